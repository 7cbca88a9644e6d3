//! Command registry and visibility tracking.
//!
//! The registry maps command names to handlers through an immutable
//! snapshot that is replaced wholesale on every change. Readers clone
//! the snapshot `Arc`, so a lookup issued concurrently with a reload
//! sees either the old or the new registration, never a half-built one.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use super::{build, Handler, PluginDeps, PluginError, BUILTIN_PLUGINS};

/// One registry generation: visibility sets plus the name→handler map.
#[derive(Clone, Default)]
pub struct Snapshot {
    /// Names visible in public help listings.
    pub public: BTreeSet<String>,
    /// Names reserved for privileged users.
    pub restricted: BTreeSet<String>,
    by_name: HashMap<String, Arc<dyn Handler>>,
}

impl Snapshot {
    /// Whether any handler owns this name, public or restricted.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Merge a handler's commands, skipping names already taken.
    /// Returns the names actually added.
    fn merge(&mut self, handler: &Arc<dyn Handler>) -> BTreeSet<String> {
        let mut added = BTreeSet::new();
        for name in handler.public_commands() {
            if !self.by_name.contains_key(&name) {
                self.by_name.insert(name.clone(), Arc::clone(handler));
                self.public.insert(name.clone());
                added.insert(name);
            }
        }
        for name in handler.restricted_commands() {
            if !self.by_name.contains_key(&name) {
                self.by_name.insert(name.clone(), Arc::clone(handler));
                self.restricted.insert(name.clone());
                added.insert(name);
            }
        }
        added
    }
}

/// Registry of command handlers.
pub struct Registry {
    deps: PluginDeps,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Registry {
    /// Create an empty registry. Call [`reload_all`](Self::reload_all)
    /// to populate it.
    pub fn new(deps: PluginDeps) -> Self {
        Self {
            deps,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Build and register a single plugin by name.
    ///
    /// Names already owned by another handler are silently skipped; the
    /// returned set holds only the names this call actually added. An
    /// empty set means nothing new (already loaded, or every name
    /// collided).
    pub fn register(&self, plugin: &str) -> Result<BTreeSet<String>, PluginError> {
        let handler = build(plugin, &self.deps)?;

        let mut guard = self.snapshot.write();
        let mut next = Snapshot::clone(&guard);
        let added = next.merge(&handler);
        *guard = Arc::new(next);

        Ok(added)
    }

    /// Drop the current snapshot and re-register every built-in plugin
    /// in the fixed order. A plugin that fails to construct is logged
    /// and skipped; the rest load normally.
    pub fn reload_all(&self) {
        let mut next = Snapshot::default();

        for plugin in BUILTIN_PLUGINS {
            match build(plugin, &self.deps) {
                Ok(handler) => {
                    next.merge(&handler);
                }
                Err(e) => {
                    warn!(plugin, error = %e, "skipping plugin");
                }
            }
        }

        info!(
            public = ?next.public,
            restricted = ?next.restricted,
            "commands registered"
        );

        *self.snapshot.write() = Arc::new(next);
    }

    /// Look up the handler owning a command name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.snapshot.read().by_name.get(name).cloned()
    }

    /// The current snapshot, for help listings and name checks.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Register an already-built handler, bypassing the plugin factory.
    #[cfg(test)]
    pub(crate) fn install_for_tests(&self, handler: Arc<dyn Handler>) {
        let mut guard = self.snapshot.write();
        let mut next = Snapshot::clone(&guard);
        next.merge(&handler);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Context, HandlerError};
    use async_trait::async_trait;

    struct FixedCommands {
        public: Vec<String>,
        restricted: Vec<String>,
    }

    #[async_trait]
    impl Handler for FixedCommands {
        fn public_commands(&self) -> Vec<String> {
            self.public.clone()
        }

        fn restricted_commands(&self) -> Vec<String> {
            self.restricted.clone()
        }

        async fn reply(
            &self,
            _ctx: &Context<'_>,
            _command: &str,
            _argument: &str,
        ) -> Result<Option<String>, HandlerError> {
            Ok(Some("fixed".to_string()))
        }
    }

    fn handler(public: &[&str], restricted: &[&str]) -> Arc<dyn Handler> {
        Arc::new(FixedCommands {
            public: public.iter().map(|s| s.to_string()).collect(),
            restricted: restricted.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn first_registrant_wins() {
        let mut snapshot = Snapshot::default();

        let added = snapshot.merge(&handler(&["google", "wiki"], &[]));
        assert_eq!(
            added,
            BTreeSet::from(["google".to_string(), "wiki".to_string()])
        );

        // A later handler cannot take "google"; only its fresh name is
        // added.
        let added = snapshot.merge(&handler(&["google", "bing"], &[]));
        assert_eq!(added, BTreeSet::from(["bing".to_string()]));
        assert!(snapshot.public.contains("google"));
    }

    #[test]
    fn full_collision_yields_empty_set() {
        let mut snapshot = Snapshot::default();
        snapshot.merge(&handler(&["google"], &["quit"]));

        let added = snapshot.merge(&handler(&["google"], &["quit"]));
        assert!(added.is_empty());
    }

    #[test]
    fn visibility_sets_are_disjoint_per_name() {
        let mut snapshot = Snapshot::default();
        snapshot.merge(&handler(&["help"], &["quit"]));

        assert!(snapshot.public.contains("help"));
        assert!(!snapshot.public.contains("quit"));
        assert!(snapshot.restricted.contains("quit"));
        assert!(snapshot.contains("help"));
        assert!(snapshot.contains("quit"));
    }

    #[test]
    fn restricted_name_blocks_public_registration() {
        let mut snapshot = Snapshot::default();
        snapshot.merge(&handler(&[], &["reload"]));

        let added = snapshot.merge(&handler(&["reload"], &[]));
        assert!(added.is_empty());
        assert!(!snapshot.public.contains("reload"));
    }
}
