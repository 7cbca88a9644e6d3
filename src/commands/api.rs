//! API documentation lookup.
//!
//! Indexes javadoc-style `index-all` files plus plain source listings
//! into class/method/field/source maps, then answers exact lookups with
//! the matching URLs and falls back to the closest term by
//! Damerau-Levenshtein distance.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use super::{Context, Handler, HandlerError, PluginError};

/// `api.toml` shape: documentation indexes and source listings.
#[derive(Debug, Deserialize)]
struct ApiSpec {
    #[serde(default, rename = "api")]
    apis: Vec<ApiEntry>,
    #[serde(default, rename = "src")]
    sources: Vec<SrcEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiEntry {
    name: String,
    baseurl: String,
    #[serde(default)]
    urlprefix: String,
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SrcEntry {
    name: String,
    baseurl: String,
    #[serde(default)]
    urlsuffix: String,
    files: Vec<String>,
}

type TermMap = HashMap<String, Vec<String>>;

/// What a lookup is limited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    All,
    Classes,
    Methods,
    Fields,
    Source,
}

/// Outcome of a lookup: whether it matched exactly or by distance.
struct SearchResults {
    exact: bool,
    urls: Vec<String>,
}

pub struct ApiCommands {
    classes: TermMap,
    methods: TermMap,
    fields: TermMap,
    source: TermMap,
    apis: Vec<String>,
}

fn add_term(map: &mut TermMap, term: &str, url: &str) {
    map.entry(term.to_lowercase())
        .or_default()
        .push(url.to_string());
}

/// Damerau-Levenshtein distance (insert, delete, substitute, transpose).
fn dam_lev_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        table[0][j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let diff = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (table[i - 1][j] + 1)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j - 1] + diff);

            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(table[i - 2][j - 2] + diff);
            }
            table[i][j] = best;
        }
    }
    table[a.len()][b.len()]
}

impl ApiCommands {
    /// Load the indexes described by `api.toml`. A missing description
    /// file or index file degrades to an empty (or partial) index with a
    /// warning, never a failed plugin.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let mut commands = Self {
            classes: TermMap::new(),
            methods: TermMap::new(),
            fields: TermMap::new(),
            source: TermMap::new(),
            apis: Vec::new(),
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "api description not found, starting empty");
                return Ok(commands);
            }
            Err(e) => return Err(PluginError::Io(e)),
        };

        let spec: ApiSpec =
            toml::from_str(&content).map_err(|e| PluginError::Data(e.to_string()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        for api in &spec.apis {
            commands.apis.push(api.name.clone());
            for file in &api.files {
                if let Err(e) = commands.parse_index(&dir.join(file), &api.baseurl, &api.urlprefix)
                {
                    warn!(file, error = %e, "skipping api index file");
                }
            }
        }

        for src in &spec.sources {
            commands.apis.push(src.name.clone());
            for file in &src.files {
                if let Err(e) = commands.parse_src(&dir.join(file), &src.baseurl, &src.urlsuffix) {
                    warn!(file, error = %e, "skipping source listing file");
                }
            }
        }

        Ok(commands)
    }

    /// Parse a javadoc `index-all` style file: every `<dt>` entry links
    /// a class, method, or field.
    fn parse_index(
        &mut self,
        file: &Path,
        baseurl: &str,
        urlprefix: &str,
    ) -> std::io::Result<()> {
        let content = std::fs::read_to_string(file)?;
        for line in content.lines() {
            let mut rest = line;
            while let Some(found) = rest.find("<dt>") {
                let entry = &rest[found..];
                self.handle_entry(entry, baseurl, urlprefix);
                rest = &rest[found + 4..];
            }
        }
        Ok(())
    }

    /// Index one `<dt><a href="…">` entry.
    fn handle_entry(&mut self, entry: &str, baseurl: &str, urlprefix: &str) {
        // Skip `<dt><a href="` plus the configured prefix.
        let url_start = 13 + urlprefix.len();
        let Some(tail) = entry.get(url_start..) else {
            return;
        };
        let Some(end) = tail.find('"') else {
            return;
        };
        let url = &tail[..end];
        let Some(slash) = url.rfind('/') else {
            return;
        };

        let pack = url[..slash].replace('/', ".");
        let name = &url[slash + 1..];

        let full_url = format!("{baseurl}{url}")
            .replace('(', "%28")
            .replace(')', "%29")
            .replace(' ', "%20");

        match name.find('#') {
            None => {
                let Some(class_name) = name.strip_suffix(".html") else {
                    return;
                };
                add_term(&mut self.classes, class_name, &full_url);
                add_term(&mut self.classes, &format!("{pack}.{class_name}"), &full_url);
            }
            Some(hash) => {
                let Some(class_name) = name[..hash].strip_suffix(".html") else {
                    return;
                };
                let member = &name[hash + 1..];

                if member.ends_with('-') {
                    // Method anchor, e.g. `parseInt-java.lang.String-`.
                    let Some(dash) = member.find('-') else {
                        return;
                    };
                    let mut method = &member[..dash];
                    if method == class_name {
                        method = "<init>";
                    }
                    if method != "<init>" {
                        add_term(&mut self.methods, method, &full_url);
                    }
                    add_term(
                        &mut self.methods,
                        &format!("{class_name}.{method}"),
                        &full_url,
                    );
                    add_term(
                        &mut self.methods,
                        &format!("{pack}.{class_name}.{method}"),
                        &full_url,
                    );
                } else {
                    add_term(&mut self.fields, member, &full_url);
                    add_term(&mut self.fields, &format!("{class_name}.{member}"), &full_url);
                    add_term(
                        &mut self.fields,
                        &format!("{pack}.{class_name}.{member}"),
                        &full_url,
                    );
                }
            }
        }
    }

    /// Parse a source listing: one path per line, e.g.
    /// `java/lang/String.java`.
    fn parse_src(&mut self, file: &Path, baseurl: &str, urlsuffix: &str) -> std::io::Result<()> {
        let content = std::fs::read_to_string(file)?;
        for line in content.lines() {
            let Some(slash) = line.rfind('/') else {
                continue;
            };
            let pack = line[..slash].replace('/', ".");
            let Some(class_name) = line[slash + 1..].strip_suffix(".java") else {
                continue;
            };

            let full_url = format!("{baseurl}{line}{urlsuffix}");
            add_term(&mut self.source, class_name, &full_url);
            add_term(&mut self.source, &format!("{pack}.{class_name}"), &full_url);
        }
        Ok(())
    }

    fn maps_for(&self, kind: SearchKind) -> Vec<&TermMap> {
        match kind {
            SearchKind::All => vec![&self.classes, &self.methods, &self.fields],
            SearchKind::Classes => vec![&self.classes],
            SearchKind::Methods => vec![&self.methods],
            SearchKind::Fields => vec![&self.fields],
            SearchKind::Source => vec![&self.source],
        }
    }

    /// Exact lookup, falling back to the closest indexed terms.
    fn search(&self, term: &str, kind: SearchKind) -> SearchResults {
        let term = term.to_lowercase().replace(' ', "");

        let mut urls = Vec::new();
        for map in self.maps_for(kind) {
            if let Some(found) = map.get(&term) {
                urls.extend(found.iter().cloned());
            }
        }

        if !urls.is_empty() {
            return SearchResults { exact: true, urls };
        }

        self.best_match(&term, kind)
    }

    fn best_match(&self, term: &str, kind: SearchKind) -> SearchResults {
        let mut best_dist = usize::MAX;
        let mut urls = Vec::new();

        for map in self.maps_for(kind) {
            for (key, key_urls) in map {
                let distance = dam_lev_distance(term, key);
                if distance < best_dist {
                    best_dist = distance;
                    urls.clear();
                    urls.extend(key_urls.iter().cloned());
                } else if distance == best_dist {
                    urls.extend(key_urls.iter().cloned());
                }
            }
        }

        SearchResults { exact: false, urls }
    }

    fn format_results(results: &SearchResults) -> String {
        if results.urls.is_empty() {
            return "No matches found.".to_string();
        }

        let shown = results.urls.len().min(3);
        let mut out = results.urls[..shown].join(" | ");
        if results.urls.len() > 3 {
            out.push_str(&format!(" ({} total)", results.urls.len()));
        }
        if !results.exact {
            let label = if shown > 1 { "Best matches: " } else { "Best match: " };
            out.insert_str(0, label);
        }
        out
    }
}

#[async_trait]
impl Handler for ApiCommands {
    fn public_commands(&self) -> Vec<String> {
        ["api", "class", "method", "field", "apis", "src"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn reply(
        &self,
        ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        if command == "apis" {
            return Ok(Some(format!(
                "All loaded APIs: {}",
                self.apis.join(", ")
            )));
        }

        if argument.is_empty() {
            return Ok(Some(format!(
                "{}, please provide something to search for.",
                ctx.caller.nick
            )));
        }

        let kind = match command {
            "class" => SearchKind::Classes,
            "method" => SearchKind::Methods,
            "field" => SearchKind::Fields,
            "src" => SearchKind::Source,
            _ => SearchKind::All,
        };

        let results = self.search(argument, kind);
        Ok(Some(Self::format_results(&results)))
    }
}
