//! Command listing.
//!
//! `help` lists the public commands; `help2` lists the restricted ones
//! to authorized users. Long listings are paged.

use async_trait::async_trait;
use std::collections::BTreeSet;

use super::{Context, Handler, HandlerError};

const PER_PAGE: usize = 30;

pub struct HelpCommands;

/// Render one page of a sorted command listing.
fn page_of(mut page: usize, per_page: usize, commands: &BTreeSet<String>) -> String {
    let list: Vec<&str> = commands.iter().map(String::as_str).collect();
    let total_pages = list.len().saturating_sub(1) / per_page + 1;

    page = page.clamp(1, total_pages);

    let start = (page - 1) * per_page;
    let end = (page * per_page).min(list.len());

    let mut out = String::from("Available commands");
    if total_pages > 1 {
        out.push_str(&format!(", page {page}/{total_pages}"));
    }
    if start < end {
        out.push_str(": ");
        out.push_str(&list[start..end].join(", "));
    }
    out
}

#[async_trait]
impl Handler for HelpCommands {
    fn public_commands(&self) -> Vec<String> {
        vec!["help".to_string()]
    }

    fn restricted_commands(&self) -> Vec<String> {
        vec!["help2".to_string()]
    }

    async fn reply(
        &self,
        ctx: &Context<'_>,
        command: &str,
        argument: &str,
    ) -> Result<Option<String>, HandlerError> {
        let page = argument.trim().parse::<usize>().unwrap_or(1);
        let snapshot = ctx.bot.registry.snapshot();

        let reply = match command {
            "help" => Some(page_of(page, PER_PAGE, &snapshot.public)),
            "help2" if ctx.is_authorized() => Some(page_of(page, PER_PAGE, &snapshot.restricted)),
            _ => None,
        };

        Ok(reply)
    }
}
