//! Human-readable and JSON renderings of a result set.

use anyhow::Result;
use bb_code_search_core::contract::SearchResultSet;

const SEPARATOR_WIDTH: usize = 40;
pub const NO_MATCHES: &str = "No matching files found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// `File: repo/path`, its matched lines and a separator, per hit.
    Matches { highlight: bool },
    /// One `repo/path` per line.
    NamesOnly,
    /// The result set as a pretty-printed JSON array.
    Json,
}

pub fn render(hits: &SearchResultSet, mode: OutputMode) -> Result<String> {
    let rendered = match mode {
        OutputMode::Json => return Ok(serde_json::to_string_pretty(hits)?),
        OutputMode::NamesOnly => hits
            .iter()
            .map(|h| h.display_name())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputMode::Matches { highlight } => hits
            .iter()
            .filter_map(|h| {
                let snippet = h.render_snippet(highlight);
                if snippet.is_empty() {
                    None
                } else {
                    Some(format!(
                        "File: {}\n{}\n{}",
                        h.display_name(),
                        snippet,
                        "-".repeat(SEPARATOR_WIDTH)
                    ))
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };

    if rendered.is_empty() {
        Ok(NO_MATCHES.to_string())
    } else {
        Ok(rendered)
    }
}
