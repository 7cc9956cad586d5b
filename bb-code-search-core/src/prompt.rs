//! Versioned instruction template sent to the LLM as the system message.

use serde::{Deserialize, Serialize};

pub const BUILTIN_TEMPLATE_VERSION: &str = "v1";

const SEARCH_SYNTAX_RULES: &str = "\
Bitbucket code search syntax:
- A query must contain at least one search term.
- Operators must be written in ALL CAPS: AND, OR, NOT, - and parentheses.
- Several terms form a boolean query joined by an implicit AND, so \"bitbucket server\" means \"bitbucket AND server\".
- Wildcards (qu?ck, buil*) and regular expressions are not supported.
- Single characters are not indexed and are ignored.
- Case is not preserved, except that operators must be upper case.
- A query may contain at most 9 expressions (terms plus operators).
- `lang:<language>` restricts results to one language, e.g. `my_function lang:python`.
";

const REPLY_SCHEMA: &str = "\
Reply with a single JSON object and nothing else:
{\"search_term\": string, \"project\": string or null, \"max_pages\": integer or null}
- search_term: the Bitbucket query without any project: operator. It must not be empty.
- project: the Bitbucket project key the user asked to search in, or null.
- max_pages: the number of result pages the user asked for, or null.
";

/// The system instruction for prompt translation, tagged with a version so
/// replies can be traced back to the template that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub version: String,
    pub system: String,
}

impl PromptTemplate {
    pub fn new(version: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            system: system.into(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_TEMPLATE_VERSION,
            format!(
                "Act as a senior software engineer translating requests into Bitbucket code searches.\n\n{SEARCH_SYNTAX_RULES}\n{REPLY_SCHEMA}"
            ),
        )
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_template_describes_reply_schema() {
        let t = PromptTemplate::builtin();
        assert_eq!(t.version, "v1");
        assert!(t.system.contains("search_term"));
        assert!(t.system.contains("max_pages"));
        assert!(t.system.contains("ALL CAPS"));
    }
}
