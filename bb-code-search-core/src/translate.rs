//! Prompt → [`StructuredQuery`] translation through an [`LlmBackend`].
//!
//! The model is asked (see [`crate::prompt`]) for a JSON object carrying a search term,
//! an optional project key and a page limit. [`parse_reply`] accepts prose, code fences and
//! several key spellings around the object, but rejects a reply without a usable search term.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::SearchRequest;
use crate::contract::{CompletionRequest, LlmBackend, StructuredQuery};
use crate::error::TranslationError;
use crate::prompt::PromptTemplate;

const SEARCH_TERM_KEYS: &[&str] = &["search_term", "searchTerm", "search_query", "query"];
const PROJECT_KEYS: &[&str] = &["project", "projectFilter", "project_filter"];
const MAX_PAGES_KEYS: &[&str] = &["max_pages", "maxPages", "pages"];
const NULL_LIKE: &[&str] = &["null", "none", "nil", "n/a"];

/// Ask the model to translate `request.prompt()` and parse its reply.
///
/// Exactly one call is made to `llm`; failures are not retried.
pub async fn translate<L>(
    request: &SearchRequest,
    template: &PromptTemplate,
    num_ctx: Option<u32>,
    llm: &L,
) -> Result<StructuredQuery, TranslationError>
where
    L: LlmBackend + ?Sized,
{
    info!(
        model = request.model(),
        template_version = %template.version,
        "[TRANSLATE] Requesting structured query from LLM"
    );

    let completion = CompletionRequest {
        model: request.model().to_string(),
        system: template.system.clone(),
        prompt: request.prompt().to_string(),
        temperature: request.temperature(),
        top_p: request.top_p(),
        num_ctx,
    };

    let reply = match llm.complete(completion).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "[TRANSLATE][ERROR] LLM call failed");
            return Err(e);
        }
    };
    debug!(reply = %reply, "[TRANSLATE] Raw LLM reply");

    let query = parse_reply(&reply, request.max_pages())?;
    info!(
        search_term = %query.search_term,
        project = query.project_filter.as_deref().unwrap_or("<none>"),
        max_pages = query.max_pages,
        "[TRANSLATE] Structured query ready"
    );
    Ok(query)
}

/// Parse a model reply into a [`StructuredQuery`] whose `max_pages` lies in `1..=page_limit`.
pub fn parse_reply(reply: &str, page_limit: u32) -> Result<StructuredQuery, TranslationError> {
    let object = extract_object(reply)?;

    let mut search_term = first_string(&object, SEARCH_TERM_KEYS).unwrap_or_default();
    let mut project_filter = match first_string(&object, PROJECT_KEYS) {
        Some(raw) => normalise_project(&raw)?,
        None => None,
    };

    // Models sometimes put the scope inside the query despite being told not to.
    if let Some(inline) = take_inline_project(&mut search_term) {
        if project_filter.is_none() {
            project_filter = normalise_project(&inline)?;
        }
    }

    if search_term.is_empty() {
        warn!(reply = %reply, "[TRANSLATE] Reply has no search term");
        return Err(TranslationError::MissingSearchTerm);
    }

    let page_limit = page_limit.max(1);
    let requested = first_page_count(&object);
    let max_pages = match requested {
        None => 1,
        Some(n) if n < 1 => 1,
        Some(n) if n > u64::from(page_limit) => {
            warn!(
                requested = n,
                page_limit, "[TRANSLATE] Requested page count exceeds limit, clamping"
            );
            page_limit
        }
        Some(n) => n as u32,
    };

    Ok(StructuredQuery {
        search_term,
        project_filter,
        max_pages,
    })
}

fn extract_object(reply: &str) -> Result<Map<String, Value>, TranslationError> {
    let Some(start) = reply.find('{') else {
        return Err(TranslationError::MalformedReply(format!(
            "no JSON object in reply: {reply}"
        )));
    };

    // Only the first value is read; anything after it is ignored.
    let first = serde_json::Deserializer::from_str(&reply[start..])
        .into_iter::<Value>()
        .next();
    match first {
        Some(Ok(Value::Object(map))) => Ok(map),
        Some(Ok(other)) => Err(TranslationError::MalformedReply(format!(
            "expected a JSON object, got: {other}"
        ))),
        Some(Err(e)) => Err(TranslationError::MalformedReply(format!(
            "{e}; reply: {reply}"
        ))),
        None => Err(TranslationError::MalformedReply(format!(
            "no JSON object in reply: {reply}"
        ))),
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys_values(object, keys).find_map(|v| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// A project key, or `None` for blank and null-like values.
fn normalise_project(raw: &str) -> Result<Option<String>, TranslationError> {
    let key = raw.trim();
    if key.is_empty() || NULL_LIKE.iter().any(|n| key.eq_ignore_ascii_case(n)) {
        return Ok(None);
    }
    if key.chars().any(char::is_whitespace) {
        return Err(TranslationError::MalformedReply(format!(
            "project key must not contain whitespace: {key:?}"
        )));
    }
    Ok(Some(key.to_string()))
}

fn first_page_count(object: &Map<String, Value>) -> Option<u64> {
    keys_values(object, MAX_PAGES_KEYS).find_map(|v| match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

fn keys_values<'a>(
    object: &'a Map<String, Value>,
    keys: &'a [&'a str],
) -> impl Iterator<Item = &'a Value> + 'a {
    keys.iter().filter_map(move |k| object.get(*k))
}

/// Removes every `project:KEY` token from `term`, returning the first key found.
fn take_inline_project(term: &mut String) -> Option<String> {
    let mut project = None;
    let mut kept = Vec::new();
    for token in term.split_whitespace() {
        match token.strip_prefix("project:") {
            Some(key) if !key.is_empty() => {
                if project.is_none() {
                    project = Some(key.to_string());
                }
            }
            _ => kept.push(token.to_string()),
        }
    }
    if project.is_some() {
        *term = kept.join(" ");
    }
    project
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_reply() {
        let q = parse_reply(
            r#"{"search_term": "ABCD", "project": "MYPROJ", "max_pages": 10}"#,
            100,
        )
        .unwrap();
        assert_eq!(q.search_term, "ABCD");
        assert_eq!(q.project_filter.as_deref(), Some("MYPROJ"));
        assert_eq!(q.max_pages, 10);
    }

    #[test]
    fn tolerates_code_fences_and_prose() {
        let reply = "Sure! Here is the query:\n```json\n{\"searchTerm\": \"foo lang:python\", \"projectFilter\": null}\n```";
        let q = parse_reply(reply, 100).unwrap();
        assert_eq!(q.search_term, "foo lang:python");
        assert_eq!(q.project_filter, None);
        assert_eq!(q.max_pages, 1);
    }

    #[test]
    fn missing_term_is_fatal() {
        let err = parse_reply(r#"{"project": "MYPROJ", "max_pages": 2}"#, 100).unwrap_err();
        assert!(matches!(err, TranslationError::MissingSearchTerm));
        let err = parse_reply(r#"{"search_term": "   "}"#, 100).unwrap_err();
        assert!(matches!(err, TranslationError::MissingSearchTerm));
    }

    #[test]
    fn non_json_reply_is_malformed() {
        assert!(matches!(
            parse_reply("I cannot help with that.", 100),
            Err(TranslationError::MalformedReply(_))
        ));
        assert!(matches!(
            parse_reply("{not json}", 100),
            Err(TranslationError::MalformedReply(_))
        ));
    }

    #[test]
    fn page_count_is_clamped_to_limit_and_floor() {
        let q = parse_reply(r#"{"search_term": "x", "max_pages": 500}"#, 20).unwrap();
        assert_eq!(q.max_pages, 20);
        let q = parse_reply(r#"{"search_term": "x", "max_pages": 0}"#, 20).unwrap();
        assert_eq!(q.max_pages, 1);
        let q = parse_reply(r#"{"search_term": "x", "max_pages": -3}"#, 20).unwrap();
        assert_eq!(q.max_pages, 1);
        let q = parse_reply(r#"{"search_term": "x", "pages": "7"}"#, 20).unwrap();
        assert_eq!(q.max_pages, 7);
    }

    #[test]
    fn first_object_wins_over_trailing_braces() {
        let reply = "Here: {\"search_term\":\"ABCD\"}\nLet me know if you need {more} help.";
        let q = parse_reply(reply, 10).unwrap();
        assert_eq!(q.search_term, "ABCD");

        let reply = r#"{"search_term": "ABCD", "max_pages": 2} {"search_term": "EFGH"}"#;
        let q = parse_reply(reply, 10).unwrap();
        assert_eq!(q.search_term, "ABCD");
        assert_eq!(q.max_pages, 2);
    }

    #[test]
    fn blank_alias_falls_through_to_next_key() {
        let q = parse_reply(r#"{"search_term": "", "query": "ABCD"}"#, 10).unwrap();
        assert_eq!(q.search_term, "ABCD");
    }

    #[test]
    fn null_like_project_means_no_filter() {
        for project in ["null", "None", "  ", "N/A"] {
            let reply = format!(r#"{{"search_term": "ABCD", "project": "{project}"}}"#);
            let q = parse_reply(&reply, 10).unwrap();
            assert_eq!(q.project_filter, None, "project {project:?}");
            assert_eq!(q.search_query(), "ABCD");
        }
        // A null-like value under the first alias does not hide a real key under the next.
        let q = parse_reply(r#"{"search_term": "ABCD", "project": "", "projectFilter": "MYPROJ"}"#, 10)
            .unwrap();
        assert_eq!(q.project_filter.as_deref(), Some("MYPROJ"));
    }

    #[test]
    fn project_key_with_whitespace_is_malformed() {
        let err = parse_reply(r#"{"search_term": "ABCD", "project": "My Project"}"#, 10).unwrap_err();
        assert!(matches!(err, TranslationError::MalformedReply(_)));
        let q = parse_reply(r#"{"search_term": "ABCD", "project": " MYPROJ "}"#, 10).unwrap();
        assert_eq!(q.search_query(), "ABCD project:MYPROJ");
    }

    #[test]
    fn inline_project_operator_moves_to_filter() {
        let q = parse_reply(r#"{"search_term": "ABCD project:MYPROJ"}"#, 5).unwrap();
        assert_eq!(q.search_term, "ABCD");
        assert_eq!(q.project_filter.as_deref(), Some("MYPROJ"));

        let err = parse_reply(r#"{"search_term": "project:MYPROJ"}"#, 5).unwrap_err();
        assert!(matches!(err, TranslationError::MissingSearchTerm));
    }
}
