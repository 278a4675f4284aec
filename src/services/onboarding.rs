use std::iter::Peekable;
use std::str::Chars;
use std::sync::OnceLock;

use regex::Regex;

use crate::services::{explanations::complete_or_fallback, providers::LlmProvider};

pub fn build_prompt(text: &str) -> String {
    format!(
        "A new user says: '{}'. Extract their key interests and suggest 3-5 movie genres or tags \
         for a recommendation system. Reply as a Python list of strings, and nothing else.",
        text
    )
}

/// Turns a new user's free-text self description into interest tags
pub async fn extract_interests(llm: &dyn LlmProvider, text: &str) -> Vec<String> {
    let reply = complete_or_fallback(llm, &build_prompt(text)).await;
    parse_interests(&reply)
}

/// Pulls the first `[...]` out of a model reply and reads it as a list of strings
///
/// The reply is untrusted: anything that is not a plain list of quoted
/// strings is rejected and the whole reply is returned as the only element.
pub fn parse_interests(reply: &str) -> Vec<String> {
    static BRACKETED: OnceLock<Regex> = OnceLock::new();
    let bracketed = BRACKETED.get_or_init(|| Regex::new(r"(?s)\[.*?\]").expect("valid regex"));

    let parsed = bracketed
        .find(reply)
        .and_then(|m| parse_string_list(m.as_str()));

    match parsed {
        Some(tags) => tags,
        None => {
            tracing::debug!(reply = %reply, "Reply is not a list of strings, keeping raw text");
            vec![reply.to_string()]
        }
    }
}

/// Strict reader for `[ "a", 'b', ]`
///
/// Accepts single- or double-quoted strings with backslash escapes, separated
/// by commas, with an optional trailing comma. Returns `None` for anything else.
pub fn parse_string_list(input: &str) -> Option<Vec<String>> {
    let mut chars = input.trim().chars().peekable();
    let mut items = Vec::new();

    if chars.next()? != '[' {
        return None;
    }

    loop {
        skip_whitespace(&mut chars);
        match chars.peek()? {
            ']' => {
                chars.next();
                break;
            }
            '\'' | '"' => {
                items.push(parse_quoted(&mut chars)?);
                skip_whitespace(&mut chars);
                match chars.next()? {
                    ',' => continue,
                    ']' => break,
                    _ => return None,
                }
            }
            _ => return None,
        }
    }

    skip_whitespace(&mut chars);
    if chars.next().is_some() {
        return None;
    }

    Some(items)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let quote = chars.next()?;
    let mut out = String::new();

    loop {
        match chars.next()? {
            c if c == quote => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                c @ ('\\' | '\'' | '"') => out.push(c),
                'x' => out.push(parse_hex_escape(chars, 2)?),
                'u' => out.push(parse_hex_escape(chars, 4)?),
                'U' => out.push(parse_hex_escape(chars, 8)?),
                _ => return None,
            },
            '\n' => return None,
            c => out.push(c),
        }
    }
}

/// Reads exactly `digits` hex digits as a code point; surrogates are rejected
fn parse_hex_escape(chars: &mut Peekable<Chars<'_>>, digits: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..digits {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::providers::MockLlmProvider;

    #[test]
    fn test_parse_double_quoted_list() {
        assert_eq!(
            parse_interests(r#"["sci-fi", "heist", "thriller"]"#),
            vec!["sci-fi", "heist", "thriller"]
        );
    }

    #[test]
    fn test_parse_single_quoted_list_with_surrounding_prose() {
        let reply = "Sure! Here you go:\n['space opera', 'heist', \"it's a caper\",]\nEnjoy.";
        assert_eq!(
            parse_interests(reply),
            vec!["space opera", "heist", "it's a caper"]
        );
    }

    #[test]
    fn test_parse_escapes() {
        assert_eq!(
            parse_string_list(r#"['rock \'n\' roll', "say \"hi\""]"#),
            Some(vec!["rock 'n' roll".to_string(), "say \"hi\"".to_string()])
        );
    }

    #[test]
    fn test_parse_hex_and_unicode_escapes() {
        assert_eq!(
            parse_interests(r#"["caf\u00e9", 'na\xefve', "\U0001F3AC films"]"#),
            vec!["café", "naïve", "🎬 films"]
        );
        assert_eq!(parse_string_list(r#"["\u00e"]"#), None);
        assert_eq!(parse_string_list(r#"["\ud83c"]"#), None);
        assert_eq!(parse_string_list(r#"["\xzz"]"#), None);
    }

    #[test]
    fn test_parse_empty_list() {
        assert_eq!(parse_interests("[]"), Vec::<String>::new());
    }

    #[test]
    fn test_no_brackets_returns_raw_reply() {
        let reply = "Sci-fi, heist and thriller.";
        assert_eq!(parse_interests(reply), vec![reply.to_string()]);
    }

    #[test]
    fn test_code_like_content_is_rejected() {
        for reply in [
            "[__import__('os').system('rm -rf /')]",
            "[1, 2, 3]",
            "['a' + 'b']",
            "[\"unterminated]",
            "[['nested']]",
        ] {
            assert_eq!(parse_interests(reply), vec![reply.to_string()], "{}", reply);
        }
    }

    #[tokio::test]
    async fn test_extract_interests_uses_model_reply() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .withf(|prompt: &str| prompt.starts_with("A new user says: 'I love sci-fi and heist movies'."))
            .times(1)
            .returning(|_| Ok(r#"["sci-fi", "heist", "thriller"]"#.to_string()));

        let interests = extract_interests(&llm, "I love sci-fi and heist movies").await;
        assert_eq!(interests, vec!["sci-fi", "heist", "thriller"]);
    }

    #[tokio::test]
    async fn test_extract_interests_provider_failure_yields_fallback_text() {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .returning(|_| Err(AppError::ExternalApi("timeout".to_string())));
        llm.expect_name().return_const("mock");

        let interests = extract_interests(&llm, "anything").await;
        assert_eq!(interests.len(), 1);
        assert!(interests[0].contains("LLM fallback"));
    }
}
