//! Post text rendering.
//!
//! Templates use `{title}` and `{url}`; `{{` and `}}` produce literal braces.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}} (supported: {{title}}, {{url}})")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace in template")]
    UnbalancedBrace,
}

/// Substitute `title` and `url` into `template`.
pub fn render(template: &str, title: &str, url: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + title.len() + url.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(TemplateError::UnbalancedBrace),
                        Some(c) => name.push(c),
                    }
                }
                match name.as_str() {
                    "title" => out.push_str(title),
                    "url" => out.push_str(url),
                    _ => return Err(TemplateError::UnknownPlaceholder(name)),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::UnbalancedBrace),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Text used when the configured template cannot be rendered.
pub fn fallback(title: &str) -> String {
    format!("🎬 New video: {title}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_both_placeholders() {
        let text = render("New: {title}\n{url}", "Rust in 100s", "https://y.t/1").unwrap();
        assert_eq!(text, "New: Rust in 100s\nhttps://y.t/1");
    }

    #[test]
    fn placeholders_may_repeat_or_be_absent() {
        assert_eq!(render("{title} / {title}", "a", "u").unwrap(), "a / a");
        assert_eq!(render("static text", "a", "u").unwrap(), "static text");
    }

    #[test]
    fn doubled_braces_are_literal() {
        assert_eq!(render("{{{title}}}", "x", "u").unwrap(), "{x}");
    }

    #[test]
    fn braces_in_title_are_not_reinterpreted() {
        assert_eq!(render("{title}", "{url}", "u").unwrap(), "{url}");
    }

    #[test]
    fn unknown_placeholder_is_reported() {
        assert_eq!(
            render("{channel}: {title}", "a", "u"),
            Err(TemplateError::UnknownPlaceholder("channel".into()))
        );
    }

    #[test]
    fn unbalanced_braces_are_reported() {
        assert_eq!(render("{title", "a", "u"), Err(TemplateError::UnbalancedBrace));
        assert_eq!(render("title}", "a", "u"), Err(TemplateError::UnbalancedBrace));
    }

    #[test]
    fn fallback_mentions_title() {
        assert_eq!(fallback("Launch"), "🎬 New video: Launch");
    }
}
