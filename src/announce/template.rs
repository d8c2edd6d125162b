//! Minimal `{{ .name }}` template substitution.
//!
//! The URL templates in indexer definitions only ever substitute named
//! variables, so a purpose-built substituter replaces a template engine
//! and makes the missing-variable contract explicit: unknown names render
//! as the empty string.

use std::collections::HashMap;

/// Render a template against a variable dictionary.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = after[..end].trim();
                let key = token.strip_prefix('.').unwrap_or(token);
                if let Some(value) = vars.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated token: emit verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes() {
        let out = render(
            "https://x/dl?id={{ .torrentId }}&key={{ .passkey }}",
            &vars(&[("torrentId", "42"), ("passkey", "PK")]),
        );
        assert_eq!(out, "https://x/dl?id=42&key=PK");
    }

    #[test]
    fn test_render_missing_is_empty() {
        let out = render("a={{ .a }}&b={{ .b }}", &vars(&[("a", "1")]));
        assert_eq!(out, "a=1&b=");
    }

    #[test]
    fn test_render_no_spaces() {
        let out = render("{{.name}}", &vars(&[("name", "x")]));
        assert_eq!(out, "x");
    }

    #[test]
    fn test_render_deterministic() {
        let v = vars(&[("id", "7")]);
        let first = render("u/{{ .id }}", &v);
        let second = render("u/{{ .id }}", &v);
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_unterminated_token() {
        let out = render("x{{ .oops", &vars(&[]));
        assert_eq!(out, "x{{ .oops");
    }
}
