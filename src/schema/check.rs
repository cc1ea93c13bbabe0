//! CHECK expression parsing
//!
//! Only enumerations are evaluated client-side: `col IN ('a', 'b')` and the
//! normalized `col = ANY (ARRAY['a'::text, 'b'::text])` form. Every other
//! CHECK expression is left to the database.

use std::sync::OnceLock;

use regex::Regex;

fn opener() -> &'static Regex {
    static OPENER: OnceLock<Regex> = OnceLock::new();
    OPENER.get_or_init(|| {
        Regex::new(r"(?i)(\bNOT\s+)?\b(?:IN|ANY)\s*\(").expect("valid enumeration opener regex")
    })
}

fn quoted_literal() -> &'static Regex {
    static LITERAL: OnceLock<Regex> = OnceLock::new();
    LITERAL.get_or_init(|| Regex::new(r"'((?:[^']|'')*)'").expect("valid quoted literal regex"))
}

/// Text between an opening bracket (already consumed) and its match
fn balanced_region(text: &str) -> &str {
    let mut depth = 1usize;
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' | '[' if !in_quote => depth += 1,
            ')' | ']' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return &text[..i];
                }
            }
            _ => {}
        }
    }
    text
}

fn numeric_member(item: &str) -> Option<String> {
    let is_open = |c: char| c == '(' || c == '[' || c.is_whitespace();
    let is_close = |c: char| c == ')' || c == ']' || c.is_whitespace();

    let item = item.split("::").next().unwrap_or_default();
    let mut item = item.trim_start_matches(is_open);
    if item.get(..5).map_or(false, |p| p.eq_ignore_ascii_case("ARRAY")) {
        item = &item[5..];
    }
    let item = item.trim_start_matches(is_open).trim_end_matches(is_close);

    item.parse::<f64>().ok().map(|_| item.to_string())
}

/// Members of the enumeration encoded by `expression`
///
/// Returns `None` when the expression is not a (positive) enumeration.
pub fn enumeration_members(expression: &str) -> Option<Vec<String>> {
    let captures = opener().captures(expression)?;
    if captures.get(1).is_some() {
        return None;
    }
    let start = captures.get(0)?.end();
    let region = balanced_region(&expression[start..]);

    let quoted: Vec<String> = quoted_literal()
        .captures_iter(region)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().replace("''", "'"))
        .collect();

    // '{a,b}'::text[] array literal
    if let [single] = quoted.as_slice() {
        if let Some(inner) = single.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let members: Vec<String> = inner
                .split(',')
                .map(|m| m.trim().trim_matches('"').to_string())
                .filter(|m| !m.is_empty())
                .collect();
            return (!members.is_empty()).then_some(members);
        }
    }
    if !quoted.is_empty() {
        return Some(quoted);
    }

    let numbers: Vec<String> = region.split(',').filter_map(numeric_member).collect();
    (!numbers.is_empty()).then_some(numbers)
}

/// Whether `candidate` literal-matches `member`; numbers compare by value
pub fn matches_member(candidate: &str, member: &str) -> bool {
    if candidate == member {
        return true;
    }
    match (candidate.parse::<f64>(), member.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(expression: &str) -> Option<Vec<String>> {
        enumeration_members(expression)
    }

    #[test]
    fn test_patterns_compile() {
        assert!(opener().is_match("status IN ('a')"));
        assert!(opener().is_match("status = ANY (ARRAY['a'::text])"));
        assert_eq!(quoted_literal().captures_iter("'a', 'it''s'").count(), 2);
    }

    #[test]
    fn test_normalized_any_array_form() {
        let expr = "CHECK ((status = ANY (ARRAY['pending'::text, 'in_progress'::text, 'done'::text])))";
        assert_eq!(
            members(expr),
            Some(vec!["pending".into(), "in_progress".into(), "done".into()])
        );
    }

    #[test]
    fn test_in_list_form() {
        assert_eq!(
            members("CHECK (role IN ('admin', 'member'))"),
            Some(vec!["admin".into(), "member".into()])
        );
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(
            members("CHECK (label IN ('it''s', 'plain'))"),
            Some(vec!["it's".into(), "plain".into()])
        );
    }

    #[test]
    fn test_casted_array_with_varchar() {
        let expr = "CHECK (((kind)::text = ANY ((ARRAY['a'::character varying, 'b'::character varying])::text[])))";
        assert_eq!(members(expr), Some(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_numeric_members() {
        assert_eq!(
            members("CHECK ((priority = ANY (ARRAY[1, 2, 3])))"),
            Some(vec!["1".into(), "2".into(), "3".into()])
        );
        assert_eq!(
            members("CHECK (level IN (1::int4, 2::int4))"),
            Some(vec!["1".into(), "2".into()])
        );
    }

    #[test]
    fn test_array_literal_form() {
        assert_eq!(
            members("CHECK ((color = ANY ('{red,green}'::text[])))"),
            Some(vec!["red".into(), "green".into()])
        );
    }

    #[test]
    fn test_non_enumerations() {
        assert_eq!(members("CHECK ((priority >= 0))"), None);
        assert_eq!(members("CHECK ((char_length(title) > 0))"), None);
        assert_eq!(members("CHECK (status NOT IN ('x', 'y'))"), None);
    }

    #[test]
    fn test_matches_member() {
        assert!(matches_member("done", "done"));
        assert!(matches_member("2", "2.0"));
        assert!(!matches_member("Done", "done"));
    }
}
