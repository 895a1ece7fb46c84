//! Text-level helpers for model-generated SQL: cleanup, header recovery, and extraction.

use std::sync::OnceLock;

use regex::Regex;

fn whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn select_keyword() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bselect\s+").expect("static regex"))
}

fn alias() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\s+AS\s+(?:"([^"]+)"|`([^`]+)`|\[([^\]]+)\]|(\w+))"#)
            .expect("static regex")
    })
}

fn statement_start() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bselect\b").expect("static regex"))
}

fn statement_end() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\d+\.\s+|```").expect("static regex"))
}

/// Collapses whitespace runs and strips trailing backtick/colon artifacts. Idempotent.
pub fn normalize_query(query: &str) -> String {
    whitespace()
        .replace_all(query, " ")
        .trim()
        .trim_end_matches(|ch: char| ch == '`' || ch == ':' || ch.is_whitespace())
        .to_string()
}

/// Drops a surrounding markdown fence (```sql ... ```) if the model added one anyway.
pub fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    let tag_len = body.find(|ch: char| !ch.is_ascii_alphanumeric()).unwrap_or(body.len());
    let (tag, rest) = body.split_at(tag_len);
    if !tag.is_empty() && !is_statement_start(tag) && rest.starts_with(char::is_whitespace) {
        return rest.trim();
    }
    body.trim()
}

/// A fence tag like `sql` is dropped, but a fence that opens straight onto `SELECT`/`WITH` keeps it.
fn is_statement_start(word: &str) -> bool {
    word.eq_ignore_ascii_case("select") || word.eq_ignore_ascii_case("with")
}

/// Column names recovered from the `SELECT ... FROM` clause, for sources that return bare rows.
///
/// Each projected column resolves to its `AS` alias, otherwise to its last dotted segment.
/// Returns an empty list when no top-level `SELECT ... FROM` is found.
pub fn extract_column_names(sql: &str) -> Vec<String> {
    let Some(select_list) = select_list(sql) else {
        return Vec::new();
    };

    split_top_level(select_list, ',')
        .into_iter()
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(column_name)
        .collect()
}

/// Every `SELECT ...` segment in free text, ending at a numbered list item, a fence, or the end.
pub fn extract_sql_queries(text: &str) -> Vec<String> {
    let mut queries = Vec::new();
    let mut cursor = 0;

    while let Some(start) = statement_start().find_at(text, cursor) {
        let end = statement_end()
            .find_at(text, start.end())
            .map(|terminator| terminator.start())
            .unwrap_or(text.len());
        let query = normalize_query(&text[start.start()..end]);
        if !query.is_empty() {
            queries.push(query);
        }
        cursor = end;
    }

    queries
}

fn column_name(column: &str) -> String {
    if let Some(captures) = alias().captures(column) {
        if let Some(name) = (1..=4).find_map(|group| captures.get(group)) {
            return name.as_str().to_string();
        }
    }

    let column = column.trim_matches(|ch| ch == '"' || ch == ' ');
    let last = column.rsplit('.').next().unwrap_or(column);
    last.trim_matches(|ch| ch == '"' || ch == ' ').to_string()
}

fn select_list(sql: &str) -> Option<&str> {
    let start = select_keyword().find(sql)?.end();
    let rest = &sql[start..];
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for (index, ch) in rest.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if depth == 0 && ch.is_whitespace() && starts_with_from(&rest[index + 1..]) => {
                return Some(rest[..index].trim());
            }
            _ => {}
        }
    }

    None
}

fn starts_with_from(text: &str) -> bool {
    let Some(word) = text.get(..4) else {
        return false;
    };
    word.eq_ignore_ascii_case("from")
        && text[4..].chars().next().map_or(true, |next| next.is_whitespace() || next == '(')
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut segment_start = 0;

    for (index, ch) in text.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if ch == separator && depth == 0 => {
                parts.push(&text[segment_start..index]);
                segment_start = index + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[segment_start..]);

    parts
}
