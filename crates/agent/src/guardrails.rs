#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

impl QueryDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Shape check applied to every generated query before it reaches a data source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryGuardrail {
    pub max_query_chars: usize,
}

impl Default for QueryGuardrail {
    fn default() -> Self {
        Self { max_query_chars: 20_000 }
    }
}

impl QueryGuardrail {
    pub fn evaluate(&self, query: &str) -> QueryDecision {
        let query = query.trim();
        if query.is_empty() {
            return QueryDecision::Deny {
                reason_code: "empty_query",
                user_message: "The model did not produce a query for this question.".to_string(),
            };
        }

        if query.chars().count() > self.max_query_chars {
            return QueryDecision::Deny {
                reason_code: "query_too_long",
                user_message: format!(
                    "Generated query exceeds the {} character limit.",
                    self.max_query_chars
                ),
            };
        }

        let leading = query
            .split(|ch: char| ch.is_whitespace() || ch == '(')
            .find(|word| !word.is_empty())
            .unwrap_or_default()
            .to_ascii_uppercase();
        if leading != "SELECT" && leading != "WITH" {
            return QueryDecision::Deny {
                reason_code: "non_read_statement",
                user_message: format!("Only SELECT queries may run; got `{leading}`."),
            };
        }

        if leading == "WITH" {
            let main = main_statement_keyword(query);
            if main.as_deref() != Some("SELECT") {
                let got = main.unwrap_or_else(|| "nothing".to_string());
                return QueryDecision::Deny {
                    reason_code: "non_read_statement",
                    user_message: format!("Only SELECT queries may follow a WITH clause; got `{got}`."),
                };
            }
        }

        if has_inner_separator(query) {
            return QueryDecision::Deny {
                reason_code: "multiple_statements",
                user_message: "Generated query contains more than one statement.".to_string(),
            };
        }

        QueryDecision::Allow
    }
}

const STATEMENT_KEYWORDS: [&str; 6] = ["SELECT", "VALUES", "INSERT", "UPDATE", "DELETE", "REPLACE"];

/// First statement keyword at paren depth zero, skipping string literals. For a `WITH` query this is
/// the statement the CTE list feeds, since CTE bodies sit inside parentheses.
fn main_statement_keyword(query: &str) -> Option<String> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut word = String::new();

    for ch in query.chars().chain(std::iter::once(' ')) {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }

        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
            continue;
        }

        if depth == 0 && !word.is_empty() {
            let upper = word.to_ascii_uppercase();
            if STATEMENT_KEYWORDS.contains(&upper.as_str()) {
                return Some(upper);
            }
        }
        word.clear();

        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    None
}

/// A `;` outside string literals that is followed by anything but whitespace.
fn has_inner_separator(query: &str) -> bool {
    let mut quote: Option<char> = None;
    for (index, ch) in query.char_indices() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ';') if !query[index + 1..].trim().is_empty() => return true,
            _ => {}
        }
    }
    false
}
