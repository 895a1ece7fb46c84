//! Markdown rendering of a [`ResultEnvelope`] for chat front-ends.

use serde_json::Value;

use crate::domain::envelope::{ResultEnvelope, RowRecord};

pub fn format_result_for_ui(result: &ResultEnvelope) -> String {
    let mut parts = Vec::new();

    if let Some(agent) = result.agent {
        parts.push(format!("Routed to: `{} Agent`", agent.label()));
    }

    if let Some(explanation) = result.explanation.as_deref().filter(|text| !text.trim().is_empty())
    {
        parts.push(format!("Insight:\n> {}", explanation.trim()));
    }

    if let Some(sql_query) = result.sql_query.as_deref().filter(|text| !text.trim().is_empty()) {
        parts.push("SQL Query:".to_string());
        parts.push(format!("```sql\n{}\n```", sql_query.trim()));
    }

    if !result.rows.is_empty() && !result.headers.is_empty() {
        parts.push(markdown_table(&result.headers, &result.rows));
    }

    if let Some(error) = &result.error {
        parts.push(format!("Error: {error}"));
    }

    parts.join("\n\n")
}

pub fn markdown_table(headers: &[String], rows: &[RowRecord]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));

    for row in rows {
        let cells: Vec<String> = match row {
            RowRecord::Mapping(_) => headers
                .iter()
                .enumerate()
                .map(|(index, header)| row.cell(header, index).map(cell_text).unwrap_or_default())
                .collect(),
            RowRecord::Positional(values) => values.iter().map(cell_text).collect(),
        };
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    lines.join("\n")
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.replace('|', "\\|").replace('\n', " "),
        other => other.to_string(),
    }
}
