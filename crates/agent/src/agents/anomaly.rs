use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use staffchat_core::format::markdown_table;
use staffchat_core::{ChatTurn, Intent, ResultEnvelope};
use tracing::{info, warn};

use super::{Agent, AgentError};
use crate::conversation::build_messages;
use crate::executor::SafeQueryExecutor;
use crate::llm::LlmClient;
use crate::prompts::ANOMALY_PROMPT;

/// Last day of ELMAH errors, newest first.
pub const DIAGNOSTIC_QUERY: &str = "SELECT ErrorId, Application, Type, Source, Message, TimeUtc \
     FROM ELMAH_Error WHERE TimeUtc >= datetime('now', '-1 day') ORDER BY TimeUtc DESC LIMIT 50";

pub const MISSING_BASELINE: &str = "No baseline found.";

/// Reference summary of normal error behaviour. Read once, shared read-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Baseline(Arc<str>);

impl Baseline {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Falls back to the placeholder text when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::new(text),
            Err(error) => {
                warn!(
                    event_name = "agent.anomaly.baseline_missing",
                    path = %path.display(),
                    error = %error,
                    "anomaly baseline unavailable"
                );
                Self::new(MISSING_BASELINE)
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fixed diagnostic query plus the baseline, summarized by a reasoning model.
pub struct AnomalyAgent {
    llm: Arc<dyn LlmClient>,
    executor: SafeQueryExecutor,
    baseline: Baseline,
}

impl AnomalyAgent {
    pub fn new(llm: Arc<dyn LlmClient>, executor: SafeQueryExecutor, baseline: Baseline) -> Self {
        Self { llm, executor, baseline }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }
}

#[async_trait]
impl Agent for AnomalyAgent {
    fn intent(&self) -> Intent {
        Intent::Anomaly
    }

    async fn run(&self, question: &str, history: &[ChatTurn]) -> ResultEnvelope {
        let (headers, rows) = match self.executor.execute(DIAGNOSTIC_QUERY).await.into_table() {
            Ok(table) => table,
            Err(message) => {
                return AgentError::Execution(message)
                    .into_envelope(Intent::Anomaly, Some(DIAGNOSTIC_QUERY))
            }
        };

        let current_logs =
            if rows.is_empty() { "(no errors logged)".to_string() } else { markdown_table(&headers, &rows) };
        let input = format!(
            "Baseline: {}\n\nCurrent Logs:\n{current_logs}\n\nUser Question: {question}",
            self.baseline.as_str()
        );

        match self.llm.complete(&build_messages(ANOMALY_PROMPT, history, &input)).await {
            Ok(analysis) => {
                info!(
                    event_name = "agent.run.completed",
                    agent = %Intent::Anomaly,
                    row_count = rows.len(),
                    "anomaly analysis produced"
                );
                ResultEnvelope::for_agent(Intent::Anomaly)
                    .with_query(DIAGNOSTIC_QUERY)
                    .with_explanation(analysis)
            }
            Err(error) => {
                AgentError::Analysis(error).into_envelope(Intent::Anomaly, Some(DIAGNOSTIC_QUERY))
            }
        }
    }
}
