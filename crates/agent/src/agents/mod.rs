//! The four question-answering agents and the pipeline they share.

pub mod anomaly;
pub mod tabular;
pub mod trend;

use std::sync::Arc;

use async_trait::async_trait;
use staffchat_core::{ChatTurn, Intent, ResultEnvelope, RowRecord};
use thiserror::Error;
use tracing::error;

use crate::conversation::build_messages;
use crate::executor::SafeQueryExecutor;
use crate::guardrails::{QueryDecision, QueryGuardrail};
use crate::llm::{LlmClient, LlmError};

pub use anomaly::{AnomalyAgent, Baseline};
pub use tabular::TabularAgent;
pub use trend::TrendAgent;

/// Turns one question into one envelope. Failures are data, never panics or `Err`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn intent(&self) -> Intent;

    async fn run(&self, question: &str, history: &[ChatTurn]) -> ResultEnvelope;
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("query generation failed: {0}")]
    Generation(#[source] LlmError),
    #[error("analysis failed: {0}")]
    Analysis(#[source] LlmError),
    #[error("query rejected: {message}")]
    Rejected { reason_code: &'static str, message: String },
    #[error("SQL execution failed: {0}")]
    Execution(String),
}

impl AgentError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation_failed",
            Self::Analysis(_) => "analysis_failed",
            Self::Rejected { reason_code, .. } => reason_code,
            Self::Execution(_) => "execution_failed",
        }
    }

    /// Error envelope for `intent`, carrying the query when one was produced.
    pub fn into_envelope(self, intent: Intent, sql_query: Option<&str>) -> ResultEnvelope {
        error!(
            event_name = "agent.run.failed",
            agent = %intent,
            reason_code = self.reason_code(),
            sql_query = sql_query.unwrap_or(""),
            error = %self,
            "agent run failed"
        );

        let envelope = ResultEnvelope::failure(intent, self.to_string());
        match sql_query {
            Some(query) => envelope.with_query(query),
            None => envelope,
        }
    }
}

/// Model call, guardrail check, and safe execution, shared by every query-generating agent.
#[derive(Clone)]
pub struct QueryPipeline {
    llm: Arc<dyn LlmClient>,
    executor: SafeQueryExecutor,
    guardrail: QueryGuardrail,
}

impl QueryPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, executor: SafeQueryExecutor) -> Self {
        Self { llm, executor, guardrail: QueryGuardrail::default() }
    }

    pub fn with_guardrail(mut self, guardrail: QueryGuardrail) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn executor(&self) -> &SafeQueryExecutor {
        &self.executor
    }

    /// Raw model text for the question, framed by `system_prompt` and the history.
    pub async fn generate(
        &self,
        system_prompt: &str,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<String, AgentError> {
        let messages = build_messages(system_prompt, history, question);
        self.llm.complete(&messages).await.map_err(AgentError::Generation)
    }

    pub async fn execute(&self, query: &str) -> Result<(Vec<String>, Vec<RowRecord>), AgentError> {
        if let QueryDecision::Deny { reason_code, user_message } = self.guardrail.evaluate(query) {
            return Err(AgentError::Rejected { reason_code, message: user_message });
        }

        self.executor.execute(query).await.into_table().map_err(AgentError::Execution)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use staffchat_core::ChatTurn;
    use staffchat_db::{DataSource, DataSourceError, QueryOutput};

    use crate::llm::{LlmClient, LlmError};

    /// Replays canned completions in order and records every prompt it saw.
    #[derive(Default)]
    pub struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub seen: Mutex<Vec<Vec<ChatTurn>>>,
    }

    impl ScriptedLlm {
        pub fn replying(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, messages: &[ChatTurn]) -> Result<String, LlmError> {
            self.seen.lock().expect("seen lock").push(messages.to_vec());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Unavailable("no scripted reply".to_string())))
        }
    }

    pub struct FixedSource {
        pub output: fn() -> Result<QueryOutput, DataSourceError>,
        pub queries: Mutex<Vec<String>>,
    }

    impl FixedSource {
        pub fn new(output: fn() -> Result<QueryOutput, DataSourceError>) -> Arc<Self> {
            Arc::new(Self { output, queries: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl DataSource for FixedSource {
        async fn run(&self, query: &str) -> Result<QueryOutput, DataSourceError> {
            self.queries.lock().expect("queries lock").push(query.to_string());
            (self.output)()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use staffchat_core::{Intent, RowRecord};
    use staffchat_db::QueryOutput;

    use super::testing::{FixedSource, ScriptedLlm};
    use super::{AgentError, QueryPipeline};
    use crate::executor::SafeQueryExecutor;

    fn pipeline(source: std::sync::Arc<FixedSource>) -> QueryPipeline {
        QueryPipeline::new(ScriptedLlm::replying([]), SafeQueryExecutor::new(source))
    }

    #[tokio::test]
    async fn rejected_queries_never_reach_the_data_source() {
        let source = FixedSource::new(|| Ok(QueryOutput::Rows(Vec::new())));

        let error = pipeline(source.clone())
            .execute("DELETE FROM AuditTrail")
            .await
            .expect_err("write must be rejected");

        assert_eq!(error.reason_code(), "non_read_statement");
        assert!(source.queries.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn execution_returns_the_table() {
        let source =
            FixedSource::new(|| Ok(QueryOutput::Rows(vec![RowRecord::Positional(vec![json!(1)])])));

        let (headers, rows) = pipeline(source).execute("SELECT 1 AS one FROM t").await.expect("ok");

        assert_eq!(headers, vec!["one".to_string()]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn error_envelope_carries_query_and_prefixed_message() {
        let envelope = AgentError::Execution("ConnectionRefused".to_string())
            .into_envelope(Intent::ErrorLog, Some("SELECT 1"));

        assert_eq!(envelope.agent, Some(Intent::ErrorLog));
        assert_eq!(envelope.sql_query.as_deref(), Some("SELECT 1"));
        assert_eq!(envelope.error.as_deref(), Some("SQL execution failed: ConnectionRefused"));
        assert!(envelope.headers.is_empty() && envelope.rows.is_empty());
    }
}
