use async_trait::async_trait;
use staffchat_core::{ChatTurn, Intent, ResultEnvelope};
use tracing::info;

use super::{Agent, QueryPipeline};
use crate::prompts::{AUDIT_TRAIL_PROMPT, ERROR_LOG_PROMPT};
use crate::sql::{normalize_query, unfence};

/// Question in, one SELECT out, rows back. Backs the audit-trail and error-log intents.
pub struct TabularAgent {
    intent: Intent,
    system_prompt: &'static str,
    pipeline: QueryPipeline,
}

impl TabularAgent {
    pub fn audit_trail(pipeline: QueryPipeline) -> Self {
        Self { intent: Intent::AuditTrail, system_prompt: AUDIT_TRAIL_PROMPT, pipeline }
    }

    pub fn error_log(pipeline: QueryPipeline) -> Self {
        Self { intent: Intent::ErrorLog, system_prompt: ERROR_LOG_PROMPT, pipeline }
    }
}

#[async_trait]
impl Agent for TabularAgent {
    fn intent(&self) -> Intent {
        self.intent
    }

    async fn run(&self, question: &str, history: &[ChatTurn]) -> ResultEnvelope {
        let raw = match self.pipeline.generate(self.system_prompt, question, history).await {
            Ok(raw) => raw,
            Err(error) => return error.into_envelope(self.intent, None),
        };
        let query = normalize_query(unfence(&raw));

        match self.pipeline.execute(&query).await {
            Ok((headers, rows)) => {
                info!(
                    event_name = "agent.run.completed",
                    agent = %self.intent,
                    row_count = rows.len(),
                    "agent query succeeded"
                );
                ResultEnvelope::for_agent(self.intent).with_query(query).with_table(headers, rows)
            }
            Err(error) => error.into_envelope(self.intent, Some(&query)),
        }
    }
}
