use std::sync::Arc;

use staffchat_core::{ChatTurn, Intent};
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::prompts::ROUTER_PROMPT;

/// Single-call classifier over the closed intent set. Total: every input maps to an intent.
#[derive(Clone)]
pub struct IntentRouter {
    llm: Arc<dyn LlmClient>,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, question: &str) -> Intent {
        let messages = [ChatTurn::system(ROUTER_PROMPT), ChatTurn::user(question)];

        let raw = match self.llm.complete(&messages).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "router.classify.model_failed",
                    fallback = %Intent::DEFAULT,
                    error = %error,
                    "classification call failed, using default intent"
                );
                return Intent::DEFAULT;
            }
        };

        match Intent::from_token(&raw) {
            Some(intent) => {
                info!(event_name = "router.classify.routed", intent = %intent, "question classified");
                intent
            }
            None => {
                warn!(
                    event_name = "router.classify.invalid_route",
                    route = %raw.trim().to_ascii_lowercase(),
                    fallback = %Intent::DEFAULT,
                    "invalid route returned by model"
                );
                Intent::DEFAULT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use staffchat_core::{Intent, Role};

    use super::IntentRouter;
    use crate::agents::testing::ScriptedLlm;
    use crate::llm::LlmError;

    async fn classify(reply: Result<String, LlmError>) -> Intent {
        IntentRouter::new(ScriptedLlm::replying([reply])).classify("question").await
    }

    #[tokio::test]
    async fn valid_tokens_are_normalized() {
        assert_eq!(classify(Ok("  Trend\n".to_string())).await, Intent::Trend);
        assert_eq!(classify(Ok("ERRORLOG".to_string())).await, Intent::ErrorLog);
        assert_eq!(classify(Ok("anomaly".to_string())).await, Intent::Anomaly);
    }

    #[tokio::test]
    async fn anything_outside_the_vocabulary_falls_back_to_audit_trail() {
        for reply in ["bogus", "", "elmah", "trend analysis", "audittrail."] {
            assert_eq!(classify(Ok(reply.to_string())).await, Intent::AuditTrail, "reply {reply:?}");
        }
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_audit_trail() {
        assert_eq!(classify(Err(LlmError::EmptyResponse)).await, Intent::AuditTrail);
    }

    #[tokio::test]
    async fn prompt_is_system_instruction_then_question() {
        let llm = ScriptedLlm::replying([Ok("trend".to_string())]);
        IntentRouter::new(llm.clone()).classify("logins per week?").await;

        let seen = llm.seen.lock().expect("lock");
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].role, Role::System);
        assert!(seen[0][0].content.contains("audittrail, errorlog, trend, anomaly"));
        assert_eq!(seen[0][1].content, "logins per week?");
    }
}
