use std::sync::Arc;

use staffchat_core::config::AppConfig;
use staffchat_core::{ChatTurn, Intent, ResultEnvelope};
use staffchat_db::DataSource;
use tracing::{error, info};
use uuid::Uuid;

use crate::agents::{Agent, AnomalyAgent, Baseline, QueryPipeline, TabularAgent, TrendAgent};
use crate::chart::{ChartRenderer, PythonChartRenderer};
use crate::conversation::truncate_history;
use crate::executor::SafeQueryExecutor;
use crate::llm::{LlmClient, LlmError, OpenAiClient};
use crate::router::IntentRouter;

/// One agent per intent. The match in `for_intent` is the whole routing table.
#[derive(Clone)]
pub struct AgentSet {
    pub audit_trail: Arc<dyn Agent>,
    pub error_log: Arc<dyn Agent>,
    pub trend: Arc<dyn Agent>,
    pub anomaly: Arc<dyn Agent>,
}

impl AgentSet {
    pub fn for_intent(&self, intent: Intent) -> Arc<dyn Agent> {
        match intent {
            Intent::AuditTrail => Arc::clone(&self.audit_trail),
            Intent::ErrorLog => Arc::clone(&self.error_log),
            Intent::Trend => Arc::clone(&self.trend),
            Intent::Anomaly => Arc::clone(&self.anomaly),
        }
    }
}

/// Collaborators the standard agent set is assembled from.
pub struct AgentWiring {
    pub query_llm: Arc<dyn LlmClient>,
    pub analysis_llm: Arc<dyn LlmClient>,
    pub source: Arc<dyn DataSource>,
    pub renderer: Arc<dyn ChartRenderer>,
    pub baseline: Baseline,
}

impl AgentWiring {
    pub fn into_agents(self) -> AgentSet {
        let executor = SafeQueryExecutor::new(self.source);
        let pipeline = QueryPipeline::new(self.query_llm, executor.clone());

        AgentSet {
            audit_trail: Arc::new(TabularAgent::audit_trail(pipeline.clone())),
            error_log: Arc::new(TabularAgent::error_log(pipeline.clone())),
            trend: Arc::new(TrendAgent::new(pipeline, self.renderer)),
            anomaly: Arc::new(AnomalyAgent::new(self.analysis_llm, executor, self.baseline)),
        }
    }
}

/// Router, then exactly one agent, then exactly one envelope. Never fails.
#[derive(Clone)]
pub struct Orchestrator {
    router: IntentRouter,
    agents: AgentSet,
    history_budget: usize,
}

impl Orchestrator {
    pub fn new(router: IntentRouter, agents: AgentSet, history_budget: usize) -> Self {
        Self { router, agents, history_budget }
    }

    pub fn from_config(config: &AppConfig, source: Arc<dyn DataSource>) -> Result<Self, LlmError> {
        let router_llm = OpenAiClient::from_config(&config.llm, &config.llm.router_model)?;
        let query_llm = OpenAiClient::from_config(&config.llm, &config.llm.query_model)?;
        let analysis_llm = OpenAiClient::from_config(&config.llm, &config.llm.analysis_model)?;

        let agents = AgentWiring {
            query_llm: Arc::new(query_llm),
            analysis_llm: Arc::new(analysis_llm),
            source,
            renderer: Arc::new(PythonChartRenderer::from_config(&config.charts)),
            baseline: Baseline::load(&config.anomaly.baseline_path),
        }
        .into_agents();

        Ok(Self::new(IntentRouter::new(Arc::new(router_llm)), agents, config.history.max_tokens))
    }

    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> ResultEnvelope {
        self.answer_traced(question, history, &Uuid::new_v4().to_string()).await
    }

    pub async fn answer_traced(
        &self,
        question: &str,
        history: &[ChatTurn],
        correlation_id: &str,
    ) -> ResultEnvelope {
        let history = truncate_history(history, self.history_budget);
        let intent = self.router.classify(question).await;
        let agent = self.agents.for_intent(intent);

        info!(
            event_name = "orchestrator.dispatch",
            correlation_id,
            intent = %intent,
            history_turns = history.len(),
            "dispatching question to agent"
        );

        // A panicking agent must still produce an envelope.
        let question = question.to_string();
        let task = tokio::spawn(async move { agent.run(&question, &history).await });

        let envelope = match task.await {
            Ok(envelope) => envelope,
            Err(join_error) => {
                error!(
                    event_name = "orchestrator.agent_crashed",
                    correlation_id,
                    intent = %intent,
                    error = %join_error,
                    "agent task did not complete"
                );
                ResultEnvelope::failure(intent, format!("{} agent failed unexpectedly", intent.label()))
            }
        };

        info!(
            event_name = "orchestrator.done",
            correlation_id,
            intent = %intent,
            is_error = envelope.is_error(),
            "question answered"
        );
        envelope
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use staffchat_core::{ChatTurn, Intent, ResultEnvelope};

    use super::{AgentSet, Orchestrator};
    use crate::agents::testing::ScriptedLlm;
    use crate::agents::Agent;
    use crate::router::IntentRouter;

    struct Echo(Intent);

    #[async_trait]
    impl Agent for Echo {
        fn intent(&self) -> Intent {
            self.0
        }

        async fn run(&self, question: &str, history: &[ChatTurn]) -> ResultEnvelope {
            ResultEnvelope::for_agent(self.0)
                .with_explanation(format!("{question} ({} turns)", history.len()))
        }
    }

    struct Panics;

    #[async_trait]
    impl Agent for Panics {
        fn intent(&self) -> Intent {
            Intent::Trend
        }

        async fn run(&self, _question: &str, _history: &[ChatTurn]) -> ResultEnvelope {
            panic!("renderer exploded")
        }
    }

    fn echo_set() -> AgentSet {
        AgentSet {
            audit_trail: Arc::new(Echo(Intent::AuditTrail)),
            error_log: Arc::new(Echo(Intent::ErrorLog)),
            trend: Arc::new(Echo(Intent::Trend)),
            anomaly: Arc::new(Echo(Intent::Anomaly)),
        }
    }

    #[test]
    fn every_intent_maps_to_its_own_agent() {
        let agents = echo_set();
        for intent in Intent::ALL {
            assert_eq!(agents.for_intent(intent).intent(), intent);
        }
    }

    #[tokio::test]
    async fn history_is_truncated_before_dispatch() {
        let router = IntentRouter::new(ScriptedLlm::replying([Ok("errorlog".to_string())]));
        let orchestrator = Orchestrator::new(router, echo_set(), 10);
        let history = vec![ChatTurn::user("a".repeat(20)), ChatTurn::assistant("b".repeat(20))];

        let envelope = orchestrator.answer("errors?", &history).await;

        assert_eq!(envelope.agent, Some(Intent::ErrorLog));
        assert_eq!(envelope.explanation.as_deref(), Some("errors? (1 turns)"));
    }

    #[tokio::test]
    async fn panicking_agent_still_yields_an_error_envelope() {
        let router = IntentRouter::new(ScriptedLlm::replying([Ok("trend".to_string())]));
        let agents = AgentSet { trend: Arc::new(Panics), ..echo_set() };
        let orchestrator = Orchestrator::new(router, agents, 1_000);

        let envelope = orchestrator.answer("chart it", &[]).await;

        assert_eq!(envelope.agent, Some(Intent::Trend));
        assert_eq!(envelope.error.as_deref(), Some("Trend agent failed unexpectedly"));
    }
}
