//! Chat endpoint.
//!
//! - `POST /api/chat`: `{question, history}` in, `{route, markdown, envelope}` out

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use staffchat_agent::Orchestrator;
use staffchat_core::{
    format_result_for_ui, ApplicationError, ChatTurn, Intent, InterfaceError, Question,
    ResultEnvelope,
};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<Orchestrator>,
    chart_directory: PathBuf,
}

impl ChatState {
    pub fn new(orchestrator: Arc<Orchestrator>, chart_directory: impl Into<PathBuf>) -> Self {
        Self { orchestrator, chart_directory: chart_directory.into() }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub route: Intent,
    pub markdown: String,
    pub envelope: ResultEnvelope,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

impl From<InterfaceError> for ChatError {
    fn from(error: InterfaceError) -> Self {
        Self {
            error: error.user_message(),
            detail: error.to_string(),
            correlation_id: error.correlation_id().to_string(),
        }
    }
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(state)
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let question = Question::new(request.question, request.history).map_err(|error| {
        let interface = ApplicationError::from(error).into_interface(correlation_id.clone());
        warn!(
            event_name = "chat.request.rejected",
            correlation_id = %correlation_id,
            error = %interface,
            "chat request failed validation"
        );
        (StatusCode::BAD_REQUEST, Json(ChatError::from(interface)))
    })?;

    let envelope =
        state.orchestrator.answer_traced(question.text(), question.history(), &correlation_id).await;
    let route = envelope.agent.unwrap_or(Intent::DEFAULT);

    let mut markdown = format_result_for_ui(&envelope);
    if let Some(filename) = envelope.chart_filename.as_deref() {
        if let Some(image) = embed_chart(&state.chart_directory, filename, &correlation_id).await {
            markdown.push_str("\n\n");
            markdown.push_str(&image);
        }
    }

    info!(
        event_name = "chat.request.answered",
        correlation_id = %correlation_id,
        route = %route,
        is_error = envelope.is_error(),
        "chat request answered"
    );

    Ok(Json(ChatResponse { route, markdown, envelope }))
}

/// Markdown data-URI image for a chart in `directory`, or `None` if it cannot be read.
pub async fn embed_chart(directory: &Path, filename: &str, correlation_id: &str) -> Option<String> {
    let Some(safe_name) = chart_file_name(filename) else {
        warn!(
            event_name = "chat.chart.invalid_name",
            correlation_id = %correlation_id,
            chart_filename = %filename,
            "chart name has no usable characters"
        );
        return None;
    };

    let chart_path = directory.join(&safe_name);
    match tokio::fs::read(&chart_path).await {
        Ok(bytes) => Some(format!("![image](data:image/png;base64,{})", STANDARD.encode(bytes))),
        Err(error) => {
            warn!(
                event_name = "chat.chart.load_failed",
                correlation_id = %correlation_id,
                chart_path = %chart_path.display(),
                error = %error,
                "chart load error"
            );
            None
        }
    }
}

/// Base name only, restricted to `[A-Za-z0-9._-]`, always ending in `.png`.
pub fn chart_file_name(filename: &str) -> Option<String> {
    let mut name = filename.to_string();
    if !name.to_ascii_lowercase().ends_with(".png") {
        name.push_str(".png");
    }

    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']);

    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(".png") || cleaned.eq_ignore_ascii_case("png") {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use staffchat_agent::{Agent, AgentSet, IntentRouter, LlmClient, LlmError, Orchestrator};
    use staffchat_core::{ChatTurn, Intent, ResultEnvelope};

    use super::{chart_file_name, chat, embed_chart, ChatRequest, ChatState};

    struct StaticLlm(&'static str);

    #[async_trait]
    impl LlmClient for StaticLlm {
        async fn complete(&self, _messages: &[ChatTurn]) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct ChartingAgent(Intent, Option<&'static str>);

    #[async_trait]
    impl Agent for ChartingAgent {
        fn intent(&self) -> Intent {
            self.0
        }

        async fn run(&self, _question: &str, _history: &[ChatTurn]) -> ResultEnvelope {
            let envelope = ResultEnvelope::for_agent(self.0).with_query("SELECT 1");
            match self.1 {
                Some(chart) => envelope.with_chart(chart),
                None => envelope,
            }
        }
    }

    fn state(route: &'static str, chart: Option<&'static str>, dir: &std::path::Path) -> ChatState {
        let agent = |intent| -> Arc<dyn Agent> { Arc::new(ChartingAgent(intent, chart)) };
        let agents = AgentSet {
            audit_trail: agent(Intent::AuditTrail),
            error_log: agent(Intent::ErrorLog),
            trend: agent(Intent::Trend),
            anomaly: agent(Intent::Anomaly),
        };
        let router = IntentRouter::new(Arc::new(StaticLlm(route)));
        ChatState::new(Arc::new(Orchestrator::new(router, agents, 1_000)), dir)
    }

    #[test]
    fn chart_names_are_reduced_to_a_safe_base_name() {
        assert_eq!(chart_file_name("/srv/charts/ab12.png").as_deref(), Some("ab12.png"));
        assert_eq!(chart_file_name("..\\..\\etc\\passwd").as_deref(), Some("passwd.png"));
        assert_eq!(chart_file_name("my chart").as_deref(), Some("my_chart.png"));
        assert_eq!(chart_file_name("../").as_deref(), None);
    }

    #[tokio::test]
    async fn existing_chart_is_embedded_as_data_uri() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("c1.png"), b"PNG").expect("write chart");

        let image = embed_chart(dir.path(), "/elsewhere/c1.png", "test").await;

        assert_eq!(image.as_deref(), Some("![image](data:image/png;base64,UE5H)"));
    }

    #[tokio::test]
    async fn chat_returns_route_markdown_and_embedded_chart() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("trend.png"), b"PNG").expect("write chart");

        let Json(response) = chat(
            State(state("trend", Some("charts/trend.png"), dir.path())),
            Json(ChatRequest { question: "logins per day?".to_string(), history: Vec::new() }),
        )
        .await
        .expect("chat should answer");

        assert_eq!(response.route, Intent::Trend);
        assert!(response.markdown.starts_with("Routed to: `Trend Agent`"));
        assert!(response.markdown.ends_with("![image](data:image/png;base64,UE5H)"));
        assert_eq!(response.envelope.sql_query.as_deref(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn unreadable_chart_leaves_markdown_without_image() {
        let dir = tempfile::tempdir().expect("tempdir");

        let Json(response) = chat(
            State(state("trend", Some("Failed to execute. Error: boom"), dir.path())),
            Json(ChatRequest { question: "chart?".to_string(), history: Vec::new() }),
        )
        .await
        .expect("chat should answer");

        assert!(!response.markdown.contains("data:image/png"));
    }

    #[tokio::test]
    async fn blank_question_is_a_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");

        let result = chat(
            State(state("audittrail", None, dir.path())),
            Json(ChatRequest { question: "   ".to_string(), history: Vec::new() }),
        )
        .await;

        let Err((status, Json(error))) = result else {
            panic!("blank question must be rejected");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.detail.contains("question must not be empty"));
        assert!(!error.correlation_id.is_empty());
    }
}
