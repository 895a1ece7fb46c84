//! Agent runtime - intent routing and text-to-SQL agents
//!
//! This crate is the "brain" of staffchat. It:
//! - Classifies a question into one of four intents (`router`)
//! - Dispatches to the matching agent and always returns one envelope (`orchestrator`)
//! - Generates, checks and runs read-only queries (`agents`, `guardrails`, `executor`)
//! - Renders trend charts in a Python child process (`chart`)
//!
//! # Architecture
//!
//! Each request follows a fixed path:
//! 1. **History truncation** (`conversation`) - keep the newest turns within the token budget
//! 2. **Classification** (`router`) - one model call, unknown output falls back to `audittrail`
//! 3. **Agent run** (`agents`) - prompt, model call, extraction, guardrail, execution
//! 4. **Envelope** - every failure becomes `ResultEnvelope::error`, nothing propagates
//!
//! # Key Types
//!
//! - `Orchestrator` - single entry point, `answer(question, history)`
//! - `LlmClient` - pluggable text-completion seam (OpenAI-compatible client included)
//! - `ChartRenderer` - pluggable chart sandbox
//!
//! # Safety Principle
//!
//! The model only writes query text. Whether that text runs is decided by `QueryGuardrail`
//! and a read-only connection, never by the model.

pub mod agents;
pub mod chart;
pub mod conversation;
pub mod executor;
pub mod extract;
pub mod guardrails;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod router;
pub mod sql;

pub use agents::{Agent, AgentError};
pub use chart::{ChartRenderer, ChartRequest, PythonChartRenderer, RenderError};
pub use llm::{LlmClient, LlmError, OpenAiClient};
pub use orchestrator::{AgentSet, AgentWiring, Orchestrator};
pub use router::IntentRouter;
