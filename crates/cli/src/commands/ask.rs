use std::sync::Arc;

use staffchat_agent::Orchestrator;
use staffchat_core::config::{AppConfig, LoadOptions};
use staffchat_core::{format_result_for_ui, Question};
use staffchat_db::{connect_with_settings, AccessMode, SqliteDataSource};

use crate::commands::{current_thread_runtime, CommandResult};

/// Answers one question end to end. Exit code 1 when the envelope carries an error.
pub fn run(question: &str, json_output: bool) -> CommandResult {
    let question = match Question::new(question, Vec::new()) {
        Ok(question) => question,
        Err(error) => return CommandResult::failure("ask", "invalid_question", error.to_string(), 2),
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
            AccessMode::ReadOnly,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let source = Arc::new(SqliteDataSource::new(pool.clone(), config.database.timeout_secs));
        let orchestrator = Orchestrator::from_config(&config, source)
            .map_err(|error| ("llm_client", error.to_string(), 5u8))?;

        let envelope = orchestrator.answer(question.text(), question.history()).await;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(envelope)
    });

    let envelope = match result {
        Ok(envelope) => envelope,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("ask", error_class, message, exit_code);
        }
    };

    let exit_code = if envelope.is_error() { 1 } else { 0 };
    if !json_output {
        return CommandResult::raw(exit_code, format_result_for_ui(&envelope));
    }

    match serde_json::to_string_pretty(&envelope) {
        Ok(output) => CommandResult::raw(exit_code, output),
        Err(error) => CommandResult::failure("ask", "serialization", error.to_string(), 6),
    }
}
