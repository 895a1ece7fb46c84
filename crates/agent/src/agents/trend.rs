use std::sync::Arc;

use async_trait::async_trait;
use staffchat_core::{ChatTurn, Intent, ResultEnvelope};
use tracing::{info, warn};

use super::{Agent, QueryPipeline};
use crate::chart::{ChartRenderer, ChartRequest};
use crate::extract::{text_field, StructuredOutputExtractor};
use crate::prompts::TREND_PROMPT;
use crate::sql::{extract_sql_queries, normalize_query};

/// Query plus matplotlib code from one model call; rows feed the chart renderer.
pub struct TrendAgent {
    pipeline: QueryPipeline,
    renderer: Arc<dyn ChartRenderer>,
    extractor: StructuredOutputExtractor,
}

impl TrendAgent {
    pub fn new(pipeline: QueryPipeline, renderer: Arc<dyn ChartRenderer>) -> Self {
        Self { pipeline, renderer, extractor: StructuredOutputExtractor }
    }
}

#[async_trait]
impl Agent for TrendAgent {
    fn intent(&self) -> Intent {
        Intent::Trend
    }

    async fn run(&self, question: &str, history: &[ChatTurn]) -> ResultEnvelope {
        let raw = match self.pipeline.generate(TREND_PROMPT, question, history).await {
            Ok(raw) => raw,
            Err(error) => return error.into_envelope(Intent::Trend, None),
        };

        let payload = self.extractor.extract(&raw);
        let query = text_field(&payload, "sql_query")
            .map(normalize_query)
            .or_else(|| extract_sql_queries(&raw).into_iter().next())
            .unwrap_or_default();
        let python_code = text_field(&payload, "python_code");
        let explanation = text_field(&payload, "explanation");

        let (headers, rows) = match self.pipeline.execute(&query).await {
            Ok(table) => table,
            Err(error) => return error.into_envelope(Intent::Trend, Some(&query)),
        };

        let chart = match python_code {
            Some(code) => {
                let request = ChartRequest { code, sql_query: &query, headers: &headers, rows: &rows };
                match self.renderer.render(request).await {
                    Ok(handle) => Some(handle),
                    // The renderer's failure text stands in for the chart handle.
                    // TODO: surface render failures through `error` once the UI can show a table without its chart.
                    Err(render_error) => {
                        warn!(
                            event_name = "agent.trend.render_failed",
                            error = %render_error,
                            "chart rendering failed"
                        );
                        Some(render_error.to_string())
                    }
                }
            }
            None => None,
        };

        info!(
            event_name = "agent.run.completed",
            agent = %Intent::Trend,
            row_count = rows.len(),
            charted = chart.is_some(),
            "agent query succeeded"
        );

        let mut envelope =
            ResultEnvelope::for_agent(Intent::Trend).with_query(query).with_table(headers, rows);
        if let Some(chart) = chart {
            envelope = envelope.with_chart(chart);
        }
        if let Some(explanation) = explanation {
            envelope = envelope.with_explanation(explanation);
        }
        envelope
    }
}
