use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use pcksim_provider::LlmMessage;
use pcksim_schema::{ConversationSession, PckVerdict};

use crate::config::ModelCallConfig;
use crate::error::PromptError;
use crate::interpreter::parse_verdict;
use crate::prompt::{compile_grader_prompt, compile_summary_prompt, GraderPromptContext};
use crate::registry::Registry;
use crate::router::LlmRouter;

/// Grades teacher turns and writes the end-of-session analysis.
pub struct PckGrader {
    router: Arc<LlmRouter>,
    grader_call: ModelCallConfig,
    summary_call: ModelCallConfig,
}

impl PckGrader {
    pub fn new(
        router: Arc<LlmRouter>,
        grader_call: ModelCallConfig,
        summary_call: ModelCallConfig,
    ) -> Self {
        Self {
            router,
            grader_call,
            summary_call,
        }
    }

    /// Grade one teacher message.
    ///
    /// `Ok(None)` means the model could not be reached. A reachable model
    /// that answers with garbage still yields a (default) verdict.
    pub async fn analyze(
        &self,
        ctx: &GraderPromptContext<'_>,
    ) -> std::result::Result<Option<PckVerdict>, PromptError> {
        let prompt = compile_grader_prompt(ctx)?;
        tracing::debug!(chars = prompt.chars().count(), "grader prompt compiled");

        let response = match self
            .router
            .complete(
                &self.grader_call,
                None,
                vec![LlmMessage::user(prompt)],
                self.grader_call.generation_options(),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("grader call failed, continuing without verdict: {e:#}");
                return Ok(None);
            }
        };

        tracing::debug!(
            "raw grader output: {}",
            response.text.chars().take(200).collect::<String>()
        );
        let verdict = parse_verdict(&response.text);
        tracing::info!(
            quality = verdict.pedagogical_quality.as_str(),
            addressed = verdict.addressed_misconception,
            risk = verdict.misconception_risk.as_str(),
            "turn graded"
        );
        Ok(Some(verdict))
    }

    /// Aggregate analysis over the whole turn log. Failures are returned.
    pub async fn summarize(
        &self,
        session: &ConversationSession,
        registry: &Registry,
    ) -> Result<String> {
        let prompt = compile_summary_prompt(session, registry);
        tracing::info!(
            session_id = %session.session_id,
            turns = session.turns.len(),
            "requesting session summary"
        );
        let response = self
            .router
            .complete(
                &self.summary_call,
                None,
                vec![LlmMessage::user(prompt)],
                self.summary_call.generation_options(),
            )
            .await
            .context("session summary call failed")?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(anyhow!("session summary call returned no text"));
        }
        Ok(text.to_string())
    }
}
