use std::collections::HashSet;

use anyhow::{anyhow, Result};
use pcksim_provider::{GenerationOptions, LlmMessage, LlmRequest, LlmResponse, ProviderRegistry};
use tokio::time;

use crate::config::ModelCallConfig;

const MAX_RETRIES: usize = 2;
const BASE_BACKOFF_MS: u64 = 1000;

/// Dispatches model calls to providers with retry and fallback.
pub struct LlmRouter {
    registry: ProviderRegistry,
}

impl LlmRouter {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Single text-in/text-out call for one configured kind of model call.
    ///
    /// The whole candidate chain, retries included, is bounded by the
    /// call's `timeout_secs`.
    pub async fn complete(
        &self,
        call: &ModelCallConfig,
        system: Option<String>,
        messages: Vec<LlmMessage>,
        options: GenerationOptions,
    ) -> Result<LlmResponse> {
        let timeout = call.timeout();
        match time::timeout(
            timeout,
            self.chat(&call.model, &call.fallbacks, system, messages, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "model call to {} timed out after {}s",
                call.model,
                timeout.as_secs()
            )),
        }
    }

    pub async fn chat(
        &self,
        primary: &str,
        fallbacks: &[String],
        system: Option<String>,
        messages: Vec<LlmMessage>,
        options: GenerationOptions,
    ) -> Result<LlmResponse> {
        let mut candidates = vec![primary.to_string()];
        candidates.extend(fallbacks.iter().cloned());

        // Deduplicate candidates while preserving order
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));

        let mut last_err: Option<anyhow::Error> = None;
        let mut tried_providers: Vec<String> = Vec::new();

        for (idx, candidate) in candidates.iter().enumerate() {
            let (provider_id, model_id) = match parse_provider_model(candidate) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("invalid model format {candidate}: {e}");
                    continue;
                }
            };

            let provider = match self.registry.get(&provider_id) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("provider {provider_id} not available: {e}");
                    continue;
                }
            };

            tried_providers.push(format!("{provider_id}/{model_id}"));

            let mut attempts = 0;
            loop {
                let req = LlmRequest {
                    model: model_id.clone(),
                    system: system.clone(),
                    messages: messages.clone(),
                    options: options.clone(),
                };

                match provider.chat(req).await {
                    Ok(resp) => {
                        if idx > 0 {
                            tracing::info!(
                                "fallback_triggered=true, from={}, to={}/{}, attempt={}",
                                primary,
                                provider_id,
                                model_id,
                                idx + 1
                            );
                        }
                        tracing::debug!(
                            model = %model_id,
                            input_tokens = ?resp.input_tokens,
                            output_tokens = ?resp.output_tokens,
                            "model call completed"
                        );
                        return Ok(resp);
                    }
                    Err(err) => {
                        let err_str = err.to_string();
                        let is_retryable = err_str.contains("[retryable]");

                        if is_retryable && attempts < MAX_RETRIES {
                            attempts += 1;
                            let backoff = BASE_BACKOFF_MS * (1 << (attempts - 1));
                            tracing::warn!(
                                "provider {provider_id} retryable error (attempt {attempts}/{MAX_RETRIES}), backing off {backoff}ms: {err_str}"
                            );
                            time::sleep(time::Duration::from_millis(backoff)).await;
                            continue;
                        }

                        tracing::warn!(
                            "provider {provider_id} failed (retryable={}, attempts={}): {err_str}",
                            is_retryable,
                            attempts
                        );
                        last_err = Some(err);
                        break;
                    }
                }
            }
        }

        let tried = tried_providers.join(" -> ");
        Err(last_err.unwrap_or_else(|| anyhow!("all model candidates failed (tried: {tried})")))
    }
}

fn parse_provider_model(input: &str) -> Result<(String, String)> {
    let mut parts = input.splitn(2, '/');
    let provider = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("invalid model format: {input}"))?;
    let model = parts
        .next()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| anyhow!("invalid model format: {input}"))?;
    Ok((provider.to_string(), model.to_string()))
}
