use crate::narrative::{narrative_prompt, NarrativeEntry, NarrativeFailure, NarrativeOutcome};
use crate::schema::VarianceResult;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a text-generation endpoint (`POST {base_url}/api/generate`).
///
/// Every call is bounded by `timeout` and resolves to a [`NarrativeOutcome`];
/// no failure escapes as an error.
#[derive(Clone)]
pub struct NarrativeClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl NarrativeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn describe(&self, prompt: &str) -> NarrativeOutcome {
        match tokio::time::timeout(self.timeout, self.generate(prompt)).await {
            Ok(Ok(text)) => NarrativeOutcome::Generated { text },
            Ok(Err(failure)) => {
                warn!("Narrative generation failed: {}", failure);
                NarrativeOutcome::unavailable(failure)
            }
            Err(_) => {
                warn!("Narrative generation timed out after {:?}", self.timeout);
                NarrativeOutcome::unavailable(NarrativeFailure::TimedOut {
                    after_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// One narrative per significant variance, in variance order.
    pub async fn describe_variances(&self, variances: &[VarianceResult]) -> Vec<NarrativeEntry> {
        let mut entries = Vec::new();
        for variance in variances.iter().filter(|v| v.significant) {
            let outcome = self.describe(&narrative_prompt(variance)).await;
            entries.push(NarrativeEntry {
                item: variance.item.clone(),
                outcome,
            });
        }
        entries
    }

    async fn generate(&self, prompt: &str) -> Result<String, NarrativeFailure> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        debug!("Requesting narrative from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NarrativeFailure::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarrativeFailure::Status {
                code: status.as_u16(),
            });
        }

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| NarrativeFailure::Malformed {
                    message: e.to_string(),
                })?;

        let text = body.response.trim();
        if text.is_empty() {
            return Err(NarrativeFailure::Malformed {
                message: "empty response".to_string(),
            });
        }
        Ok(text.to_string())
    }
}
