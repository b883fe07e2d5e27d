//! Coaching tips from Gemini, with a silent fallback.

use std::time::Duration;

use async_trait::async_trait;
use shared::{
    ElevationSample,
    advice::{self, FALLBACK_TIP},
    gemini::{self, GenerateContentRequest, GenerateContentResponse},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{collaborators::Advisor, config::GeminiConfig, error::PlannerError};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini API key is missing")]
    MissingCredential,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

pub struct GeminiAdvisor {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiAdvisor {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::MissingCredential);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    async fn generate(&self, prompt: String) -> Result<Option<String>, GeminiError> {
        let url = gemini::endpoint(&self.config.model);
        debug!("Gemini: requesting tip from {}", self.config.model);
        let response = self
            .client
            .post(url)
            .query(&[("key", &self.config.api_key)])
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status, message });
        }

        let body: GenerateContentResponse = response.json().await?;
        Ok(body.text())
    }
}

#[async_trait]
impl Advisor for GeminiAdvisor {
    async fn advise(&self, elevation: &[ElevationSample]) -> Result<String, PlannerError> {
        let prompt = advice::build_prompt(&advice::condensed_profile(elevation));
        let answer = self.generate(prompt).await?;
        Ok(advice::finalize_tip(answer.as_deref()))
    }
}

/// Ask `advisor` for a tip; any failure, or no advisor at all, yields the fallback.
pub async fn coaching_tip(advisor: Option<&dyn Advisor>, elevation: &[ElevationSample]) -> String {
    let Some(advisor) = advisor else {
        debug!("no advice credential configured, using fallback tip");
        return FALLBACK_TIP.to_string();
    };
    match advisor.advise(elevation).await {
        Ok(tip) => tip,
        Err(err) => {
            warn!("coaching tip failed: {err}");
            FALLBACK_TIP.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    #[async_trait]
    impl Advisor for Unreachable {
        async fn advise(&self, _: &[ElevationSample]) -> Result<String, PlannerError> {
            Err(PlannerError::AdviceGenerationFailed("connection refused".into()))
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Advisor for Fixed {
        async fn advise(&self, _: &[ElevationSample]) -> Result<String, PlannerError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_unreachable_advisor_falls_back() {
        assert_eq!(coaching_tip(Some(&Unreachable), &[]).await, FALLBACK_TIP);
    }

    #[tokio::test]
    async fn test_missing_advisor_falls_back() {
        assert_eq!(coaching_tip(None, &[]).await, FALLBACK_TIP);
    }

    #[tokio::test]
    async fn test_advisor_answer_passes_through() {
        assert_eq!(
            coaching_tip(Some(&Fixed("Spin light up the hill.")), &[]).await,
            "Spin light up the hill."
        );
    }

    #[test]
    fn test_blank_key_is_missing_credential() {
        let result = GeminiAdvisor::new(GeminiConfig {
            api_key: " ".into(),
            model: gemini::DEFAULT_MODEL.into(),
            timeout_seconds: 5,
        });
        assert!(matches!(result, Err(GeminiError::MissingCredential)));
    }
}
