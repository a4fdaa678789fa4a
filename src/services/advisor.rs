//! Thin client for the external ML service. Payloads are opaque JSON in
//! both directions; the service owns its own feature contracts.

use crate::domain::errors::DomainError;

#[derive(Clone)]
pub struct AdvisorClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl AdvisorClient {
    pub fn from_env() -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        }
    }

    pub fn chat(&self, payload: &serde_json::Value) -> Result<serde_json::Value, DomainError> {
        self.post("/chat", payload)
    }

    pub fn price_suggestion(
        &self,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.post("/predict_dynamic_pricing", payload)
    }

    fn post(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .map_err(|e| DomainError::External(format!("ML service unreachable: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .map_err(|e| DomainError::External(format!("ML service returned garbage: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(DomainError::External(format!(
                "ML service returned {status}: {body}"
            )))
        }
    }
}
