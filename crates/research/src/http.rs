use crate::traits::{ExternalEvidence, ExternalEvidenceProvider};
use crate::ExternalFailure;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct LookupRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<&'a str>,
}

/// External docs lookup over HTTP.
///
/// POSTs `{"query", "transcript"}` and expects `{"context", "sources"}` back.
#[derive(Debug, Clone)]
pub struct HttpEvidenceProvider {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpEvidenceProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExternalFailure> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalFailure::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> ExternalFailure {
        match ExternalFailure::from(err) {
            ExternalFailure::Timeout(_) => {
                ExternalFailure::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
            }
            other => other,
        }
    }
}

#[async_trait]
impl ExternalEvidenceProvider for HttpEvidenceProvider {
    async fn lookup(
        &self,
        query: &str,
        transcript: Option<&str>,
    ) -> Result<ExternalEvidence, ExternalFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&LookupRequest { query, transcript })
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalFailure::Protocol(format!("HTTP {}", status.as_u16())));
        }

        let evidence: ExternalEvidence = response.json().await.map_err(|e| self.classify(e))?;
        if evidence.context.trim().is_empty() {
            return Err(ExternalFailure::Empty);
        }
        log::debug!(
            "External lookup for {query:?} returned {} chars, {} source(s)",
            evidence.context.len(),
            evidence.sources.len()
        );
        Ok(evidence)
    }
}
