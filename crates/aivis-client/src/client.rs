//! HTTP client for the visibility backend's REST API.
//!
//! Every successful response is wrapped as `{"data": ...}`; error responses
//! carry `{"error": {"message": ...}}`. Non-2xx statuses surface as
//! [`ClientError::Api`] and are classified into port errors by the
//! `From<ClientError> for PortError` conversion.

use std::time::Duration;

use aivis_core::{
    AppConfig, Competitor, Keyword, RegionFilter, ScheduledQuery, VisibilityCheck,
};
use aivis_engine::{
    CheckBatch, NewSchedule, PortResult, ScheduleUpdate, VisibilityBackend,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

const DEFAULT_USER_AGENT: &str = "aivis/0.1 (visibility-engine)";

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct KeywordBatchRequest<'a> {
    keywords: &'a [String],
}

#[derive(Serialize, Deserialize)]
struct SuggestionPreference {
    dismissed: bool,
}

/// Client for the backend REST API.
///
/// Use [`BackendClient::new`] with the loaded [`AppConfig`], or
/// [`BackendClient::with_base_url`] to point at a mock server in tests.
pub struct BackendClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl BackendClient {
    /// Creates a client from application config.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if the
    /// configured backend URL is unusable.
    pub fn new(config: &AppConfig) -> Result<Self, ClientError> {
        Self::build(
            &config.backend_url,
            config.backend_token.as_deref(),
            config.backend_timeout_secs,
            &config.user_agent,
        )
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::new`].
    pub fn with_base_url(
        base_url: &str,
        token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        Self::build(base_url, token, timeout_secs, DEFAULT_USER_AGENT)
    }

    fn build(
        base_url: &str,
        token: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise to exactly one trailing slash so path segments append
        // below any prefix such as `/api/`.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let invalid = |reason: String| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(&normalised).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(invalid("expected an http(s) URL".to_string()));
        }

        Ok(Self {
            client,
            base_url: parsed,
            token: token.filter(|t| !t.is_empty()).map(str::to_owned),
        })
    }

    /// Builds an endpoint URL below the base, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and returns the body of a 2xx response.
    async fn send(&self, request: RequestBuilder, context: &str) -> Result<String, ClientError> {
        tracing::debug!(context, "backend: request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .ok()
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        tracing::warn!(
            context,
            status = status.as_u16(),
            message = %message,
            "backend: request failed"
        );
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, ClientError> {
        let body = self.send(request, context).await?;
        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
                context: context.to_string(),
                source: e,
            })?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        let context = format!("GET {}", url.path());
        self.send_json(self.request(Method::GET, url), &context).await
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl VisibilityBackend for BackendClient {
    async fn list_schedules(&self, project_id: &str) -> PortResult<Vec<ScheduledQuery>> {
        Ok(self.get(&["projects", project_id, "schedules"]).await?)
    }

    async fn list_due_schedules(&self, now: DateTime<Utc>) -> PortResult<Vec<ScheduledQuery>> {
        let mut url = self.endpoint(&["schedules", "due"])?;
        url.query_pairs_mut().append_pair("now", &rfc3339(now));
        Ok(self
            .send_json(self.request(Method::GET, url), "GET schedules/due")
            .await?)
    }

    async fn get_schedule(&self, id: &str) -> PortResult<ScheduledQuery> {
        Ok(self.get(&["schedules", id]).await?)
    }

    async fn create_schedule(&self, schedule: &NewSchedule) -> PortResult<ScheduledQuery> {
        let url = self.endpoint(&["projects", &schedule.project_id, "schedules"])?;
        let request = self.request(Method::POST, url).json(schedule);
        Ok(self.send_json(request, "POST schedules").await?)
    }

    async fn update_schedule(
        &self,
        id: &str,
        update: &ScheduleUpdate,
    ) -> PortResult<ScheduledQuery> {
        let url = self.endpoint(&["schedules", id])?;
        let request = self.request(Method::PATCH, url).json(update);
        Ok(self
            .send_json(request, &format!("PATCH schedules/{id}"))
            .await?)
    }

    async fn delete_schedule(&self, id: &str) -> PortResult<()> {
        let url = self.endpoint(&["schedules", id])?;
        self.send(
            self.request(Method::DELETE, url),
            &format!("DELETE schedules/{id}"),
        )
        .await?;
        Ok(())
    }

    async fn run_check(&self, batch: &CheckBatch) -> PortResult<Vec<VisibilityCheck>> {
        let url = self.endpoint(&["projects", &batch.project_id, "checks"])?;
        let request = self.request(Method::POST, url).json(batch);
        Ok(self.send_json(request, "POST checks").await?)
    }

    async fn list_history(
        &self,
        project_id: &str,
        region: Option<&RegionFilter>,
    ) -> PortResult<Vec<VisibilityCheck>> {
        let mut url = self.endpoint(&["projects", project_id, "checks"])?;
        if let Some(region) = region {
            url.query_pairs_mut()
                .append_pair("region", &region.region)
                .append_pair("language", &region.language);
        }
        Ok(self
            .send_json(self.request(Method::GET, url), "GET checks")
            .await?)
    }

    /// The backend's batch route upserts by text, which is what makes repeated
    /// scheduled runs reuse one keyword.
    async fn create_keywords_batch(
        &self,
        project_id: &str,
        texts: &[String],
    ) -> PortResult<Vec<Keyword>> {
        let url = self.endpoint(&["projects", project_id, "keywords", "batch"])?;
        let request = self
            .request(Method::POST, url)
            .json(&KeywordBatchRequest { keywords: texts });
        Ok(self.send_json(request, "POST keywords/batch").await?)
    }

    async fn list_competitors(&self, project_id: &str) -> PortResult<Vec<Competitor>> {
        Ok(self.get(&["projects", project_id, "competitors"]).await?)
    }

    async fn suggestion_dismissed(&self, project_id: &str) -> PortResult<bool> {
        let pref: SuggestionPreference = self
            .get(&["projects", project_id, "preferences", "schedule-suggestion"])
            .await?;
        Ok(pref.dismissed)
    }

    async fn dismiss_suggestion(&self, project_id: &str) -> PortResult<()> {
        let url = self.endpoint(&["projects", project_id, "preferences", "schedule-suggestion"])?;
        let request = self
            .request(Method::PUT, url)
            .json(&SuggestionPreference { dismissed: true });
        self.send(request, "PUT preferences/schedule-suggestion")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> BackendClient {
        BackendClient::with_base_url(base_url, Some("t0ken"), 30)
            .expect("client construction should not fail")
    }

    #[test]
    fn endpoint_appends_below_base_path() {
        let client = test_client("https://backend.example.com/api/v2");
        let url = client.endpoint(&["projects", "p1", "schedules"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://backend.example.com/api/v2/projects/p1/schedules"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slashes() {
        let client = test_client("https://backend.example.com///");
        let url = client.endpoint(&["schedules", "s-1"]).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/schedules/s-1");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = test_client("https://backend.example.com");
        let url = client.endpoint(&["projects", "acme eu", "checks"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://backend.example.com/projects/acme%20eu/checks"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(matches!(
            BackendClient::with_base_url("ftp://backend.example.com", None, 30),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            BackendClient::with_base_url("not a url", None, 30),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn blank_token_is_dropped() {
        let client = BackendClient::with_base_url("http://localhost:9", Some(""), 30).unwrap();
        assert!(client.token.is_none());
    }
}
