//! Delegates report generation to the report service over HTTP.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::config::ReportServiceConfig;
use crate::jobs::types::{HandlerOutcome, JobContext, JobHandler, JobType};

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    job_id: Uuid,
    organization_id: &'a str,
    job_type: JobType,
    config: &'a JsonValue,
    attempt: u32,
}

/// POSTs the job to `{base_url}/{job_type}`
///
/// 2xx is a success carrying the response body, 4xx a business failure, and
/// 5xx or a transport error a fault.
pub struct ReportServiceHandler {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl ReportServiceHandler {
    pub fn new(config: &ReportServiceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build report service HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, job_type: JobType) -> String {
        format!("{}/{}", self.base_url, job_type)
    }
}

#[async_trait]
impl JobHandler for ReportServiceHandler {
    async fn execute(&self, ctx: JobContext) -> anyhow::Result<HandlerOutcome> {
        let url = self.endpoint(ctx.job_type);
        let body = ReportRequest {
            job_id: ctx.job_id,
            organization_id: &ctx.organization_id,
            job_type: ctx.job_type,
            config: &ctx.config,
            attempt: ctx.attempt,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => anyhow::bail!("Report request cancelled"),
            response = request.send() => response.with_context(|| format!("POST {url} failed"))?,
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {url}"))?;

        if status.is_success() {
            let data = if text.trim().is_empty() {
                JsonValue::Null
            } else {
                serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
            };
            return Ok(HandlerOutcome::Success(data));
        }

        if status.is_client_error() {
            tracing::debug!(
                job_id = %ctx.job_id,
                status = status.as_u16(),
                "Report service rejected job"
            );
            return Ok(HandlerOutcome::Failure(format!(
                "Report service rejected request ({status}): {text}"
            )));
        }

        anyhow::bail!("Report service error ({status}): {text}")
    }
}
