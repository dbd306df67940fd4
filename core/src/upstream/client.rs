use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::wire::{
    AuditLogEnvelope, CampaignsEnvelope, IdentityEnvelope, MemberRecord, OffersEnvelope,
    TimelineEnvelope,
};
use super::{Resource, UpstreamApi};
use crate::config::{env_parse, env_string};
use crate::context::{Campaign, IdentifierKind, Offer, PointAuditLog, TimelineEvent};
use crate::{Result, TallyError};

/// Configuration for the upstream client loaded from environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Core identity/loyalty API, e.g. https://api.example.com
    pub core_base_url: String,
    pub core_api_key: String,
    pub core_api_secret: String,
    /// Connect offers/incentives API
    pub connect_base_url: String,
    pub connect_api_key: String,
    pub connect_api_secret: String,
    pub retailer_id: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Base delay between attempts; grows linearly with the attempt number
    pub retry_backoff_ms: u64,
    /// Offers page size; large enough to be effectively unpaginated
    pub offers_page_size: u32,
    /// Number of most recent audit log entries fetched
    pub audit_log_limit: u32,
    /// Timeline stream category filtered server-side
    pub timeline_category: String,
    pub culture: String,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            core_base_url: env_string("CORE_API_BASE_URL").unwrap_or_default(),
            core_api_key: env_string("CORE_API_KEY").unwrap_or_default(),
            core_api_secret: env_string("CORE_API_SECRET").unwrap_or_default(),
            connect_base_url: env_string("CONNECT_API_BASE_URL").unwrap_or_default(),
            connect_api_key: env_string("CONNECT_API_KEY").unwrap_or_default(),
            connect_api_secret: env_string("CONNECT_API_SECRET").unwrap_or_default(),
            retailer_id: env_string("RETAILER_ID").unwrap_or_default(),
            timeout_ms: env_parse("UPSTREAM_TIMEOUT_MS").unwrap_or(10_000),
            max_retries: env_parse("UPSTREAM_MAX_RETRIES").unwrap_or(1),
            retry_backoff_ms: env_parse("UPSTREAM_RETRY_BACKOFF_MS").unwrap_or(250),
            offers_page_size: env_parse("OFFERS_PAGE_SIZE").unwrap_or(1000),
            audit_log_limit: env_parse("AUDIT_LOG_LIMIT").unwrap_or(10),
            timeline_category: env_string("TIMELINE_CATEGORY")
                .unwrap_or_else(|| "ACCOUNT_AUDIT_LOG".to_string()),
            culture: env_string("OFFERS_CULTURE").unwrap_or_else(|| "en-US".to_string()),
            user_agent: "tally/0.1".to_string(),
        }
    }
}

/// Typed HTTP client over the core and connect APIs
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TallyError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(UpstreamConfig::default())
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// `{core_base}/priv/v1/apps/{key}/{segments...}`, each segment percent-encoded
    fn core_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.core_base_url)
            .map_err(|e| TallyError::Config(format!("invalid core base url: {e}")))?;
        for segment in segments {
            if matches!(*segment, "" | "." | "..") {
                return Err(TallyError::InvalidArgument(format!(
                    "Invalid path segment: {segment:?}"
                )));
            }
        }
        url.path_segments_mut()
            .map_err(|_| TallyError::Config("core base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["priv", "v1", "apps", self.config.core_api_key.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn connect_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.connect_base_url.trim_end_matches('/'),
            path
        )
    }

    fn core_auth(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.config.core_api_key, Some(&self.config.core_api_secret))
    }

    fn connect_auth(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(
            &self.config.connect_api_key,
            Some(&self.config.connect_api_secret),
        )
    }

    /// Send with one bounded retry policy and decode a JSON body.
    ///
    /// Connect errors, timeouts and 502/503/504 are retried up to `max_retries` times;
    /// anything else surfaces immediately as `TallyError::Upstream`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        resource: Resource,
        request: RequestBuilder,
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            let req = request.try_clone().ok_or_else(|| {
                TallyError::Internal(format!("{resource} request cannot be retried"))
            })?;

            let retry_delay =
                Duration::from_millis(self.config.retry_backoff_ms * u64::from(attempt + 1));
            let can_retry = attempt < self.config.max_retries;

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp.text().await.map_err(|e| {
                            TallyError::upstream(
                                resource,
                                Some(status.as_u16()),
                                format!("failed to read body: {e}"),
                            )
                        })?;
                        return serde_json::from_str(&body).map_err(|e| {
                            warn!(target: "upstream", %resource, error = %e, "Malformed upstream body");
                            TallyError::upstream(
                                resource,
                                Some(status.as_u16()),
                                format!("malformed body: {e}"),
                            )
                        });
                    }

                    let body = resp.text().await.unwrap_or_default();
                    if is_transient(status) && can_retry {
                        warn!(target: "upstream", %resource, %status, attempt, "Transient upstream status; retrying");
                        tokio::time::sleep(retry_delay).await;
                        attempt += 1;
                        continue;
                    }
                    warn!(target: "upstream", %resource, %status, body = %body, "Upstream returned error");
                    return Err(TallyError::upstream(resource, Some(status.as_u16()), body));
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && can_retry {
                        warn!(target: "upstream", %resource, error = %e, attempt, "Upstream request failed; retrying");
                        tokio::time::sleep(retry_delay).await;
                        attempt += 1;
                        continue;
                    }
                    warn!(target: "upstream", %resource, error = %e, "Upstream request failed");
                    return Err(TallyError::upstream(resource, None, e.to_string()));
                }
            }
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    async fn find_member(&self, identifier: &str, kind: IdentifierKind) -> Result<MemberRecord> {
        debug!(target: "upstream", %kind, "Resolving member identity");

        // The by-id path authenticates with the key in the path only; contact search
        // uses basic auth.
        let request = match kind {
            IdentifierKind::UserId => self.http.get(self.core_url(&["users", identifier])?),
            IdentifierKind::Email | IdentifierKind::Phone => {
                let field = if kind == IdentifierKind::Email {
                    "email"
                } else {
                    "mobile_number"
                };
                self.core_auth(
                    self.http
                        .get(self.core_url(&["users", "search_users"])?)
                        .query(&[(field, identifier)])
                        .query(&[("advanced_search_params[user_profile]", "true")]),
                )
            }
        };

        let envelope: IdentityEnvelope = self.send_json(Resource::Identity, request).await?;
        let record = envelope
            .into_first()
            .ok_or_else(|| TallyError::NotFound("User not found".to_string()))?;

        info!(target: "upstream", member_id = %record.id, %kind, "Member identity resolved");
        Ok(record)
    }

    async fn fetch_offers(&self, user_id: &str) -> Result<Vec<Offer>> {
        let body = json!({
            "retailer_id": self.config.retailer_id,
            "user_id": user_id,
            "skip": 0,
            "take": self.config.offers_page_size,
            "include_pending_extended_data": true,
            "culture": self.config.culture,
        });
        let request = self.connect_auth(
            self.http
                .post(self.connect_url("offers/api/2.0/offers/get_user_offers"))
                .json(&body),
        );
        let envelope: OffersEnvelope = self.send_json(Resource::Offers, request).await?;
        Ok(envelope.into_offers())
    }

    async fn fetch_campaigns(&self, user_id: &str) -> Result<Vec<Campaign>> {
        let request = self.core_auth(
            self.http
                .get(self.core_url(&["users", user_id, "campaigns"])?),
        );
        let envelope: CampaignsEnvelope = self.send_json(Resource::Campaigns, request).await?;
        Ok(envelope.into_campaigns())
    }

    async fn fetch_point_audit_logs(&self, user_id: &str) -> Result<Vec<PointAuditLog>> {
        let body = json!({
            "retailer_id": self.config.retailer_id,
            "user_id": user_id,
            "exclude_specified_modification_types": false,
            "skip": 0,
            "take": self.config.audit_log_limit,
        });
        let request = self.connect_auth(
            self.http
                .post(self.connect_url(
                    "incentives/api/1.0/point_audit_logs/fetch_point_audit_logs",
                ))
                .json(&body),
        );
        let envelope: AuditLogEnvelope = self.send_json(Resource::PointAuditLogs, request).await?;
        Ok(envelope.into_entries())
    }

    async fn fetch_timeline_events(&self, user_id: &str) -> Result<Vec<TimelineEvent>> {
        let url = self.core_url(&[
            "users",
            user_id,
            "timelines",
            &self.config.timeline_category,
        ])?;
        let request = self.core_auth(self.http.get(url));
        let envelope: TimelineEnvelope = self.send_json(Resource::Timeline, request).await?;
        Ok(envelope.into_events())
    }
}
