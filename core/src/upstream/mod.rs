//! Upstream loyalty platform access
//!
//! This module provides:
//! - `UpstreamApi`, the seam the context resolver fetches through
//! - `UpstreamClient`, the reqwest implementation over the core identity API and the
//!   connect offers/incentives API
//! - `MemberRecord` and friends, the raw identity record before it becomes a `MemberContext`

mod client;
pub mod wire;

pub use client::{UpstreamClient, UpstreamConfig};
pub use wire::MemberRecord;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::context::{Campaign, IdentifierKind, Offer, PointAuditLog, TimelineEvent};
use crate::Result;

/// Kind of upstream resource, carried on every upstream error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Identity,
    Offers,
    Campaigns,
    PointAuditLogs,
    Timeline,
    Model,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Identity => "identity",
            Resource::Offers => "offers",
            Resource::Campaigns => "campaigns",
            Resource::PointAuditLogs => "point_audit_logs",
            Resource::Timeline => "timeline",
            Resource::Model => "model",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch-and-normalize operations against the loyalty platform.
///
/// Each method is a single logical call with no side effects beyond the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Zero-or-one user record; `NotFound` when the lookup yields no match
    async fn find_member(&self, identifier: &str, kind: IdentifierKind) -> Result<MemberRecord>;

    async fn fetch_offers(&self, user_id: &str) -> Result<Vec<Offer>>;

    async fn fetch_campaigns(&self, user_id: &str) -> Result<Vec<Campaign>>;

    async fn fetch_point_audit_logs(&self, user_id: &str) -> Result<Vec<PointAuditLog>>;

    async fn fetch_timeline_events(&self, user_id: &str) -> Result<Vec<TimelineEvent>>;
}
