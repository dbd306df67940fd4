//! Member context data model.
//!
//! Everything here is normalized at ingest: optional upstream numbers default to
//! zero and secondary collections default to empty, so consumers never branch on
//! absence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::lenient;
use crate::TallyError;

/// How an identifier should be looked up upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    UserId,
    Email,
    Phone,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::UserId => "user_id",
            IdentifierKind::Email => "email",
            IdentifierKind::Phone => "phone",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierKind {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_id" => Ok(IdentifierKind::UserId),
            "email" => Ok(IdentifierKind::Email),
            "phone" => Ok(IdentifierKind::Phone),
            other => Err(TallyError::InvalidArgument(format!(
                "Invalid identifier type: {}",
                other
            ))),
        }
    }
}

/// A named loyalty status level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierInfo {
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub system: Option<String>,
    #[serde(default)]
    pub entered_at: Option<String>,
    #[serde(default)]
    pub resets_at: Option<String>,
}

/// One upstream ledger account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAccount {
    pub account_name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub available_balance: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub life_time_value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OfferMedia {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Offer {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub offer_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub is_redeemable: bool,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub media: Vec<OfferMedia>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(default, deserialize_with = "lenient::opt_integer")]
    pub campaign_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, rename = "type")]
    pub campaign_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub template_type: Option<String>,
}

/// A single point-balance modification
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointAuditLog {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub point_account_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub user_point_account_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub modification: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount_spent: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount_expired: f64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub audit_type: i64,
    #[serde(default)]
    pub modification_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub modification_entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub point_source_id: Option<String>,
    #[serde(default)]
    pub point_source_name: Option<String>,
    #[serde(default)]
    pub time_of_occurrence: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub request_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub transaction_id: Option<String>,
}

/// Generic activity record. The payload schema depends on the event type and is
/// carried opaquely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default, deserialize_with = "lenient::string")]
    pub event_stream_stream_id: String,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub event_stream_event_category_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub event_stream_event_type_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub target_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub event_stream_payload: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub contexts: Vec<Value>,
}

impl TimelineEvent {
    /// String field of the opaque payload
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.event_stream_payload.get(key).and_then(Value::as_str)
    }

    /// `event_type_slug` tag of the payload
    pub fn event_type_slug(&self) -> Option<&str> {
        self.payload_str("event_type_slug")
    }
}

/// Unified snapshot of one member's identity, balances, offers, campaigns,
/// audit history and event timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberContext {
    pub member_id: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tier: Option<TierInfo>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_points: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub life_time_points: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub reward_dollars: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tier_qualifying_points: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub redeemable_points: f64,
    #[serde(default)]
    pub point_accounts: Vec<PointAccount>,
    #[serde(default)]
    pub recent_activity: Vec<PointAuditLog>,
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

impl MemberContext {
    pub fn tier_name(&self) -> Option<&str> {
        self.tier.as_ref().map(|t| t.name.as_str())
    }
}
