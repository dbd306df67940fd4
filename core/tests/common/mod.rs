#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tally_core::context::{Campaign, Offer, PointAuditLog, TimelineEvent};
use tally_core::intent::{Intent, IntentClassifier};
use tally_core::llm::{ChatMessage, ChatModel};
use tally_core::upstream::{MemberRecord, Resource, UpstreamApi};
use tally_core::{IdentifierKind, MemberContext, Result, TallyError};

pub fn member_record(id: &str, user_id: Option<&str>) -> MemberRecord {
    serde_json::from_value(json!({
        "id": id,
        "user_id": user_id,
        "external_id": "ext-42",
        "first_name": "Claire",
        "last_name": "Braun",
        "email": "claire@example.com",
        "tier_entered_at": "2024-01-01",
        "tier_resets_at": "2025-01-01",
        "tier_details": {
            "point_account_balances": {
                "summary": { "total_points": 45210, "life_time_points": 90000 },
                "details": [
                    { "account_name": "Reward Dollars", "available_balance": 12.5, "life_time_value": 40 },
                    { "account_name": "Tier Qualifying Points", "available_balance": 3000, "life_time_value": 3000 },
                    { "account_name": "Redeemable Points", "available_balance": "45210", "life_time_value": null }
                ]
            },
            "tier_levels": [
                { "tier_overview": { "name": "Gold" }, "tier_system_id": 7 },
                { "tier_overview": { "name": "Silver" }, "tier_system_id": 7 }
            ]
        }
    }))
    .expect("member fixture")
}

pub fn offer(id: &str, name: &str, description: &str) -> Offer {
    Offer {
        id: id.into(),
        name: name.into(),
        description: Some(description.into()),
        ..Default::default()
    }
}

pub fn campaign(name: &str, end_date: Option<&str>) -> Campaign {
    Campaign {
        name: name.into(),
        end_date: end_date.map(str::to_string),
        ..Default::default()
    }
}

pub fn audit(account: Option<&str>, modification: f64, spent: f64, expired: f64) -> PointAuditLog {
    PointAuditLog {
        account_name: account.map(str::to_string),
        modification,
        amount_spent: spent,
        amount_expired: expired,
        ..Default::default()
    }
}

pub fn timeline_event(timestamp: i64, payload: serde_json::Value) -> TimelineEvent {
    serde_json::from_value(json!({
        "event_stream_stream_id": format!("evt-{timestamp}"),
        "timestamp": timestamp,
        "event_stream_payload": payload,
    }))
    .expect("timeline fixture")
}

pub fn empty_context(member_id: &str) -> MemberContext {
    serde_json::from_value(json!({ "member_id": member_id })).expect("context fixture")
}

/// In-memory upstream with per-call counters and switchable secondary failures
#[derive(Default)]
pub struct FakeUpstream {
    pub record: Option<MemberRecord>,
    pub offers: Vec<Offer>,
    pub campaigns: Vec<Campaign>,
    pub audits: Vec<PointAuditLog>,
    pub timeline: Vec<TimelineEvent>,
    pub fail_offers: bool,
    pub fail_timeline: bool,
    pub identity_calls: AtomicUsize,
    pub secondary_calls: AtomicUsize,
    pub lookups: Mutex<Vec<(String, IdentifierKind)>>,
    pub secondary_ids: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn with_member(record: MemberRecord) -> Self {
        Self {
            record: Some(record),
            ..Default::default()
        }
    }

    pub fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub fn secondary_calls(&self) -> usize {
        self.secondary_calls.load(Ordering::SeqCst)
    }

    fn note_secondary(&self, user_id: &str) {
        self.secondary_calls.fetch_add(1, Ordering::SeqCst);
        self.secondary_ids.lock().unwrap().push(user_id.to_string());
    }
}

#[async_trait]
impl UpstreamApi for FakeUpstream {
    async fn find_member(&self, identifier: &str, kind: IdentifierKind) -> Result<MemberRecord> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        self.lookups
            .lock()
            .unwrap()
            .push((identifier.to_string(), kind));
        self.record
            .clone()
            .ok_or_else(|| TallyError::NotFound("User not found".into()))
    }

    async fn fetch_offers(&self, user_id: &str) -> Result<Vec<Offer>> {
        self.note_secondary(user_id);
        if self.fail_offers {
            return Err(TallyError::Upstream {
                resource: Resource::Offers,
                status: Some(500),
                body: "boom".into(),
            });
        }
        Ok(self.offers.clone())
    }

    async fn fetch_campaigns(&self, user_id: &str) -> Result<Vec<Campaign>> {
        self.note_secondary(user_id);
        Ok(self.campaigns.clone())
    }

    async fn fetch_point_audit_logs(&self, user_id: &str) -> Result<Vec<PointAuditLog>> {
        self.note_secondary(user_id);
        Ok(self.audits.clone())
    }

    async fn fetch_timeline_events(&self, user_id: &str) -> Result<Vec<TimelineEvent>> {
        self.note_secondary(user_id);
        if self.fail_timeline {
            return Err(TallyError::Upstream {
                resource: Resource::Timeline,
                status: None,
                body: "connection reset".into(),
            });
        }
        Ok(self.timeline.clone())
    }
}

/// Classifier that always answers with the same intent
pub struct FixedClassifier(pub Option<Intent>);

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _message: &str) -> Result<Option<Intent>> {
        Ok(self.0.clone())
    }
}

/// Chat model that echoes a canned answer and records the prompts it saw
#[derive(Default)]
pub struct CannedChat {
    pub answer: String,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl CannedChat {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.seen.lock().unwrap().push(messages);
        Ok(self.answer.clone())
    }
}
