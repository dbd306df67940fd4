//! Raw upstream envelopes and their normalization into the member context model.

use serde::Deserialize;
use serde_json::Value;

use crate::context::lenient;
use crate::context::{Campaign, Offer, OfferMedia, PointAccount, PointAuditLog, TimelineEvent};

/// User record returned by the identity lookup, with its tier/balance sub-structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    /// Internal id used by the per-user endpoints; some tenants omit it
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tier_entered_at: Option<String>,
    #[serde(default)]
    pub tier_resets_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub tier_details: TierDetails,
}

impl MemberRecord {
    /// Id for the offers/campaigns/audit/timeline calls
    pub fn internal_id(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TierDetails {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub point_account_balances: PointAccountBalances,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub tier_levels: Vec<TierLevel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointAccountBalances {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub summary: BalanceSummary,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub details: Vec<PointAccount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceSummary {
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_points: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub life_time_points: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierLevel {
    pub tier_overview: TierOverview,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub tier_system_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierOverview {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
}

/// Identity envelope: search returns `players`, the by-id path may return a single `user`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct IdentityEnvelope {
    #[serde(default, deserialize_with = "lenient::or_default")]
    players: Vec<MemberRecord>,
    #[serde(default)]
    user: Option<MemberRecord>,
}

impl IdentityEnvelope {
    /// First match in upstream order
    pub(crate) fn into_first(self) -> Option<MemberRecord> {
        self.players.into_iter().next().or(self.user)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OffersEnvelope {
    #[serde(default, deserialize_with = "lenient::or_default")]
    payload: OffersPayload,
}

#[derive(Debug, Default, Deserialize)]
struct OffersPayload {
    #[serde(default, deserialize_with = "lenient::or_default")]
    user_offers: Vec<RawOffer>,
}

#[derive(Debug, Deserialize)]
struct RawOffer {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    offer_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    is_redeemable: bool,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    expiration_date: Option<String>,
    #[serde(default)]
    redemption_end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    media: Vec<OfferMedia>,
}

impl OffersEnvelope {
    pub(crate) fn into_offers(self) -> Vec<Offer> {
        self.payload
            .user_offers
            .into_iter()
            .map(|o| Offer {
                id: o.id,
                name: o.name,
                description: o.description,
                offer_type: o.offer_type,
                is_redeemable: o.is_redeemable,
                start_date: o.start_date,
                expiration_date: o
                    .expiration_date
                    .filter(|d| !d.is_empty())
                    .or(o.redemption_end_date),
                media: o.media,
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CampaignsEnvelope {
    #[serde(default, deserialize_with = "lenient::or_default")]
    campaigns: CampaignTiles,
}

#[derive(Debug, Default, Deserialize)]
struct CampaignTiles {
    #[serde(default, deserialize_with = "lenient::or_default")]
    tiles: Vec<RawCampaign>,
}

#[derive(Debug, Deserialize)]
struct RawCampaign {
    #[serde(default, deserialize_with = "lenient::opt_integer")]
    campaign_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    name: String,
    #[serde(default)]
    custom_payload: Option<Value>,
    #[serde(default)]
    progress: Option<Value>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    template: Option<Value>,
}

fn str_at(value: Option<&Value>, path: &[&str]) -> Option<String> {
    let mut cur = value?;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str().map(str::to_string)
}

impl CampaignsEnvelope {
    pub(crate) fn into_campaigns(self) -> Vec<Campaign> {
        self.campaigns
            .tiles
            .into_iter()
            .map(|c| {
                let template = c.template.as_ref();
                Campaign {
                    campaign_id: c.campaign_id,
                    name: c.name,
                    campaign_type: str_at(c.custom_payload.as_ref(), &["type"]),
                    status: str_at(c.progress.as_ref(), &["state"]),
                    start_date: c.start_date,
                    end_date: c.end_date,
                    header: str_at(template, &["message", "header"]),
                    description: str_at(template, &["message", "description"]),
                    image_url: str_at(template, &["message", "image_url"]),
                    template_type: str_at(template, &["type"]),
                }
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditLogEnvelope {
    #[serde(default, deserialize_with = "lenient::or_default")]
    payload: AuditLogPayload,
}

#[derive(Debug, Default, Deserialize)]
struct AuditLogPayload {
    #[serde(default, deserialize_with = "lenient::or_default")]
    results: Vec<PointAuditLog>,
}

impl AuditLogEnvelope {
    pub(crate) fn into_entries(self) -> Vec<PointAuditLog> {
        self.payload.results
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TimelineEnvelope {
    #[serde(default, deserialize_with = "lenient::or_default")]
    result: Vec<TimelineEvent>,
}

impl TimelineEnvelope {
    pub(crate) fn into_events(self) -> Vec<TimelineEvent> {
        self.result
    }
}
