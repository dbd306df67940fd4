//! Context resolution: one identity lookup followed by concurrent secondary fetches.
//!
//! The identity call is fatal on failure. Offers, campaigns, audit logs and timeline
//! events are best-effort: a failure is logged and the collection is left empty.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{IdentifierKind, MemberContext, PointAccount, TierInfo};
use crate::upstream::{MemberRecord, UpstreamApi};
use crate::{Result, TallyError};

const REWARD_DOLLARS: &str = "Reward Dollars";
const TIER_QUALIFYING_POINTS: &str = "Tier Qualifying Points";
const REDEEMABLE_POINTS: &str = "Redeemable Points";

pub struct ContextResolver {
    upstream: Arc<dyn UpstreamApi>,
}

impl ContextResolver {
    pub fn new(upstream: Arc<dyn UpstreamApi>) -> Self {
        Self { upstream }
    }

    /// Resolve with the identifier kind given as its wire name (`user_id`, `email`, `phone`)
    pub async fn resolve_str(&self, identifier: &str, kind: &str) -> Result<MemberContext> {
        let kind: IdentifierKind = kind.parse()?;
        self.resolve(identifier, kind).await
    }

    pub async fn resolve(&self, identifier: &str, kind: IdentifierKind) -> Result<MemberContext> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(TallyError::InvalidArgument(
                "identifier must not be empty".to_string(),
            ));
        }

        debug!(target: "resolver", %kind, "Resolving member context");
        let record = self.upstream.find_member(identifier, kind).await?;
        if record.id.trim().is_empty() {
            warn!(target: "resolver", %kind, "Upstream member record has no id");
            return Err(TallyError::NotFound("User not found".to_string()));
        }
        let uid = record.internal_id().to_string();

        let (offers, campaigns, recent_activity, timeline) = tokio::join!(
            self.upstream.fetch_offers(&uid),
            self.upstream.fetch_campaigns(&uid),
            self.upstream.fetch_point_audit_logs(&uid),
            self.upstream.fetch_timeline_events(&uid),
        );

        let mut ctx = base_context(record);
        ctx.offers = or_empty(offers, "offers", &ctx.member_id);
        ctx.campaigns = or_empty(campaigns, "campaigns", &ctx.member_id);
        ctx.recent_activity = or_empty(recent_activity, "point_audit_logs", &ctx.member_id);
        ctx.timeline = or_empty(timeline, "timeline", &ctx.member_id);

        info!(
            target: "resolver",
            member_id = %ctx.member_id,
            offers = ctx.offers.len(),
            campaigns = ctx.campaigns.len(),
            activity = ctx.recent_activity.len(),
            timeline = ctx.timeline.len(),
            "Member context resolved"
        );
        Ok(ctx)
    }
}

fn or_empty<T>(result: Result<Vec<T>>, what: &str, member_id: &str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(target: "resolver", %member_id, resource = what, error = %e, "Secondary fetch failed; continuing without it");
        Vec::new()
    })
}

/// Identity, tier and balances; secondary collections start empty
fn base_context(record: MemberRecord) -> MemberContext {
    let balances = record.tier_details.point_account_balances;
    let tier = record
        .tier_details
        .tier_levels
        .into_iter()
        .next()
        .map(|level| TierInfo {
            name: level.tier_overview.name,
            system: level.tier_system_id,
            entered_at: record.tier_entered_at.clone(),
            resets_at: record.tier_resets_at.clone(),
        });

    let details = balances.details;
    MemberContext {
        member_id: record.id,
        external_id: record.external_id,
        first_name: record.first_name,
        last_name: record.last_name,
        email: record.email,
        tier,
        total_points: balances.summary.total_points,
        life_time_points: balances.summary.life_time_points,
        reward_dollars: named_balance(&details, REWARD_DOLLARS),
        tier_qualifying_points: named_balance(&details, TIER_QUALIFYING_POINTS),
        redeemable_points: named_balance(&details, REDEEMABLE_POINTS),
        point_accounts: details,
        recent_activity: Vec::new(),
        offers: Vec::new(),
        campaigns: Vec::new(),
        timeline: Vec::new(),
    }
}

/// Exact, case-sensitive account name match
fn named_balance(accounts: &[PointAccount], name: &str) -> f64 {
    accounts
        .iter()
        .find(|a| a.account_name == name)
        .map(|a| a.available_balance)
        .unwrap_or(0.0)
}

/// Short identify-user reply
pub fn greeting(ctx: &MemberContext) -> String {
    let offers = ctx.offers.len();
    format!(
        "Hi {}, you're a {} with {} points and {} active offer{}.",
        ctx.first_name.as_deref().unwrap_or_default(),
        ctx.tier_name().unwrap_or("member"),
        format_thousands(ctx.total_points as i64),
        offers,
        if offers == 1 { "" } else { "s" }
    )
}

/// Comma-grouped integer, e.g. 1234567 -> "1,234,567"
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
