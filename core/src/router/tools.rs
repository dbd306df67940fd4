//! Read-only computations over a `MemberContext`.
//!
//! Every tool is pure and infallible: missing data produces a stated "none" reply.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::context::{format_thousands, MemberContext, TimelineEvent};

pub const DEFAULT_PURCHASE_COUNT: usize = 3;

const NO_END_DATE_SENTINEL: &str = "9999-12-31";

pub fn point_summary(ctx: &MemberContext) -> String {
    format!(
        "You're currently a {} member with {} points.",
        ctx.tier_name().unwrap_or("Unknown"),
        format_thousands(ctx.total_points as i64)
    )
}

/// Sum of positive modifications
pub fn total_earned(ctx: &MemberContext) -> String {
    let earned: f64 = ctx
        .recent_activity
        .iter()
        .map(|a| a.modification)
        .filter(|m| *m > 0.0)
        .sum();
    format!(
        "You've earned a total of {} points.",
        format_thousands(earned as i64)
    )
}

pub fn total_spent(ctx: &MemberContext) -> String {
    let spent: f64 = ctx.recent_activity.iter().map(|a| a.amount_spent).sum();
    format!(
        "You've spent a total of {} points.",
        format_thousands(spent as i64)
    )
}

pub fn total_expired(ctx: &MemberContext) -> String {
    let expired: f64 = ctx
        .recent_activity
        .iter()
        .map(|a| a.amount_expired)
        .filter(|e| *e > 0.0)
        .sum();
    if expired == 0.0 {
        return "You have no expired points.".to_string();
    }
    format!("You have {:.0} points that have expired.", expired)
}

/// Subtotals per account in first-seen order
pub fn points_by_account(ctx: &MemberContext) -> String {
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for entry in &ctx.recent_activity {
        let account = entry.account_name.as_deref().unwrap_or("Unknown");
        match totals.iter_mut().find(|(name, _)| *name == account) {
            Some((_, sum)) => *sum += entry.modification,
            None => totals.push((account, entry.modification)),
        }
    }
    if totals.is_empty() {
        return "No recent point activity.".to_string();
    }
    let lines: Vec<String> = totals
        .iter()
        .map(|(account, pts)| format!("{account}: {pts:.0} pts"))
        .collect();
    format!("Point changes by account:\n{}", lines.join("\n"))
}

/// Dollar value of names shaped like `$25 Reward`
/// Whole-dollar amount from a `$<digits>` name, as digits without leading zeros.
/// Any length is accepted; amounts order by `(len, digits)`.
fn dollar_value(name: &str) -> Option<&str> {
    let token = name.strip_prefix('$')?.split_whitespace().next()?;
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match token.trim_start_matches('0') {
        "" => Some("0"),
        digits => Some(digits),
    }
}

pub fn most_valuable_offer(ctx: &MemberContext) -> String {
    let mut best: Option<(&str, (usize, &str))> = None;
    for offer in &ctx.offers {
        let Some(digits) = dollar_value(&offer.name) else {
            continue;
        };
        let value = (digits.len(), digits);
        // strict comparison keeps the first of equal maxima
        if best.map_or(true, |(_, top)| value > top) {
            best = Some((offer.name.as_str(), value));
        }
    }
    match best {
        Some((name, _)) => format!("Your most valuable offer is \"{name}\"."),
        None => "Could not determine the most valuable offer.".to_string(),
    }
}

pub fn summarize_offers(ctx: &MemberContext) -> String {
    if ctx.offers.is_empty() {
        return "You don't have any active offers.".to_string();
    }
    ctx.offers
        .iter()
        .map(|o| format!("{} – {}", o.name, o.description.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Campaign with the earliest end date; undated campaigns sort last
pub fn soonest_campaign(ctx: &MemberContext) -> String {
    let end_key = |end: &Option<String>| -> String {
        end.as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(NO_END_DATE_SENTINEL)
            .to_string()
    };
    let mut campaigns: Vec<_> = ctx.campaigns.iter().collect();
    campaigns.sort_by_key(|c| end_key(&c.end_date));

    let Some(first) = campaigns.first() else {
        return "You have no campaigns.".to_string();
    };
    match first.end_date.as_deref().filter(|d| !d.is_empty()) {
        Some(end) => format!("\"{}\" ends on {}", first.name, end),
        None => format!("\"{}\" has no end date.", first.name),
    }
}

fn payload_text(event: &TimelineEvent, key: &str) -> Option<String> {
    match event.event_stream_payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Most recent `count` purchase events, newest first
pub fn recent_purchases(ctx: &MemberContext, count: usize) -> String {
    let mut purchases: Vec<&TimelineEvent> = ctx
        .timeline
        .iter()
        .filter(|e| e.event_type_slug() == Some("PURCHASE"))
        .collect();
    purchases.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    purchases.truncate(count);

    if purchases.is_empty() {
        return "No purchases found.".to_string();
    }
    purchases
        .iter()
        .map(|e| {
            format!(
                "- {} on {}",
                payload_text(e, "transaction_id").unwrap_or_else(|| "N/A".into()),
                payload_text(e, "transaction_time").unwrap_or_else(|| "Unknown".into())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Month number of a `TimeOfOccurrence` string in any of the shapes upstream emits
fn occurrence_month(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.month());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.month());
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d.month());
        }
    }
    None
}

fn payload_number(event: &TimelineEvent, key: &str) -> f64 {
    match event.event_stream_payload.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

/// Points spent in the current month.
///
/// Only the month number is compared, so events from the same month of an earlier
/// year are counted too.
pub fn points_spent_this_month(ctx: &MemberContext, now: DateTime<Utc>) -> String {
    let spends: Vec<&TimelineEvent> = ctx
        .timeline
        .iter()
        .filter(|e| e.event_type_slug() == Some("INCENTIVES_POINT_SPEND"))
        .filter(|e| {
            e.payload_str("TimeOfOccurrence")
                .and_then(occurrence_month)
                == Some(now.month())
        })
        .collect();

    if spends.is_empty() {
        return "No points spent this month.".to_string();
    }
    let total: f64 = spends
        .iter()
        .map(|e| payload_number(e, "Modification").abs())
        .sum();
    format!("You've spent {} points so far this month.", total as i64)
}
