mod common;

use chrono::{TimeZone, Utc};
use common::{audit, campaign, empty_context, offer, timeline_event};
use serde_json::json;
use tally_core::router::{reason, reason_at, route_prompt, tools, ToolKind};

#[test]
fn spent_wins_over_earned() {
    let mut ctx = empty_context("m-1");
    ctx.recent_activity = vec![audit(Some("A"), 50.0, 20.0, 0.0), audit(Some("A"), -10.0, 5.0, 0.0)];

    let out = reason("I spent and earned points", &ctx);
    assert_eq!(out.tool, Some(ToolKind::TotalSpent));
    assert_eq!(out.steps, vec!["get_total_spent_points".to_string()]);
    assert_eq!(out.summary, "You've spent a total of 25 points.");
}

#[test]
fn keyword_table_routes() {
    let cases = [
        ("what expired", ToolKind::TotalExpired),
        ("how much have I earned", ToolKind::TotalEarned),
        ("break it down by account", ToolKind::PointsByAccount),
        ("what's my best value offer", ToolKind::MostValuableOffer),
        ("how many points do I have", ToolKind::PointSummary),
        ("list my offers", ToolKind::SummarizeOffers),
        ("which campaign expires first", ToolKind::SoonestCampaign),
        ("show my last purchases", ToolKind::RecentPurchases),
        ("tell me a joke", ToolKind::Fallback),
    ];
    for (prompt, expected) in cases {
        assert_eq!(route_prompt(prompt), expected, "prompt: {prompt}");
    }
}

#[test]
fn most_valuable_offer_picks_largest_dollar_name() {
    let mut ctx = empty_context("m-1");
    ctx.offers = vec![
        offer("1", "$10 Reward", ""),
        offer("2", "$25 Reward", ""),
        offer("3", "Free Item", ""),
    ];
    assert_eq!(
        tools::most_valuable_offer(&ctx),
        "Your most valuable offer is \"$25 Reward\"."
    );
}

#[test]
fn most_valuable_offer_ties_keep_first() {
    let mut ctx = empty_context("m-1");
    ctx.offers = vec![offer("1", "$25 Bonus", ""), offer("2", "$25 Reward", "")];
    assert_eq!(
        tools::most_valuable_offer(&ctx),
        "Your most valuable offer is \"$25 Bonus\"."
    );

    ctx.offers = vec![offer("3", "Free Item", "")];
    assert_eq!(
        tools::most_valuable_offer(&ctx),
        "Could not determine the most valuable offer."
    );
}

#[test]
fn most_valuable_offer_handles_amounts_beyond_u64() {
    let mut ctx = empty_context("m-1");
    ctx.offers = vec![
        offer("1", "$99999999999999999999 Jackpot", ""),
        offer("2", "$100000000000000000000 Mega", ""),
        offer("3", "$25 Reward", ""),
    ];
    assert_eq!(
        tools::most_valuable_offer(&ctx),
        "Your most valuable offer is \"$100000000000000000000 Mega\"."
    );

    ctx.offers = vec![offer("1", "$99999999999999999999999 Prize", "")];
    assert_eq!(
        tools::most_valuable_offer(&ctx),
        "Your most valuable offer is \"$99999999999999999999999 Prize\"."
    );
}

#[test]
fn soonest_campaign_sorts_undated_last() {
    let mut ctx = empty_context("m-1");
    ctx.campaigns = vec![
        campaign("Open Ended", None),
        campaign("New Year", Some("2025-01-01")),
        campaign("Summer", Some("2024-06-01")),
    ];
    assert_eq!(
        tools::soonest_campaign(&ctx),
        "\"Summer\" ends on 2024-06-01"
    );

    ctx.campaigns = vec![campaign("Open Ended", None)];
    assert_eq!(
        tools::soonest_campaign(&ctx),
        "\"Open Ended\" has no end date."
    );

    ctx.campaigns.clear();
    assert_eq!(tools::soonest_campaign(&ctx), "You have no campaigns.");
}

#[test]
fn points_by_account_keeps_first_seen_order() {
    let mut ctx = empty_context("m-1");
    ctx.recent_activity = vec![
        audit(Some("A"), 5.0, 0.0, 0.0),
        audit(Some("B"), 5.0, 0.0, 0.0),
        audit(Some("A"), 2.0, 0.0, 0.0),
    ];
    assert_eq!(
        tools::points_by_account(&ctx),
        "Point changes by account:\nA: 7 pts\nB: 5 pts"
    );

    ctx.recent_activity = vec![audit(None, -3.0, 0.0, 0.0)];
    assert_eq!(
        tools::points_by_account(&ctx),
        "Point changes by account:\nUnknown: -3 pts"
    );

    ctx.recent_activity.clear();
    assert_eq!(tools::points_by_account(&ctx), "No recent point activity.");
}

#[test]
fn earned_and_expired_only_count_positive_amounts() {
    let mut ctx = empty_context("m-1");
    ctx.recent_activity = vec![
        audit(Some("A"), 1200.0, 0.0, 0.0),
        audit(Some("A"), -300.0, 0.0, 40.0),
        audit(Some("A"), 800.0, 0.0, -5.0),
    ];
    assert_eq!(tools::total_earned(&ctx), "You've earned a total of 2,000 points.");
    assert_eq!(tools::total_expired(&ctx), "You have 40 points that have expired.");

    ctx.recent_activity = vec![audit(Some("A"), 10.0, 0.0, 0.0)];
    assert_eq!(tools::total_expired(&ctx), "You have no expired points.");
}

#[test]
fn point_summary_without_tier() {
    let mut ctx = empty_context("m-1");
    ctx.total_points = 1234567.9;
    assert_eq!(
        tools::point_summary(&ctx),
        "You're currently a Unknown member with 1,234,567 points."
    );
}

#[test]
fn summarize_offers_lines() {
    let mut ctx = empty_context("m-1");
    assert_eq!(tools::summarize_offers(&ctx), "You don't have any active offers.");
    ctx.offers = vec![
        offer("1", "$5 Off", "Any purchase"),
        offer("2", "Free Coffee", "Small drip"),
    ];
    assert_eq!(
        tools::summarize_offers(&ctx),
        "$5 Off – Any purchase\nFree Coffee – Small drip"
    );
}

#[test]
fn recent_purchases_newest_first_and_bounded() {
    let mut ctx = empty_context("m-1");
    ctx.timeline = vec![
        timeline_event(100, json!({ "event_type_slug": "PURCHASE", "transaction_id": "t1", "transaction_time": "Mon" })),
        timeline_event(400, json!({ "event_type_slug": "PURCHASE", "transaction_id": "t4" })),
        timeline_event(300, json!({ "event_type_slug": "PURCHASE", "transaction_id": "t3", "transaction_time": "Wed" })),
        timeline_event(200, json!({ "event_type_slug": "PURCHASE", "transaction_id": 2, "transaction_time": "Tue" })),
        timeline_event(500, json!({ "event_type_slug": "LOGIN" })),
    ];
    assert_eq!(
        tools::recent_purchases(&ctx, tools::DEFAULT_PURCHASE_COUNT),
        "- t4 on Unknown\n- t3 on Wed\n- 2 on Tue"
    );

    ctx.timeline.truncate(0);
    assert_eq!(tools::recent_purchases(&ctx, 3), "No purchases found.");
}

#[test]
fn points_spent_this_month_compares_month_only() {
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
    let mut ctx = empty_context("m-1");
    ctx.timeline = vec![
        timeline_event(1, json!({ "event_type_slug": "INCENTIVES_POINT_SPEND", "TimeOfOccurrence": "2024-03-02T10:00:00Z", "Modification": -150 })),
        // same month, earlier year: still counted
        timeline_event(2, json!({ "event_type_slug": "INCENTIVES_POINT_SPEND", "TimeOfOccurrence": "2023-03-20", "Modification": "-50" })),
        timeline_event(3, json!({ "event_type_slug": "INCENTIVES_POINT_SPEND", "TimeOfOccurrence": "2024-02-28T10:00:00Z", "Modification": -999 })),
        timeline_event(4, json!({ "event_type_slug": "INCENTIVES_POINT_SPEND", "TimeOfOccurrence": "not a date", "Modification": -999 })),
        timeline_event(5, json!({ "event_type_slug": "PURCHASE", "TimeOfOccurrence": "2024-03-02T10:00:00Z", "Modification": -999 })),
    ];
    assert_eq!(
        tools::points_spent_this_month(&ctx, now),
        "You've spent 200 points so far this month."
    );

    let april = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    assert_eq!(
        tools::points_spent_this_month(&ctx, april),
        "No points spent this month."
    );
}

#[test]
fn reason_at_is_deterministic_for_a_fixed_clock() {
    let ctx = empty_context("m-1");
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
    let out = reason_at("what's my tier", &ctx, now);
    assert_eq!(out.tool, Some(ToolKind::PointSummary));
    assert!(out.payload.is_none());
}
