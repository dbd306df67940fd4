// Query Router implementation
//
// Ordered keyword rules pick exactly one read-only tool per prompt. The first
// matching rule wins; no rule means the fallback reply.

mod intents;
pub mod tools;

pub use intents::answer_intent;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fmt::Write as _;
use tracing::debug;

use crate::context::MemberContext;

pub const FALLBACK_REPLY: &str = "Sorry, I didn't understand the request.";

/// Computation selected for a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    PointSummary,
    TotalEarned,
    TotalSpent,
    TotalExpired,
    PointsByAccount,
    MostValuableOffer,
    SummarizeOffers,
    SoonestCampaign,
    RecentPurchases,
    PointsSpentThisMonth,
    Fallback,
}

impl ToolKind {
    /// Step label reported back to callers
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::PointSummary => "get_point_summary",
            ToolKind::TotalEarned => "get_total_earned_points",
            ToolKind::TotalSpent => "get_total_spent_points",
            ToolKind::TotalExpired => "get_total_points_expired",
            ToolKind::PointsByAccount => "get_points_by_account",
            ToolKind::MostValuableOffer => "get_most_valuable_offer",
            ToolKind::SummarizeOffers => "summarize_offers",
            ToolKind::SoonestCampaign => "get_soonest_campaign",
            ToolKind::RecentPurchases => "get_recent_purchases",
            ToolKind::PointsSpentThisMonth => "get_points_spent_this_month",
            ToolKind::Fallback => "fallback",
        }
    }

    /// Node name in the routing graph
    pub fn node(&self) -> &'static str {
        match self {
            ToolKind::PointSummary => "points",
            ToolKind::TotalEarned => "earned",
            ToolKind::TotalSpent => "spent",
            ToolKind::TotalExpired => "expired",
            ToolKind::PointsByAccount => "account_summary",
            ToolKind::MostValuableOffer => "most_valuable_offer",
            ToolKind::SummarizeOffers => "offers",
            ToolKind::SoonestCampaign => "soonest_campaign",
            ToolKind::RecentPurchases => "recent_purchases",
            ToolKind::PointsSpentThisMonth => "points_spent_this_month",
            ToolKind::Fallback => "fallback",
        }
    }

    fn run(&self, ctx: &MemberContext, now: DateTime<Utc>) -> String {
        match self {
            ToolKind::PointSummary => tools::point_summary(ctx),
            ToolKind::TotalEarned => tools::total_earned(ctx),
            ToolKind::TotalSpent => tools::total_spent(ctx),
            ToolKind::TotalExpired => tools::total_expired(ctx),
            ToolKind::PointsByAccount => tools::points_by_account(ctx),
            ToolKind::MostValuableOffer => tools::most_valuable_offer(ctx),
            ToolKind::SummarizeOffers => tools::summarize_offers(ctx),
            ToolKind::SoonestCampaign => tools::soonest_campaign(ctx),
            ToolKind::RecentPurchases => {
                tools::recent_purchases(ctx, tools::DEFAULT_PURCHASE_COUNT)
            }
            ToolKind::PointsSpentThisMonth => tools::points_spent_this_month(ctx, now),
            ToolKind::Fallback => FALLBACK_REPLY.to_string(),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A rule matches when every group has at least one keyword contained in the
/// lowercased prompt.
#[derive(Debug, Clone, Copy)]
pub struct RoutingRule {
    pub tool: ToolKind,
    pub groups: &'static [&'static [&'static str]],
}

impl RoutingRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|kw| lowered.contains(kw)))
    }

    /// Human readable condition, e.g. `offer & (most|best)`
    pub fn describe(&self) -> String {
        self.groups
            .iter()
            .map(|group| match group {
                [single] => (*single).to_string(),
                many => format!("({})", many.join("|")),
            })
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// Evaluated in order. `PointsSpentThisMonth` sits behind `TotalSpent` and never
/// fires for prompts containing "spent"; the order is kept as deployed.
pub const ROUTING_RULES: &[RoutingRule] = &[
    RoutingRule {
        tool: ToolKind::TotalExpired,
        groups: &[&["expired"]],
    },
    RoutingRule {
        tool: ToolKind::TotalSpent,
        groups: &[&["spent"]],
    },
    RoutingRule {
        tool: ToolKind::TotalEarned,
        groups: &[&["earned"]],
    },
    RoutingRule {
        tool: ToolKind::PointsByAccount,
        groups: &[&["by account", "account"]],
    },
    RoutingRule {
        tool: ToolKind::MostValuableOffer,
        groups: &[&["offer"], &["most", "best"], &["valuable", "value"]],
    },
    RoutingRule {
        tool: ToolKind::PointSummary,
        groups: &[&["tier", "points"]],
    },
    RoutingRule {
        tool: ToolKind::SummarizeOffers,
        groups: &[&["offers"]],
    },
    RoutingRule {
        tool: ToolKind::SoonestCampaign,
        groups: &[&["campaign"], &["end", "expires"]],
    },
    RoutingRule {
        tool: ToolKind::RecentPurchases,
        groups: &[&["purchases"], &["last"]],
    },
    RoutingRule {
        tool: ToolKind::PointsSpentThisMonth,
        groups: &[&["points"], &["spent"], &["month"]],
    },
];

/// Result of one routed computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    /// Absent for explicit-intent answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolKind>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub steps: Vec<String>,
}

pub fn route_prompt(prompt: &str) -> ToolKind {
    let lowered = prompt.to_lowercase();
    ROUTING_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.tool)
        .unwrap_or(ToolKind::Fallback)
}

/// Route `prompt` and run exactly one tool against the context
pub fn reason(prompt: &str, ctx: &MemberContext) -> ToolOutput {
    reason_at(prompt, ctx, Utc::now())
}

/// `reason` with an explicit clock for the month-scoped tool
pub fn reason_at(prompt: &str, ctx: &MemberContext, now: DateTime<Utc>) -> ToolOutput {
    let tool = route_prompt(prompt);
    debug!(target: "router", tool = tool.label(), member_id = %ctx.member_id, "Routed prompt");
    ToolOutput {
        tool: Some(tool),
        summary: tool.run(ctx, now),
        payload: None,
        steps: vec![tool.label().to_string()],
    }
}

/// Graphviz rendering of the rule table: entry -> tool per rule -> end
pub fn routing_graph_dot() -> String {
    let mut dot = String::from("digraph reasoning {\n");
    dot.push_str("    __start__ [shape=Mdiamond];\n");
    dot.push_str("    __end__ [shape=Msquare];\n");

    let mut tools: Vec<ToolKind> = ROUTING_RULES.iter().map(|r| r.tool).collect();
    tools.push(ToolKind::Fallback);
    for tool in &tools {
        let _ = writeln!(dot, "    {} [label=\"{}\"];", tool.node(), tool.label());
    }
    for (i, rule) in ROUTING_RULES.iter().enumerate() {
        let _ = writeln!(
            dot,
            "    __start__ -> {} [label=\"{}. {}\", style=dashed];",
            rule.tool.node(),
            i + 1,
            rule.describe()
        );
    }
    let _ = writeln!(
        dot,
        "    __start__ -> {} [label=\"otherwise\", style=dashed];",
        ToolKind::Fallback.node()
    );
    for tool in &tools {
        let _ = writeln!(dot, "    {} -> __end__;", tool.node());
    }
    dot.push_str("}\n");
    dot
}
