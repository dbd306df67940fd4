//! Replies for explicitly classified intents.

use serde_json::json;
use std::fmt::Write as _;

use super::ToolOutput;
use crate::context::{format_thousands, greeting, MemberContext};
use crate::intent::Intent;

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Render the reply for `intent` against an already refreshed context
pub fn answer_intent(intent: &Intent, ctx: &MemberContext) -> ToolOutput {
    let mut payload = None;
    let summary = match intent {
        Intent::IdentifyUser { .. } => {
            payload = Some(json!({ "context": ctx }));
            greeting(ctx)
        }
        Intent::GetPointBalance => format!(
            "You have {} points.",
            format_thousands(ctx.total_points as i64)
        ),
        Intent::GetActiveCampaigns => {
            payload = Some(json!({ "campaigns": ctx.campaigns }));
            format!("You are enrolled in {} campaign(s).", ctx.campaigns.len())
        }
        Intent::GetActiveOffers => {
            payload = Some(json!({ "offers": ctx.offers }));
            let n = ctx.offers.len();
            format!("You have {n} active offer{}.", plural(n))
        }
        Intent::GetOfferExpiry => match ctx.offers.first() {
            None => "You have no active offers to check expiration for.".to_string(),
            Some(offer) => format!(
                "Your offer \"{}\" expires on {}.",
                offer.name,
                offer
                    .expiration_date
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .unwrap_or("an unknown time")
            ),
        },
        Intent::ShowOffers => {
            if ctx.offers.is_empty() {
                "You don't have any active offers to display.".to_string()
            } else {
                payload = Some(json!({ "offers": ctx.offers }));
                let mut out = String::from("Here are your active offers:\n\n");
                for offer in &ctx.offers {
                    let _ = writeln!(
                        out,
                        "• {} – {}",
                        offer.name,
                        offer.description.as_deref().unwrap_or_default()
                    );
                    push_window(&mut out, "⏱", &offer.start_date, &offer.expiration_date);
                }
                out.trim().to_string()
            }
        }
        Intent::ShowCampaigns => {
            if ctx.campaigns.is_empty() {
                "You don't have any active campaigns to display.".to_string()
            } else {
                payload = Some(json!({ "campaigns": ctx.campaigns }));
                let mut out = String::from("Here are your active campaigns:\n\n");
                for campaign in &ctx.campaigns {
                    let _ = writeln!(
                        out,
                        "• {} – {}",
                        campaign.name,
                        campaign.description.as_deref().unwrap_or_default()
                    );
                    push_window(&mut out, "📅", &campaign.start_date, &campaign.end_date);
                }
                out.trim().to_string()
            }
        }
    };

    ToolOutput {
        tool: None,
        summary,
        payload,
        steps: vec![intent.name().to_string()],
    }
}

/// Validity line, only when at least one bound is known
fn push_window(out: &mut String, marker: &str, start: &Option<String>, end: &Option<String>) {
    let start = start.as_deref().filter(|s| !s.is_empty());
    let end = end.as_deref().filter(|s| !s.is_empty());
    if start.is_none() && end.is_none() {
        return;
    }
    let _ = writeln!(
        out,
        "  {marker} {} → {}",
        start.unwrap_or_default(),
        end.unwrap_or("no end date")
    );
}
