//! Intent module root
//!
//! - `Intent`, the closed set of conversational requests
//! - `IntentClassifier`, the seam to whatever turns free text into an intent
//! - `LlmIntentClassifier`, the chat-model backed implementation

mod classifier;

pub use classifier::{parse_classifier_output, LlmIntentClassifier};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Conversational intent. Wire names are the snake_case tags (`identify_user`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    IdentifyUser { value: Option<String> },
    GetPointBalance,
    GetActiveCampaigns,
    GetActiveOffers,
    GetOfferExpiry,
    ShowOffers,
    ShowCampaigns,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::IdentifyUser { .. } => "identify_user",
            Intent::GetPointBalance => "get_point_balance",
            Intent::GetActiveCampaigns => "get_active_campaigns",
            Intent::GetActiveOffers => "get_active_offers",
            Intent::GetOfferExpiry => "get_offer_expiry",
            Intent::ShowOffers => "show_offers",
            Intent::ShowCampaigns => "show_campaigns",
        }
    }

    /// Build from a wire name plus the optional extracted value
    pub fn from_parts(name: &str, value: Option<String>) -> Option<Self> {
        Some(match name {
            "identify_user" => Intent::IdentifyUser {
                value: value.filter(|v| !v.trim().is_empty()),
            },
            "get_point_balance" => Intent::GetPointBalance,
            "get_active_campaigns" => Intent::GetActiveCampaigns,
            "get_active_offers" => Intent::GetActiveOffers,
            "get_offer_expiry" => Intent::GetOfferExpiry,
            "show_offers" => Intent::ShowOffers,
            "show_campaigns" => Intent::ShowCampaigns,
            _ => return None,
        })
    }
}

/// Turns a free-text message into an intent.
///
/// `Ok(None)` means the message could not be classified; transport failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<Option<Intent>>;
}
