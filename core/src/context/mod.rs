//! Member context model and resolution
//!
//! - **Types**: `MemberContext` and the records it aggregates
//! - **Resolver**: identity lookup plus concurrent, failure-tolerant secondary fetches
//! - **Lenient**: ingest-time normalization of loosely typed upstream fields

pub mod lenient;
pub mod resolver;
pub mod types;

pub use types::{
    Campaign, IdentifierKind, MemberContext, Offer, OfferMedia, PointAccount, PointAuditLog,
    TierInfo, TimelineEvent,
};

pub use resolver::{format_thousands, greeting, ContextResolver};
