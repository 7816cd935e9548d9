//! Deal lifecycle
//!
//! - [`types`]: the persisted deal record and request bodies
//! - [`manager`]: lifecycle operations over the configured stores
//! - [`handler`]: the `/api/v1/deals` HTTP surface

pub mod handler;
pub mod manager;
pub mod types;

pub use handler::{deals_router, DealsState};
pub use manager::DealManager;
pub use types::{
    ChatMessage, ChatMessageRequest, Deal, DealProfile, DealStatus, FounderInvite, InviteRequest,
    MaterialRef, MemoRef, NewMaterial, RegenerateMemoRequest, FOUNDER_PARTICIPANT,
};
