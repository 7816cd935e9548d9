//! Dealroom - deal intake, memo drafting and founder outreach backend
//!
//! Dealroom accepts startup pitch materials, drafts a weighted investment
//! memo from them, and hands founders an invite into a follow-up
//! conversation. Each submission is a [`deals::Deal`] whose status moves
//! forward through `created -> memo_generated -> invited -> chat_active`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      HTTP API (axum)                          │
//! │   /health            /api/v1/deals/...                        │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │                        DealManager                            │
//! │  create · regenerate memo · invite · chat · delete            │
//! └───────┬──────────────────────┬──────────────────────┬────────┘
//!         │                      │                      │
//! ┌───────▼───────┐     ┌────────▼────────┐    ┌────────▼───────┐
//! │   DealStore   │     │  ArtefactStore  │    │ MemoAssembler  │
//! │ memory · file │     │ memory · file   │    │  + generator   │
//! │   Firestore   │     │ Cloud Storage   │    │heuristic·Gemini│
//! └───────────────┘     └─────────────────┘    └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`deals`]: deal record, lifecycle manager and HTTP handlers
//! - [`memo`]: weightings, text extraction and memo generation
//! - [`storage`]: deal record stores
//! - [`artefacts`]: blob stores for uploads and memos
//! - [`gcp`]: Google Cloud credentials and API error decoding
//! - [`api`]: router assembly and the error envelope
//! - [`server`]: backend wiring and the serve loop
//! - [`config`]: configuration management

pub mod api;
pub mod artefacts;
pub mod config;
pub mod deals;
pub mod error;
pub mod gcp;
pub mod memo;
pub mod server;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DealroomConfig;
pub use error::{Error, Result};
