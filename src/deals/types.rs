//! Deal record and related wire types
//!
//! The persisted [`Deal`] mirrors a flat document schema
//! (`id, status, materials[], memo, weightings{}, founder_invite,
//! chat_transcript[]` plus bookkeeping fields). All fields serialize in
//! snake_case so the same JSON is used for Firestore, the file store and the
//! HTTP API.

use crate::artefacts::ArtefactRef;
use crate::memo::Weightings;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deal processing status. Declaration order is the lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Created,
    MemoGenerated,
    Invited,
    ChatActive,
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::MemoGenerated => write!(f, "memo_generated"),
            Self::Invited => write!(f, "invited"),
            Self::ChatActive => write!(f, "chat_active"),
        }
    }
}

impl std::str::FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "memo_generated" => Ok(Self::MemoGenerated),
            "invited" => Ok(Self::Invited),
            "chat_active" => Ok(Self::ChatActive),
            other => Err(format!("unknown deal status: {}", other)),
        }
    }
}

/// Reference to an uploaded original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRef {
    pub artefact: ArtefactRef,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Reference to the current memo document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoRef {
    pub artefact: ArtefactRef,
    /// 1 for the first memo, +1 per regeneration
    pub version: u32,
    pub generated_at: DateTime<Utc>,
}

/// Invite issued to a founder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FounderInvite {
    pub token: String,
    pub invite_url: String,
    #[serde(default)]
    pub founder_email: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used: bool,
}

impl FounderInvite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// One message in the founder conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub participant: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Message from the founder side, stamped now
    pub fn founder(message: impl Into<String>) -> Self {
        Self {
            participant: FOUNDER_PARTICIPANT.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Participant name used for founder-side messages
pub const FOUNDER_PARTICIPANT: &str = "founder";

/// Company metadata guessed from the uploaded materials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealProfile {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub founders: Vec<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

/// A startup pitch submission and its processing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub status: DealStatus,
    pub materials: Vec<MaterialRef>,
    #[serde(default)]
    pub memo: Option<MemoRef>,
    #[serde(default)]
    pub weightings: Option<Weightings>,
    #[serde(default)]
    pub founder_invite: Option<FounderInvite>,
    #[serde(default)]
    pub chat_transcript: Vec<ChatMessage>,
    #[serde(default)]
    pub profile: DealProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by every committed mutation
    #[serde(default)]
    pub revision: u64,
}

impl Deal {
    /// Fresh deal in the `created` state
    pub fn new(id: impl Into<String>, materials: Vec<MaterialRef>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: DealStatus::Created,
            materials,
            memo: None,
            weightings: None,
            founder_invite: None,
            chat_transcript: Vec::new(),
            profile: DealProfile::default(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Move the status forward to `target`; never moves it back
    pub fn advance(&mut self, target: DealStatus) {
        if target > self.status {
            self.status = target;
        }
    }

    /// Display name for memos and logs
    pub fn display_name(&self) -> String {
        self.profile
            .company_name
            .clone()
            .unwrap_or_else(|| format!("Deal {}", self.id))
    }
}

/// An upload waiting to be stored
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl NewMaterial {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Request body for memo regeneration
#[derive(Debug, Default, Deserialize)]
pub struct RegenerateMemoRequest {
    #[serde(default)]
    pub weightings: Option<BTreeMap<String, f64>>,
}

/// Request body for founder invites
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub founder_email: Option<String>,
    #[serde(default)]
    pub expires_in_minutes: Option<i64>,
}

/// Request body for appending a chat message
#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    #[serde(default)]
    pub participant: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<ChatMessageRequest> for ChatMessage {
    fn from(req: ChatMessageRequest) -> Self {
        Self {
            participant: req
                .participant
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| FOUNDER_PARTICIPANT.to_string()),
            message: req.message,
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
