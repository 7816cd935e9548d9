//! Deal lifecycle manager
//!
//! Owns every state transition of a [`Deal`]: creation from uploads, memo
//! regeneration, founder invites and chat appends. All mutations of an
//! existing deal go through [`DealStore::update`], so they are atomic per
//! deal on every backend and the status only ever moves forward.

use super::types::*;
use crate::artefacts::{Artefact, ArtefactKind, ArtefactRef, ArtefactStore};
use crate::config::InviteConfig;
use crate::error::{Error, Result};
use crate::memo::{derive_profile, extract, MaterialText, MemoAssembler, MemoGenerator, Weightings};
use crate::storage::DealStore;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use std::sync::{Arc, Mutex};

/// Random bytes in an invite token
const INVITE_TOKEN_BYTES: usize = 32;

/// Coordinates deal records, artefacts and memo assembly
pub struct DealManager {
    deals: Arc<dyn DealStore>,
    artefacts: Arc<dyn ArtefactStore>,
    assembler: MemoAssembler,
    invites: InviteConfig,
}

impl DealManager {
    pub fn new(
        deals: Arc<dyn DealStore>,
        artefacts: Arc<dyn ArtefactStore>,
        generator: Arc<dyn MemoGenerator>,
        invites: InviteConfig,
    ) -> Self {
        let assembler = MemoAssembler::new(generator, artefacts.clone());
        Self {
            deals,
            artefacts,
            assembler,
            invites,
        }
    }

    /// Backend names, for diagnostics
    pub fn backends(&self) -> (String, String, String) {
        (
            self.deals.name().to_string(),
            self.artefacts.name().to_string(),
            self.assembler.generator_name().to_string(),
        )
    }

    /// Create a deal from uploaded materials
    pub async fn create_deal(
        &self,
        materials: Vec<NewMaterial>,
        weightings: Option<Weightings>,
    ) -> Result<Deal> {
        if materials.is_empty() {
            return Err(Error::Validation(
                "At least one material file is required".to_string(),
            ));
        }
        if let Some(empty) = materials.iter().find(|m| m.bytes.is_empty()) {
            return Err(Error::Validation(format!(
                "Material '{}' is empty",
                empty.filename
            )));
        }

        let id = format!("deal-{}", uuid::Uuid::new_v4().simple());

        match self.store_new_deal(&id, materials, weightings).await {
            Ok(deal) => {
                tracing::info!(
                    deal_id = %deal.id,
                    materials = deal.materials.len(),
                    company = deal.profile.company_name.as_deref().unwrap_or("-"),
                    "Deal created"
                );
                Ok(deal)
            }
            Err(e) => {
                if let Err(cleanup) = self.artefacts.delete_deal(&id).await {
                    tracing::warn!(deal_id = %id, "Failed to clean up artefacts: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn store_new_deal(
        &self,
        id: &str,
        materials: Vec<NewMaterial>,
        weightings: Option<Weightings>,
    ) -> Result<Deal> {
        let mut refs = Vec::with_capacity(materials.len());
        let mut texts = Vec::with_capacity(materials.len());
        for material in materials {
            texts.push(MaterialText::extract(
                &material.filename,
                &material.content_type,
                &material.bytes,
            ));
            let meta = self
                .artefacts
                .put(
                    id,
                    ArtefactKind::OriginalUpload,
                    &material.filename,
                    &material.content_type,
                    material.bytes,
                )
                .await?;
            refs.push(MaterialRef {
                artefact: meta.reference,
                filename: material.filename,
                content_type: meta.content_type,
                size: meta.size,
            });
        }

        let mut deal = Deal::new(id, refs);
        deal.profile = derive_profile(&extract::combined_text(&texts));
        deal.weightings = weightings;

        self.deals.insert(&deal).await?;
        Ok(deal)
    }

    /// Generate a new memo, replacing the current one
    pub async fn regenerate_memo(&self, id: &str, weightings: Option<Weightings>) -> Result<Deal> {
        let deal = self.deals.get(id).await?;
        let effective = weightings
            .or_else(|| deal.weightings.clone())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "No weightings supplied and none stored for deal {}",
                    id
                ))
            })?;

        let materials = self.load_material_texts(&deal).await?;
        let document = self.assembler.assemble(&deal, materials, &effective).await?;
        let meta = self.assembler.publish(&document).await?;

        let replaced: Mutex<Option<ArtefactRef>> = Mutex::new(None);
        let committed = self
            .deals
            .update(id, &|d: &mut Deal| {
                let previous = d.memo.take();
                let version = previous.as_ref().map(|m| m.version + 1).unwrap_or(1);
                if let Ok(mut slot) = replaced.lock() {
                    *slot = previous.map(|m| m.artefact);
                }
                d.memo = Some(MemoRef {
                    artefact: meta.reference.clone(),
                    version,
                    generated_at: document.generated_at,
                });
                d.weightings = Some(effective.clone());
                d.advance(DealStatus::MemoGenerated);
                Ok(())
            })
            .await;

        let deal = match committed {
            Ok(deal) => deal,
            Err(e) => {
                if let Err(cleanup) = self.artefacts.delete(&meta.reference).await {
                    tracing::warn!(artefact = %meta.reference, "Failed to remove orphaned memo: {}", cleanup);
                }
                return Err(e);
            }
        };

        if let Some(old) = replaced.into_inner().ok().flatten() {
            if let Err(e) = self.artefacts.delete(&old).await {
                tracing::warn!(artefact = %old, "Failed to remove superseded memo: {}", e);
            }
        }

        tracing::info!(
            deal_id = %deal.id,
            version = deal.memo.as_ref().map(|m| m.version).unwrap_or_default(),
            generator = %document.generator,
            "Memo generated"
        );
        Ok(deal)
    }

    async fn load_material_texts(&self, deal: &Deal) -> Result<Vec<MaterialText>> {
        let loads = deal.materials.iter().map(|material| async move {
            let artefact = self.artefacts.get(&material.artefact).await?;
            Ok::<_, Error>(MaterialText::extract(
                &material.filename,
                &material.content_type,
                &artefact.bytes,
            ))
        });
        futures::future::try_join_all(loads).await
    }

    /// Issue (or re-issue) the founder invite
    pub async fn issue_founder_invite(
        &self,
        id: &str,
        request: InviteRequest,
    ) -> Result<FounderInvite> {
        // An unknown deal wins over a bad request body
        self.deals.get(id).await?;

        let ttl = request
            .expires_in_minutes
            .unwrap_or(self.invites.default_ttl_minutes);
        if ttl < self.invites.min_ttl_minutes || ttl > self.invites.max_ttl_minutes {
            return Err(Error::Validation(format!(
                "expires_in_minutes must be between {} and {} (got {})",
                self.invites.min_ttl_minutes, self.invites.max_ttl_minutes, ttl
            )));
        }

        let email = request
            .founder_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(Error::Validation(format!(
                    "'{}' is not a valid email address",
                    email
                )));
            }
        }

        let now = Utc::now();
        let token = new_invite_token();
        let fresh = FounderInvite {
            invite_url: format!("{}/{}", self.invites.base_url.trim_end_matches('/'), token),
            token,
            founder_email: email,
            issued_at: now,
            expires_at: now + Duration::minutes(ttl),
            used: false,
        };

        let deal = self
            .deals
            .update(id, &|d: &mut Deal| {
                let reusable = d.founder_invite.as_ref().is_some_and(|current| {
                    current.founder_email == fresh.founder_email
                        && !current.used
                        && !current.is_expired(now)
                });
                if !reusable {
                    d.founder_invite = Some(fresh.clone());
                }
                d.advance(DealStatus::Invited);
                Ok(())
            })
            .await?;

        let invite = deal
            .founder_invite
            .ok_or_else(|| Error::Internal(format!("Deal {} lost its invite", id)))?;
        tracing::info!(deal_id = %id, expires_at = %invite.expires_at, "Founder invite issued");
        Ok(invite)
    }

    /// Append one message to the founder conversation
    pub async fn append_founder_chat(&self, id: &str, message: ChatMessage) -> Result<Deal> {
        if message.message.trim().is_empty() {
            return Err(Error::Validation("Chat message must not be empty".to_string()));
        }

        let deal = self
            .deals
            .update(id, &|d: &mut Deal| {
                if message.participant == FOUNDER_PARTICIPANT {
                    if let Some(invite) = d.founder_invite.as_mut() {
                        invite.used = true;
                    }
                }
                d.chat_transcript.push(message.clone());
                d.advance(DealStatus::ChatActive);
                Ok(())
            })
            .await?;

        tracing::debug!(deal_id = %id, messages = deal.chat_transcript.len(), "Chat message appended");
        Ok(deal)
    }

    pub async fn get_deal(&self, id: &str) -> Result<Deal> {
        self.deals.get(id).await
    }

    pub async fn list_deals(&self) -> Result<Vec<Deal>> {
        self.deals.list().await
    }

    /// Delete a deal and every artefact it owns
    pub async fn delete_deal(&self, id: &str) -> Result<()> {
        self.deals.delete(id).await?;
        let removed = self.artefacts.delete_deal(id).await?;
        tracing::info!(deal_id = %id, artefacts = removed, "Deal deleted");
        Ok(())
    }

    /// Current memo document
    pub async fn download_memo(&self, id: &str) -> Result<Artefact> {
        let deal = self.deals.get(id).await?;
        let memo = deal
            .memo
            .ok_or_else(|| Error::NotFound(format!("Deal {} has no memo yet", id)))?;
        self.artefacts.get(&memo.artefact).await
    }

    /// Original upload at `index` (upload order)
    pub async fn download_material(&self, id: &str, index: usize) -> Result<(MaterialRef, Artefact)> {
        let deal = self.deals.get(id).await?;
        let material = deal.materials.into_iter().nth(index).ok_or_else(|| {
            Error::NotFound(format!("Deal {} has no material #{}", id, index))
        })?;
        let artefact = self.artefacts.get(&material.artefact).await?;
        Ok((material, artefact))
    }
}

fn new_invite_token() -> String {
    let mut bytes = [0u8; INVITE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefacts::{FsArtefactStore, MemoryArtefactStore};
    use crate::memo::HeuristicGenerator;
    use crate::storage::{FileDealStore, MemoryDealStore};
    use crate::testing::{MockFirestore, MockGcs};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Keeps temp dirs and mock servers alive for the test
    #[allow(dead_code)]
    enum Guard {
        None,
        Dir(TempDir),
        Mocks(MockFirestore, MockGcs),
    }

    fn memory_manager() -> DealManager {
        DealManager::new(
            Arc::new(MemoryDealStore::new()),
            Arc::new(MemoryArtefactStore::new()),
            Arc::new(HeuristicGenerator),
            InviteConfig::default(),
        )
    }

    async fn all_managers() -> Vec<(&'static str, DealManager, Guard)> {
        let dir = TempDir::new().unwrap();
        let file = DealManager::new(
            Arc::new(FileDealStore::new(dir.path().join("deals")).await.unwrap()),
            Arc::new(FsArtefactStore::new(dir.path().join("artefacts")).await.unwrap()),
            Arc::new(HeuristicGenerator),
            InviteConfig::default(),
        );

        let firestore = MockFirestore::start().await;
        let gcs = MockGcs::start().await;
        let managed = DealManager::new(
            Arc::new(firestore.store()),
            Arc::new(crate::artefacts::GcsArtefactStore::new(
                &gcs.endpoint(),
                "decks".to_string(),
                Arc::new(crate::gcp::StaticTokenSource::emulator()),
            )),
            Arc::new(HeuristicGenerator),
            InviteConfig::default(),
        );

        vec![
            ("memory", memory_manager(), Guard::None),
            ("file", file, Guard::Dir(dir)),
            ("managed", managed, Guard::Mocks(firestore, gcs)),
        ]
    }

    fn pitch() -> NewMaterial {
        NewMaterial::new(
            "pitch.pdf",
            "application/pdf",
            "Acme Robotics\nWarehouse robots with AI\nFounders: Jane Doe, John Roe\n".as_bytes().to_vec(),
        )
    }

    fn weights(pairs: &[(&str, f64)]) -> Weightings {
        Weightings::from_raw(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        )
        .unwrap()
    }

    async fn worked_example(manager: &DealManager) {
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();
        assert_eq!(deal.status, DealStatus::Created);
        assert_eq!(deal.materials.len(), 1);
        assert_eq!(deal.profile.company_name.as_deref(), Some("Acme Robotics"));

        let deal = manager
            .regenerate_memo(&deal.id, Some(weights(&[("team", 0.5), ("market", 0.5)])))
            .await
            .unwrap();
        assert_eq!(deal.status, DealStatus::MemoGenerated);
        let memo = manager.download_memo(&deal.id).await.unwrap();
        assert!(String::from_utf8_lossy(&memo.bytes).contains("Team Strength"));

        let invite = manager
            .issue_founder_invite(&deal.id, InviteRequest::default())
            .await
            .unwrap();
        assert!(!invite.token.is_empty());
        assert_eq!(manager.get_deal(&deal.id).await.unwrap().status, DealStatus::Invited);

        let deal = manager
            .append_founder_chat(&deal.id, ChatMessage::founder("Hello"))
            .await
            .unwrap();
        let transcript: Vec<&str> = deal.chat_transcript.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(transcript, vec!["Hello"]);
        assert_eq!(deal.status, DealStatus::ChatActive);
    }

    #[tokio::test]
    async fn test_worked_example_on_every_backend() {
        for (name, manager, _guard) in all_managers().await {
            let (store, _, _) = manager.backends();
            assert!(!store.is_empty(), "{}", name);
            worked_example(&manager).await;
        }
    }

    #[tokio::test]
    async fn test_backends_report_same_errors() {
        for (name, manager, _guard) in all_managers().await {
            assert!(
                matches!(manager.get_deal("deal-missing").await, Err(Error::NotFound(_))),
                "{}",
                name
            );
            assert!(
                matches!(manager.delete_deal("deal-missing").await, Err(Error::NotFound(_))),
                "{}",
                name
            );
            assert!(
                matches!(
                    manager.regenerate_memo("deal-missing", None).await,
                    Err(Error::NotFound(_))
                ),
                "{}",
                name
            );

            let deal = manager.create_deal(vec![pitch()], None).await.unwrap();
            assert!(
                matches!(
                    manager.regenerate_memo(&deal.id, None).await,
                    Err(Error::Validation(_))
                ),
                "{}",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_create_requires_materials() {
        let manager = memory_manager();
        assert!(matches!(
            manager.create_deal(vec![], None).await,
            Err(Error::Validation(_))
        ));
        let empty = NewMaterial::new("empty.pdf", "application/pdf", Vec::new());
        assert!(matches!(
            manager.create_deal(vec![empty], None).await,
            Err(Error::Validation(_))
        ));
        assert!(manager.list_deals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_never_reused() {
        let manager = memory_manager();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let deal = manager.create_deal(vec![pitch()], None).await.unwrap();
            assert!(deal.id.starts_with("deal-"));
            assert!(ids.insert(deal.id));
        }
        assert_eq!(manager.list_deals().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_regeneration_replaces_memo() {
        let artefacts = Arc::new(MemoryArtefactStore::new());
        let manager = DealManager::new(
            Arc::new(MemoryDealStore::new()),
            artefacts.clone(),
            Arc::new(HeuristicGenerator),
            InviteConfig::default(),
        );
        let deal = manager
            .create_deal(vec![pitch()], Some(weights(&[("traction", 1.0)])))
            .await
            .unwrap();

        let first = manager.regenerate_memo(&deal.id, None).await.unwrap();
        let second = manager
            .regenerate_memo(&deal.id, Some(weights(&[("financials", 2.0), ("claims", 1.0)])))
            .await
            .unwrap();

        let first_memo = first.memo.unwrap();
        let second_memo = second.memo.clone().unwrap();
        assert_ne!(first_memo.artefact, second_memo.artefact);
        assert_eq!(first_memo.version, 1);
        assert_eq!(second_memo.version, 2);

        // Superseded memo is removed; one upload plus the current memo remain
        assert!(matches!(
            artefacts.get(&first_memo.artefact).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(artefacts.len().await, 2);

        // New weightings become the stored default
        let third = manager.regenerate_memo(&deal.id, None).await.unwrap();
        assert_eq!(third.weightings, second.weightings);
        assert_eq!(third.memo.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_status_never_moves_back() {
        let manager = memory_manager();
        let deal = manager
            .create_deal(vec![pitch()], Some(Weightings::uniform()))
            .await
            .unwrap();

        manager
            .append_founder_chat(&deal.id, ChatMessage::founder("Early hello"))
            .await
            .unwrap();
        manager
            .issue_founder_invite(&deal.id, InviteRequest::default())
            .await
            .unwrap();
        let deal = manager.regenerate_memo(&deal.id, None).await.unwrap();

        assert_eq!(deal.status, DealStatus::ChatActive);
        assert!(deal.memo.is_some());
    }

    #[tokio::test]
    async fn test_chat_is_append_only() {
        let manager = memory_manager();
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();

        let mut previous: Vec<ChatMessage> = Vec::new();
        for i in 0..5 {
            let deal = manager
                .append_founder_chat(&deal.id, ChatMessage::founder(format!("message {}", i)))
                .await
                .unwrap();
            assert_eq!(deal.chat_transcript.len(), previous.len() + 1);
            assert_eq!(&deal.chat_transcript[..previous.len()], previous.as_slice());
            previous = deal.chat_transcript;
        }
    }

    #[tokio::test]
    async fn test_blank_chat_rejected() {
        let manager = memory_manager();
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();
        let result = manager
            .append_founder_chat(&deal.id, ChatMessage::founder("   "))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(manager.get_deal(&deal.id).await.unwrap().chat_transcript.is_empty());
    }

    #[tokio::test]
    async fn test_invite_reissue_rules() {
        let manager = memory_manager();
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();
        let request = |email: &str| InviteRequest {
            founder_email: Some(email.to_string()),
            expires_in_minutes: Some(30),
        };

        let first = manager
            .issue_founder_invite(&deal.id, request("jane@acme.example"))
            .await
            .unwrap();
        assert!(first
            .invite_url
            .starts_with("https://founder-chat.example.com/invite/"));
        assert!(first.invite_url.ends_with(&first.token));
        assert_eq!(URL_SAFE_NO_PAD.decode(&first.token).unwrap().len(), 32);

        // Same founder, still valid: same invite
        let again = manager
            .issue_founder_invite(&deal.id, request("jane@acme.example"))
            .await
            .unwrap();
        assert_eq!(again, first);

        // Different founder: new token
        let other = manager
            .issue_founder_invite(&deal.id, request("john@acme.example"))
            .await
            .unwrap();
        assert_ne!(other.token, first.token);

        // Once the founder has chatted the invite is used; re-issue gives a fresh one
        manager
            .append_founder_chat(&deal.id, ChatMessage::founder("Hi"))
            .await
            .unwrap();
        let stored = manager.get_deal(&deal.id).await.unwrap();
        assert!(stored.founder_invite.as_ref().unwrap().used);
        let fresh = manager
            .issue_founder_invite(&deal.id, request("john@acme.example"))
            .await
            .unwrap();
        assert_ne!(fresh.token, other.token);
        assert!(!fresh.used);
    }

    #[tokio::test]
    async fn test_invite_on_unknown_deal_is_not_found_before_validation() {
        let manager = memory_manager();
        for request in [
            InviteRequest {
                founder_email: None,
                expires_in_minutes: Some(0),
            },
            InviteRequest {
                founder_email: Some("not-an-email".to_string()),
                expires_in_minutes: None,
            },
        ] {
            let result = manager.issue_founder_invite("missing", request).await;
            assert!(matches!(result, Err(Error::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_invite_validation() {
        let manager = memory_manager();
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();

        for minutes in [0, 4, 1441] {
            let result = manager
                .issue_founder_invite(
                    &deal.id,
                    InviteRequest {
                        founder_email: None,
                        expires_in_minutes: Some(minutes),
                    },
                )
                .await;
            assert!(matches!(result, Err(Error::Validation(_))), "{}", minutes);
        }

        let result = manager
            .issue_founder_invite(
                &deal.id,
                InviteRequest {
                    founder_email: Some("not-an-email".to_string()),
                    expires_in_minutes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let invite = manager
            .issue_founder_invite(&deal.id, InviteRequest::default())
            .await
            .unwrap();
        assert_eq!((invite.expires_at - invite.issued_at).num_minutes(), 60);
        assert_eq!(manager.get_deal(&deal.id).await.unwrap().status, DealStatus::Invited);
    }

    #[tokio::test]
    async fn test_unknown_deal_for_every_operation() {
        let manager = memory_manager();
        let id = "deal-unknown";
        assert!(matches!(
            manager.issue_founder_invite(id, InviteRequest::default()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.append_founder_chat(id, ChatMessage::founder("x")).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(manager.download_memo(id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            manager.download_material(id, 0).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_downloads() {
        let manager = memory_manager();
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();

        let (material, artefact) = manager.download_material(&deal.id, 0).await.unwrap();
        assert_eq!(material.filename, "pitch.pdf");
        assert!(artefact.bytes.starts_with(b"Acme Robotics"));
        assert!(matches!(
            manager.download_material(&deal.id, 1).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.download_memo(&deal.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_artefacts() {
        let artefacts = Arc::new(MemoryArtefactStore::new());
        let manager = DealManager::new(
            Arc::new(MemoryDealStore::new()),
            artefacts.clone(),
            Arc::new(HeuristicGenerator),
            InviteConfig::default(),
        );
        let keep = manager.create_deal(vec![pitch()], None).await.unwrap();
        let doomed = manager
            .create_deal(vec![pitch(), pitch()], Some(Weightings::uniform()))
            .await
            .unwrap();
        manager.regenerate_memo(&doomed.id, None).await.unwrap();
        assert_eq!(artefacts.len().await, 4);

        manager.delete_deal(&doomed.id).await.unwrap();
        assert_eq!(artefacts.len().await, 1);
        assert!(matches!(manager.get_deal(&doomed.id).await, Err(Error::NotFound(_))));
        assert!(manager.get_deal(&keep.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_chat_appends() {
        let manager = Arc::new(memory_manager());
        let deal = manager.create_deal(vec![pitch()], None).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let manager = manager.clone();
                let id = deal.id.clone();
                tokio::spawn(async move {
                    manager
                        .append_founder_chat(&id, ChatMessage::founder(format!("m{}", i)))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let deal = manager.get_deal(&deal.id).await.unwrap();
        assert_eq!(deal.chat_transcript.len(), 16);
        assert_eq!(deal.revision, 16);
    }
}
