//! Memo draft assembly
//!
//! Turns a deal, its extracted materials and validated weightings into a
//! [`MemoDocument`]: normalizes weights, asks the generator for content,
//! checks that every weighted section came back, and orders sections by
//! weight. [`MemoAssembler::publish`] writes the rendered document to the
//! artefact store.

use super::document::{
    composite_risk_score, MemoDocument, MemoSection, MEMO_CONCLUSION, MEMO_CONTENT_TYPE,
    MEMO_FILENAME,
};
use super::extract::MaterialText;
use super::generator::{MemoGenerator, MemoRequest};
use super::weights::{Criterion, Weightings};
use crate::artefacts::{ArtefactKind, ArtefactMeta, ArtefactStore};
use crate::deals::Deal;
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds and stores memo documents
pub struct MemoAssembler {
    generator: Arc<dyn MemoGenerator>,
    artefacts: Arc<dyn ArtefactStore>,
}

impl MemoAssembler {
    pub fn new(generator: Arc<dyn MemoGenerator>, artefacts: Arc<dyn ArtefactStore>) -> Self {
        Self {
            generator,
            artefacts,
        }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Assemble a memo for `deal` from its materials and weightings
    pub async fn assemble(
        &self,
        deal: &Deal,
        materials: Vec<MaterialText>,
        weightings: &Weightings,
    ) -> Result<MemoDocument> {
        let weights = weightings.normalized();
        let risk_score = composite_risk_score(&weights);
        let company_name = deal.display_name();
        let material_names: Vec<String> = materials.iter().map(|m| m.filename.clone()).collect();

        let request = MemoRequest {
            deal_id: deal.id.clone(),
            company_name: company_name.clone(),
            sector: deal.profile.sector.clone(),
            founders: deal.profile.founders.clone(),
            materials,
            weights: weights.clone(),
        };

        let generated = self.generator.generate(&request).await.map_err(|e| match e {
            Error::Generation(_) => e,
            other => Error::Generation(format!("{} generator failed: {}", self.generator.name(), other)),
        })?;

        if generated.summary.trim().is_empty() {
            return Err(Error::Generation(format!(
                "{} generator returned an empty summary",
                self.generator.name()
            )));
        }

        let bodies = canonical_sections(generated.sections);
        let mut sections = Vec::with_capacity(weights.len());
        for (criterion, weight) in weights {
            let body = bodies
                .get(&criterion)
                .map(|b| b.trim())
                .filter(|b| !b.is_empty())
                .ok_or_else(|| {
                    Error::Generation(format!(
                        "{} generator returned no content for the '{}' section",
                        self.generator.name(),
                        criterion
                    ))
                })?;
            sections.push(MemoSection {
                criterion,
                title: criterion.title().to_string(),
                weight,
                body: body.to_string(),
            });
        }

        Ok(MemoDocument {
            deal_id: deal.id.clone(),
            title: format!("Investment Memo: {}", company_name),
            company_name,
            sector: deal.profile.sector.clone(),
            founders: deal.profile.founders.clone(),
            generated_at: Utc::now(),
            generator: self.generator.name().to_string(),
            summary: generated.summary.trim().to_string(),
            sections,
            materials: material_names,
            risk_score,
            conclusion: MEMO_CONCLUSION.to_string(),
        })
    }

    /// Store the rendered memo as a new `memo_document` artefact
    pub async fn publish(&self, document: &MemoDocument) -> Result<ArtefactMeta> {
        self.artefacts
            .put(
                &document.deal_id,
                ArtefactKind::MemoDocument,
                MEMO_FILENAME,
                MEMO_CONTENT_TYPE,
                document.to_bytes(),
            )
            .await
    }
}

/// Map generator section keys (including aliases) onto criteria; keys that
/// name no criterion are dropped.
fn canonical_sections(raw: BTreeMap<String, String>) -> BTreeMap<Criterion, String> {
    let mut sections = BTreeMap::new();
    for (key, body) in raw {
        match key.parse::<Criterion>() {
            Ok(criterion) => {
                sections.insert(criterion, body);
            }
            Err(_) => tracing::debug!(section = %key, "Ignoring unrecognised memo section"),
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefacts::MemoryArtefactStore;
    use crate::memo::generator::{GeneratedMemo, HeuristicGenerator};
    use async_trait::async_trait;

    /// Generator returning a fixed answer
    struct Canned(std::result::Result<GeneratedMemo, String>);

    #[async_trait]
    impl MemoGenerator for Canned {
        async fn generate(&self, _request: &MemoRequest) -> Result<GeneratedMemo> {
            self.0.clone().map_err(Error::Storage)
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn make_assembler(generator: impl MemoGenerator + 'static) -> (MemoAssembler, Arc<MemoryArtefactStore>) {
        let artefacts = Arc::new(MemoryArtefactStore::new());
        (MemoAssembler::new(Arc::new(generator), artefacts.clone()), artefacts)
    }

    fn weightings(pairs: &[(&str, f64)]) -> Weightings {
        Weightings::from_raw(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()).unwrap()
    }

    fn materials() -> Vec<MaterialText> {
        vec![MaterialText::extract("pitch.pdf", "application/pdf", b"Acme\nFounders: Jane Doe")]
    }

    fn canned(summary: &str, sections: &[(&str, &str)]) -> Canned {
        Canned(Ok(GeneratedMemo {
            summary: summary.to_string(),
            sections: sections
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }))
    }

    #[tokio::test]
    async fn test_sections_ordered_by_weight() {
        let (assembler, _) = make_assembler(HeuristicGenerator);
        let deal = Deal::new("deal-1", vec![]);
        let memo = assembler
            .assemble(
                &deal,
                materials(),
                &weightings(&[("team", 1.0), ("market", 3.0), ("claims", 0.0)]),
            )
            .await
            .unwrap();

        let order: Vec<Criterion> = memo.sections.iter().map(|s| s.criterion).collect();
        assert_eq!(order, vec![Criterion::Market, Criterion::Team]);
        assert!((memo.sections[0].weight - 0.75).abs() < 1e-9);
        assert_eq!(memo.materials, vec!["pitch.pdf"]);
        assert_eq!(memo.generator, "heuristic");
    }

    #[tokio::test]
    async fn test_every_memo_carries_risk_score_and_conclusion() {
        let deal = Deal::new("deal-1", vec![]);
        let (heuristic, _) = make_assembler(HeuristicGenerator);
        let memo = heuristic
            .assemble(&deal, materials(), &weightings(&[("team", 1.0), ("market", 3.0)]))
            .await
            .unwrap();
        assert_eq!(memo.risk_score, 3.13);
        assert_eq!(memo.conclusion, MEMO_CONCLUSION);

        let (canned_gen, _) = make_assembler(canned("Summary", &[("traction", "Growing")]));
        let memo = canned_gen
            .assemble(&deal, materials(), &weightings(&[("traction", 2.0)]))
            .await
            .unwrap();
        assert_eq!(memo.risk_score, 12.5);
        assert!(memo
            .render_markdown()
            .contains("Automatic draft. Requires investment committee review."));
    }

    #[tokio::test]
    async fn test_generator_aliases_accepted() {
        let (assembler, _) = make_assembler(canned("Summary", &[("team_strength", "Good team")]));
        let memo = assembler
            .assemble(&Deal::new("deal-1", vec![]), materials(), &weightings(&[("team", 1.0)]))
            .await
            .unwrap();
        assert_eq!(memo.sections[0].body, "Good team");
    }

    #[tokio::test]
    async fn test_missing_section_is_generation_error() {
        let (assembler, _) = make_assembler(canned("Summary", &[("team", "Good team")]));
        let result = assembler
            .assemble(
                &Deal::new("deal-1", vec![]),
                materials(),
                &weightings(&[("team", 0.5), ("market", 0.5)]),
            )
            .await;
        assert!(matches!(result, Err(Error::Generation(msg)) if msg.contains("market")));
    }

    #[tokio::test]
    async fn test_blank_output_is_generation_error() {
        let (assembler, _) = make_assembler(canned("   ", &[("team", "x")]));
        let result = assembler
            .assemble(&Deal::new("deal-1", vec![]), materials(), &weightings(&[("team", 1.0)]))
            .await;
        assert!(matches!(result, Err(Error::Generation(_))));

        let (assembler, _) = make_assembler(canned("Summary", &[("team", "  ")]));
        let result = assembler
            .assemble(&Deal::new("deal-1", vec![]), materials(), &weightings(&[("team", 1.0)]))
            .await;
        assert!(matches!(result, Err(Error::Generation(_))));
    }

    #[tokio::test]
    async fn test_generator_failure_is_generation_error() {
        let (assembler, _) = make_assembler(Canned(Err("upstream down".to_string())));
        let result = assembler
            .assemble(&Deal::new("deal-1", vec![]), materials(), &weightings(&[("team", 1.0)]))
            .await;
        assert!(matches!(result, Err(Error::Generation(msg)) if msg.contains("upstream down")));
    }

    #[tokio::test]
    async fn test_publish_writes_markdown_artefact() {
        let (assembler, artefacts) = make_assembler(HeuristicGenerator);
        let memo = assembler
            .assemble(&Deal::new("deal-1", vec![]), materials(), &weightings(&[("traction", 1.0)]))
            .await
            .unwrap();
        let meta = assembler.publish(&memo).await.unwrap();

        assert_eq!(meta.reference.kind(), ArtefactKind::MemoDocument);
        let stored = artefacts.get(&meta.reference).await.unwrap();
        let text = String::from_utf8(stored.bytes.to_vec()).unwrap();
        assert!(text.contains("## Traction (weight 100%)"));
    }
}
