//! Memo content generation
//!
//! [`MemoGenerator`] is the opaque content-synthesis collaborator. It receives
//! the deal context and the normalized weights and returns a summary plus one
//! section body per criterion. The assembler validates the output; generators
//! never need to fill gaps themselves.

use super::extract::{combined_text, truncate_chars, MaterialText};
use super::weights::Criterion;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

const SUMMARY_CHARS: usize = 300;

/// Everything a generator gets to see
#[derive(Debug, Clone)]
pub struct MemoRequest {
    pub deal_id: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub founders: Vec<String>,
    pub materials: Vec<MaterialText>,
    /// Normalized weights, highest first
    pub weights: Vec<(Criterion, f64)>,
}

/// Raw generator output: summary plus section bodies keyed by criterion name
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeneratedMemo {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

/// Produces memo content
#[async_trait]
pub trait MemoGenerator: Send + Sync {
    async fn generate(&self, request: &MemoRequest) -> Result<GeneratedMemo>;

    /// Generator name recorded on the memo
    fn name(&self) -> &str;
}

/// Deterministic placeholder writer used when no model is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicGenerator;

impl HeuristicGenerator {
    fn section(criterion: Criterion, request: &MemoRequest) -> String {
        let sector = request.sector.as_deref().unwrap_or("General");
        match criterion {
            Criterion::Team => {
                if request.founders.is_empty() {
                    "Founder information pending. Professional backgrounds to be collected in the founder conversation.".to_string()
                } else {
                    format!(
                        "Founders: {}. Education and previous ventures not provided; professional backgrounds pending founder interview.",
                        request.founders.join(", ")
                    )
                }
            }
            Criterion::Market => format!(
                "Sector: {}. Total addressable and serviceable obtainable market pending validation; sizing requires analyst input.",
                sector
            ),
            Criterion::Traction => {
                "Growth and revenue traction claimed in the materials awaits data from the founder conversation.".to_string()
            }
            Criterion::Claims => {
                "Key growth claims extracted from the materials are pending validation against supporting datasets.".to_string()
            }
            Criterion::Financials => {
                "ARR and MRR unavailable. Funding ask, stated runway and implied net burn pending; projections to be forecasted.".to_string()
            }
        }
    }
}

#[async_trait]
impl MemoGenerator for HeuristicGenerator {
    async fn generate(&self, request: &MemoRequest) -> Result<GeneratedMemo> {
        let text = combined_text(&request.materials);
        let summary = if text.is_empty() {
            format!(
                "{} submitted {} file(s) without extractable text. Automatic draft; requires investment committee review.",
                request.company_name,
                request.materials.len()
            )
        } else {
            let mut summary = truncate_chars(&text, SUMMARY_CHARS);
            if text.chars().count() > SUMMARY_CHARS {
                summary.push_str("...");
            }
            summary
        };

        let sections = request
            .weights
            .iter()
            .map(|(criterion, _)| (criterion.key().to_string(), Self::section(*criterion, request)))
            .collect();

        Ok(GeneratedMemo { summary, sections })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
