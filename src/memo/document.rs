//! Structured memo document and its Markdown rendering

use super::weights::Criterion;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type of the persisted memo
pub const MEMO_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Filename used for the persisted memo
pub const MEMO_FILENAME: &str = "memo.md";

/// Closing note on every generated memo
pub const MEMO_CONCLUSION: &str = "Automatic draft. Requires investment committee review.";

const RISK_SCORE_INTERPRETATION: &str = "Lower is better. Derived from the memo weightings.";

/// Team + traction weight of 0.4 maps to 5.0
const RISK_SCALE: f64 = 12.5;

/// One weighted memo section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoSection {
    pub criterion: Criterion,
    pub title: String,
    /// Normalized weight in `(0, 1]`
    pub weight: f64,
    pub body: String,
}

/// A complete investment memo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoDocument {
    pub deal_id: String,
    pub title: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub founders: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Name of the generator that wrote the content
    pub generator: String,
    pub summary: String,
    /// Ordered by descending weight
    pub sections: Vec<MemoSection>,
    /// Source material filenames, in upload order
    pub materials: Vec<String>,
    /// See [`composite_risk_score`]
    pub risk_score: f64,
    pub conclusion: String,
}

impl MemoDocument {
    /// Render as Markdown
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        out.push_str(&format!("- **Company:** {}\n", self.company_name));
        if let Some(sector) = &self.sector {
            out.push_str(&format!("- **Sector:** {}\n", sector));
        }
        if !self.founders.is_empty() {
            out.push_str(&format!("- **Founders:** {}\n", self.founders.join(", ")));
        }
        out.push_str(&format!("- **Deal:** `{}`\n", self.deal_id));
        out.push_str(&format!("- **Generated:** {}\n", self.generated_at.to_rfc3339()));
        out.push_str(&format!("- **Generator:** {}\n", self.generator));
        if !self.materials.is_empty() {
            out.push_str(&format!("- **Materials:** {}\n", self.materials.join(", ")));
        }

        out.push_str(&format!("\n## Summary\n\n{}\n", self.summary.trim()));

        for section in &self.sections {
            out.push_str(&format!(
                "\n## {} (weight {:.0}%)\n\n{}\n",
                section.title,
                section.weight * 100.0,
                section.body.trim()
            ));
        }

        out.push_str(&format!(
            "\n## Risk Assessment\n\n- **Composite risk score:** {:.2}\n- {}\n",
            self.risk_score, RISK_SCORE_INTERPRETATION
        ));
        out.push_str(&format!("\n## Conclusion\n\n{}\n", self.conclusion));
        out
    }

    /// Serialized form stored in the artefact store
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.render_markdown())
    }
}

/// Composite risk score derived from the normalized weights.
///
/// Emphasis on team strength and traction raises the score; equal weights
/// across all five criteria give 5.00. Rounded to two decimals.
pub fn composite_risk_score(weights: &[(Criterion, f64)]) -> f64 {
    let emphasis: f64 = weights
        .iter()
        .filter(|(c, _)| matches!(c, Criterion::Team | Criterion::Traction))
        .map(|(_, w)| w)
        .sum();
    (emphasis * RISK_SCALE * 100.0).round() / 100.0
}
