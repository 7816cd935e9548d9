//! Memo criteria and caller-supplied weightings
//!
//! Weightings arrive as a free-form `name -> number` map. [`Weightings`]
//! validates the keys against the recognised [`Criterion`] set (accepting the
//! long-form aliases used by older clients), rejects negative or non-finite
//! values, and stores the canonical form that is persisted on the deal.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A memo section the caller can weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Team,
    Market,
    Traction,
    Claims,
    Financials,
}

impl Criterion {
    /// All criteria in canonical (tie-break) order
    pub const ALL: [Criterion; 5] = [
        Criterion::Team,
        Criterion::Market,
        Criterion::Traction,
        Criterion::Claims,
        Criterion::Financials,
    ];

    /// Canonical key
    pub fn key(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Market => "market",
            Self::Traction => "traction",
            Self::Claims => "claims",
            Self::Financials => "financials",
        }
    }

    /// Section heading used in rendered memos
    pub fn title(&self) -> &'static str {
        match self {
            Self::Team => "Team Strength",
            Self::Market => "Market Opportunity",
            Self::Traction => "Traction",
            Self::Claims => "Claim Credibility",
            Self::Financials => "Financial Health",
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "team" | "team_strength" => Ok(Self::Team),
            "market" | "market_opportunity" => Ok(Self::Market),
            "traction" => Ok(Self::Traction),
            "claims" | "claim_credibility" => Ok(Self::Claims),
            "financials" | "financial_health" => Ok(Self::Financials),
            other => Err(Error::Validation(format!(
                "Unrecognised weighting '{}' (expected one of: team, market, traction, claims, financials)",
                other
            ))),
        }
    }
}

/// Validated weightings keyed by canonical criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Weightings {
    weights: BTreeMap<Criterion, f64>,
}

impl Weightings {
    /// Validate a raw caller-supplied map
    pub fn from_raw(raw: BTreeMap<String, f64>) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Validation(
                "Weightings must name at least one criterion".to_string(),
            ));
        }

        let mut weights = BTreeMap::new();
        for (key, value) in raw {
            let criterion: Criterion = key.parse()?;
            if !value.is_finite() {
                return Err(Error::Validation(format!(
                    "Weighting '{}' must be a finite number",
                    key
                )));
            }
            if value < 0.0 {
                return Err(Error::Validation(format!(
                    "Weighting '{}' must not be negative (got {})",
                    key, value
                )));
            }
            if weights.insert(criterion, value).is_some() {
                return Err(Error::Validation(format!(
                    "Weighting '{}' given more than once",
                    criterion
                )));
            }
        }

        if !weights.values().any(|w| *w > 0.0) {
            return Err(Error::Validation(
                "At least one weighting must be greater than zero".to_string(),
            ));
        }

        Ok(Self { weights })
    }

    /// Equal weight on every criterion
    pub fn uniform() -> Self {
        Self {
            weights: Criterion::ALL.iter().map(|c| (*c, 1.0)).collect(),
        }
    }

    /// Raw weight for a criterion, if present
    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.weights.get(&criterion).copied()
    }

    /// Weights scaled to sum to 1.0, zero weights dropped, ordered by
    /// descending weight with ties in canonical criterion order.
    pub fn normalized(&self) -> Vec<(Criterion, f64)> {
        // Scale by the largest weight first so the sum cannot overflow
        let max = self.weights.values().copied().fold(0.0_f64, f64::max);
        let scaled: Vec<(Criterion, f64)> = self
            .weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(c, w)| (*c, w / max))
            .collect();
        let total: f64 = scaled.iter().map(|(_, w)| w).sum();
        let mut normalized: Vec<(Criterion, f64)> =
            scaled.into_iter().map(|(c, w)| (c, w / total)).collect();
        // Stable sort keeps BTreeMap (canonical) order among equal weights
        normalized.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        normalized
    }
}

impl TryFrom<BTreeMap<String, f64>> for Weightings {
    type Error = Error;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl From<Weightings> for BTreeMap<String, f64> {
    fn from(w: Weightings) -> Self {
        w.weights
            .into_iter()
            .map(|(c, v)| (c.key().to_string(), v))
            .collect()
    }
}
