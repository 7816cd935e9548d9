//! Memo draft assembly
//!
//! - [`weights`]: recognised criteria and validated weightings
//! - [`extract`]: text and company metadata from uploads
//! - [`generator`]: the content-synthesis seam plus the heuristic writer
//! - [`gemini`]: Gemini-backed writer
//! - [`document`]: the structured memo and its Markdown form
//! - [`assembler`]: ties the above together and stores the result

pub mod assembler;
pub mod document;
pub mod extract;
pub mod gemini;
pub mod generator;
pub mod weights;

pub use assembler::MemoAssembler;
pub use document::{
    composite_risk_score, MemoDocument, MemoSection, MEMO_CONCLUSION, MEMO_CONTENT_TYPE,
    MEMO_FILENAME,
};
pub use extract::{derive_profile, MaterialText};
pub use gemini::GeminiGenerator;
pub use generator::{GeneratedMemo, HeuristicGenerator, MemoGenerator, MemoRequest};
pub use weights::{Criterion, Weightings};

use crate::config::{GeneratorConfig, GeneratorProvider};
use crate::error::Result;
use std::sync::Arc;

/// Build the configured memo generator
pub fn build_generator(config: &GeneratorConfig) -> Result<Arc<dyn MemoGenerator>> {
    let generator: Arc<dyn MemoGenerator> = match config.provider {
        GeneratorProvider::Heuristic => Arc::new(HeuristicGenerator),
        GeneratorProvider::Gemini => Arc::new(GeminiGenerator::new(config)?),
    };
    tracing::info!(generator = generator.name(), "Memo generator ready");
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generator_is_heuristic() {
        let generator = build_generator(&GeneratorConfig::default()).unwrap();
        assert_eq!(generator.name(), "heuristic");
    }

    #[test]
    fn test_gemini_without_key_fails() {
        let config = GeneratorConfig {
            provider: GeneratorProvider::Gemini,
            api_key_ref: "DEALROOM_TEST_MISSING_KEY".to_string(),
            ..GeneratorConfig::default()
        };
        assert!(build_generator(&config).is_err());
    }
}
