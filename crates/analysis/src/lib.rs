//! Syndrome differentiation and constitution assessment.
//!
//! Everything here runs after the modality results are collected and the
//! features fused:
//! - [`RuleMatcher`] scores the versioned [`RuleLibrary`]
//! - [`HybridAnalyzer`] asks a language model for a second opinion
//! - [`merge`] reconciles both into one ranked candidate list
//! - [`ConstitutionAssessor`] scores the body-type archetypes
//! - [`synthesize`] and [`summarize`] produce the advice and narrative

pub mod analyzer;
pub mod constitution;
pub mod hybrid;
pub mod matcher;
pub mod merge;
pub mod parser;
pub mod prompt;
pub mod recommend;
pub mod rules;
pub mod summary;

pub use analyzer::{SyndromeAnalysis, SyndromeAnalyzer};
pub use constitution::{combination_notes, tendencies, ConstitutionAssessor};
pub use hybrid::{FeatureExtractor, HybridAnalyzer};
pub use matcher::{EvidencePolicy, RuleMatcher};
pub use merge::{analysis_confidence, merge};
pub use parser::{parse_feature_lines, parse_syndromes, try_parse_syndromes};
pub use prompt::{PromptBlocks, PromptTemplate};
pub use recommend::synthesize;
pub use rules::{RuleLibrary, SyndromeRule};
pub use summary::summarize;
