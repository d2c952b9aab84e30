//! Common types and traits shared across the four-diagnosis crates.
//!
//! This crate provides the data model every stage of the pipeline speaks:
//! modality payloads in, normalized features through the middle, and the
//! assembled [`CoordinationResult`] out.

pub mod error;
pub mod feature;
pub mod request;
pub mod result;
pub mod syndrome;
pub mod traits;

pub use error::{Result, SizhenError};
pub use feature::{
    fuse_features, now_secs, sanitize_confidence, DiagnosisResult, DiagnosisType, Feature,
    FeatureCategory,
};
pub use request::{
    CoordinationRequest, ImageType, InquiryPayload, ListenPayload, LookPayload, ModalityPayload,
    PalpationPayload,
};
pub use result::{CoordinationResult, CoordinationStatus, NO_SERVICES_SUMMARY};
pub use syndrome::{ConstitutionScore, Evidence, Recommendation, RecommendationType, SyndromeCandidate};
pub use traits::{DiagnosticService, RawFeature, ResultRepository, ServiceRequest, ServiceResponse};
