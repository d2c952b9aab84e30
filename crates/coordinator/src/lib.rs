//! Four-diagnosis coordination engine.
//!
//! The coordinator is the central piece that:
//! 1. Receives a consultation request carrying up to four modality payloads
//! 2. Dispatches each selected modality to its adapter, in parallel or in sequence
//! 3. Fuses the surviving results into one feature list
//! 4. Runs syndrome differentiation, constitution assessment and recommendations
//!
//! # Architecture
//!
//! ```text
//! CoordinationRequest
//!        │
//!        ▼
//! ┌──────────────────┐
//! │   Coordinator    │
//! │   (this crate)   │
//! └────────┬─────────┘
//!          │ adapters (retry + timeout)
//!    ┌─────┴─────┬───────────┬────────────┐
//!    ▼           ▼           ▼            ▼
//! [Looking] [Listening]  [Inquiry]  [Palpation]
//!          │
//!          ▼
//!   fuse → rules + LLM → merge → constitution → recommendations
//! ```

pub mod adapter;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod fixture;
pub mod metrics;
pub mod repository;

pub use adapter::{request_options, ModalityAdapter, ServiceAdapter};
pub use config::{
    AnalysisConfig, CoordinatorConfig, DispatchConfig, DispatchMode, ModalitiesConfig,
    ParallelTimeout,
};
pub use coordinator::{CoordinationState, FourDiagnosisCoordinator, ALL_FAILED_SUMMARY};
pub use dispatch::{run_parallel, run_sequential, DispatchJob};
pub use fixture::{Fixture, FixtureScript, FixtureService};
pub use metrics::{CoordinationMetrics, MetricEvent, MetricsSnapshot};
pub use repository::InMemoryResultRepository;
