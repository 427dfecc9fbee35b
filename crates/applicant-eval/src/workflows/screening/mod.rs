//! Applicant screening: criteria resolution per hiring stage, manual scoring sessions,
//! composite AI scores and batch evaluation.
//!
//! Collaborators (candidate store, stage registry, criteria catalog, AI evaluator, question
//! generator) are traits in [`repository`]; the coordinator and service only talk to them through
//! those seams.

pub mod batch;
pub mod catalog;
pub mod composite;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod export;
pub mod import;
pub mod repository;
pub mod resolution;
pub mod router;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use batch::{BatchDriver, BatchResult, BatchRow, RowOutcome, RowStatus};
pub use catalog::DirectoryCatalog;
pub use composite::{combine, reweigh, RatioAdjustment, RatioError, ScoreRatio};
pub use coordinator::{CommitOutcome, LoadOutcome, ReviewCoordinator};
pub use domain::{
    AiEvaluation, Candidate, CandidateFilter, CandidateId, CandidatePatch, CandidateProfile,
    CandidateStatus, CriteriaItem, CriteriaTemplate, ManualEvaluation, NewCandidate, Stage,
    UpsertOutcome,
};
pub use error::ScreeningError;
pub use export::{ExportFilter, ExportRow};
pub use import::BatchImportError;
pub use repository::{
    AiEvaluator, CandidateStore, CatalogError, CriteriaCatalog, EvaluatorError, QuestionGenerator,
    StageRegistry, StoreError,
};
pub use resolution::{resolve, CatalogSnapshot, FallbackPolicy, Resolution};
pub use router::screening_router;
pub use service::{CandidateCriteria, ScreeningService};
pub use session::{ScoringSession, SessionError, SessionSource};
