use async_trait::async_trait;
use serde::Serialize;

use super::composite::ScoreRatio;
use super::domain::{
    AiEvaluation, Candidate, CandidateFilter, CandidateId, CandidatePatch, CriteriaTemplate,
    ManualEvaluation, NewCandidate, Stage, UpsertOutcome,
};

/// Storage abstraction for candidate records and their evaluation history.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get_candidate(&self, id: &CandidateId) -> Result<Candidate, StoreError>;
    async fn list_candidates(&self, filter: CandidateFilter) -> Result<Vec<Candidate>, StoreError>;
    async fn create_candidate(&self, draft: NewCandidate) -> Result<Candidate, StoreError>;
    async fn update_candidate(
        &self,
        id: &CandidateId,
        patch: CandidatePatch,
    ) -> Result<Candidate, StoreError>;
    async fn delete_candidate(&self, id: &CandidateId) -> Result<(), StoreError>;
    /// Sole writer of a candidate's manual evaluations, keyed by criteria filename.
    async fn upsert_manual_evaluation(
        &self,
        id: &CandidateId,
        evaluation: ManualEvaluation,
    ) -> Result<UpsertOutcome, StoreError>;
    /// Stores the evaluation; pending candidates move into screening.
    async fn record_ai_evaluation(
        &self,
        id: &CandidateId,
        evaluation: AiEvaluation,
    ) -> Result<Candidate, StoreError>;
    /// Replaces the stored interview questions and moves the candidate into interview.
    async fn record_interview_questions(
        &self,
        id: &CandidateId,
        questions: Vec<String>,
    ) -> Result<Candidate, StoreError>;
}

/// Ordered hiring stages and their governing templates.
#[async_trait]
pub trait StageRegistry: Send + Sync {
    /// Stages ascending by `order`.
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError>;
    async fn create_stage(&self, stage: Stage) -> Result<Stage, StoreError>;
}

/// Catalog of uploaded criteria documents.
#[async_trait]
pub trait CriteriaCatalog: Send + Sync {
    async fn list_criteria_names(&self) -> Result<Vec<String>, CatalogError>;
    async fn get_criteria_template(&self, name: &str) -> Result<CriteriaTemplate, CatalogError>;
    async fn store_criteria(&self, name: &str, contents: &[u8]) -> Result<String, CatalogError>;
    async fn delete_criteria(&self, name: &str) -> Result<(), CatalogError>;
}

/// AI-assisted scorer producing skill and mindset dimensions.
#[async_trait]
pub trait AiEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        candidate: &Candidate,
        ratio: ScoreRatio,
    ) -> Result<AiEvaluation, EvaluatorError>;
}

/// Drafts first-interview questions from a candidate's profile and AI evaluation.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_questions(
        &self,
        candidate: &Candidate,
        evaluation: &AiEvaluation,
        count: usize,
    ) -> Result<Vec<String>, EvaluatorError>;
}

/// Error enumeration for candidate and stage storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error enumeration for criteria catalog failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CatalogError {
    #[error("criteria file '{0}' not found")]
    NotFound(String),
    #[error("criteria file '{name}' could not be parsed: {reason}")]
    Parse { name: String, reason: String },
    #[error("criteria file name '{0}' is not allowed")]
    InvalidName(String),
    #[error("criteria storage unavailable: {0}")]
    Unavailable(String),
}

/// Evaluator failure. `Unavailable` can be retried; `Rejected` cannot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluatorError {
    #[error("evaluator rejected candidate: {0}")]
    Rejected(String),
    #[error("evaluator unavailable: {0}")]
    Unavailable(String),
}
