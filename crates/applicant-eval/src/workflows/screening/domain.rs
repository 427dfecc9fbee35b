use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest score a reviewer can assign to a criteria item.
pub const MIN_ITEM_SCORE: u8 = 1;
/// Highest score a reviewer can assign to a criteria item.
pub const MAX_ITEM_SCORE: u8 = 5;
/// Score carried by freshly parsed, not yet reviewed criteria items.
pub const NEUTRAL_ITEM_SCORE: u8 = 3;
/// Interview questions drafted when the request does not ask for a count.
pub const DEFAULT_QUESTION_COUNT: usize = 10;
/// Upper bound on interview questions per request.
pub const MAX_QUESTION_COUNT: usize = 30;

/// Identifier wrapper for stored candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline status tracked for every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Pending,
    Screening,
    Interview,
    Passed,
    Rejected,
}

impl CandidateStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Screening => "screening",
            CandidateStatus::Interview => "interview",
            CandidateStatus::Passed => "passed",
            CandidateStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "screening" => Some(Self::Screening),
            "interview" => Some(Self::Interview),
            "passed" => Some(Self::Passed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Structured applicant data handed to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub education: Vec<String>,
    pub work_experience: Vec<String>,
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub certifications: Vec<String>,
    pub motivation: String,
    pub career_goals: String,
    pub additional_info: String,
}

/// A named step of the hiring pipeline and the template that governs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub order: u32,
    pub stage_name: String,
    pub criteria_filename: String,
}

/// One scoring dimension of a criteria template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaItem {
    pub name: String,
    pub definition: String,
    pub score: u8,
    #[serde(default)]
    pub memo: String,
}

impl CriteriaItem {
    /// Item in its default, unreviewed state.
    pub fn unscored(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            score: NEUTRAL_ITEM_SCORE,
            memo: String::new(),
        }
    }

    pub fn clamp_score(value: i32) -> u8 {
        value.clamp(i32::from(MIN_ITEM_SCORE), i32::from(MAX_ITEM_SCORE)) as u8
    }

    pub fn has_valid_score(&self) -> bool {
        (MIN_ITEM_SCORE..=MAX_ITEM_SCORE).contains(&self.score)
    }
}

/// Named, ordered set of scoring dimensions as published in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaTemplate {
    pub criteria_filename: String,
    pub items: Vec<CriteriaItem>,
}

impl CriteriaTemplate {
    /// Items reset to the neutral score with empty memos.
    pub fn default_items(&self) -> Vec<CriteriaItem> {
        self.items
            .iter()
            .map(|item| CriteriaItem::unscored(item.name.clone(), item.definition.clone()))
            .collect()
    }

    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }
}

/// Reviewer-completed instance of a criteria template for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEvaluation {
    pub criteria_filename: String,
    pub evaluation_data: Vec<CriteriaItem>,
    #[serde(default)]
    pub overall_comment: String,
}

/// Result of writing a manual evaluation into a candidate's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// AI-produced assessment along the skill and mindset dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEvaluation {
    pub skill_score: f64,
    pub mindset_score: f64,
    pub total_score: f64,
    pub skill_ratio: f64,
    pub mindset_ratio: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Candidate record as held by the candidate store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: CandidateStatus,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub profile: Option<CandidateProfile>,
    #[serde(default)]
    pub ai_evaluation: Option<AiEvaluation>,
    #[serde(default)]
    pub manual_evaluations: Vec<ManualEvaluation>,
    #[serde(default)]
    pub interview_questions: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(id: CandidateId, draft: NewCandidate, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            status: CandidateStatus::Pending,
            current_stage: None,
            profile: draft.profile,
            ai_evaluation: None,
            manual_evaluations: Vec::new(),
            interview_questions: Vec::new(),
            notes: String::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn manual_evaluation(&self, criteria_filename: &str) -> Option<&ManualEvaluation> {
        self.manual_evaluations
            .iter()
            .find(|evaluation| evaluation.criteria_filename == criteria_filename)
    }

    /// Replaces the entry for the same filename in place, or appends a new one.
    pub fn upsert_manual_evaluation(&mut self, evaluation: ManualEvaluation) -> UpsertOutcome {
        match self
            .manual_evaluations
            .iter_mut()
            .find(|existing| existing.criteria_filename == evaluation.criteria_filename)
        {
            Some(existing) => {
                *existing = evaluation;
                UpsertOutcome::Updated
            }
            None => {
                self.manual_evaluations.push(evaluation);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Drafting questions puts the candidate into the interview step.
    pub fn record_interview_questions(&mut self, questions: Vec<String>) {
        self.interview_questions = questions;
        self.status = CandidateStatus::Interview;
    }

    pub fn apply_patch(&mut self, patch: CandidatePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = Some(phone);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(stage) = patch.current_stage {
            self.current_stage = Some(stage);
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
    }
}

/// Fields accepted when registering a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile: Option<CandidateProfile>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidatePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<CandidateStatus>,
    pub current_stage: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Listing filter for candidate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateFilter {
    pub status: Option<CandidateStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }
}
