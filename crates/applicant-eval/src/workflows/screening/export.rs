use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Candidate, CandidateId, CandidateStatus};

/// Filter applied to evaluated candidates before export.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ExportFilter {
    pub status: Option<CandidateStatus>,
    pub min_score: Option<f64>,
}

/// Flattened evaluation result for spreadsheets and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: CandidateId,
    pub name: String,
    pub email: String,
    pub status: CandidateStatus,
    pub total_score: f64,
    pub skill_score: f64,
    pub mindset_score: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl ExportFilter {
    pub fn matches(&self, candidate: &Candidate) -> bool {
        let Some(evaluation) = candidate.ai_evaluation.as_ref() else {
            return false;
        };
        if self.status.is_some_and(|status| status != candidate.status) {
            return false;
        }
        self.min_score
            .map_or(true, |min| evaluation.total_score >= min)
    }
}

/// Rows for evaluated candidates passing `filter`, in input order.
pub fn export_rows<'a, I>(candidates: I, filter: &ExportFilter) -> Vec<ExportRow>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    candidates
        .into_iter()
        .filter(|candidate| filter.matches(candidate))
        .filter_map(|candidate| {
            let evaluation = candidate.ai_evaluation.as_ref()?;
            Some(ExportRow {
                id: candidate.id.clone(),
                name: candidate.name.clone(),
                email: candidate.email.clone(),
                status: candidate.status,
                total_score: evaluation.total_score,
                skill_score: evaluation.skill_score,
                mindset_score: evaluation.mindset_score,
                summary: evaluation.summary.clone(),
                created_at: candidate.created_at,
            })
        })
        .collect()
}

pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
