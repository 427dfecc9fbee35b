use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::batch::BatchRow;
use super::domain::CandidateProfile;

#[derive(Debug)]
pub enum BatchImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for BatchImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchImportError::Io(err) => write!(f, "failed to read candidate batch: {}", err),
            BatchImportError::Csv(err) => write!(f, "invalid candidate batch CSV: {}", err),
        }
    }
}

impl std::error::Error for BatchImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchImportError::Io(err) => Some(err),
            BatchImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for BatchImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BatchImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads candidate rows from a headed CSV file.
pub fn rows_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<BatchRow>, BatchImportError> {
    let file = std::fs::File::open(path)?;
    rows_from_reader(file)
}

pub fn rows_from_reader<R: Read>(reader: R) -> Result<Vec<BatchRow>, BatchImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();

    for record in csv_reader.deserialize::<CandidateCsvRow>() {
        rows.push(record?.into_batch_row());
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct CandidateCsvRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(default)]
    education: String,
    #[serde(default)]
    work_experience: String,
    #[serde(default)]
    technical_skills: String,
    #[serde(default)]
    soft_skills: String,
    #[serde(default)]
    motivation: String,
    #[serde(default)]
    career_goals: String,
    #[serde(default)]
    additional_info: String,
}

impl CandidateCsvRow {
    fn into_batch_row(self) -> BatchRow {
        BatchRow {
            name: self.name,
            email: self.email,
            phone: self.phone,
            profile: CandidateProfile {
                education: single_entry(self.education),
                work_experience: single_entry(self.work_experience),
                technical_skills: split_list(&self.technical_skills),
                soft_skills: split_list(&self.soft_skills),
                certifications: Vec::new(),
                motivation: self.motivation,
                career_goals: self.career_goals,
                additional_info: self.additional_info,
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn single_entry(raw: String) -> Vec<String> {
    if raw.trim().is_empty() {
        Vec::new()
    } else {
        vec![raw]
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
