use serde::Serialize;

use super::domain::Stage;

/// Read-only view of the stage registry and criteria catalog used for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogSnapshot {
    stages: Vec<Stage>,
    criteria_names: Vec<String>,
}

impl CatalogSnapshot {
    /// Sorts stages by `order` and drops repeated catalog names, keeping first occurrence.
    pub fn new(mut stages: Vec<Stage>, criteria_names: Vec<String>) -> Self {
        stages.sort_by_key(|stage| stage.order);

        let mut unique: Vec<String> = Vec::with_capacity(criteria_names.len());
        for name in criteria_names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        Self {
            stages,
            criteria_names: unique,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn criteria_names(&self) -> &[String] {
        &self.criteria_names
    }

    pub fn stage(&self, stage_name: &str) -> Option<&Stage> {
        self.stages
            .iter()
            .find(|stage| stage.stage_name == stage_name)
    }

    pub fn contains_criteria(&self, name: &str) -> bool {
        self.criteria_names.iter().any(|candidate| candidate == name)
    }
}

/// What to show when the candidate's stage does not name a template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Use the first catalog entry.
    #[default]
    FirstCatalogEntry,
    /// Use the named template when the catalog has it, else the first entry.
    Preferred(String),
    /// Leave the candidate without an active template.
    Disabled,
}

impl FallbackPolicy {
    /// `first` and `none` are keywords; anything else names a preferred template.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "first" => Self::FirstCatalogEntry,
            "none" | "disabled" => Self::Disabled,
            _ => Self::Preferred(trimmed.to_string()),
        }
    }

    fn pick<'a>(&self, snapshot: &'a CatalogSnapshot) -> Option<&'a str> {
        match self {
            FallbackPolicy::FirstCatalogEntry => {
                snapshot.criteria_names().first().map(String::as_str)
            }
            FallbackPolicy::Preferred(preferred) => snapshot
                .criteria_names()
                .iter()
                .find(|name| *name == preferred)
                .or_else(|| snapshot.criteria_names().first())
                .map(String::as_str),
            FallbackPolicy::Disabled => None,
        }
    }
}

/// The template chosen for a candidate at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Resolution {
    Stage {
        stage_name: String,
        criteria_filename: String,
    },
    Fallback {
        criteria_filename: String,
    },
    /// Chosen explicitly by the reviewer.
    Selected {
        criteria_filename: String,
    },
    Unavailable,
}

impl Resolution {
    pub fn criteria_filename(&self) -> Option<&str> {
        match self {
            Resolution::Stage {
                criteria_filename, ..
            }
            | Resolution::Fallback { criteria_filename }
            | Resolution::Selected { criteria_filename } => Some(criteria_filename),
            Resolution::Unavailable => None,
        }
    }
}

/// Picks the active template: stage match first, then the fallback policy.
pub fn resolve(
    current_stage: Option<&str>,
    snapshot: &CatalogSnapshot,
    fallback: &FallbackPolicy,
) -> Resolution {
    if let Some(stage) = current_stage.and_then(|name| snapshot.stage(name)) {
        return Resolution::Stage {
            stage_name: stage.stage_name.clone(),
            criteria_filename: stage.criteria_filename.clone(),
        };
    }

    match fallback.pick(snapshot) {
        Some(name) => Resolution::Fallback {
            criteria_filename: name.to_string(),
        },
        None => Resolution::Unavailable,
    }
}

/// Change reported by [`ActiveCriteria::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionChange {
    Unchanged,
    Switched {
        previous: Option<String>,
        next: Option<String>,
    },
}

/// Compare-and-skip holder of the currently active filename.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveCriteria {
    current: Option<String>,
}

impl ActiveCriteria {
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn update(&mut self, resolution: &Resolution) -> ResolutionChange {
        self.set(resolution.criteria_filename())
    }

    pub fn set(&mut self, next: Option<&str>) -> ResolutionChange {
        if self.current.as_deref() == next {
            return ResolutionChange::Unchanged;
        }
        let previous = self.current.take();
        self.current = next.map(str::to_string);
        ResolutionChange::Switched {
            previous,
            next: self.current.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
