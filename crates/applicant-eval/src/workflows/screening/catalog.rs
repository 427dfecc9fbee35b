use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::domain::{CriteriaItem, CriteriaTemplate};
use super::repository::{CatalogError, CriteriaCatalog};

/// Extensions accepted for uploaded criteria documents.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["csv", "xlsx", "pdf", "md", "docx"];

const CSV_NAME_HEADER: &str = "要件/構成要素";
const CSV_DEFINITION_HEADER: &str = "定義";

/// Criteria catalog backed by a directory of uploaded documents.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, CatalogError> {
        let name = sanitize_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl CriteriaCatalog for DirectoryCatalog {
    async fn list_criteria_names(&self) -> Result<Vec<String>, CatalogError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CatalogError::Unavailable(err.to_string())),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if has_allowed_extension(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn get_criteria_template(&self, name: &str) -> Result<CriteriaTemplate, CatalogError> {
        let path = self.path_for(name)?;
        let contents = tokio::fs::read(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => CatalogError::NotFound(name.to_string()),
            _ => CatalogError::Unavailable(err.to_string()),
        })?;
        debug!(criteria = name, bytes = contents.len(), "criteria document read");
        parse_document(name, &contents)
    }

    async fn store_criteria(&self, name: &str, contents: &[u8]) -> Result<String, CatalogError> {
        let name = sanitize_name(name)?.to_string();
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;
        tokio::fs::write(self.root.join(&name), contents)
            .await
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;
        info!(criteria = %name, bytes = contents.len(), "criteria document stored");
        Ok(name)
    }

    async fn delete_criteria(&self, name: &str) -> Result<(), CatalogError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => CatalogError::NotFound(name.to_string()),
                _ => CatalogError::Unavailable(err.to_string()),
            })?;
        info!(criteria = name, "criteria document deleted");
        Ok(())
    }
}

/// Rejects path-like names and unsupported extensions.
pub fn sanitize_name(raw: &str) -> Result<&str, CatalogError> {
    let name = raw.trim();
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(CatalogError::InvalidName(raw.to_string()));
    }
    if !has_allowed_extension(name) {
        return Err(CatalogError::InvalidName(raw.to_string()));
    }
    Ok(name)
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn has_allowed_extension(name: &str) -> bool {
    extension(name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Parses a stored document by extension. Binary office formats are stored but not read.
pub fn parse_document(name: &str, contents: &[u8]) -> Result<CriteriaTemplate, CatalogError> {
    let parse_error = |reason: &str| CatalogError::Parse {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let items = match extension(name).as_deref() {
        Some("csv") => parse_csv_items(contents).map_err(|reason| parse_error(&reason))?,
        Some("md") => {
            let text = std::str::from_utf8(contents)
                .map_err(|_| parse_error("document is not valid UTF-8"))?;
            parse_markdown_items(text)
        }
        Some(other) => return Err(parse_error(&format!("'{other}' documents cannot be scored"))),
        None => return Err(parse_error("document has no extension")),
    };

    if items.is_empty() {
        return Err(parse_error("no criteria items found"));
    }

    Ok(CriteriaTemplate {
        criteria_filename: name.to_string(),
        items,
    })
}

fn parse_csv_items(contents: &[u8]) -> Result<Vec<CriteriaItem>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(contents);

    let headers = reader.headers().map_err(|err| err.to_string())?.clone();
    let column = |label: &str| headers.iter().position(|header| header == label);
    let (name_idx, definition_idx) = match (column(CSV_NAME_HEADER), column(CSV_DEFINITION_HEADER)) {
        (Some(name), Some(definition)) => (name, definition),
        _ => (0, 1),
    };

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| err.to_string())?;
        let name = record.get(name_idx).unwrap_or_default();
        let definition = record.get(definition_idx).unwrap_or_default();
        if name.is_empty() || definition.is_empty() {
            continue;
        }
        items.push(CriteriaItem::unscored(name, definition));
    }
    Ok(items)
}

fn parse_markdown_items(text: &str) -> Vec<CriteriaItem> {
    let mut items = Vec::new();
    let mut heading: Option<&str> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(title) = line.strip_prefix("### ").or_else(|| line.strip_prefix("## ")) {
            heading = Some(title.trim());
            continue;
        }
        if line.starts_with('#') {
            heading = None;
            continue;
        }
        if let Some(name) = heading.take() {
            items.push(CriteriaItem::unscored(name, line));
        }
    }

    items
}
