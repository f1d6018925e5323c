//! Directory-backed document server.
//!
//! The storage endpoint is a directory holding one sub-directory per
//! database, each containing one `<collection>.json` file per collection.
//! A collection file is either a JSON array of documents or one document
//! per line, as written by the dataset importer.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use super::InMemoryCollection;
use crate::error::{QfapError, Result};

pub struct DatasetClient {
    root: PathBuf,
}

impl DatasetClient {
    /// Connect to the server at `endpoint`, a path with an optional `file://` prefix.
    pub fn connect(endpoint: &str) -> Result<Self> {
        let root = PathBuf::from(endpoint.strip_prefix("file://").unwrap_or(endpoint));
        if !root.is_dir() {
            return Err(QfapError::Config(format!(
                "storage endpoint {endpoint:?} is not a directory"
            )));
        }
        Ok(Self { root })
    }

    pub fn list_database_names(&self) -> Result<Vec<String>> {
        list_names(&self.root, |path| path.is_dir().then(|| file_name(path)).flatten())
    }

    /// Switch to `name`, which must be one of the available databases.
    pub fn database(&self, name: &str) -> Result<Database> {
        let available = self.list_database_names()?;
        if !available.iter().any(|db| db == name) {
            return Err(QfapError::Config(format!(
                "Invalid database name {name:?}. Pick one from {available:?}"
            )));
        }
        info!("Switching to database {:?}", name);
        Ok(Database {
            name: name.to_string(),
            path: self.root.join(name),
        })
    }
}

pub struct Database {
    name: String,
    path: PathBuf,
}

impl Database {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn list_collection_names(&self) -> Result<Vec<String>> {
        list_names(&self.path, |path| {
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            if path.is_file() && is_json {
                path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
            } else {
                None
            }
        })
    }

    /// Load `name`, which must be one of the available collections.
    pub fn collection(&self, name: &str) -> Result<InMemoryCollection> {
        let available = self.list_collection_names()?;
        if !available.iter().any(|c| c == name) {
            return Err(QfapError::Config(format!(
                "Invalid collection name {name:?}. Pick one from {available:?}"
            )));
        }
        info!("Switching to collection {:?}", name);

        let path = self.path.join(format!("{name}.json"));
        let content = fs::read_to_string(&path)
            .map_err(|e| QfapError::Unavailable(format!("reading {}: {}", path.display(), e)))?;
        let documents = parse_documents(&content)?;
        info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(InMemoryCollection::new(name, documents))
    }
}

fn parse_documents(content: &str) -> Result<Vec<Value>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(QfapError::from))
        .collect()
}

fn list_names(dir: &Path, name_of: impl Fn(&Path) -> Option<String>) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| QfapError::Unavailable(format!("listing {}: {}", dir.display(), e)))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| QfapError::Unavailable(e.to_string()))?;
        if let Some(name) = name_of(&entry.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
