//! Serialization of generated documents and access to the written artifact.
//!
//! Artifacts are written atomically: the content goes to a temporary file next to the target
//! and is then renamed over it, so a reader sees either the previous document or the new one.

use crate::error::{Error, Result};
use crate::openapi_builder::OpenApiDocument;
use log::debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Serializes an OpenAPI document to YAML format.
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    Ok(serde_yaml::to_string(doc)?)
}

/// Serializes an OpenAPI document to pretty-printed JSON.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Whether a path names a JSON artifact; everything else is treated as YAML.
pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Writes content to a file, creating parent directories as needed.
///
/// The file is replaced only once the full content has been written.
pub fn write_atomic(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Reads back a previously written artifact.
///
/// A missing file is [`Error::NotGenerated`]; an empty or unparsable one is
/// [`Error::InvalidContent`].
pub fn load_artifact(path: &Path) -> Result<OpenApiDocument> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotGenerated(path.to_path_buf()))
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let invalid = |message: String| Error::InvalidContent {
        path: path.to_path_buf(),
        message,
    };
    if content.trim().is_empty() {
        return Err(invalid("file is empty".to_string()));
    }

    if is_json_path(path) {
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))
    } else {
        serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))
    }
}
