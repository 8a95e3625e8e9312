//! File writers for export records.
//!
//! Two strategies: structured records serialized as JSON, and raw text blocks
//! (PEM certificate + key pairs, rule sources). Both create the target's
//! parent directories and write through a sibling `.tmp` file that is renamed
//! into place, so a failed write leaves no truncated target behind.

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{ExportError, ExportResult};

/// Contents of a single export file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileExport<'a> {
    /// Structured records, written back to back as JSON.
    Json(Vec<serde_json::Value>),
    /// Raw text blocks, written back to back.
    Text(Vec<Cow<'a, str>>),
}

impl<'a> FileExport<'a> {
    /// A single structured record.
    pub fn json<T: Serialize + ?Sized>(record: &T) -> ExportResult<Self> {
        Ok(Self::Json(vec![serde_json::to_value(record)?]))
    }

    /// A certificate followed by its key.
    pub fn pem_pair(cert: &'a str, key: &'a str) -> Self {
        Self::Text(vec![Cow::Borrowed(cert), Cow::Borrowed(key)])
    }

    pub fn text(block: impl Into<Cow<'a, str>>) -> Self {
        Self::Text(vec![block.into()])
    }

    fn render(&self) -> ExportResult<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::Json(records) => {
                for record in records {
                    serde_json::to_writer(&mut out, record)?;
                }
            }
            Self::Text(blocks) => {
                for block in blocks {
                    out.extend_from_slice(block.as_bytes());
                }
            }
        }
        Ok(out)
    }
}

/// Write one export file, creating its directory if needed.
pub fn write_export(path: &Path, export: &FileExport<'_>) -> ExportResult<()> {
    if let Some(dir) = path.parent() {
        trace!("Creating an export dir: {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;
    }

    let bytes = export.render()?;
    debug!("Creating an export: {}", path.display());
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let mut file = fs::File::create(temp_path).map_err(|e| ExportError::io(temp_path, e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| ExportError::io(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, path).map_err(|e| ExportError::io(path, e))
}
