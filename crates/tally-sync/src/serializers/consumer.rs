use std::path::Path;

use crate::error::ExportResult;
use crate::model::ConsumerRecord;
use crate::writer::{write_export, FileExport};

use super::CONSUMER_FILE;

/// Pick a URL prefix: a non-blank override wins, then a non-blank configured value.
pub fn resolve_url(override_url: Option<&str>, configured: Option<&str>) -> Option<String> {
    override_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| configured.filter(|u| !u.trim().is_empty()))
        .map(str::to_string)
}

pub fn write_consumer(record: &ConsumerRecord, export_dir: &Path) -> ExportResult<()> {
    write_export(&export_dir.join(CONSUMER_FILE), &FileExport::json(record)?)
}
