//! Two-layer manifest archive.
//!
//! ```text
//! {uuid}-{export dir name}.zip      outer, exactly two entries
//! ├── consumer_export.zip           inner, every file of the export tree
//! └── signature                     SHA256withRSA over the inner bytes
//! ```
//!
//! Entries carry a fixed modification time and the tree is walked in file
//! name order, so identical trees produce byte-identical inner archives.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{ExportError, ExportResult};
use crate::signing::ManifestSigner;

/// Entry name of the unsigned archive inside the signed one.
pub const INNER_ARCHIVE_NAME: &str = "consumer_export.zip";

/// Entry name of the detached signature inside the signed archive.
pub const SIGNATURE_ENTRY_NAME: &str = "signature";

/// How export files are named inside `consumer_export.zip`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryNaming {
    /// Bare file name (`100.json`). Two files with the same name are an error.
    #[default]
    Flat,
    /// Path below the export directory's parent (`export/products/100.json`).
    Relative,
}

impl FromStr for EntryNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "relative" => Ok(Self::Relative),
            other => Err(format!("unknown entry naming '{other}' (expected flat or relative)")),
        }
    }
}

impl std::fmt::Display for EntryNaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => f.write_str("flat"),
            Self::Relative => f.write_str("relative"),
        }
    }
}

/// Zip `export_dir`, sign it, and wrap both into the signed archive.
///
/// Both archives are written into `work_dir`; the returned path is the
/// signed one. Nothing is cleaned up, on success or failure.
pub fn package(
    consumer_uuid: &str,
    work_dir: &Path,
    export_dir: &Path,
    naming: EntryNaming,
    signer: &dyn ManifestSigner,
) -> ExportResult<PathBuf> {
    let dir_name = export_dir
        .file_name()
        .map_or(Cow::Borrowed("export"), |n| n.to_string_lossy());
    let outer_name = format!("{consumer_uuid}-{dir_name}.zip");
    info!(
        "Creating archive of {} in: {}",
        export_dir.display(),
        outer_name
    );

    let inner_path = work_dir.join(INNER_ARCHIVE_NAME);
    write_inner_archive(
        &inner_path,
        export_dir,
        naming,
        &format!("tally export for {consumer_uuid}"),
    )?;

    let inner = fs::read(&inner_path).map_err(|e| ExportError::io(&inner_path, e))?;
    let signature = signer.sign(&inner)?;
    info!(
        consumer = consumer_uuid,
        digest = %sha256_digest(&inner),
        "Signed {}",
        INNER_ARCHIVE_NAME
    );

    let outer_path = work_dir.join(outer_name);
    write_signed_archive(
        &outer_path,
        &inner,
        &signature,
        &format!("signed tally export for {consumer_uuid}"),
    )?;

    debug!("Returning file: {}", outer_path.display());
    Ok(outer_path)
}

/// `sha256:` followed by the lowercase hex digest.
pub(crate) fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().last_modified_time(zip::DateTime::default())
}

fn write_inner_archive(
    archive: &Path,
    export_dir: &Path,
    naming: EntryNaming,
    comment: &str,
) -> ExportResult<()> {
    let file = File::create(archive).map_err(|e| ExportError::io(archive, e))?;
    let mut zip = ZipWriter::new(file);
    zip.set_comment(comment);

    let base = export_dir.parent().unwrap_or(export_dir);
    let mut seen = HashSet::new();

    for entry in WalkDir::new(export_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(export_dir).to_path_buf();
            ExportError::io(path, io::Error::from(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry_name(path, base, naming);
        if !seen.insert(name.clone()) {
            return Err(ExportError::DuplicateEntry { name });
        }

        debug!("Adding file to archive: {name}");
        zip.start_file(name, entry_options())?;
        let mut source = File::open(path).map_err(|e| ExportError::io(path, e))?;
        io::copy(&mut source, &mut zip).map_err(|e| ExportError::io(path, e))?;
    }

    zip.finish()?;
    Ok(())
}

fn write_signed_archive(
    archive: &Path,
    inner: &[u8],
    signature: &[u8],
    comment: &str,
) -> ExportResult<()> {
    let file = File::create(archive).map_err(|e| ExportError::io(archive, e))?;
    let mut zip = ZipWriter::new(file);
    zip.set_comment(comment);

    zip.start_file(INNER_ARCHIVE_NAME, entry_options())?;
    zip.write_all(inner).map_err(|e| ExportError::io(archive, e))?;

    debug!("Adding signature to archive");
    zip.start_file(SIGNATURE_ENTRY_NAME, entry_options())?;
    zip.write_all(signature)
        .map_err(|e| ExportError::io(archive, e))?;

    zip.finish()?;
    Ok(())
}

fn entry_name(path: &Path, base: &Path, naming: EntryNaming) -> String {
    match naming {
        EntryNaming::Flat => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        EntryNaming::Relative => path
            .strip_prefix(base)
            .unwrap_or(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
    }
}
