//! Signature check of a signed manifest archive.
//!
//! Reads the two entries of the outer archive and checks the detached
//! signature against the inner archive bytes. The inner archive is returned
//! untouched; turning it back into domain records is out of scope here.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::archive::{sha256_digest, INNER_ARCHIVE_NAME, SIGNATURE_ENTRY_NAME};
use crate::signing::SignatureVerifier;

/// Manifest verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a valid manifest archive: {0}")]
    Malformed(#[from] zip::result::ZipError),

    #[error("manifest is missing entry '{name}'")]
    MissingEntry { name: &'static str },

    #[error("manifest contains unexpected entry '{name}'")]
    UnexpectedEntry { name: String },

    #[error("invalid verification key: {reason}")]
    Key { reason: String },

    #[error("manifest signature verification failed")]
    SignatureInvalid,
}

impl VerifyError {
    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SignatureInvalid => 4,
            Self::MissingEntry { .. } | Self::UnexpectedEntry { .. } => 2,
            Self::Key { .. } => 3,
            Self::Io { .. } | Self::Malformed(_) => 1,
        }
    }
}

/// A manifest whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedManifest {
    /// Bytes of `consumer_export.zip`.
    pub inner: Vec<u8>,
    /// Entry names of the inner archive, in archive order.
    pub entries: Vec<String>,
    /// `sha256:` digest of the inner archive.
    pub digest: String,
}

/// Open a signed manifest and check its signature.
pub fn verify_manifest(
    path: &Path,
    verifier: &dyn SignatureVerifier,
) -> Result<VerifiedManifest, VerifyError> {
    let file = File::open(path).map_err(|source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut outer = ZipArchive::new(file)?;

    if let Some(name) = outer
        .file_names()
        .find(|n| *n != INNER_ARCHIVE_NAME && *n != SIGNATURE_ENTRY_NAME)
    {
        return Err(VerifyError::UnexpectedEntry {
            name: name.to_string(),
        });
    }

    let inner = read_entry(&mut outer, INNER_ARCHIVE_NAME, path)?;
    let signature = read_entry(&mut outer, SIGNATURE_ENTRY_NAME, path)?;

    if !verifier.verify(&inner, &signature) {
        return Err(VerifyError::SignatureInvalid);
    }

    let digest = sha256_digest(&inner);
    let entries = ZipArchive::new(io::Cursor::new(inner.as_slice()))?
        .file_names()
        .map(str::to_string)
        .collect();
    info!(
        digest = %digest,
        "Verified manifest {}",
        path.display()
    );

    Ok(VerifiedManifest {
        inner,
        entries,
        digest,
    })
}

fn read_entry<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
    path: &Path,
) -> Result<Vec<u8>, VerifyError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(VerifyError::MissingEntry { name });
        }
        Err(e) => return Err(e.into()),
    };
    debug!("Reading {name} ({} bytes)", entry.size());

    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(out)
}
