use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_sync::{
    AllowAll, ExportRules, Exporter, RsaManifestSigner, SkipDerivedPools, Snapshot, SyncConfig,
};

use crate::cli::args::{CertsArgs, ExportArgs, RulesArg, SourceArgs};
use crate::exit_codes::SUCCESS;

pub fn cmd_export(config: &SyncConfig, args: ExportArgs) -> Result<i32> {
    let (snapshot, signer) = load(config, &args.source)?;
    let rules: &dyn ExportRules = match args.rules {
        RulesArg::SkipDerived => &SkipDerivedPools,
        RulesArg::All => &AllowAll,
    };

    let exporter = Exporter::new(config, &snapshot, rules, &signer, args.principal);
    let archive = exporter
        .full_export(
            &snapshot.consumer,
            args.cdn_label.as_deref(),
            args.web_url.as_deref(),
            args.api_url.as_deref(),
        )
        .with_context(|| format!("export of consumer {} failed", snapshot.consumer.uuid))?;

    deliver(&archive, args.source.out.as_deref())
}

pub fn cmd_certs(config: &SyncConfig, args: CertsArgs) -> Result<i32> {
    let (snapshot, signer) = load(config, &args.source)?;
    let serials: BTreeSet<u64> = args.serials.iter().copied().collect();
    let serials = (!serials.is_empty()).then_some(&serials);

    let exporter = Exporter::new(config, &snapshot, &AllowAll, &signer, args.principal);
    let archive = exporter
        .certificate_export(&snapshot.consumer, serials)
        .with_context(|| {
            format!(
                "certificate export of consumer {} failed",
                snapshot.consumer.uuid
            )
        })?;

    deliver(&archive, args.source.out.as_deref())
}

fn load(config: &SyncConfig, args: &SourceArgs) -> Result<(Snapshot, RsaManifestSigner)> {
    let snapshot = Snapshot::from_json_file(&args.snapshot)?;
    let key = args
        .key
        .as_deref()
        .or(config.signing_key_path.as_deref())
        .context("no signing key: pass --key or set TALLY_SIGNING_KEY")?;
    let signer = RsaManifestSigner::from_pem_file(key)
        .with_context(|| format!("failed to load signing key {}", key.display()))?;
    tracing::debug!(key_id = signer.key_id(), "Loaded signing key");
    Ok((snapshot, signer))
}

/// Print the archive path, copying it into `out` first when given.
fn deliver(archive: &Path, out: Option<&Path>) -> Result<i32> {
    let path = match out {
        Some(dir) => copy_into(archive, dir)?,
        None => archive.to_path_buf(),
    };
    println!("{}", path.display());
    Ok(SUCCESS)
}

fn copy_into(archive: &Path, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;
    let file_name = archive
        .file_name()
        .context("archive path has no file name")?;
    let target = dir.join(file_name);
    std::fs::copy(archive, &target)
        .with_context(|| format!("failed to copy manifest to {}", target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_into_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("c-1-export.zip");
        std::fs::write(&archive, b"zip").unwrap();

        let target = copy_into(&archive, &tmp.path().join("out/nested")).unwrap();
        assert_eq!(target, tmp.path().join("out/nested/c-1-export.zip"));
        assert_eq!(std::fs::read(target).unwrap(), b"zip");
    }

    #[test]
    fn missing_key_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let snapshot = tmp.path().join("state.json");
        std::fs::write(
            &snapshot,
            r#"{"consumer":{"uuid":"c","name":"n","ownerKey":"o","type":{"label":"candlepin"}}}"#,
        )
        .unwrap();
        let args = SourceArgs {
            snapshot,
            key: None,
            out: None,
        };

        let err = load(&SyncConfig::default(), &args).unwrap_err();
        assert!(err.to_string().contains("no signing key"));
    }
}
