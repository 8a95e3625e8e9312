//! Server-wide reference data shipped with every manifest.

use std::path::Path;

use crate::error::ExportResult;
use crate::model::{Cdn, ConsumerType, DistributorVersion};
use crate::writer::{write_export, FileExport};

use super::{record_path, CDN_DIR, CONSUMER_TYPES_DIR, DISTRIBUTOR_VERSION_DIR};

pub fn write_consumer_types(types: &[ConsumerType], export_dir: &Path) -> ExportResult<()> {
    let dir = export_dir.join(CONSUMER_TYPES_DIR);
    for consumer_type in types {
        let path = record_path(&dir, &consumer_type.label, "json")?;
        write_export(&path, &FileExport::json(consumer_type)?)?;
    }
    Ok(())
}

pub fn write_distributor_versions(
    versions: &[DistributorVersion],
    export_dir: &Path,
) -> ExportResult<()> {
    let dir = export_dir.join(DISTRIBUTOR_VERSION_DIR);
    for version in versions {
        let path = record_path(&dir, &version.name, "json")?;
        write_export(&path, &FileExport::json(version)?)?;
    }
    Ok(())
}

pub fn write_cdns(cdns: &[Cdn], export_dir: &Path) -> ExportResult<()> {
    let dir = export_dir.join(CDN_DIR);
    for cdn in cdns {
        let path = record_path(&dir, &cdn.label, "json")?;
        write_export(&path, &FileExport::json(cdn)?)?;
    }
    Ok(())
}
