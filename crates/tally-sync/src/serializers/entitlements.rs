use std::path::Path;

use tracing::{debug, error};

use crate::error::{ExportError, ExportResult};
use crate::model::Entitlement;
use crate::source::ExportRules;
use crate::writer::{write_export, FileExport};

use super::{record_path, ENTITLEMENTS_DIR};

/// `entitlements/{id}.json` for every exportable entitlement.
///
/// A dirty entitlement aborts the whole export, even one the rules would
/// have skipped. The directory is only created once a file is written.
pub fn write_entitlements(
    entitlements: &[Entitlement],
    rules: &dyn ExportRules,
    export_dir: &Path,
) -> ExportResult<()> {
    let dir = export_dir.join(ENTITLEMENTS_DIR);
    for entitlement in entitlements {
        if entitlement.dirty {
            error!("Entitlement {} is marked as dirty", entitlement.id);
            return Err(ExportError::DirtyEntitlement {
                id: entitlement.id.clone(),
            });
        }

        if !rules.can_export(entitlement) {
            debug!(
                "Skipping export of entitlement with product: {}",
                entitlement.pool.product.id
            );
            continue;
        }

        debug!("Exporting entitlement for product {}", entitlement.pool.product.id);
        let path = record_path(&dir, &entitlement.id, "json")?;
        write_export(&path, &FileExport::json(entitlement)?)?;
    }
    Ok(())
}
