use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::error::ExportResult;
use crate::model::{Certificate, Entitlement};
use crate::source::ExportRules;
use crate::writer::{write_export, FileExport};

use super::{record_path, CONTENT_ACCESS_CERTIFICATES_DIR, ENTITLEMENT_CERTIFICATES_DIR, UPSTREAM_CONSUMER_DIR};

/// Which entitlement certificates end up in a manifest.
#[derive(Clone, Copy, Default)]
pub struct CertificateFilter<'a> {
    serials: Option<&'a BTreeSet<u64>>,
    rules: Option<&'a dyn ExportRules>,
}

impl<'a> CertificateFilter<'a> {
    /// Every certificate of every entitlement.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only certificates whose serial is listed. `None` keeps every serial.
    pub fn with_serials(mut self, serials: Option<&'a BTreeSet<u64>>) -> Self {
        self.serials = serials;
        self
    }

    /// Only certificates of entitlements the rules allow to leave the server.
    pub fn with_rules(mut self, rules: &'a dyn ExportRules) -> Self {
        self.rules = Some(rules);
        self
    }

    fn allows_entitlement(&self, entitlement: &Entitlement) -> bool {
        self.rules.map_or(true, |r| r.can_export(entitlement))
    }

    fn allows_serial(&self, serial: u64) -> bool {
        self.serials.map_or(true, |s| s.contains(&serial))
    }
}

impl std::fmt::Debug for CertificateFilter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateFilter")
            .field("serials", &self.serials)
            .field("rules", &self.rules.is_some())
            .finish()
    }
}

/// `upstream_consumer/{serial}.json`: the consumer's identity certificate and key.
pub fn write_identity_certificate(cert: Option<&Certificate>, export_dir: &Path) -> ExportResult<()> {
    let Some(cert) = cert else {
        debug!("Consumer has no identity certificate, skipping");
        return Ok(());
    };
    let path = record_path(
        &export_dir.join(UPSTREAM_CONSUMER_DIR),
        &cert.serial.id.to_string(),
        "json",
    )?;
    write_export(&path, &FileExport::json(cert)?)
}

/// `entitlement_certificates/{serial}.pem`: certificate followed by key.
pub fn write_entitlement_certificates(
    entitlements: &[Entitlement],
    filter: &CertificateFilter<'_>,
    export_dir: &Path,
) -> ExportResult<()> {
    let dir = export_dir.join(ENTITLEMENT_CERTIFICATES_DIR);
    for entitlement in entitlements {
        if !filter.allows_entitlement(entitlement) {
            debug!(
                "Skipping certificates of entitlement {}: not exportable",
                entitlement.id
            );
            continue;
        }
        for cert in &entitlement.certificates {
            if !filter.allows_serial(cert.serial.id) {
                continue;
            }
            write_pem(&dir, cert)?;
        }
    }
    Ok(())
}

/// `content_access_certificates/{serial}.pem`, when the owner uses content access mode.
pub fn write_content_access_certificate(
    cert: Option<&Certificate>,
    export_dir: &Path,
) -> ExportResult<()> {
    match cert {
        Some(cert) => write_pem(&export_dir.join(CONTENT_ACCESS_CERTIFICATES_DIR), cert),
        None => Ok(()),
    }
}

fn write_pem(dir: &Path, cert: &Certificate) -> ExportResult<()> {
    let path = record_path(dir, &cert.serial.id.to_string(), "pem")?;
    write_export(&path, &FileExport::pem_pair(&cert.cert, &cert.key))
}
