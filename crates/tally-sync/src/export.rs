//! Export orchestration.
//!
//! An export runs a fixed roster of serializer steps against a fresh export
//! tree, then hands the tree to [`archive::package`](crate::archive::package).
//! The first failing step aborts the export; the work area stays on disk
//! for the caller to inspect or remove.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::archive;
use crate::config::SyncConfig;
use crate::error::{ExportError, ExportResult};
use crate::model::{Consumer, ConsumerRecord, Entitlement, Meta};
use crate::serializers::{self, CertificateFilter, LegacyRules};
use crate::signing::ManifestSigner;
use crate::source::{ExportRules, ManifestSource};

/// Name of the export tree inside a work area.
pub const EXPORT_DIR_NAME: &str = "export";

/// State shared by the steps of one export.
struct ExportRun<'r> {
    consumer: &'r Consumer,
    entitlements: Vec<Entitlement>,
    export_dir: PathBuf,
    cdn_label: Option<&'r str>,
    web_url: Option<&'r str>,
    api_url: Option<&'r str>,
    serials: Option<&'r BTreeSet<u64>>,
}

type Step = fn(&Exporter<'_>, &ExportRun<'_>) -> ExportResult<()>;

const FULL_EXPORT: &[(&str, Step)] = &[
    ("meta", meta_step),
    ("consumer", consumer_step),
    ("identity certificate", identity_certificate_step),
    ("entitlements", entitlements_step),
    ("entitlement certificates", entitlement_certificates_step),
    ("products", products_step),
    ("consumer types", consumer_types_step),
    ("rules", rules_step),
    ("distributor versions", distributor_versions_step),
    ("content delivery networks", cdns_step),
];

const CERTIFICATE_EXPORT: &[(&str, Step)] = &[
    ("meta", meta_step),
    ("entitlement certificates", certificate_only_step),
    ("content access certificates", content_access_step),
];

/// Builds signed manifests for consumers.
pub struct Exporter<'a> {
    config: &'a SyncConfig,
    source: &'a dyn ManifestSource,
    rules: &'a dyn ExportRules,
    signer: &'a dyn ManifestSigner,
    principal: String,
}

impl<'a> Exporter<'a> {
    pub fn new(
        config: &'a SyncConfig,
        source: &'a dyn ManifestSource,
        rules: &'a dyn ExportRules,
        signer: &'a dyn ManifestSigner,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            config,
            source,
            rules,
            signer,
            principal: principal.into(),
        }
    }

    /// Full manifest: reference data, entitlements, certificates and products.
    ///
    /// Blank URL overrides fall back to the configured prefixes.
    pub fn full_export(
        &self,
        consumer: &Consumer,
        cdn_label: Option<&str>,
        web_url: Option<&str>,
        api_url: Option<&str>,
    ) -> ExportResult<PathBuf> {
        let run = self.begin(consumer, cdn_label, web_url, api_url, None)?;
        self.finish(run, FULL_EXPORT)
    }

    /// Certificate re-export, limited to `serials` when given.
    ///
    /// Certificates are exported whatever the export rules say: the consumer
    /// already holds these entitlements and is only refreshing certificates.
    pub fn certificate_export(
        &self,
        consumer: &Consumer,
        serials: Option<&BTreeSet<u64>>,
    ) -> ExportResult<PathBuf> {
        let run = self.begin(consumer, None, None, None, serials)?;
        self.finish(run, CERTIFICATE_EXPORT)
    }

    fn begin<'r>(
        &self,
        consumer: &'r Consumer,
        cdn_label: Option<&'r str>,
        web_url: Option<&'r str>,
        api_url: Option<&'r str>,
        serials: Option<&'r BTreeSet<u64>>,
    ) -> ExportResult<ExportRun<'r>> {
        let work_area = make_work_area(&self.config.work_dir)?;
        let entitlements = self
            .source
            .entitlements(consumer)
            .map_err(|e| ExportError::lookup(format!("entitlements of {}", consumer.uuid), e))?;

        Ok(ExportRun {
            consumer,
            entitlements,
            export_dir: work_area.join(EXPORT_DIR_NAME),
            cdn_label,
            web_url,
            api_url,
            serials,
        })
    }

    fn finish(&self, run: ExportRun<'_>, steps: &[(&str, Step)]) -> ExportResult<PathBuf> {
        for (name, step) in steps {
            debug!(consumer = %run.consumer.uuid, "Exporting {name}");
            step(self, &run)?;
        }

        let work_area = run.export_dir.parent().unwrap_or(run.export_dir.as_path());
        let archive = archive::package(
            &run.consumer.uuid,
            work_area,
            &run.export_dir,
            self.config.entry_naming,
            self.signer,
        )?;
        info!(consumer = %run.consumer.uuid, "Export written to {}", archive.display());
        Ok(archive)
    }

    fn legacy_rules(&self) -> LegacyRules {
        LegacyRules::from_override(self.config.legacy_rules_path.as_deref())
    }
}

impl std::fmt::Debug for Exporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// A private `export*` directory under `work_dir`, kept after return.
fn make_work_area(work_dir: &Path) -> ExportResult<PathBuf> {
    std::fs::create_dir_all(work_dir).map_err(|e| ExportError::io(work_dir, e))?;
    let dir = tempfile::Builder::new()
        .prefix("export")
        .tempdir_in(work_dir)
        .map_err(|e| ExportError::io(work_dir, e))?;
    Ok(dir.keep())
}

fn lookup<T>(what: &str, result: anyhow::Result<T>) -> ExportResult<T> {
    result.map_err(|e| ExportError::lookup(format!("failed to load {what}"), e))
}

fn meta_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let meta = Meta {
        version: exporter.config.version.clone(),
        created: Utc::now(),
        principal_name: exporter.principal.clone(),
        web_app_prefix: None,
        cdn_label: run.cdn_label.map(str::to_string),
    };
    serializers::write_meta(&meta, &run.export_dir)
}

fn consumer_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let record = ConsumerRecord::new(
        run.consumer,
        serializers::resolve_url(run.web_url, exporter.config.prefix_web_url.as_deref()),
        serializers::resolve_url(run.api_url, exporter.config.prefix_api_url.as_deref()),
    );
    serializers::write_consumer(&record, &run.export_dir)
}

fn identity_certificate_step(_: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    serializers::write_identity_certificate(run.consumer.id_cert.as_ref(), &run.export_dir)
}

fn entitlements_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    serializers::write_entitlements(&run.entitlements, exporter.rules, &run.export_dir)
}

fn entitlement_certificates_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let filter = CertificateFilter::all()
        .with_serials(run.serials)
        .with_rules(exporter.rules);
    serializers::write_entitlement_certificates(&run.entitlements, &filter, &run.export_dir)
}

fn certificate_only_step(_: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let filter = CertificateFilter::all().with_serials(run.serials);
    serializers::write_entitlement_certificates(&run.entitlements, &filter, &run.export_dir)
}

fn content_access_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let cert = lookup(
        "content access certificate",
        exporter.source.content_access_certificate(run.consumer),
    )?;
    serializers::write_content_access_certificate(cert.as_ref(), &run.export_dir)
}

fn products_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    serializers::write_products(
        &run.entitlements,
        &run.consumer.owner_key,
        exporter.source,
        &run.export_dir,
    )
}

fn consumer_types_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let types = lookup("consumer types", exporter.source.consumer_types())?;
    serializers::write_consumer_types(&types, &run.export_dir)
}

fn rules_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let rules = lookup("rules", exporter.source.rules())?;
    serializers::write_rules(&rules, &exporter.legacy_rules(), &run.export_dir)
}

fn distributor_versions_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let versions = lookup("distributor versions", exporter.source.distributor_versions())?;
    serializers::write_distributor_versions(&versions, &run.export_dir)
}

fn cdns_step(exporter: &Exporter<'_>, run: &ExportRun<'_>) -> ExportResult<()> {
    let cdns = lookup("content delivery networks", exporter.source.cdns())?;
    serializers::write_cdns(&cdns, &run.export_dir)
}
