//! Manifest synchronization for Tally.
//!
//! This crate owns the two halves of upstream/downstream entitlement sync:
//!
//! - **Export**: serialize a consumer's entitlement state into a directory
//!   tree, zip it, sign the zip, and wrap zip + signature in an outer archive.
//! - **Reconciliation**: assign stable local identifiers to a freshly imported
//!   batch of upstream subscriptions, so repeated imports do not churn ids.
//!
//! Persistence, eligibility rules and key custody stay outside: they are
//! consumed through the traits in [`source`] and [`signing`].
//!
//! # Manifest layout
//!
//! ```text
//! {uuid}-export.zip
//! ├── consumer_export.zip      # unsigned archive of the export tree
//! └── signature                # SHA256withRSA over consumer_export.zip
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tally_sync::{AllowAll, Exporter, RsaManifestSigner, Snapshot, SyncConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SyncConfig::from_env();
//! let snapshot = Snapshot::from_json_file("state.json")?;
//! let signer = RsaManifestSigner::from_pem_file("signing_key.pem")?;
//!
//! let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");
//! let archive = exporter.full_export(&snapshot.consumer, Some("cdn"), None, None)?;
//! println!("manifest written to {}", archive.display());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod reconcile;
pub mod serializers;
pub mod signing;
pub mod source;
pub mod verify;
pub mod writer;

// Convenience re-exports
pub use archive::{EntryNaming, INNER_ARCHIVE_NAME, SIGNATURE_ENTRY_NAME};
pub use config::{ConfigError, SyncConfig};
pub use error::{ErrorKind, ExportError, ExportResult};
pub use export::Exporter;
pub use model::{
    Cdn, Certificate, CertificateSerial, Consumer, ConsumerType, DistributorVersion, Entitlement,
    Meta, Pool, Product, ProductCertificate, Rules,
};
pub use reconcile::{
    reconcile, MatchPass, Reconciliation, Resolution, SubscriptionReconciler, SubscriptionRecord,
};
pub use signing::{ManifestSigner, RsaManifestSigner, RsaManifestVerifier, SignatureVerifier};
pub use source::{
    AllowAll, ExportRules, ManifestSource, SkipDerivedPools, Snapshot, SubscriptionSource,
};
pub use verify::{verify_manifest, VerifiedManifest, VerifyError};
pub use writer::{write_export, FileExport};
