//! End-to-end export tests: snapshot in, signed archive out.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tally_sync::{
    AllowAll, Cdn, Certificate, Consumer, ConsumerType, DistributorVersion, EntryNaming,
    Entitlement, ExportError, Exporter, Pool, Product, ProductCertificate, RsaManifestSigner,
    Rules, SkipDerivedPools, Snapshot, SyncConfig, INNER_ARCHIVE_NAME, SIGNATURE_ENTRY_NAME,
};
use zip::ZipArchive;

const SIGNING_KEY: &str = include_str!("fixtures/signing_key.pem");

fn signer() -> RsaManifestSigner {
    RsaManifestSigner::from_pem(SIGNING_KEY).unwrap()
}

fn closure_product() -> Product {
    Product::new("MKT-1", "Premium Bundle")
        .with_provided(Product::new("2", "Engineering 2"))
        .with_derived(
            Product::new("MKT-3", "Guest Bundle").with_provided(Product::new("4", "Engineering 4")),
        )
}

fn snapshot() -> Snapshot {
    let entitlement = Entitlement::new("ent-1", Pool::new("pool-1", closure_product(), 100), 5)
        .with_certificate(Certificate::new(11, "ENT-CERT-11\n", "ENT-KEY-11\n"));

    let mut snapshot = Snapshot::new(Consumer {
        uuid: "c-1".into(),
        name: "downstream".into(),
        owner_key: "acme".into(),
        consumer_type: ConsumerType::new("candlepin", true),
        id_cert: Some(Certificate::new(99, "ID-CERT\n", "ID-KEY\n")),
        entitlements: vec![entitlement],
        ..Consumer::default()
    });
    snapshot.consumer_types = vec![
        ConsumerType::new("candlepin", true),
        ConsumerType::new("system", false),
    ];
    snapshot.distributor_versions = vec![DistributorVersion {
        name: "sat-6".into(),
        display_name: "Satellite 6".into(),
        capabilities: vec!["cert_v3".into()],
    }];
    snapshot.cdns = vec![Cdn {
        label: "cdn-1".into(),
        name: "Primary CDN".into(),
        url: "https://cdn.example.com".into(),
    }];
    snapshot.rules = Rules {
        version: "5.44".into(),
        rules: "// current rules\n".into(),
    };
    snapshot.product_certificates = ["MKT-1", "2", "MKT-3", "4"]
        .into_iter()
        .map(|id| {
            (
                id.to_string(),
                ProductCertificate {
                    product_id: id.into(),
                    cert: format!("PRODUCT-CERT-{id}\n"),
                },
            )
        })
        .collect();
    snapshot
}

fn config(work_dir: &Path) -> SyncConfig {
    SyncConfig::default()
        .with_work_dir(work_dir)
        .with_version("4.2.0-1")
}

fn export_dir(archive: &Path) -> PathBuf {
    archive.parent().unwrap().join("export")
}

fn files_under(root: &Path) -> BTreeMap<String, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (name, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn inner_entries(archive: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut outer = ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    let mut inner_bytes = Vec::new();
    outer
        .by_name(INNER_ARCHIVE_NAME)
        .unwrap()
        .read_to_end(&mut inner_bytes)
        .unwrap();

    let mut inner = ZipArchive::new(Cursor::new(inner_bytes)).unwrap();
    let names: Vec<String> = inner.file_names().map(str::to_string).collect();
    names
        .into_iter()
        .map(|name| {
            let mut bytes = Vec::new();
            inner.by_name(&name).unwrap().read_to_end(&mut bytes).unwrap();
            (name, bytes)
        })
        .collect()
}

#[test]
fn full_export_writes_every_record_kind() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let snapshot = snapshot();
    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");

    let archive = exporter
        .full_export(&snapshot.consumer, Some("cdn-1"), None, Some("api.example.com"))
        .unwrap();
    assert_eq!(archive.file_name().unwrap(), "c-1-export.zip");

    let files: BTreeSet<String> = files_under(&export_dir(&archive)).into_keys().collect();
    let expected: BTreeSet<String> = [
        "meta.json",
        "consumer.json",
        "upstream_consumer/99.json",
        "entitlements/ent-1.json",
        "entitlement_certificates/11.pem",
        "products/MKT-1.json",
        "products/2.json",
        "products/2.pem",
        "products/MKT-3.json",
        "products/4.json",
        "products/4.pem",
        "consumer_types/candlepin.json",
        "consumer_types/system.json",
        "rules2/rules.js",
        "rules/default-rules.js",
        "distributor_version/sat-6.json",
        "content_delivery_network/cdn-1.json",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(files, expected);

    let dir = export_dir(&archive);
    let meta: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta["version"], "4.2.0-1");
    assert_eq!(meta["principalName"], "admin");
    assert_eq!(meta["cdnLabel"], "cdn-1");

    let consumer: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.join("consumer.json")).unwrap()).unwrap();
    assert_eq!(consumer["urlWeb"], "localhost:8443/tally");
    assert_eq!(consumer["urlApi"], "api.example.com");

    assert_eq!(
        fs::read_to_string(dir.join("entitlement_certificates/11.pem")).unwrap(),
        "ENT-CERT-11\nENT-KEY-11\n"
    );
}

#[test]
fn flat_archive_reproduces_export_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let snapshot = snapshot();
    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");

    let archive = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap();

    let mut outer = ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
    let mut outer_names: Vec<&str> = outer.file_names().collect();
    outer_names.sort_unstable();
    assert_eq!(outer_names, vec![INNER_ARCHIVE_NAME, SIGNATURE_ENTRY_NAME]);
    assert_eq!(outer.len(), 2);

    let on_disk: BTreeMap<String, Vec<u8>> = files_under(&export_dir(&archive))
        .into_iter()
        .map(|(path, bytes)| (path.rsplit('/').next().unwrap().to_string(), bytes))
        .collect();
    assert_eq!(inner_entries(&archive), on_disk);
}

#[test]
fn relative_archive_reproduces_export_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path()).with_entry_naming(EntryNaming::Relative);
    let snapshot = snapshot();
    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");

    let archive = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap();

    let on_disk: BTreeMap<String, Vec<u8>> = files_under(&export_dir(&archive))
        .into_iter()
        .map(|(path, bytes)| (format!("export/{path}"), bytes))
        .collect();
    assert_eq!(inner_entries(&archive), on_disk);
}

#[test]
fn ineligible_entitlements_leave_no_trace() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut snapshot = snapshot();
    let mut derived = Entitlement::new(
        "ent-derived",
        Pool::new("pool-2", Product::new("700", "Guest"), 10),
        1,
    )
    .with_certificate(Certificate::new(12, "ENT-CERT-12\n", "ENT-KEY-12\n"));
    derived
        .pool
        .attributes
        .insert("pool_derived".into(), "true".into());
    snapshot.consumer.entitlements.push(derived);

    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &SkipDerivedPools, &signer, "admin");
    let archive = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap();

    let dir = export_dir(&archive);
    assert!(dir.join("entitlements/ent-1.json").exists());
    assert!(!dir.join("entitlements/ent-derived.json").exists());
    assert!(dir.join("entitlement_certificates/11.pem").exists());
    assert!(!dir.join("entitlement_certificates/12.pem").exists());
}

#[test]
fn zero_entitlements_still_writes_meta_and_consumer() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut snapshot = snapshot();
    snapshot.consumer.entitlements.clear();

    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");
    let archive = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap();

    let dir = export_dir(&archive);
    assert!(dir.join("meta.json").is_file());
    assert!(dir.join("consumer.json").is_file());
    assert!(!dir.join("entitlements").exists());
    assert!(!dir.join("products").exists());
}

#[test]
fn product_closure_and_certificates() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let snapshot = snapshot();
    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");

    let archive = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap();

    let products = files_under(&export_dir(&archive).join("products"));
    let json: BTreeSet<&str> = products
        .keys()
        .filter_map(|k| k.strip_suffix(".json"))
        .collect();
    let pem: BTreeSet<&str> = products
        .keys()
        .filter_map(|k| k.strip_suffix(".pem"))
        .collect();

    assert_eq!(json, BTreeSet::from(["2", "4", "MKT-1", "MKT-3"]));
    assert_eq!(pem, BTreeSet::from(["2", "4"]));
    assert_eq!(products["4.pem"], b"PRODUCT-CERT-4\n");
}

#[test]
fn dirty_entitlement_aborts_export() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut snapshot = snapshot();
    snapshot.consumer.entitlements[0].dirty = true;

    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");
    let err = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap_err();

    assert!(matches!(err, ExportError::DirtyEntitlement { ref id } if id == "ent-1"));
    assert!(err.is_policy_violation());

    let archives: Vec<PathBuf> = walkdir::WalkDir::new(tmp.path())
        .into_iter()
        .map(|e| e.unwrap().into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .collect();
    assert!(archives.is_empty(), "unexpected archives: {archives:?}");
}

#[test]
fn certificate_export_filters_by_serial_only() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let mut snapshot = snapshot();
    let mut derived = Entitlement::new(
        "ent-derived",
        Pool::new("pool-2", Product::new("700", "Guest"), 10),
        1,
    )
    .with_certificate(Certificate::new(12, "ENT-CERT-12\n", "ENT-KEY-12\n"))
    .with_certificate(Certificate::new(13, "ENT-CERT-13\n", "ENT-KEY-13\n"));
    derived
        .pool
        .attributes
        .insert("pool_derived".into(), "true".into());
    snapshot.consumer.entitlements.push(derived);
    snapshot.content_access_certificate = Some(Certificate::new(50, "SCA\n", "SCA-KEY\n"));

    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &SkipDerivedPools, &signer, "admin");
    let serials: BTreeSet<u64> = [11, 12].into_iter().collect();
    let archive = exporter
        .certificate_export(&snapshot.consumer, Some(&serials))
        .unwrap();

    let files: BTreeSet<String> = files_under(&export_dir(&archive)).into_keys().collect();
    let expected: BTreeSet<String> = [
        "meta.json",
        "entitlement_certificates/11.pem",
        "entitlement_certificates/12.pem",
        "content_access_certificates/50.pem",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(files, expected);

    let meta: serde_json::Value = serde_json::from_slice(
        &fs::read(export_dir(&archive).join("meta.json")).unwrap(),
    )
    .unwrap();
    assert!(meta["cdnLabel"].is_null());
}

#[test]
fn unreadable_legacy_rules_fail_the_export() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path()).with_legacy_rules_path(tmp.path().join("missing.js"));
    let snapshot = snapshot();
    let signer = signer();
    let exporter = Exporter::new(&config, &snapshot, &AllowAll, &signer, "admin");

    let err = exporter
        .full_export(&snapshot.consumer, None, None, None)
        .unwrap_err();
    assert!(matches!(err, ExportError::LegacyRules { .. }), "got {err:?}");
    assert!(!err.is_policy_violation());
}
