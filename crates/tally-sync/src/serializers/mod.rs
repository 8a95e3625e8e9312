//! Entity serializers: one function per manifest record kind.
//!
//! Each serializer takes the records it exports plus the export root, resolves
//! its own sub-directory, and names every file after a stable attribute of
//! the record (label, id, serial, name). Surrogate keys that change between
//! exports are never used in file names.
//!
//! | Path | Serializer |
//! |---|---|
//! | `meta.json` | [`write_meta`] |
//! | `consumer.json` | [`write_consumer`] |
//! | `upstream_consumer/{serial}.json` | [`write_identity_certificate`] |
//! | `entitlements/{id}.json` | [`write_entitlements`] |
//! | `entitlement_certificates/{serial}.pem` | [`write_entitlement_certificates`] |
//! | `content_access_certificates/{serial}.pem` | [`write_content_access_certificate`] |
//! | `products/{id}.json`, `products/{id}.pem` | [`write_products`] |
//! | `consumer_types/{label}.json` | [`write_consumer_types`] |
//! | `rules2/rules.js`, `rules/default-rules.js` | [`write_rules`] |
//! | `distributor_version/{name}.json` | [`write_distributor_versions`] |
//! | `content_delivery_network/{label}.json` | [`write_cdns`] |

use std::path::{Component, Path, PathBuf};

use crate::error::{ExportError, ExportResult};

mod certificates;
mod consumer;
mod entitlements;
mod meta;
mod products;
mod reference;
mod rules;

pub use certificates::{
    write_content_access_certificate, write_entitlement_certificates, write_identity_certificate,
    CertificateFilter,
};
pub use consumer::{resolve_url, write_consumer};
pub use entitlements::write_entitlements;
pub use meta::write_meta;
pub use products::{product_closure, write_products};
pub use reference::{write_cdns, write_consumer_types, write_distributor_versions};
pub use rules::{write_rules, LegacyRules, EMBEDDED_LEGACY_RULES};

pub const META_FILE: &str = "meta.json";
pub const CONSUMER_FILE: &str = "consumer.json";
pub const UPSTREAM_CONSUMER_DIR: &str = "upstream_consumer";
pub const ENTITLEMENTS_DIR: &str = "entitlements";
pub const ENTITLEMENT_CERTIFICATES_DIR: &str = "entitlement_certificates";
pub const CONTENT_ACCESS_CERTIFICATES_DIR: &str = "content_access_certificates";
pub const PRODUCTS_DIR: &str = "products";
pub const CONSUMER_TYPES_DIR: &str = "consumer_types";
pub const RULES_DIR: &str = "rules2";
pub const RULES_FILE: &str = "rules.js";
pub const LEGACY_RULES_DIR: &str = "rules";
pub const LEGACY_RULES_FILE: &str = "default-rules.js";
pub const DISTRIBUTOR_VERSION_DIR: &str = "distributor_version";
pub const CDN_DIR: &str = "content_delivery_network";

/// `dir/{stem}.{extension}`, provided `stem` is a single plain path component.
///
/// Stems come from record attributes; one holding a separator, `..` or
/// nothing at all would land outside `dir` or collide with it.
pub(crate) fn record_path(dir: &Path, stem: &str, extension: &str) -> ExportResult<PathBuf> {
    let mut components = Path::new(stem).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == stem && !stem.contains(['/', '\\']) => {
            Ok(dir.join(format!("{stem}.{extension}")))
        }
        _ => Err(ExportError::InvalidFileName {
            name: stem.to_string(),
        }),
    }
}
