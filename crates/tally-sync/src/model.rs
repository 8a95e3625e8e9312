//! Entitlement domain records as they appear in a manifest.
//!
//! Field names serialize in camelCase: manifests are read by importers that
//! predate this crate and expect that layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pool attribute marking a pool derived from another pool.
pub const POOL_DERIVED_ATTRIBUTE: &str = "pool_derived";

/// A registered system or distributor that holds entitlements.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub owner_key: String,
    #[serde(rename = "type")]
    pub consumer_type: ConsumerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_access_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_cert: Option<Certificate>,
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
}

/// Exported view of a consumer (`consumer.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRecord {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub owner_key: String,
    #[serde(rename = "type")]
    pub consumer_type: ConsumerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_access_mode: Option<String>,
    pub url_web: Option<String>,
    pub url_api: Option<String>,
}

impl ConsumerRecord {
    pub fn new(consumer: &Consumer, url_web: Option<String>, url_api: Option<String>) -> Self {
        Self {
            uuid: consumer.uuid.clone(),
            name: consumer.name.clone(),
            username: consumer.username.clone(),
            owner_key: consumer.owner_key.clone(),
            consumer_type: consumer.consumer_type.clone(),
            content_access_mode: consumer.content_access_mode.clone(),
            url_web,
            url_api,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerType {
    pub label: String,
    #[serde(default)]
    pub manifest: bool,
}

impl ConsumerType {
    pub fn new(label: impl Into<String>, manifest: bool) -> Self {
        Self {
            label: label.into(),
            manifest,
        }
    }
}

/// A consumer's claim on some quantity of a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub id: String,
    pub pool: Pool,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    /// Pending changes not yet reconciled. Never written to a manifest.
    #[serde(default, skip_serializing)]
    pub dirty: bool,
}

impl Entitlement {
    pub fn new(id: impl Into<String>, pool: Pool, quantity: u32) -> Self {
        Self {
            id: id.into(),
            pool,
            quantity,
            start_date: None,
            end_date: None,
            certificates: Vec::new(),
            dirty: false,
        }
    }

    pub fn with_certificate(mut self, cert: Certificate) -> Self {
        self.certificates.push(cert);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub product: Product,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_entitlement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_consumer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Pool {
    pub fn new(id: impl Into<String>, product: Product, quantity: i64) -> Self {
        Self {
            id: id.into(),
            product,
            quantity,
            upstream_pool_id: None,
            upstream_entitlement_id: None,
            upstream_consumer_id: None,
            contract_number: None,
            account_number: None,
            order_number: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn is_derived(&self) -> bool {
        self.attributes
            .get(POOL_DERIVED_ATTRIBUTE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// A sellable product and the products it provides.
///
/// Provided products may themselves provide further products; the derived
/// product (the one granted to guests) carries its own provided tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<i64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub provided_products: Vec<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_product: Option<Box<Product>>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            multiplier: None,
            attributes: BTreeMap::new(),
            provided_products: Vec::new(),
            derived_product: None,
        }
    }

    pub fn with_provided(mut self, product: Product) -> Self {
        self.provided_products.push(product);
        self
    }

    pub fn with_derived(mut self, product: Product) -> Self {
        self.derived_product = Some(Box::new(product));
        self
    }

    /// Engineering products carry purely numeric ids; marketing SKUs do not.
    pub fn is_engineering(&self) -> bool {
        !self.id.is_empty() && self.id.bytes().all(|b| b.is_ascii_digit())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSerial {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

/// A PEM certificate with its private key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub serial: CertificateSerial,
    pub cert: String,
    pub key: String,
}

impl Certificate {
    pub fn new(serial: u64, cert: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            serial: CertificateSerial {
                id: serial,
                expiration: None,
            },
            cert: cert.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductCertificate {
    pub product_id: String,
    pub cert: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistributorVersion {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Content delivery network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cdn {
    pub label: String,
    pub name: String,
    pub url: String,
}

/// Current rule set source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rules {
    pub version: String,
    pub rules: String,
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub version: String,
    pub created: DateTime<Utc>,
    pub principal_name: String,
    pub web_app_prefix: Option<String>,
    pub cdn_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engineering_products_are_numeric() {
        assert!(Product::new("100", "Base").is_engineering());
        assert!(!Product::new("MKT-100", "Marketing").is_engineering());
        assert!(!Product::new("", "Empty").is_engineering());
        assert!(!Product::new("-1", "Signed").is_engineering());
    }

    #[test]
    fn dirty_flag_never_serialized() {
        let mut ent = Entitlement::new("ent-1", Pool::new("pool-1", Product::new("100", "Base"), 10), 1)
            .with_certificate(Certificate::new(7, "CERT", "KEY"));
        ent.dirty = true;

        let json = serde_json::to_value(&ent).unwrap();
        assert!(json.get("dirty").is_none());
        assert_eq!(json["pool"]["product"]["id"], "100");
        assert_eq!(json["certificates"][0]["serial"]["id"], 7);
        assert_eq!(json["certificates"][0]["cert"], "CERT");
        assert_eq!(json["certificates"][0]["key"], "KEY");

        let back: Entitlement = serde_json::from_value(json).unwrap();
        assert!(!back.dirty);
        assert_eq!(back.certificates, ent.certificates);
    }

    #[test]
    fn derived_pool_attribute() {
        let mut pool: Pool = serde_json::from_value(serde_json::json!({
            "id": "p",
            "product": {"id": "1", "name": "n"},
            "quantity": 1
        }))
        .unwrap();
        assert!(!pool.is_derived());
        pool.attributes
            .insert(POOL_DERIVED_ATTRIBUTE.into(), "TRUE".into());
        assert!(pool.is_derived());
    }
}
