//! Collaborator seams for export and reconciliation.
//!
//! Persistence and the rules engine live outside this crate. Export reads
//! through [`ManifestSource`] and asks [`ExportRules`] whether an entitlement
//! may leave the server; reconciliation pre-fetches existing records through
//! [`SubscriptionSource`]. [`Snapshot`] is an in-memory source backed by a
//! JSON document, used by the CLI and by tests.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::model::{
    Cdn, Certificate, Consumer, ConsumerType, DistributorVersion, Entitlement, ProductCertificate,
    Rules,
};
use crate::reconcile::SubscriptionRecord;

/// Lookups needed to export a consumer.
pub trait ManifestSource {
    /// Entitlements held by the consumer, with their certificates.
    fn entitlements(&self, consumer: &Consumer) -> anyhow::Result<Vec<Entitlement>>;

    fn consumer_types(&self) -> anyhow::Result<Vec<ConsumerType>>;

    fn distributor_versions(&self) -> anyhow::Result<Vec<DistributorVersion>>;

    fn cdns(&self) -> anyhow::Result<Vec<Cdn>>;

    /// The rule set currently in force.
    fn rules(&self) -> anyhow::Result<Rules>;

    /// Certificate for an engineering product, if the product service issues one.
    fn product_certificate(
        &self,
        owner_key: &str,
        product_id: &str,
    ) -> anyhow::Result<Option<ProductCertificate>>;

    /// Content access certificate, present only for owners in content access mode.
    fn content_access_certificate(&self, consumer: &Consumer)
        -> anyhow::Result<Option<Certificate>>;
}

/// Decides whether an entitlement may appear in a manifest.
pub trait ExportRules {
    fn can_export(&self, entitlement: &Entitlement) -> bool;
}

impl<F> ExportRules for F
where
    F: Fn(&Entitlement) -> bool,
{
    fn can_export(&self, entitlement: &Entitlement) -> bool {
        self(entitlement)
    }
}

/// Every entitlement is exportable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ExportRules for AllowAll {
    fn can_export(&self, _entitlement: &Entitlement) -> bool {
        true
    }
}

/// Entitlements from derived pools stay on the server that derived them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipDerivedPools;

impl ExportRules for SkipDerivedPools {
    fn can_export(&self, entitlement: &Entitlement) -> bool {
        !entitlement.pool.is_derived()
    }
}

/// Pre-fetches an owner's subscription-backed records.
pub trait SubscriptionSource {
    fn existing_subscriptions(&self, owner_key: &str) -> Vec<SubscriptionRecord>;
}

impl SubscriptionSource for BTreeMap<String, Vec<SubscriptionRecord>> {
    fn existing_subscriptions(&self, owner_key: &str) -> Vec<SubscriptionRecord> {
        self.get(owner_key).cloned().unwrap_or_default()
    }
}

/// A consumer and its surrounding server state, loaded from JSON.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub consumer: Consumer,
    #[serde(default)]
    pub consumer_types: Vec<ConsumerType>,
    #[serde(default)]
    pub distributor_versions: Vec<DistributorVersion>,
    #[serde(default)]
    pub cdns: Vec<Cdn>,
    #[serde(default)]
    pub rules: Rules,
    /// Product certificates keyed by product id.
    #[serde(default)]
    pub product_certificates: BTreeMap<String, ProductCertificate>,
    #[serde(default)]
    pub content_access_certificate: Option<Certificate>,
}

impl Snapshot {
    pub fn new(consumer: Consumer) -> Self {
        Self {
            consumer,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("invalid snapshot {}", path.display()))
    }
}

impl ManifestSource for Snapshot {
    fn entitlements(&self, consumer: &Consumer) -> anyhow::Result<Vec<Entitlement>> {
        if consumer.uuid != self.consumer.uuid {
            anyhow::bail!("consumer {} is not part of this snapshot", consumer.uuid);
        }
        Ok(self.consumer.entitlements.clone())
    }

    fn consumer_types(&self) -> anyhow::Result<Vec<ConsumerType>> {
        Ok(self.consumer_types.clone())
    }

    fn distributor_versions(&self) -> anyhow::Result<Vec<DistributorVersion>> {
        Ok(self.distributor_versions.clone())
    }

    fn cdns(&self) -> anyhow::Result<Vec<Cdn>> {
        Ok(self.cdns.clone())
    }

    fn rules(&self) -> anyhow::Result<Rules> {
        Ok(self.rules.clone())
    }

    fn product_certificate(
        &self,
        _owner_key: &str,
        product_id: &str,
    ) -> anyhow::Result<Option<ProductCertificate>> {
        Ok(self.product_certificates.get(product_id).cloned())
    }

    fn content_access_certificate(
        &self,
        _consumer: &Consumer,
    ) -> anyhow::Result<Option<Certificate>> {
        Ok(self.content_access_certificate.clone())
    }
}
