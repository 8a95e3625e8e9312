//! Subscription reconciliation.
//!
//! Upstream servers do not keep subscription ids stable between manifests.
//! Reconciliation maps each incoming upstream subscription onto an existing
//! local record so that local ids survive re-import. Records are grouped by
//! upstream pool id and groups never match across each other. Within a group:
//!
//! 1. [`MatchPass::Identity`]: same non-empty upstream entitlement id and
//!    upstream consumer id.
//! 2. [`MatchPass::Quantity`]: same quantity. Each incoming record takes the
//!    first remaining existing record in input order.
//! 3. [`MatchPass::Rank`]: the rest, both sides sorted by quantity descending
//!    (stable), paired by position.
//!
//! Incoming records left over keep their own id. Existing records left over
//! are not reported; retiring them is up to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::source::SubscriptionSource;

/// One upstream subscription as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Local id. Fresh for incoming records until reconciled.
    #[serde(default = "fresh_id")]
    pub id: String,
    #[serde(default)]
    pub upstream_pool_id: Option<String>,
    #[serde(default)]
    pub upstream_entitlement_id: Option<String>,
    #[serde(default)]
    pub upstream_consumer_id: Option<String>,
    pub quantity: i64,
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl SubscriptionRecord {
    pub fn new(id: impl Into<String>, upstream_pool_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            id: id.into(),
            upstream_pool_id: Some(upstream_pool_id.into()),
            upstream_entitlement_id: None,
            upstream_consumer_id: None,
            quantity,
        }
    }

    /// A freshly parsed record with a new random id.
    pub fn incoming(upstream_pool_id: impl Into<String>, quantity: i64) -> Self {
        Self::new(fresh_id(), upstream_pool_id, quantity)
    }

    pub fn with_upstream(
        mut self,
        entitlement_id: impl Into<String>,
        consumer_id: impl Into<String>,
    ) -> Self {
        self.upstream_entitlement_id = Some(entitlement_id.into());
        self.upstream_consumer_id = Some(consumer_id.into());
        self
    }

    fn group_key(&self) -> Option<&str> {
        present(&self.upstream_pool_id)
    }

    fn same_upstream(&self, other: &Self) -> bool {
        match (
            present(&self.upstream_entitlement_id),
            present(&self.upstream_consumer_id),
        ) {
            (Some(ent), Some(con)) => {
                present(&other.upstream_entitlement_id) == Some(ent)
                    && present(&other.upstream_consumer_id) == Some(con)
            }
            _ => false,
        }
    }
}

/// Which pass matched an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPass {
    Identity,
    Quantity,
    Rank,
}

/// Outcome for one incoming record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "lowercase")]
pub enum Resolution {
    /// Takes over the id of an existing record.
    Inherited { id: String, pass: MatchPass },
    /// A genuinely new subscription; keeps its own id.
    New { id: String },
}

impl Resolution {
    pub fn id(&self) -> &str {
        match self {
            Self::Inherited { id, .. } | Self::New { id } => id,
        }
    }

    pub fn pass(&self) -> Option<MatchPass> {
        match self {
            Self::Inherited { pass, .. } => Some(*pass),
            Self::New { .. } => None,
        }
    }
}

/// Resolved id for every incoming record, by incoming index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reconciliation {
    resolutions: Vec<Resolution>,
}

impl Reconciliation {
    pub fn get(&self, index: usize) -> Option<&Resolution> {
        self.resolutions.get(index)
    }

    /// Resolved id of the incoming record at `index`.
    pub fn id(&self, index: usize) -> Option<&str> {
        self.get(index).map(Resolution::id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Resolution)> + '_ {
        self.resolutions.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    /// Number of incoming records matched by `pass`.
    pub fn count(&self, pass: MatchPass) -> usize {
        self.resolutions
            .iter()
            .filter(|r| r.pass() == Some(pass))
            .count()
    }

    /// Write resolved ids back onto the incoming records they were computed for.
    pub fn apply(&self, incoming: &mut [SubscriptionRecord]) {
        for (record, resolution) in incoming.iter_mut().zip(&self.resolutions) {
            record.id = resolution.id().to_string();
        }
    }
}

/// Match `incoming` against `existing`. Pure and infallible.
pub fn reconcile(existing: &[SubscriptionRecord], incoming: &[SubscriptionRecord]) -> Reconciliation {
    let mut resolutions: Vec<Resolution> = incoming
        .iter()
        .map(|r| Resolution::New { id: r.id.clone() })
        .collect();

    let existing_groups = group(existing);
    for (key, incoming_group) in group(incoming) {
        let Some(existing_group) = existing_groups.get(&key) else {
            debug!(
                "No existing records for upstream pool {}",
                key.unwrap_or("<none>")
            );
            continue;
        };
        match_group(
            existing,
            existing_group.clone(),
            incoming,
            &incoming_group,
            &mut resolutions,
        );
    }

    let reconciliation = Reconciliation { resolutions };
    debug!(
        identity = reconciliation.count(MatchPass::Identity),
        quantity = reconciliation.count(MatchPass::Quantity),
        rank = reconciliation.count(MatchPass::Rank),
        incoming = incoming.len(),
        "Reconciled subscriptions"
    );
    reconciliation
}

fn group(records: &[SubscriptionRecord]) -> BTreeMap<Option<&str>, Vec<usize>> {
    let mut groups: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        groups.entry(record.group_key()).or_default().push(index);
    }
    groups
}

fn match_group(
    existing: &[SubscriptionRecord],
    mut free: Vec<usize>,
    incoming: &[SubscriptionRecord],
    incoming_group: &[usize],
    resolutions: &mut [Resolution],
) {
    let mut inherit = |i: usize, e: usize, pass: MatchPass| {
        resolutions[i] = Resolution::Inherited {
            id: existing[e].id.clone(),
            pass,
        };
    };

    let mut unmatched = Vec::new();
    for &i in incoming_group {
        match free.iter().position(|&e| incoming[i].same_upstream(&existing[e])) {
            Some(pos) => inherit(i, free.remove(pos), MatchPass::Identity),
            None => unmatched.push(i),
        }
    }

    let mut remaining = Vec::new();
    for i in unmatched {
        match free
            .iter()
            .position(|&e| existing[e].quantity == incoming[i].quantity)
        {
            Some(pos) => inherit(i, free.remove(pos), MatchPass::Quantity),
            None => remaining.push(i),
        }
    }

    free.sort_by(|a, b| existing[*b].quantity.cmp(&existing[*a].quantity));
    remaining.sort_by(|a, b| incoming[*b].quantity.cmp(&incoming[*a].quantity));
    for (&e, &i) in free.iter().zip(&remaining) {
        inherit(i, e, MatchPass::Rank);
    }
}

/// Reconciles an owner's incoming subscriptions against what the source holds.
#[derive(Debug, Clone)]
pub struct SubscriptionReconciler<S> {
    source: S,
}

impl<S: SubscriptionSource> SubscriptionReconciler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn reconcile(&self, owner_key: &str, incoming: &[SubscriptionRecord]) -> Reconciliation {
        let existing = self.source.existing_subscriptions(owner_key);
        debug!(
            owner = owner_key,
            existing = existing.len(),
            incoming = incoming.len(),
            "Reconciling subscriptions"
        );
        reconcile(&existing, incoming)
    }
}
