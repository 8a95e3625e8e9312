use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{ExportError, ExportResult};
use crate::model::{Entitlement, Product};
use crate::source::ManifestSource;
use crate::writer::{write_export, FileExport};

use super::{record_path, PRODUCTS_DIR};

/// Every product reachable from the entitlements, keyed by product id.
///
/// Covers each pool's main product, its provided products at any depth, and
/// the derived product with its own provided products. When two entitlements
/// reference the same id, the first occurrence is kept.
pub fn product_closure(entitlements: &[Entitlement]) -> BTreeMap<&str, &Product> {
    let mut products = BTreeMap::new();
    for entitlement in entitlements {
        let product = &entitlement.pool.product;
        products.entry(product.id.as_str()).or_insert(product);
        add_provided(product, &mut products);

        if let Some(derived) = product.derived_product.as_deref() {
            products.entry(derived.id.as_str()).or_insert(derived);
            add_provided(derived, &mut products);
        }
    }
    products
}

fn add_provided<'a>(product: &'a Product, products: &mut BTreeMap<&'a str, &'a Product>) {
    for provided in &product.provided_products {
        products.entry(provided.id.as_str()).or_insert(provided);
        add_provided(provided, products);
    }
}

/// `products/{id}.json` for the closure, plus `products/{id}.pem` for
/// engineering products whose certificate the source can supply.
pub fn write_products(
    entitlements: &[Entitlement],
    owner_key: &str,
    source: &dyn ManifestSource,
    export_dir: &Path,
) -> ExportResult<()> {
    let dir = export_dir.join(PRODUCTS_DIR);
    for (id, product) in product_closure(entitlements) {
        write_export(&record_path(&dir, id, "json")?, &FileExport::json(product)?)?;

        if !product.is_engineering() {
            continue;
        }
        let cert = source
            .product_certificate(owner_key, id)
            .map_err(|e| ExportError::lookup(format!("product certificate {id}"), e))?;
        match cert {
            Some(cert) => {
                write_export(&record_path(&dir, id, "pem")?, &FileExport::text(cert.cert))?;
            }
            None => debug!("No certificate for product {id}, skipping"),
        }
    }
    Ok(())
}
