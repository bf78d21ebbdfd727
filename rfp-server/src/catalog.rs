use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use shared_types::Product;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("product catalog unavailable: {0}")]
    Unavailable(String),
}

/// Source of products the technical stage matches requirements against.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn list_catalog(&self) -> Result<Vec<Product>, CatalogError>;
}

pub type SharedProductCatalog = Arc<dyn ProductCatalog>;

/// Fixed in-process catalog.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    products: Vec<Product>,
}

impl StaticCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The five stock industrial products.
    pub fn standard() -> Self {
        Self::new(vec![
            product(
                "PUMP-2847",
                "Industrial Centrifugal Pump",
                "High-performance centrifugal pump for industrial applications. Flow rate up to 500 GPM, pressure rating 150 PSI.",
                "Pumps",
                &[
                    ("flowRate", "500 GPM"),
                    ("pressure", "150 PSI"),
                    ("material", "Stainless Steel 316"),
                ],
            ),
            product(
                "VALVE-1842",
                "Hydraulic Control Valve",
                "Precision hydraulic valve with electronic controls. Suitable for high-pressure applications.",
                "Valves",
                &[
                    ("pressure", "200 PSI"),
                    ("material", "Stainless Steel 304"),
                    ("control", "Electronic"),
                ],
            ),
            product(
                "BEARING-3921",
                "Precision Bearing Assembly",
                "High-precision bearing for industrial machinery. Low friction, high load capacity.",
                "Bearings",
                &[
                    ("loadCapacity", "5000 lbs"),
                    ("material", "Hardened Steel"),
                    ("precision", "ABEC-7"),
                ],
            ),
            product(
                "GEARBOX-5624",
                "Helical Gearbox",
                "Precision helical gearbox for power transmission. Multiple gear ratios available.",
                "Gearboxes",
                &[
                    ("ratio", "10:1"),
                    ("torque", "500 Nm"),
                    ("efficiency", "96%"),
                ],
            ),
            product(
                "MOTOR-8473",
                "Industrial Electric Motor",
                "Three-phase electric motor for industrial applications. Energy efficient design.",
                "Motors",
                &[
                    ("power", "10 HP"),
                    ("voltage", "480V"),
                    ("efficiency", "IE3"),
                ],
            ),
        ])
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn list_catalog(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.clone())
    }
}

fn product(
    sku: &str,
    name: &str,
    description: &str,
    category: &str,
    specifications: &[(&str, &str)],
) -> Product {
    Product {
        sku: sku.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        specifications: specifications
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}
