use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(OfferingId);
id_newtype!(PackageId);
id_newtype!(ProductId);
id_newtype!(EntitlementId);

/// The underlying billable SKU (subscription or one-time item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
}

/// A purchasable wrapper around a single product within an offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub product: Product,
}

/// A named bundle of purchasable packages presented to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub packages: Vec<Package>,
}

/// Ordered mapping from offering id to offering.
///
/// Iteration order is catalog order (insertion order); offering ids are
/// unique within the catalog. Catalog order defines which occurrence of a
/// product wins when flattened listings de-duplicate by product id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferingCatalog {
    offerings: Vec<Offering>,
}

impl OfferingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_offerings(offerings: impl IntoIterator<Item = Offering>) -> Self {
        let mut catalog = Self::new();
        for offering in offerings {
            catalog.insert(offering);
        }
        catalog
    }

    /// Inserts an offering. An offering with the same id is replaced in
    /// place, keeping its catalog position.
    pub fn insert(&mut self, offering: Offering) {
        if let Some(existing) = self
            .offerings
            .iter_mut()
            .find(|existing| existing.id == offering.id)
        {
            *existing = offering;
        } else {
            self.offerings.push(offering);
        }
    }

    pub fn get(&self, id: &OfferingId) -> Option<&Offering> {
        self.offerings.iter().find(|offering| &offering.id == id)
    }

    pub fn offerings(&self) -> impl Iterator<Item = &Offering> {
        self.offerings.iter()
    }

    pub fn len(&self) -> usize {
        self.offerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offerings.is_empty()
    }
}

/// A named access right granted to a customer upon qualifying purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: EntitlementId,
    pub is_active: bool,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a customer's entitlements and purchase history,
/// as resolved by the entitlement store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub app_user_id: String,
    pub entitlements: HashMap<EntitlementId, Entitlement>,
    pub purchased_product_ids: HashSet<ProductId>,
    pub request_date: DateTime<Utc>,
}

impl CustomerSnapshot {
    pub fn entitlement_active(&self, id: &EntitlementId) -> bool {
        self.entitlements
            .get(id)
            .is_some_and(|entitlement| entitlement.is_active)
    }

    pub fn has_purchased(&self, product_id: &ProductId) -> bool {
        self.purchased_product_ids.contains(product_id)
    }
}

/// Either side of the purchase entry points: a package out of an offering,
/// or a product purchased directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Purchasable {
    Package(Package),
    Product(Product),
}

impl Purchasable {
    pub fn product(&self) -> &Product {
        match self {
            Purchasable::Package(package) => &package.product,
            Purchasable::Product(product) => product,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product().id
    }
}

impl From<Package> for Purchasable {
    fn from(package: Package) -> Self {
        Purchasable::Package(package)
    }
}

impl From<Product> for Purchasable {
    fn from(product: Product) -> Self {
        Purchasable::Product(product)
    }
}
