//! Observable state groups owned by the purchase session controller.
//!
//! `OfferingsState` and `RedemptionState` are closed unions so that exactly
//! one lifecycle stage is representable at a time; the purchase session is a
//! single struct because its fields change together under one guard.

use serde::{Deserialize, Serialize};
use shared::domain::{CustomerSnapshot, OfferingCatalog, ProductId};

/// Lifecycle of the offerings catalog fetch.
///
/// `Success` holds the last-known-good catalog across refreshes: a refresh
/// failure sets `refresh_error` without discarding the data, while an
/// initial-load failure (no prior data) lands in `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OfferingsState {
    Loading,
    Success {
        offerings: OfferingCatalog,
        is_refreshing: bool,
        refresh_error: Option<String>,
    },
    Error {
        message: String,
    },
}

/// In-flight purchase tracking. At most one purchase runs at a time;
/// `purchasing_product_id` is set exactly while `is_purchasing` is true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseSession {
    pub is_purchasing: bool,
    pub purchasing_product_id: Option<ProductId>,
    pub purchase_error: Option<String>,
}

/// Lifecycle of a web purchase redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RedemptionState {
    Idle,
    Redeeming,
    Success { message: String },
    Error { message: String },
    Expired { message: String },
}

/// Last received customer snapshot plus the derived subscription flag for
/// the configured entitlement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerState {
    pub snapshot: Option<CustomerSnapshot>,
    pub subscription_active: bool,
}

/// Per-product presentation state derived from the purchase session and the
/// customer snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchasableState {
    ReadyToPurchase,
    Purchasing,
    Purchased,
    PurchasingOtherProduct,
}
