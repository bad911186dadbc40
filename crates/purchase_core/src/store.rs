use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use shared::{
    domain::{CustomerSnapshot, OfferingCatalog, Purchasable},
    error::{StoreError, StoreErrorKind},
};

use crate::deep_link::RedemptionLink;

/// Result of redeeming a web purchase link.
///
/// A closed set rather than an error path: every way a redemption can end
/// is an outcome the caller maps to user-facing state.
#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionOutcome {
    Success { customer: CustomerSnapshot },
    Error { message: String },
    InvalidToken,
    BelongsToOtherUser,
    Expired { obfuscated_email: String },
}

/// Port to the entitlement backend: offerings, purchases, customer
/// snapshots, and web purchase redemption.
///
/// Implementations must be safe to call from multiple in-flight tasks.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn get_offerings(&self) -> Result<OfferingCatalog, StoreError>;

    /// Runs the purchase flow for a package or product. Fails with
    /// [`StoreErrorKind::UserCancelled`] when the user backs out.
    async fn purchase(&self, purchasable: &Purchasable) -> Result<CustomerSnapshot, StoreError>;

    async fn get_customer_info(&self) -> Result<CustomerSnapshot, StoreError>;

    async fn redeem_web_purchase(&self, link: RedemptionLink) -> RedemptionOutcome;

    /// Push channel for out-of-band entitlement changes (renewals,
    /// purchases made on other devices). One subscription per call.
    fn customer_info_updates(&self) -> BoxStream<'static, CustomerSnapshot>;
}

/// Placeholder store for controllers constructed without a backend.
pub struct MissingEntitlementStore;

#[async_trait]
impl EntitlementStore for MissingEntitlementStore {
    async fn get_offerings(&self) -> Result<OfferingCatalog, StoreError> {
        Err(unavailable("offerings query"))
    }

    async fn purchase(&self, purchasable: &Purchasable) -> Result<CustomerSnapshot, StoreError> {
        Err(unavailable(&format!(
            "purchase of product {}",
            purchasable.product_id()
        )))
    }

    async fn get_customer_info(&self) -> Result<CustomerSnapshot, StoreError> {
        Err(unavailable("customer info query"))
    }

    async fn redeem_web_purchase(&self, _link: RedemptionLink) -> RedemptionOutcome {
        RedemptionOutcome::Error {
            message: "entitlement store backend is unavailable".to_string(),
        }
    }

    fn customer_info_updates(&self) -> BoxStream<'static, CustomerSnapshot> {
        Box::pin(stream::empty())
    }
}

fn unavailable(operation: &str) -> StoreError {
    StoreError::new(
        StoreErrorKind::Configuration,
        format!("entitlement store backend is unavailable for {operation}"),
    )
}
