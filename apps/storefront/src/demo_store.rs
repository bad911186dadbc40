//! Self-contained in-memory entitlement store backing the demo shell.
//!
//! Stands in for the real store backend: a seeded catalog, entitlement
//! grants on purchase, scripted redemption tokens, and pushed snapshots for
//! out-of-band changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{stream::BoxStream, StreamExt};
use purchase_core::{EntitlementStore, RedemptionLink, RedemptionOutcome};
use shared::{
    domain::{
        CustomerSnapshot, Entitlement, EntitlementId, OfferingCatalog, ProductId, Purchasable,
    },
    error::{StoreError, StoreErrorKind},
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

const STORE_LATENCY: Duration = Duration::from_millis(250);
const ENTITLEMENT_PERIOD_DAYS: i64 = 30;

/// Scripted disposition for a seeded redemption token.
#[derive(Debug, Clone)]
pub enum TokenDisposition {
    Grants { product_id: ProductId },
    BelongsToOtherUser,
    Expired { obfuscated_email: String },
}

pub struct DemoEntitlementStore {
    api_key: String,
    entitlement_id: Option<EntitlementId>,
    catalog: OfferingCatalog,
    customer: Mutex<CustomerSnapshot>,
    redemption_tokens: Mutex<HashMap<String, TokenDisposition>>,
    updates: broadcast::Sender<CustomerSnapshot>,
}

impl DemoEntitlementStore {
    pub fn new(
        api_key: String,
        entitlement_id: Option<EntitlementId>,
        catalog: OfferingCatalog,
        redemption_tokens: HashMap<String, TokenDisposition>,
    ) -> Arc<Self> {
        let (updates, _) = broadcast::channel(16);
        let customer = CustomerSnapshot {
            app_user_id: format!("demo-user-{}", Uuid::new_v4()),
            entitlements: HashMap::new(),
            purchased_product_ids: HashSet::new(),
            request_date: Utc::now(),
        };
        Arc::new(Self {
            api_key,
            entitlement_id,
            catalog,
            customer: Mutex::new(customer),
            redemption_tokens: Mutex::new(redemption_tokens),
            updates,
        })
    }

    /// Pushes an out-of-band entitlement change, as a renewal would.
    pub async fn simulate_renewal(&self) {
        let snapshot = {
            let mut customer = self.customer.lock().await;
            for entitlement in customer.entitlements.values_mut() {
                if let Some(expires_at) = entitlement.expires_at.as_mut() {
                    *expires_at += chrono::Duration::days(ENTITLEMENT_PERIOD_DAYS);
                }
            }
            customer.request_date = Utc::now();
            customer.clone()
        };
        let _ = self.updates.send(snapshot);
    }

    fn ensure_configured(&self) -> Result<(), StoreError> {
        if self.api_key.trim().is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::Configuration,
                "no API key configured for the entitlement store",
            ));
        }
        Ok(())
    }

    fn product_available(&self, product_id: &ProductId) -> bool {
        self.catalog
            .offerings()
            .flat_map(|offering| offering.packages.iter())
            .any(|package| &package.product.id == product_id)
    }

    async fn grant(&self, product_id: &ProductId) -> CustomerSnapshot {
        let mut customer = self.customer.lock().await;
        customer.purchased_product_ids.insert(product_id.clone());
        if let Some(entitlement_id) = &self.entitlement_id {
            customer.entitlements.insert(
                entitlement_id.clone(),
                Entitlement {
                    id: entitlement_id.clone(),
                    is_active: true,
                    product_id: product_id.clone(),
                    expires_at: Some(Utc::now() + chrono::Duration::days(ENTITLEMENT_PERIOD_DAYS)),
                },
            );
        }
        customer.request_date = Utc::now();
        customer.clone()
    }
}

#[async_trait]
impl EntitlementStore for DemoEntitlementStore {
    async fn get_offerings(&self) -> Result<OfferingCatalog, StoreError> {
        self.ensure_configured()?;
        tokio::time::sleep(STORE_LATENCY).await;
        Ok(self.catalog.clone())
    }

    async fn purchase(&self, purchasable: &Purchasable) -> Result<CustomerSnapshot, StoreError> {
        self.ensure_configured()?;
        tokio::time::sleep(STORE_LATENCY).await;

        let product_id = purchasable.product_id();
        if !self.product_available(product_id) {
            return Err(StoreError::new(
                StoreErrorKind::StoreProblem,
                format!("product {product_id} is not available in the store"),
            ));
        }

        let transaction_id = Uuid::new_v4();
        info!(
            product_id = %product_id,
            transaction_id = %transaction_id,
            "demo store: purchase settled"
        );
        let snapshot = self.grant(product_id).await;
        let _ = self.updates.send(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_customer_info(&self) -> Result<CustomerSnapshot, StoreError> {
        self.ensure_configured()?;
        Ok(self.customer.lock().await.clone())
    }

    async fn redeem_web_purchase(&self, link: RedemptionLink) -> RedemptionOutcome {
        tokio::time::sleep(STORE_LATENCY).await;
        let disposition = self.redemption_tokens.lock().await.remove(link.token());
        match disposition {
            Some(TokenDisposition::Grants { product_id }) => {
                info!(product_id = %product_id, "demo store: web purchase redeemed");
                let snapshot = self.grant(&product_id).await;
                let _ = self.updates.send(snapshot.clone());
                RedemptionOutcome::Success { customer: snapshot }
            }
            Some(TokenDisposition::BelongsToOtherUser) => RedemptionOutcome::BelongsToOtherUser,
            Some(TokenDisposition::Expired { obfuscated_email }) => {
                RedemptionOutcome::Expired { obfuscated_email }
            }
            None => RedemptionOutcome::InvalidToken,
        }
    }

    fn customer_info_updates(&self) -> BoxStream<'static, CustomerSnapshot> {
        let stream = BroadcastStream::new(self.updates.subscribe())
            .filter_map(|update| async move { update.ok() });
        Box::pin(stream)
    }
}
