use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use shared::domain::{CustomerSnapshot, EntitlementId, Offering, Product, ProductId, Purchasable};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

pub mod deep_link;
pub mod state;
pub mod store;

pub use deep_link::RedemptionLink;
pub use state::{
    CustomerState, OfferingsState, PurchasableState, PurchaseSession, RedemptionState,
};
pub use store::{EntitlementStore, MissingEntitlementStore, RedemptionOutcome};

/// Mediates between UI commands and the entitlement store.
///
/// Owns the observable state for the offerings catalog, the in-flight
/// purchase session, the redemption lifecycle, and the customer entitlement
/// snapshot. Every store failure is converted into a state transition at
/// this boundary; no operation propagates an error to its caller, and every
/// state remains retriable.
///
/// Each state group lives in its own watch cell, so a transition is an
/// atomic read-modify-write and observers never see a partial update.
pub struct PurchaseSessionController {
    store: Arc<dyn EntitlementStore>,
    entitlement_id: Option<EntitlementId>,
    offerings: watch::Sender<OfferingsState>,
    purchase_session: watch::Sender<PurchaseSession>,
    redemption: watch::Sender<RedemptionState>,
    customer: watch::Sender<CustomerState>,
    updates_task: Mutex<Option<JoinHandle<()>>>,
}

impl PurchaseSessionController {
    /// `entitlement_id` selects which entitlement drives the derived
    /// subscription flag; with `None` the flag stays false.
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        entitlement_id: Option<EntitlementId>,
    ) -> Arc<Self> {
        let (offerings, _) = watch::channel(OfferingsState::Loading);
        let (purchase_session, _) = watch::channel(PurchaseSession::default());
        let (redemption, _) = watch::channel(RedemptionState::Idle);
        let (customer, _) = watch::channel(CustomerState::default());
        Arc::new(Self {
            store,
            entitlement_id,
            offerings,
            purchase_session,
            redemption,
            customer,
            updates_task: Mutex::new(None),
        })
    }

    /// Fetches the initial customer snapshot and subscribes to pushed
    /// snapshot updates for the controller's lifetime.
    ///
    /// An initial fetch failure is tolerated: the update subscription
    /// delivers the next snapshot.
    pub async fn start(self: &Arc<Self>) {
        match self.store.get_customer_info().await {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(err) => {
                warn!("customer: initial snapshot fetch failed: {err}");
            }
        }

        let mut updates = self.store.customer_info_updates();
        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(snapshot) = updates.next().await {
                controller.apply_snapshot(snapshot);
            }
        });

        let previous = self.updates_task.lock().await.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stops the customer update subscription.
    pub async fn shutdown(&self) {
        if let Some(task) = self.updates_task.lock().await.take() {
            task.abort();
        }
    }

    /// Fetches the offerings catalog.
    ///
    /// With a catalog already loaded this is a refresh: the existing data
    /// stays visible behind `is_refreshing`, and a failure lands in
    /// `refresh_error` instead of discarding it. Concurrent calls are not
    /// guarded; the last completion wins.
    pub async fn fetch_offerings(&self) {
        let previous = self.offerings.borrow().clone();
        match &previous {
            OfferingsState::Success { offerings, .. } => {
                self.offerings.send_replace(OfferingsState::Success {
                    offerings: offerings.clone(),
                    is_refreshing: true,
                    refresh_error: None,
                });
            }
            _ => {
                self.offerings.send_replace(OfferingsState::Loading);
            }
        }

        debug!("offerings: fetch started");
        match self.store.get_offerings().await {
            Ok(catalog) => {
                if catalog.is_empty() {
                    warn!("offerings: store returned an empty catalog");
                }
                debug!(count = catalog.len(), "offerings: fetch succeeded");
                self.offerings.send_replace(OfferingsState::Success {
                    offerings: catalog,
                    is_refreshing: false,
                    refresh_error: None,
                });
            }
            Err(err) => {
                error!("offerings: fetch failed: {err}");
                let message = format!("Failed to fetch offerings: {err}");
                let next = match previous {
                    OfferingsState::Success { offerings, .. } => OfferingsState::Success {
                        offerings,
                        is_refreshing: false,
                        refresh_error: Some(message),
                    },
                    _ => OfferingsState::Error { message },
                };
                self.offerings.send_replace(next);
            }
        }
    }

    /// Runs the purchase flow for a package or product.
    ///
    /// At most one purchase is in flight per controller; while one is, the
    /// call is a silent no-op and the store is not invoked. The guard is a
    /// single compare-and-swap on the purchase cell. A user-cancelled
    /// purchase is not an error and leaves `purchase_error` untouched.
    pub async fn purchase(&self, purchasable: impl Into<Purchasable>) {
        let purchasable = purchasable.into();
        let product_id = purchasable.product_id().clone();

        let mut claimed = false;
        self.purchase_session.send_if_modified(|session| {
            if session.is_purchasing {
                return false;
            }
            session.is_purchasing = true;
            session.purchasing_product_id = Some(product_id.clone());
            session.purchase_error = None;
            claimed = true;
            true
        });
        if !claimed {
            debug!(product_id = %product_id, "purchase: skipped, another purchase is in flight");
            return;
        }

        info!(product_id = %product_id, "purchase: started");
        match self.store.purchase(&purchasable).await {
            Ok(snapshot) => {
                info!(product_id = %product_id, "purchase: completed");
                self.apply_snapshot(snapshot);
            }
            Err(err) if err.is_user_cancelled() => {
                debug!(product_id = %product_id, "purchase: cancelled by user");
            }
            Err(err) => {
                error!(product_id = %product_id, "purchase: failed: {err}");
                let message = format!("Purchase failed: {err}");
                self.purchase_session
                    .send_modify(|session| session.purchase_error = Some(message));
            }
        }

        self.purchase_session.send_modify(|session| {
            session.is_purchasing = false;
            session.purchasing_product_id = None;
        });
    }

    /// Forwards an inbound platform deep link. Anything that is not a
    /// redemption link is ignored.
    pub async fn handle_deep_link(&self, raw_url: &str) {
        let Some(link) = RedemptionLink::from_url(raw_url) else {
            return;
        };
        self.redeem_web_purchase(link).await;
    }

    /// Redeems a web purchase and maps each store outcome onto its terminal
    /// redemption state.
    pub async fn redeem_web_purchase(&self, link: RedemptionLink) {
        debug!("redemption: started");
        self.redemption.send_replace(RedemptionState::Redeeming);

        let next = match self.store.redeem_web_purchase(link).await {
            RedemptionOutcome::Success { customer } => {
                info!("redemption: succeeded");
                self.apply_snapshot(customer);
                RedemptionState::Success {
                    message: "Purchase redeemed successfully".to_string(),
                }
            }
            RedemptionOutcome::Error { message } => {
                error!("redemption: failed: {message}");
                RedemptionState::Error {
                    message: format!("Redemption failed: {message}"),
                }
            }
            RedemptionOutcome::InvalidToken => {
                error!("redemption: failed: invalid token");
                RedemptionState::Error {
                    message: "Redemption failed: the redemption token is invalid".to_string(),
                }
            }
            RedemptionOutcome::BelongsToOtherUser => {
                error!("redemption: failed: purchase belongs to another user");
                RedemptionState::Error {
                    message: "Redemption failed: this purchase belongs to another user"
                        .to_string(),
                }
            }
            RedemptionOutcome::Expired { obfuscated_email } => {
                warn!("redemption: link expired, new link sent to {obfuscated_email}");
                RedemptionState::Expired {
                    message: format!(
                        "Redemption link expired, a new one was sent to {obfuscated_email}"
                    ),
                }
            }
        };

        self.redemption.send_replace(next);
    }

    /// Returns the redemption lifecycle to idle, from any variant. Called
    /// by the UI after a terminal message has been shown once.
    pub fn clear_redemption_state(&self) {
        self.redemption.send_replace(RedemptionState::Idle);
    }

    /// Clears a refresh error without touching the catalog. Leaves
    /// `Loading` and `Error` states as they are.
    pub fn clear_refresh_error(&self) {
        self.offerings.send_if_modified(|state| match state {
            OfferingsState::Success { refresh_error, .. } if refresh_error.is_some() => {
                *refresh_error = None;
                true
            }
            _ => false,
        });
    }

    pub fn clear_purchase_error(&self) {
        self.purchase_session.send_if_modified(|session| {
            if session.purchase_error.is_none() {
                return false;
            }
            session.purchase_error = None;
            true
        });
    }

    /// Whether the product appears in the last customer snapshot's purchase
    /// history. False until a snapshot has been received.
    pub fn is_product_purchased(&self, product_id: &ProductId) -> bool {
        self.customer
            .borrow()
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.has_purchased(product_id))
    }

    /// The loaded offerings in catalog order; empty while no catalog is
    /// loaded.
    pub fn offerings_list(&self) -> Vec<Offering> {
        match &*self.offerings.borrow() {
            OfferingsState::Success { offerings, .. } => offerings.offerings().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// All products across all offerings, de-duplicated by product id. The
    /// first occurrence in catalog order wins.
    pub fn all_products(&self) -> Vec<Product> {
        let state = self.offerings.borrow().clone();
        let OfferingsState::Success { offerings, .. } = state else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut products = Vec::new();
        for offering in offerings.offerings() {
            for package in &offering.packages {
                if seen.insert(package.product.id.clone()) {
                    products.push(package.product.clone());
                }
            }
        }
        products
    }

    /// Presentation state for one product given the purchase session and
    /// the purchase history.
    pub fn purchasable_state(&self, product_id: &ProductId) -> PurchasableState {
        if self.is_product_purchased(product_id) {
            return PurchasableState::Purchased;
        }

        let session = self.purchase_session.borrow().clone();
        if !session.is_purchasing {
            return PurchasableState::ReadyToPurchase;
        }
        if session.purchasing_product_id.as_ref() == Some(product_id) {
            PurchasableState::Purchasing
        } else {
            PurchasableState::PurchasingOtherProduct
        }
    }

    pub fn subscription_active(&self) -> bool {
        self.customer.borrow().subscription_active
    }

    pub fn subscribe_offerings(&self) -> watch::Receiver<OfferingsState> {
        self.offerings.subscribe()
    }

    pub fn subscribe_purchase_session(&self) -> watch::Receiver<PurchaseSession> {
        self.purchase_session.subscribe()
    }

    pub fn subscribe_redemption(&self) -> watch::Receiver<RedemptionState> {
        self.redemption.subscribe()
    }

    pub fn subscribe_customer(&self) -> watch::Receiver<CustomerState> {
        self.customer.subscribe()
    }

    pub fn offerings_state(&self) -> OfferingsState {
        self.offerings.borrow().clone()
    }

    pub fn purchase_session(&self) -> PurchaseSession {
        self.purchase_session.borrow().clone()
    }

    pub fn redemption_state(&self) -> RedemptionState {
        self.redemption.borrow().clone()
    }

    pub fn customer_state(&self) -> CustomerState {
        self.customer.borrow().clone()
    }

    fn apply_snapshot(&self, snapshot: CustomerSnapshot) {
        let subscription_active = self
            .entitlement_id
            .as_ref()
            .is_some_and(|id| snapshot.entitlement_active(id));
        debug!(
            app_user_id = %snapshot.app_user_id,
            subscription_active,
            "customer: snapshot applied"
        );
        self.customer.send_replace(CustomerState {
            snapshot: Some(snapshot),
            subscription_active,
        });
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
