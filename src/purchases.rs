//! Product catalog and entitlement tracking.
//!
//! The store itself sits behind [`PurchaseProvider`]. The
//! [`EntitlementManager`] caches the catalog, derives the
//! [`EntitlementState`] from the verified product ids and publishes it
//! through a `watch` channel so every [`EntitlementHandle`] sees the latest
//! state without querying the provider.

use crate::{
    config::settings::PurchaseSettings,
    core::entitlement::{
        EntitlementState, LIFETIME_PRODUCT_ID, MONTHLY_PRODUCT_ID, PRODUCT_IDS, WEEKLY_PRODUCT_ID,
        YEARLY_PRODUCT_ID,
    },
    errors::{Error, Result},
    events::{ChangeEvent, EventBus},
};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

/// Billing period of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPeriod {
    /// Renews every week
    Weekly,
    /// Renews every month
    Monthly,
    /// Renews every year
    Yearly,
}

/// A purchasable product.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Store product id
    pub id: String,
    /// Name shown to the user
    pub display_name: String,
    /// Price in the store currency
    pub price: f64,
    /// `None` for one-time purchases
    pub period: Option<SubscriptionPeriod>,
}

impl Product {
    fn new(id: &str, display_name: &str, price: f64, period: Option<SubscriptionPeriod>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            price,
            period,
        }
    }

    /// Whether the product is a one-time purchase.
    #[must_use]
    pub const fn is_lifetime(&self) -> bool {
        self.period.is_none()
    }
}

/// Result of a purchase attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Verified purchase of the given product
    Purchased {
        /// Purchased product id
        product_id: String,
    },
    /// The user backed out
    Cancelled,
    /// Awaiting approval outside the app
    Pending,
}

/// The store backend.
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    /// Looks up the products with the given ids. Unknown ids are left out.
    async fn products(&self, ids: &[&str]) -> Result<Vec<Product>>;

    /// Product ids with a verified, currently active entitlement.
    async fn current_entitlements(&self) -> Result<Vec<String>>;

    /// Starts a purchase.
    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome>;
}

/// In-process provider with a fixed catalog, used by the binary and tests.
#[derive(Debug)]
pub struct StaticPurchaseProvider {
    catalog: Vec<Product>,
    owned: RwLock<BTreeSet<String>>,
}

impl StaticPurchaseProvider {
    /// Creates a provider with the given catalog and initially owned ids.
    #[must_use]
    pub fn new<I>(catalog: Vec<Product>, owned: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            catalog,
            owned: RwLock::new(owned.into_iter().collect()),
        }
    }

    /// The default catalog with the owned products from `[purchases]`.
    #[must_use]
    pub fn from_settings(settings: &PurchaseSettings) -> Self {
        Self::new(default_catalog(), settings.owned_products.iter().cloned())
    }
}

/// The four products the app sells.
#[must_use]
pub fn default_catalog() -> Vec<Product> {
    vec![
        Product::new(
            YEARLY_PRODUCT_ID,
            "Think Twice Yearly",
            19.99,
            Some(SubscriptionPeriod::Yearly),
        ),
        Product::new(LIFETIME_PRODUCT_ID, "Think Twice Lifetime", 49.99, None),
        Product::new(
            WEEKLY_PRODUCT_ID,
            "Think Twice Weekly",
            0.99,
            Some(SubscriptionPeriod::Weekly),
        ),
        Product::new(
            MONTHLY_PRODUCT_ID,
            "Think Twice Monthly",
            2.99,
            Some(SubscriptionPeriod::Monthly),
        ),
    ]
}

#[async_trait]
impl PurchaseProvider for StaticPurchaseProvider {
    async fn products(&self, ids: &[&str]) -> Result<Vec<Product>> {
        Ok(self
            .catalog
            .iter()
            .filter(|p| ids.contains(&p.id.as_str()))
            .cloned()
            .collect())
    }

    async fn current_entitlements(&self) -> Result<Vec<String>> {
        Ok(self.owned.read().await.iter().cloned().collect())
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome> {
        if !self.catalog.iter().any(|p| p.id == product_id) {
            return Err(Error::PurchaseProvider {
                message: format!("Unknown product: {product_id}"),
            });
        }

        self.owned.write().await.insert(product_id.to_string());
        Ok(PurchaseOutcome::Purchased {
            product_id: product_id.to_string(),
        })
    }
}

/// Read side of the entitlement state.
#[derive(Debug, Clone)]
pub struct EntitlementHandle {
    rx: watch::Receiver<EntitlementState>,
}

impl EntitlementHandle {
    /// A handle that always reports `state`.
    #[must_use]
    pub fn fixed(state: EntitlementState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    /// The latest published state.
    #[must_use]
    pub fn current(&self) -> EntitlementState {
        self.rx.borrow().clone()
    }

    /// Waits for the next state change. Returns `false` once the manager is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

fn by_price(a: &Product, b: &Product) -> Ordering {
    a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal)
}

/// Caches the catalog and keeps the entitlement state current.
pub struct EntitlementManager {
    provider: Arc<dyn PurchaseProvider>,
    bus: EventBus,
    products: RwLock<Vec<Product>>,
    state: watch::Sender<EntitlementState>,
}

impl EntitlementManager {
    /// Creates a manager starting from the free tier state.
    #[must_use]
    pub fn new(provider: Arc<dyn PurchaseProvider>, bus: EventBus) -> Self {
        let (state, _rx) = watch::channel(EntitlementState::free());
        Self {
            provider,
            bus,
            products: RwLock::new(Vec::new()),
            state,
        }
    }

    /// A new read handle on the entitlement state.
    #[must_use]
    pub fn handle(&self) -> EntitlementHandle {
        EntitlementHandle {
            rx: self.state.subscribe(),
        }
    }

    /// The latest entitlement state.
    #[must_use]
    pub fn current(&self) -> EntitlementState {
        self.state.borrow().clone()
    }

    /// Loads the catalog, cheapest first. On error the previous catalog is kept.
    pub async fn load_products(&self) -> Result<usize> {
        let mut products = self
            .provider
            .products(&PRODUCT_IDS)
            .await
            .inspect_err(|e| warn!("Failed to load products: {e}"))?;
        products.sort_by(by_price);

        let mut cache = self.products.write().await;
        *cache = products;
        info!("Loaded {} products", cache.len());
        Ok(cache.len())
    }

    /// The cached catalog.
    pub async fn products(&self) -> Vec<Product> {
        self.products.read().await.clone()
    }

    /// Re-reads the verified entitlements. On error the previous state is kept.
    ///
    /// Publishes [`ChangeEvent::EntitlementsChanged`] when the state differs.
    pub async fn refresh(&self) -> Result<EntitlementState> {
        let ids = self
            .provider
            .current_entitlements()
            .await
            .inspect_err(|e| warn!("Failed to refresh entitlements: {e}"))?;

        let state = EntitlementState::from_purchased(ids);
        let previous = self.state.send_replace(state.clone());

        if previous == state {
            debug!("Entitlements unchanged");
        } else {
            info!(
                "Entitlements updated: premium = {}, products = {:?}",
                state.is_premium(),
                state.purchased_product_ids
            );
            self.bus.publish(ChangeEvent::EntitlementsChanged);
        }

        Ok(state)
    }

    /// Purchases a product and refreshes the state on success.
    pub async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome> {
        let outcome = self.provider.purchase(product_id).await?;
        if matches!(outcome, PurchaseOutcome::Purchased { .. }) {
            self.refresh().await?;
        }
        Ok(outcome)
    }

    /// Re-syncs purchases made elsewhere.
    pub async fn restore(&self) -> Result<EntitlementState> {
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    struct FlakyProvider {
        inner: StaticPurchaseProvider,
        fail: AtomicBool,
    }

    #[async_trait]
    impl PurchaseProvider for FlakyProvider {
        async fn products(&self, ids: &[&str]) -> Result<Vec<Product>> {
            if self.fail.load(AtomicOrdering::SeqCst) {
                return Err(Error::PurchaseProvider {
                    message: "store unavailable".to_string(),
                });
            }
            self.inner.products(ids).await
        }

        async fn current_entitlements(&self) -> Result<Vec<String>> {
            if self.fail.load(AtomicOrdering::SeqCst) {
                return Err(Error::PurchaseProvider {
                    message: "store unavailable".to_string(),
                });
            }
            self.inner.current_entitlements().await
        }

        async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome> {
            self.inner.purchase(product_id).await
        }
    }

    fn manager_with(owned: &[&str]) -> (EntitlementManager, EventBus) {
        let bus = EventBus::new(8);
        let provider = StaticPurchaseProvider::new(
            default_catalog(),
            owned.iter().map(ToString::to_string),
        );
        (EntitlementManager::new(Arc::new(provider), bus.clone()), bus)
    }

    #[tokio::test]
    async fn test_catalog_sorted_by_price() -> Result<()> {
        let (manager, _bus) = manager_with(&[]);
        assert_eq!(manager.load_products().await?, 4);

        let ids: Vec<String> = manager.products().await.into_iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            vec![
                WEEKLY_PRODUCT_ID,
                MONTHLY_PRODUCT_ID,
                YEARLY_PRODUCT_ID,
                LIFETIME_PRODUCT_ID
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_derives_state_and_publishes() -> Result<()> {
        let (manager, bus) = manager_with(&[LIFETIME_PRODUCT_ID]);
        let mut rx = bus.subscribe();
        let handle = manager.handle();
        assert!(!handle.current().is_premium());

        let state = manager.refresh().await?;
        assert!(state.has_lifetime);
        assert!(handle.current().is_premium());
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::EntitlementsChanged);

        manager.refresh().await?;
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_updates_entitlements() -> Result<()> {
        let (manager, _bus) = manager_with(&[]);
        let mut handle = manager.handle();

        let outcome = manager.purchase(MONTHLY_PRODUCT_ID).await?;
        assert_eq!(
            outcome,
            PurchaseOutcome::Purchased {
                product_id: MONTHLY_PRODUCT_ID.to_string()
            }
        );
        assert!(handle.changed().await);
        assert!(handle.current().has_active_subscription);
        assert!(!handle.current().has_lifetime);

        let unknown = manager.purchase("nope").await;
        assert!(matches!(unknown.unwrap_err(), Error::PurchaseProvider { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_failures_keep_cached_data() -> Result<()> {
        let provider = Arc::new(FlakyProvider {
            inner: StaticPurchaseProvider::new(
                default_catalog(),
                vec![YEARLY_PRODUCT_ID.to_string()],
            ),
            fail: AtomicBool::new(false),
        });
        let manager = EntitlementManager::new(Arc::clone(&provider) as Arc<dyn PurchaseProvider>, EventBus::new(8));

        manager.load_products().await?;
        manager.refresh().await?;

        provider.fail.store(true, AtomicOrdering::SeqCst);
        assert!(manager.load_products().await.is_err());
        assert!(manager.refresh().await.is_err());

        assert_eq!(manager.products().await.len(), 4);
        assert!(manager.current().is_premium());
        Ok(())
    }

    #[test]
    fn test_fixed_handle() {
        let handle = EntitlementHandle::fixed(EntitlementState::from_purchased([
            WEEKLY_PRODUCT_ID,
        ]));
        assert!(handle.current().is_premium());
    }

    #[tokio::test]
    async fn test_static_provider_from_settings() -> Result<()> {
        let settings = PurchaseSettings {
            owned_products: vec![LIFETIME_PRODUCT_ID.to_string()],
        };
        let provider = StaticPurchaseProvider::from_settings(&settings);
        assert_eq!(
            provider.current_entitlements().await?,
            vec![LIFETIME_PRODUCT_ID.to_string()]
        );
        assert_eq!(provider.products(&[WEEKLY_PRODUCT_ID]).await?.len(), 1);
        Ok(())
    }
}
