mod config;
mod demo_store;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use demo_store::{DemoEntitlementStore, TokenDisposition};
use purchase_core::{OfferingsState, PurchaseSessionController, RedemptionState};
use shared::domain::{EntitlementId, Offering, OfferingCatalog, Package, Product, Purchasable};

#[derive(Parser, Debug)]
struct Args {
    /// Path to the storefront configuration file.
    #[arg(long, default_value = "storefront.toml")]
    config: String,
    /// Redemption deep link to process after the purchase flow, e.g.
    /// app-demo://redeem_web_purchase?redemption_token=WEB-PURCHASE-1
    #[arg(long)]
    redeem_url: Option<String>,
    /// Purchase the underlying product directly instead of the package.
    #[arg(long)]
    as_product: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = config::load_settings(&args.config);
    let entitlement_id = settings.entitlement_id.clone().map(EntitlementId::from);

    let store = DemoEntitlementStore::new(
        settings.api_key.clone(),
        entitlement_id.clone(),
        sample_catalog(),
        demo_redemption_tokens(),
    );
    let controller = PurchaseSessionController::new(store.clone(), entitlement_id);
    controller.start().await;

    controller.fetch_offerings().await;
    if let OfferingsState::Error { message } = controller.offerings_state() {
        println!("Offerings fetch failed: {message}");
        return Ok(());
    }

    let offerings = controller.offerings_list();
    println!("Offerings ({}):", offerings.len());
    for offering in &offerings {
        println!("  {}:", offering.id);
        for package in &offering.packages {
            println!(
                "    [{}] {}: {}",
                package.id, package.product.title, package.product.description
            );
        }
    }

    println!("Unique products:");
    for product in controller.all_products() {
        println!("  {}: {}", product.id, product.title);
    }

    let Some(package) = offerings
        .first()
        .and_then(|offering| offering.packages.first())
        .cloned()
    else {
        println!("No packages available to purchase.");
        return Ok(());
    };

    let purchasable: Purchasable = if args.as_product {
        package.product.clone().into()
    } else {
        package.clone().into()
    };
    println!("Purchasing {}...", purchasable.product_id());

    let mut customer_rx = controller.subscribe_customer();
    controller.purchase(purchasable).await;

    match controller.purchase_session().purchase_error {
        Some(message) => println!("{message}"),
        None => println!(
            "Purchased {}; subscription active: {}",
            package.product.id,
            controller.subscription_active()
        ),
    }

    // Out-of-band renewal pushed by the store backend.
    let _ = customer_rx.borrow_and_update();
    store.simulate_renewal().await;
    if tokio::time::timeout(Duration::from_secs(1), customer_rx.changed())
        .await
        .is_ok()
    {
        println!(
            "Received pushed entitlement update; subscription active: {}",
            controller.subscription_active()
        );
    }

    if let Some(url) = args.redeem_url.as_deref() {
        println!("Processing redemption link...");
        controller.handle_deep_link(url).await;
        match controller.redemption_state() {
            RedemptionState::Success { message }
            | RedemptionState::Error { message }
            | RedemptionState::Expired { message } => println!("{message}"),
            RedemptionState::Idle => println!("Not a redemption link, ignored."),
            RedemptionState::Redeeming => {}
        }
        controller.clear_redemption_state();
    }

    controller.shutdown().await;
    Ok(())
}

fn sample_catalog() -> OfferingCatalog {
    let monthly = Product {
        id: "premium_monthly".into(),
        title: "Premium (monthly)".to_string(),
        description: "One month of premium access".to_string(),
    };
    let annual = Product {
        id: "premium_annual".into(),
        title: "Premium (annual)".to_string(),
        description: "One year of premium access".to_string(),
    };
    let lifetime = Product {
        id: "premium_lifetime".into(),
        title: "Premium (lifetime)".to_string(),
        description: "Lifetime premium access".to_string(),
    };

    OfferingCatalog::from_offerings([
        Offering {
            id: "default".into(),
            packages: vec![
                Package {
                    id: "$rc_monthly".into(),
                    product: monthly,
                },
                Package {
                    id: "$rc_annual".into(),
                    product: annual.clone(),
                },
            ],
        },
        Offering {
            id: "spring_promo".into(),
            packages: vec![
                Package {
                    id: "$rc_annual".into(),
                    product: annual,
                },
                Package {
                    id: "$rc_lifetime".into(),
                    product: lifetime,
                },
            ],
        },
    ])
}

fn demo_redemption_tokens() -> HashMap<String, TokenDisposition> {
    HashMap::from([
        (
            "WEB-PURCHASE-1".to_string(),
            TokenDisposition::Grants {
                product_id: "premium_annual".into(),
            },
        ),
        (
            "WEB-PURCHASE-OTHER".to_string(),
            TokenDisposition::BelongsToOtherUser,
        ),
        (
            "WEB-PURCHASE-EXPIRED".to_string(),
            TokenDisposition::Expired {
                obfuscated_email: "d***@example.com".to_string(),
            },
        ),
    ])
}
