//! Shopfront CLI - drive the storefront and admin from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! shopfront products
//! shopfront products --id 12
//!
//! # Work with the cart
//! shopfront cart add 12 -q 2
//! shopfront cart update 31 5
//! shopfront cart show
//!
//! # Place and pay an order
//! shopfront checkout --phone 012345678 --address "Street 5, Phnom Penh"
//! shopfront pay 42
//!
//! # Catalog management
//! shopfront admin products create --name "Dried Mango" --price 4.50 --stock 40 --category-id 3
//! ```
//!
//! # Environment Variables
//!
//! See `shopfront_storefront::config` for the full list. `SHOPFRONT_API_URL`
//! is required; `SHOPFRONT_API_TOKEN` is required for everything but the
//! catalog.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use shopfront_core::{CartLineId, CategoryId, OrderId, ProductId};
use shopfront_storefront::{Session, StorefrontConfig};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront storefront and admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products, or show one
    Products {
        /// Show a single product
        #[arg(long)]
        id: Option<ProductId>,
    },
    /// List categories
    Categories,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage your orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Turn the cart into an order
    Checkout {
        /// Contact phone number (at least 8 characters)
        #[arg(long)]
        phone: String,

        /// Delivery address (at least 5 characters)
        #[arg(long)]
        address: String,
    },
    /// Pay an order and wait for confirmation (Ctrl-C cancels the payment)
    Pay {
        /// Order to pay
        order_id: OrderId,
    },
    /// Catalog and order management
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product_id: ProductId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a cart line
    Update { line_id: CartLineId, quantity: u32 },
    /// Remove a product from the cart
    Remove { product_id: ProductId },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List your orders
    List,
    /// Cancel a pending order
    Cancel { order_id: OrderId },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: AdminCategoryAction,
    },
    /// Manage products
    Products {
        #[command(subcommand)]
        action: AdminProductAction,
    },
    /// Manage all orders
    Orders {
        #[command(subcommand)]
        action: AdminOrderAction,
    },
}

#[derive(Subcommand)]
enum AdminCategoryAction {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        id: CategoryId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: CategoryId,
    },
}

/// Fields shared by product create and update.
#[derive(clap::Args)]
struct ProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category_id: CategoryId,
    #[arg(long)]
    price: Decimal,
    #[arg(long)]
    stock: u32,
    /// Image file (jpg, png, gif or webp)
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AdminProductAction {
    List,
    Create {
        #[command(flatten)]
        product: ProductArgs,
    },
    Update {
        id: ProductId,
        #[command(flatten)]
        product: ProductArgs,
    },
    Delete {
        id: ProductId,
    },
}

#[derive(Subcommand)]
enum AdminOrderAction {
    List {
        /// Filter by order number, phone or address
        #[arg(long)]
        search: Option<String>,
    },
    Cancel {
        order_id: OrderId,
    },
}

/// Initialize Sentry error tracking if a DSN is configured.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "shopfront_storefront=info,shopfront_admin=info,shopfront_cli=info".into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if sentry_guard.is_some() {
        tracing::info!("Sentry initialized");
    }

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // Flush Sentry before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_config(&config.api);

    match cli.command {
        Commands::Admin { action } => {
            let admin = shopfront_admin::AdminClient::new(&config.api, &session)?;
            run_admin(&admin, action).await?;
        }
        command => {
            let storefront = shopfront_storefront::Storefront::new(&config, &session)?;
            run_shop(&storefront, command).await?;
        }
    }
    Ok(())
}

async fn run_shop(
    storefront: &shopfront_storefront::Storefront,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Products { id: Some(id) } => commands::catalog::show_product(storefront, id).await?,
        Commands::Products { id: None } => commands::catalog::list_products(storefront).await?,
        Commands::Categories => commands::catalog::list_categories(storefront).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(storefront).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(storefront, product_id, quantity).await?,
            CartAction::Update { line_id, quantity } => {
                commands::cart::update(storefront, line_id, quantity).await?;
            }
            CartAction::Remove { product_id } => {
                commands::cart::remove(storefront, product_id).await?;
            }
            CartAction::Clear => commands::cart::clear(storefront).await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List => commands::orders::list(storefront).await?,
            OrdersAction::Cancel { order_id } => {
                commands::orders::cancel(storefront, order_id).await?;
            }
        },
        Commands::Checkout { phone, address } => {
            commands::orders::checkout(storefront, phone, address).await?;
        }
        Commands::Pay { order_id } => commands::pay::pay(storefront, order_id).await?,
        // Routed to `run_admin` by `run`
        Commands::Admin { .. } => {}
    }
    Ok(())
}

async fn run_admin(
    admin: &shopfront_admin::AdminClient,
    action: AdminAction,
) -> Result<(), Box<dyn std::error::Error>> {
    use commands::admin;

    match action {
        AdminAction::Categories { action } => match action {
            AdminCategoryAction::List => admin::list_categories(admin).await?,
            AdminCategoryAction::Create { name, description } => {
                admin::create_category(admin, name, description).await?;
            }
            AdminCategoryAction::Update {
                id,
                name,
                description,
            } => admin::update_category(admin, id, name, description).await?,
            AdminCategoryAction::Delete { id } => admin::delete_category(admin, id).await?,
        },
        AdminAction::Products { action } => match action {
            AdminProductAction::List => admin::list_products(admin).await?,
            AdminProductAction::Create { product } => {
                admin::save_product(admin, None, product.into_parts()).await?;
            }
            AdminProductAction::Update { id, product } => {
                admin::save_product(admin, Some(id), product.into_parts()).await?;
            }
            AdminProductAction::Delete { id } => admin::delete_product(admin, id).await?,
        },
        AdminAction::Orders { action } => match action {
            AdminOrderAction::List { search } => {
                admin::list_orders(admin, search.as_deref()).await?;
            }
            AdminOrderAction::Cancel { order_id } => admin::cancel_order(admin, order_id).await?,
        },
    }
    Ok(())
}

impl ProductArgs {
    fn into_parts(self) -> (shopfront_admin::ProductInput, Option<PathBuf>) {
        (
            shopfront_admin::ProductInput {
                name: self.name,
                description: self.description,
                category_id: self.category_id,
                price: self.price.into(),
                stock: self.stock,
            },
            self.image,
        )
    }
}
