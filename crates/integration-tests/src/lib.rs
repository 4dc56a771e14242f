//! Integration tests for Shopfront.
//!
//! The tests drive the real [`ApiClient`](shopfront_storefront::ApiClient)
//! and stores against [`FakeBackend`], an in-memory axum server speaking the
//! backend's REST contract: the `{ success, data, message }` envelope, HTTP
//! 422 field errors, bearer authentication and `_method=PUT` multipart
//! updates.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `api_client` - Envelope handling, error mapping, catalog cache
//! - `cart_sync` - Cart store against the backend
//! - `order_cancellation` - Order store
//! - `checkout` - Cart to order
//! - `payment_polling` - Payment flow with real timers
//! - `admin_catalog` - Admin wrappers

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use shopfront_admin::AdminClient;
use shopfront_core::{
    CartItem, CartLineId, Category, CategoryId, NewOrder, Order, OrderId, OrderItem, OrderStatus,
    Payment, PaymentId, PaymentStatus, Price, Product, ProductId,
};
use shopfront_storefront::{
    ApiConfig, ApiError, PaymentSettings, Session, Storefront, StorefrontConfig,
};

/// Bearer token the fake backend accepts.
pub const TOKEN: &str = "17|q9Zk2LmP4vX8rT1nB6wY3cJ5hF0dS7aE";

/// QR payload prefix of every payment the fake backend creates.
pub const QR_PREFIX: &str = "00020101021229370016";

/// Catalog reads need no credential.
const PUBLIC_OPS: &[&str] = &["get_products", "get_product", "get_categories"];

type Reply = Result<Response, Response>;

/// How a backend operation misbehaves once switched with [`FakeBackend::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// HTTP 200 with `success: false`.
    Rejected,
    /// The given HTTP status with a generic error body.
    Status(u16),
    /// HTTP 429 with a `Retry-After` header.
    RateLimited(u64),
    /// HTTP 200 with a body that is not JSON.
    Malformed,
}

/// An image received with a product form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub len: usize,
}

/// The last multipart product form received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    pub fields: BTreeMap<String, String>,
    pub image: Option<UploadedImage>,
}

#[derive(Default)]
struct BackendState {
    products: Vec<Product>,
    categories: Vec<Category>,
    cart: Vec<CartItem>,
    orders: Vec<Order>,
    payments: Vec<Payment>,
    payment_script: VecDeque<PaymentStatus>,
    next_id: i64,
    hits: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, Failure>,
    delays: HashMap<&'static str, Duration>,
    last_upload: Option<Upload>,
}

impl BackendState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory backend served over HTTP.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BackendState) -> T) -> T {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Serve on an ephemeral local port and return the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn serve(&self) -> std::io::Result<String> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let app = self.router();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Fake backend stopped: {e}");
            }
        });

        Ok(format!("http://{addr}/api"))
    }

    fn router(&self) -> Router {
        let api = Router::new()
            .route("/products", get(list_products).post(create_product))
            .route(
                "/products/{id}",
                get(get_product).post(update_product).delete(delete_product),
            )
            .route("/categories", get(list_categories).post(create_category))
            .route(
                "/categories/{id}",
                get(get_category).put(update_category).delete(delete_category),
            )
            .route("/cart", get(get_cart).post(add_to_cart))
            .route("/cart/clear", delete(clear_cart))
            .route("/cart/product/{id}", delete(remove_cart_product))
            .route("/cart/{id}", put(update_cart_line))
            .route("/orders", get(get_orders).post(create_order))
            .route("/orders/{id}", get(get_order).delete(cancel_order))
            .route("/payment/{id}", post(create_payment).get(check_payment))
            .route("/payment/{id}/cancel", post(cancel_payment))
            .with_state(self.clone());

        Router::new().nest("/api", api)
    }

    // =========================================================================
    // Seeding and inspection
    // =========================================================================

    /// Add a product to the catalog.
    pub fn seed_product(&self, name: &str, price_cents: i64, stock: u32) -> Product {
        self.with_state(|state| {
            let product = Product {
                id: ProductId::new(state.next_id()),
                name: name.to_string(),
                price: Price::from_cents(price_cents),
                stock,
                description: None,
                image_url: None,
                category_id: None,
            };
            state.products.push(product.clone());
            product
        })
    }

    /// Add a category.
    pub fn seed_category(&self, name: &str) -> Category {
        self.with_state(|state| {
            let category = Category {
                id: CategoryId::new(state.next_id()),
                name: name.to_string(),
                description: None,
            };
            state.categories.push(category.clone());
            category
        })
    }

    /// Put a product in the shopper's cart on the backend only.
    pub fn seed_cart_line(&self, product: &Product, quantity: u32) -> CartItem {
        self.with_state(|state| {
            let line = CartItem {
                id: CartLineId::new(state.next_id()),
                product: product.clone(),
                quantity,
            };
            state.cart.push(line.clone());
            line
        })
    }

    /// Change a product's price on the backend only.
    pub fn reprice(&self, product_id: ProductId, price_cents: i64) {
        self.with_state(|state| {
            if let Some(product) = state.products.iter_mut().find(|p| p.id == product_id) {
                product.price = Price::from_cents(price_cents);
            }
        });
    }

    /// Mark an order completed, as the backend does when its payment settles.
    pub fn complete_order(&self, order_id: OrderId) {
        self.with_state(|state| {
            if let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) {
                order.status = OrderStatus::Completed;
            }
        });
    }

    #[must_use]
    pub fn cart(&self) -> Vec<CartItem> {
        self.with_state(|state| state.cart.clone())
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.with_state(|state| state.orders.clone())
    }

    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.with_state(|state| state.products.clone())
    }

    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.with_state(|state| state.categories.clone())
    }

    #[must_use]
    pub fn payment(&self, payment_id: PaymentId) -> Option<Payment> {
        self.with_state(|state| state.payments.iter().find(|p| p.id == payment_id).cloned())
    }

    /// Statuses the provider reports on the next checks, in order. Once
    /// drained, a pending payment stays pending.
    pub fn script_payment(&self, statuses: impl IntoIterator<Item = PaymentStatus>) {
        self.with_state(|state| state.payment_script.extend(statuses));
    }

    /// Make every call to `op` fail.
    pub fn fail(&self, op: &'static str, failure: Failure) {
        self.with_state(|state| state.failures.insert(op, failure));
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, op: &'static str) {
        self.with_state(|state| state.failures.remove(op));
    }

    /// Hold every call to `op` before answering.
    pub fn delay(&self, op: &'static str, delay: Duration) {
        self.with_state(|state| state.delays.insert(op, delay));
    }

    /// Requests received for `op`, including rejected ones.
    #[must_use]
    pub fn hits(&self, op: &str) -> usize {
        self.with_state(|state| state.hits.get(op).copied().unwrap_or_default())
    }

    #[must_use]
    pub fn last_upload(&self) -> Option<Upload> {
        self.with_state(|state| state.last_upload.clone())
    }

    /// Count the request, check the credential, then apply delay and failure switches.
    async fn enter(&self, op: &'static str, headers: &HeaderMap) -> Result<(), Response> {
        let (delay, failure) = self.with_state(|state| {
            *state.hits.entry(op).or_default() += 1;
            (state.delays.get(op).copied(), state.failures.get(op).copied())
        });
        let public = PUBLIC_OPS.contains(&op);

        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == format!("Bearer {TOKEN}"));
        if !public && !authorized {
            return Err(error(StatusCode::UNAUTHORIZED, "Unauthenticated."));
        }

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match failure {
            None => Ok(()),
            Some(Failure::Rejected) => Err(rejected(&format!("{op} rejected"))),
            Some(Failure::Status(code)) => Err(error(
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "Server Error",
            )),
            Some(Failure::RateLimited(secs)) => Err((
                StatusCode::TOO_MANY_REQUESTS,
                [(RETRY_AFTER, secs.to_string())],
                Json(json!({ "message": "Too Many Attempts." })),
            )
                .into_response()),
            Some(Failure::Malformed) => Err((StatusCode::OK, "<html>oops</html>").into_response()),
        }
    }
}

// =============================================================================
// Response helpers
// =============================================================================

fn ok(data: impl serde::Serialize) -> Reply {
    Ok(Json(json!({ "success": true, "data": data })).into_response())
}

fn ok_empty(message: &str) -> Reply {
    Ok(Json(json!({ "success": true, "message": message })).into_response())
}

fn ok_payment(payment: impl serde::Serialize) -> Reply {
    Ok(Json(json!({ "success": true, "payment": payment })).into_response())
}

fn rejected(message: &str) -> Response {
    Json(json!({ "success": false, "message": message })).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

fn not_found(what: &str) -> Response {
    error(StatusCode::NOT_FOUND, &format!("{what} not found"))
}

/// HTTP 422 in the backend's shape: the first message doubles as the summary.
fn invalid(errors: &BTreeMap<&str, &str>) -> Response {
    let message = errors
        .values()
        .next()
        .copied()
        .unwrap_or("The given data was invalid.");
    let errors: BTreeMap<&str, [&str; 1]> = errors.iter().map(|(k, v)| (*k, [*v])).collect();
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "message": message, "errors": errors })),
    )
        .into_response()
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply {
    backend.enter("get_products", &headers).await?;
    ok(backend.products())
}

async fn get_product(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Reply {
    backend.enter("get_product", &headers).await?;
    let product = backend
        .with_state(|state| state.products.iter().find(|p| p.id == id).cloned())
        .ok_or_else(|| not_found("Product"))?;
    ok(product)
}

async fn list_categories(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply {
    backend.enter("get_categories", &headers).await?;
    ok(backend.categories())
}

async fn get_category(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<CategoryId>,
) -> Reply {
    backend.enter("get_category", &headers).await?;
    let category = backend
        .with_state(|state| state.categories.iter().find(|c| c.id == id).cloned())
        .ok_or_else(|| not_found("Category"))?;
    ok(category)
}

#[derive(Debug, Deserialize)]
struct CategoryBody {
    #[serde(default)]
    name: String,
    description: Option<String>,
}

fn validate_category(body: &CategoryBody) -> Result<(), Response> {
    if body.name.trim().is_empty() {
        return Err(invalid(&BTreeMap::from([(
            "name",
            "The name field is required.",
        )])));
    }
    Ok(())
}

async fn create_category(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<CategoryBody>,
) -> Reply {
    backend.enter("create_category", &headers).await?;
    validate_category(&body)?;

    let category = backend.with_state(|state| {
        let category = Category {
            id: CategoryId::new(state.next_id()),
            name: body.name,
            description: body.description,
        };
        state.categories.push(category.clone());
        category
    });
    ok(category)
}

async fn update_category(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryBody>,
) -> Reply {
    backend.enter("update_category", &headers).await?;
    validate_category(&body)?;

    let category = backend
        .with_state(|state| {
            let category = state.categories.iter_mut().find(|c| c.id == id)?;
            category.name = body.name;
            category.description = body.description;
            Some(category.clone())
        })
        .ok_or_else(|| not_found("Category"))?;
    ok(category)
}

async fn delete_category(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<CategoryId>,
) -> Reply {
    backend.enter("delete_category", &headers).await?;
    let removed = backend.with_state(|state| {
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        state.categories.len() != before
    });
    if !removed {
        return Err(not_found("Category"));
    }
    ok_empty("Category deleted")
}

/// Read a multipart product form, keeping a copy for inspection.
async fn read_upload(backend: &FakeBackend, mut multipart: Multipart) -> Result<Upload, Response> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        error(StatusCode::BAD_REQUEST, &e.to_string())
    };

    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_request)?;
            upload.image = Some(UploadedImage {
                file_name,
                content_type,
                len: bytes.len(),
            });
        } else {
            let value = field.text().await.map_err(bad_request)?;
            upload.fields.insert(name, value);
        }
    }

    backend.with_state(|state| state.last_upload = Some(upload.clone()));
    Ok(upload)
}

/// Validate a product form into the product it describes.
fn product_from_upload(
    backend: &FakeBackend,
    id: ProductId,
    upload: &Upload,
) -> Result<Product, Response> {
    let field = |name: &str| upload.fields.get(name).map(|v| v.trim()).unwrap_or_default();
    let mut errors = BTreeMap::new();

    let name = field("name");
    if name.is_empty() {
        errors.insert("name", "The name field is required.");
    }
    let price = field("price").parse::<Decimal>().ok();
    if price.is_none_or(|price| price.is_sign_negative()) {
        errors.insert("price", "The price must be a number of at least 0.");
    }
    let stock = field("stock").parse::<u32>().ok();
    if stock.is_none() {
        errors.insert("stock", "The stock must be an integer of at least 0.");
    }
    let category_id = field("category_id")
        .parse::<CategoryId>()
        .ok()
        .filter(|id| backend.with_state(|state| state.categories.iter().any(|c| c.id == *id)));
    if category_id.is_none() {
        errors.insert("category_id", "The selected category id is invalid.");
    }

    let (Some(price), Some(stock), Some(category_id), true) =
        (price, stock, category_id, errors.is_empty())
    else {
        return Err(invalid(&errors));
    };

    let description = Some(field("description").to_string()).filter(|d| !d.is_empty());
    let image_url = upload
        .image
        .as_ref()
        .and_then(|image| image.file_name.as_ref())
        .map(|file_name| format!("/storage/products/{file_name}"));

    Ok(Product {
        id,
        name: name.to_string(),
        price: Price::new(price),
        stock,
        description,
        image_url,
        category_id: Some(category_id),
    })
}

async fn create_product(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    backend.enter("create_product", &headers).await?;
    let upload = read_upload(&backend, multipart).await?;

    let id = backend.with_state(|state| ProductId::new(state.next_id()));
    let product = product_from_upload(&backend, id, &upload)?;
    backend.with_state(|state| state.products.push(product.clone()));
    ok(product)
}

#[derive(Debug, Deserialize)]
struct MethodOverride {
    #[serde(rename = "_method")]
    method: Option<String>,
}

async fn update_product(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
    Query(method): Query<MethodOverride>,
    multipart: Multipart,
) -> Reply {
    if !method
        .method
        .is_some_and(|method| method.eq_ignore_ascii_case("PUT"))
    {
        return Err(error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }
    backend.enter("update_product", &headers).await?;
    let upload = read_upload(&backend, multipart).await?;

    let existing = backend
        .with_state(|state| state.products.iter().find(|p| p.id == id).cloned())
        .ok_or_else(|| not_found("Product"))?;
    let mut product = product_from_upload(&backend, id, &upload)?;
    if product.image_url.is_none() {
        product.image_url = existing.image_url;
    }

    backend.with_state(|state| {
        if let Some(slot) = state.products.iter_mut().find(|p| p.id == id) {
            *slot = product.clone();
        }
    });
    ok(product)
}

async fn delete_product(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Reply {
    backend.enter("delete_product", &headers).await?;
    let removed = backend.with_state(|state| {
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        state.products.len() != before
    });
    if !removed {
        return Err(not_found("Product"));
    }
    ok_empty("Product deleted")
}

// =============================================================================
// Cart
// =============================================================================

async fn get_cart(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply {
    backend.enter("get_cart", &headers).await?;
    ok(backend.cart())
}

#[derive(Debug, Deserialize)]
struct AddToCartBody {
    product_id: ProductId,
    quantity: u32,
}

async fn add_to_cart(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<AddToCartBody>,
) -> Reply {
    backend.enter("add_to_cart", &headers).await?;

    backend.with_state(|state| {
        let product = state
            .products
            .iter()
            .find(|p| p.id == body.product_id)
            .cloned()
            .ok_or_else(|| not_found("Product"))?;

        let in_cart = state
            .cart
            .iter()
            .find(|line| line.product.id == body.product_id)
            .map_or(0, |line| line.quantity);
        if in_cart.saturating_add(body.quantity) > product.stock {
            return Err(rejected("Not enough stock"));
        }

        if let Some(line) = state
            .cart
            .iter_mut()
            .find(|line| line.product.id == body.product_id)
        {
            line.quantity += body.quantity;
        } else {
            let id = CartLineId::new(state.next_id());
            state.cart.push(CartItem {
                id,
                product,
                quantity: body.quantity,
            });
        }
        Ok(())
    })?;

    ok_empty("Added to cart")
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn update_cart_line(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<CartLineId>,
    Json(body): Json<QuantityBody>,
) -> Reply {
    backend.enter("update_cart_line", &headers).await?;

    backend.with_state(|state| {
        let line = state
            .cart
            .iter_mut()
            .find(|line| line.id == id)
            .ok_or_else(|| not_found("Cart item"))?;
        if body.quantity > line.product.stock {
            return Err(rejected("Not enough stock"));
        }
        line.quantity = body.quantity;
        Ok(())
    })?;

    ok_empty("Cart updated")
}

async fn remove_cart_product(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(product_id): Path<ProductId>,
) -> Reply {
    backend.enter("remove_cart_product", &headers).await?;
    backend.with_state(|state| state.cart.retain(|line| line.product.id != product_id));
    ok_empty("Removed from cart")
}

async fn clear_cart(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply {
    backend.enter("clear_cart", &headers).await?;
    backend.with_state(|state| state.cart.clear());
    ok_empty("Cart cleared")
}

// =============================================================================
// Orders
// =============================================================================

async fn get_orders(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply {
    backend.enter("get_orders", &headers).await?;
    ok(backend.orders())
}

/// Single orders are served with their lines under `order_items`.
async fn get_order(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<OrderId>,
) -> Reply {
    backend.enter("get_order", &headers).await?;
    let order = backend
        .with_state(|state| state.orders.iter().find(|o| o.id == id).cloned())
        .ok_or_else(|| not_found("Order"))?;

    let mut body = serde_json::to_value(&order)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;
    if let Some(fields) = body.as_object_mut() {
        if let Some(items) = fields.remove("items") {
            fields.insert("order_items".to_string(), items);
        }
    }
    ok(body)
}

async fn create_order(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<NewOrder>,
) -> Reply {
    backend.enter("create_order", &headers).await?;

    let mut errors = BTreeMap::new();
    if body.phone.trim().len() < 8 {
        errors.insert("phone", "The phone must be at least 8 characters.");
    }
    if body.address.trim().len() < 5 {
        errors.insert("address", "The address must be at least 5 characters.");
    }
    if !errors.is_empty() {
        return Err(invalid(&errors));
    }

    let order = backend.with_state(|state| {
        if state.cart.is_empty() {
            return Err(rejected("Cart is empty"));
        }

        let items: Vec<OrderItem> = state
            .cart
            .drain(..)
            .map(|line| OrderItem {
                price: line.product.price,
                quantity: line.quantity,
                product: Some(line.product),
            })
            .collect();

        let id = state.next_id();
        let order = Order {
            id: OrderId::new(id),
            order_number: format!("ORD-{id:05}"),
            status: OrderStatus::Pending,
            total_price: items.iter().map(OrderItem::line_total).sum(),
            items,
            phone: body.phone,
            address: body.address,
            created_at: Utc::now(),
        };
        state.orders.insert(0, order.clone());
        Ok(order)
    })?;

    ok(order)
}

async fn cancel_order(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<OrderId>,
) -> Reply {
    backend.enter("cancel_order", &headers).await?;

    backend.with_state(|state| {
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| not_found("Order"))?;
        if order.status != OrderStatus::Pending {
            return Err(rejected("Only pending orders can be cancelled"));
        }
        order.status = OrderStatus::Cancelled;
        Ok(())
    })?;

    ok_empty("Order cancelled")
}

// =============================================================================
// Payments
// =============================================================================

async fn create_payment(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(order_id): Path<OrderId>,
) -> Reply {
    backend.enter("create_payment", &headers).await?;

    let payment = backend.with_state(|state| {
        let order = state
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| not_found("Order"))?;
        match order.status {
            OrderStatus::Completed => return Err(rejected("Order already paid")),
            OrderStatus::Cancelled => return Err(rejected("Order is cancelled")),
            OrderStatus::Pending => {}
        }

        let id = state.next_id();
        let payment = Payment {
            id: PaymentId::new(id),
            order_id,
            status: PaymentStatus::Pending,
            qr_string: Some(format!("{QR_PREFIX}{id:04}")),
        };
        state.payments.push(payment.clone());
        Ok(payment)
    })?;

    ok_payment(payment)
}

async fn check_payment(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<PaymentId>,
) -> Reply {
    backend.enter("check_payment", &headers).await?;

    let status = backend.with_state(|state| {
        let scripted = state.payment_script.front().copied();
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("Payment"))?;

        if let Some(next) = scripted.filter(|_| payment.status == PaymentStatus::Pending) {
            payment.status = next;
            state.payment_script.pop_front();
        }

        let status = payment.status;
        let order_id = payment.order_id;
        if status == PaymentStatus::Paid {
            let paid_order = state.orders.iter_mut().find(|o| o.id == order_id);
            if let Some(order) = paid_order {
                order.status = OrderStatus::Completed;
            }
        }
        Ok(status)
    })?;

    ok_payment(json!({ "id": id, "status": status }))
}

async fn cancel_payment(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<PaymentId>,
) -> Reply {
    backend.enter("cancel_payment", &headers).await?;

    backend.with_state(|state| {
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("Payment"))?;
        if payment.status != PaymentStatus::Pending {
            return Err(rejected("Payment is no longer pending"));
        }
        payment.status = PaymentStatus::Cancelled;
        Ok(())
    })?;

    ok_empty("Payment cancelled")
}

// =============================================================================
// Test context
// =============================================================================

/// A running fake backend plus the configuration pointing at it.
pub struct TestContext {
    pub backend: FakeBackend,
    pub config: StorefrontConfig,
}

impl TestContext {
    /// Start a backend with fast payment polling.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be served.
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let backend = FakeBackend::new();
        let base_url = backend.serve().await?;

        let config = StorefrontConfig {
            api: ApiConfig::for_base_url(&base_url)?,
            payment: PaymentSettings {
                poll_interval: Duration::from_millis(40),
                max_poll_attempts: 10,
                close_delay: Duration::from_millis(80),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        Ok(Self { backend, config })
    }

    /// Shopper storefront signed in with [`TOKEN`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn storefront(&self) -> Result<Storefront, ApiError> {
        Storefront::new(&self.config, &Session::bearer(TOKEN))
    }

    /// Storefront without a credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn anonymous_storefront(&self) -> Result<Storefront, ApiError> {
        Storefront::new(&self.config, &Session::anonymous())
    }

    /// Admin client signed in with [`TOKEN`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn admin(&self) -> Result<AdminClient, ApiError> {
        AdminClient::new(&self.config.api, &Session::bearer(TOKEN))
    }
}
