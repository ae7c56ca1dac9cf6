//! Cart and catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use cart::{AddToCart, CartContents};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{CartLine, Product, ProductFilter, Store};

use crate::AppState;
use crate::auth::CurrentCustomer;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub description: Option<String>,
    #[serde(rename = "minPrice")]
    pub min_price: Option<String>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<String>,
}

impl SearchParams {
    /// Builds a filter, treating empty parameters as absent.
    fn into_filter(self) -> Result<ProductFilter, ApiError> {
        let mut filter = ProductFilter::new();
        if let Some(description) = non_empty(self.description) {
            filter = filter.description(description);
        }
        if let Some(min) = non_empty(self.min_price) {
            filter = filter.min_price(parse_price("minPrice", &min)?);
        }
        if let Some(max) = non_empty(self.max_price) {
            filter = filter.max_price(parse_price("maxPrice", &max)?);
        }
        Ok(filter)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_price(name: &str, value: &str) -> Result<Money, ApiError> {
    Money::parse_decimal(value).map_err(|e| ApiError::BadRequest(format!("Invalid {name}: {e}")))
}

// -- Response types --

#[derive(Serialize)]
pub struct AddToCartResponse {
    pub message: &'static str,
    pub cart_id: i64,
    pub cart_item_id: i64,
    pub quantity: i64,
    pub remaining_stock: i64,
}

#[derive(Serialize)]
pub struct CartItemsResponse {
    pub cart_name: String,
    pub items: Vec<CartLineResponse>,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub cart_item_id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub product_name: String,
    pub price: String,
}

impl From<CartLine> for CartLineResponse {
    fn from(line: CartLine) -> Self {
        Self {
            cart_item_id: line.item.id.as_i64(),
            cart_id: line.item.cart_id.as_i64(),
            product_id: line.item.product_id.as_i64(),
            quantity: line.item.quantity,
            product_name: line.product_name,
            price: line.price.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductResponse>,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub product_id: i64,
    pub product_name: String,
    pub description: String,
    pub price: String,
    pub stock_quantity: i64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            product_id: product.id.as_i64(),
            product_name: product.name,
            description: product.description,
            price: product.price.to_string(),
            stock_quantity: product.stock_quantity,
        }
    }
}

// -- Handlers --

/// POST /cart/{cart_name}/add: add a product to the caller's named cart.
#[tracing::instrument(skip(state, payload))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    cart_name: Result<Path<String>, PathRejection>,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<AddToCartResponse>, ApiError> {
    let Path(cart_name) = cart_name?;
    let Json(req) = payload?;
    let cmd = AddToCart::new(
        customer_id,
        cart_name,
        ProductId::new(req.product_id),
        req.quantity,
    )?;

    let outcome = state.engine.add_to_cart(cmd).await?;

    Ok(Json(AddToCartResponse {
        message: "Product added to cart successfully",
        cart_id: outcome.cart_id.as_i64(),
        cart_item_id: outcome.cart_item_id.as_i64(),
        quantity: outcome.quantity,
        remaining_stock: outcome.remaining_stock,
    }))
}

/// GET /cart/{cart_name}/items: list the caller's named cart.
#[tracing::instrument(skip(state))]
pub async fn items<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    cart_name: Result<Path<String>, PathRejection>,
) -> Result<Json<CartItemsResponse>, ApiError> {
    let Path(cart_name) = cart_name?;
    let CartContents { cart, lines } = state.queries.get_cart_items(customer_id, &cart_name).await?;

    Ok(Json(CartItemsResponse {
        cart_name: cart.cart_name,
        items: lines.into_iter().map(CartLineResponse::from).collect(),
    }))
}

/// GET /cart/search: search the catalog.
#[tracing::instrument(skip(state, params))]
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<ProductsResponse>, ApiError> {
    let Query(params) = params?;
    let filter = params.into_filter()?;

    let products = state.queries.search_products(&filter).await?;

    Ok(Json(ProductsResponse {
        products: products.into_iter().map(ProductResponse::from).collect(),
    }))
}
