use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::locks::{LockTable, RowKey};
use crate::{
    Cart, CartId, CartItem, CartItemId, CartLine, Customer, CustomerId, NewCustomer, NewProduct,
    Product, ProductFilter, ProductId, Result, StoreError,
    store::{Store, Transaction},
};

/// Committed rows plus natural-key indexes.
#[derive(Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    customers: BTreeMap<CustomerId, Customer>,
    carts: BTreeMap<CartId, Cart>,
    cart_index: HashMap<(CustomerId, String), CartId>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    cart_item_index: HashMap<(CartId, ProductId), CartItemId>,
}

impl Tables {
    fn cart_by_key(&self, customer_id: CustomerId, cart_name: &str) -> Option<&Cart> {
        self.cart_index
            .get(&(customer_id, cart_name.to_string()))
            .and_then(|id| self.carts.get(id))
    }

    fn cart_item_by_key(&self, cart_id: CartId, product_id: ProductId) -> Option<&CartItem> {
        self.cart_item_index
            .get(&(cart_id, product_id))
            .and_then(|id| self.cart_items.get(id))
    }
}

#[derive(Default)]
struct Sequence(AtomicI64);

impl Sequence {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    locks: LockTable,
    product_ids: Sequence,
    customer_ids: Sequence,
    cart_ids: Sequence,
    cart_item_ids: Sequence,
    fail_next_commit: AtomicBool,
}

/// In-memory store implementation for tests and store-less local runs.
///
/// Provides the same contract as the PostgreSQL implementation: transactional
/// writes are buffered and applied atomically at commit, and row locks are
/// held from first use until the transaction ends.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next transaction commit fail as if the store went away.
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the number of committed carts.
    pub async fn cart_count(&self) -> usize {
        self.shared.tables.read().await.carts.len()
    }

    /// Returns the number of committed cart items.
    pub async fn cart_item_count(&self) -> usize {
        self.shared.tables.read().await.cart_items.len()
    }

    /// Returns every committed cart item, ordered by ID.
    pub async fn cart_items(&self) -> Vec<CartItem> {
        self.shared
            .tables
            .read()
            .await
            .cart_items
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            pending: PendingWrites::default(),
        })
    }

    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let tables = self.shared.tables.read().await;
        Ok(tables.products.get(&product_id).cloned())
    }

    async fn find_cart(&self, customer_id: CustomerId, cart_name: &str) -> Result<Option<Cart>> {
        let tables = self.shared.tables.read().await;
        Ok(tables.cart_by_key(customer_id, cart_name).cloned())
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let tables = self.shared.tables.read().await;
        Ok(tables
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .filter_map(|item| {
                tables.products.get(&item.product_id).map(|p| CartLine {
                    item: item.clone(),
                    product_name: p.name.clone(),
                    price: p.price,
                })
            })
            .collect())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        if product.stock_quantity < 0 {
            return Err(StoreError::Constraint(
                "products_stock_quantity_check".to_string(),
            ));
        }

        let product = Product {
            id: ProductId::new(self.shared.product_ids.next()),
            name: product.name,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
        };
        let mut tables = self.shared.tables.write().await;
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let mut tables = self.shared.tables.write().await;
        if tables.customers.values().any(|c| c.email == customer.email) {
            return Err(StoreError::Constraint("customers_email_key".to_string()));
        }

        let now = Utc::now();
        let customer = Customer {
            id: CustomerId::new(self.shared.customer_ids.next()),
            first_name: customer.first_name,
            last_name: customer.last_name,
            email: customer.email,
            phone_number: customer.phone_number,
            address: customer.address,
            password_hash: customer.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        let tables = self.shared.tables.read().await;
        Ok(tables.customers.get(&customer_id).cloned())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let tables = self.shared.tables.read().await;
        Ok(tables.customers.values().find(|c| c.email == email).cloned())
    }

    async fn update_address(&self, customer_id: CustomerId, address: &str) -> Result<bool> {
        let mut tables = self.shared.tables.write().await;
        match tables.customers.get_mut(&customer_id) {
            Some(customer) => {
                customer.address = Some(address.to_string());
                customer.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password_hash(&self, customer_id: CustomerId, hash: &str) -> Result<bool> {
        let mut tables = self.shared.tables.write().await;
        match tables.customers.get_mut(&customer_id) {
            Some(customer) => {
                customer.password_hash = hash.to_string();
                customer.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Writes staged by a transaction, applied only at commit.
#[derive(Default)]
struct PendingWrites {
    carts: Vec<Cart>,
    /// New or updated cart items, as full rows.
    cart_items: BTreeMap<CartItemId, CartItem>,
    product_stock: HashMap<ProductId, i64>,
}

impl PendingWrites {
    fn cart_by_key(&self, customer_id: CustomerId, cart_name: &str) -> Option<&Cart> {
        self.carts
            .iter()
            .find(|c| c.customer_id == customer_id && c.cart_name == cart_name)
    }

    fn cart_item_by_key(&self, cart_id: CartId, product_id: ProductId) -> Option<&CartItem> {
        self.cart_items
            .values()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    pending: PendingWrites,
}

impl InMemoryTransaction {
    /// Takes the row lock for `key` unless this transaction already holds it.
    async fn lock(&mut self, key: RowKey) {
        if !self.held.contains_key(&key) {
            let guard = self.shared.locks.acquire(key.clone()).await;
            self.held.insert(key, guard);
        }
    }

    async fn current_cart_item(&self, item_id: CartItemId) -> Option<CartItem> {
        if let Some(item) = self.pending.cart_items.get(&item_id) {
            return Some(item.clone());
        }
        self.shared
            .tables
            .read()
            .await
            .cart_items
            .get(&item_id)
            .cloned()
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.held.keys().cloned().collect();
        self.held.clear();
        self.shared.locks.prune(&keys);
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn find_cart(
        &mut self,
        customer_id: CustomerId,
        cart_name: &str,
    ) -> Result<Option<Cart>> {
        if let Some(cart) = self.pending.cart_by_key(customer_id, cart_name) {
            return Ok(Some(cart.clone()));
        }
        let tables = self.shared.tables.read().await;
        Ok(tables.cart_by_key(customer_id, cart_name).cloned())
    }

    async fn insert_cart_if_absent(
        &mut self,
        customer_id: CustomerId,
        cart_name: &str,
    ) -> Result<Option<Cart>> {
        if !self
            .shared
            .tables
            .read()
            .await
            .customers
            .contains_key(&customer_id)
        {
            return Err(StoreError::MissingReference(format!(
                "customer {customer_id}"
            )));
        }

        self.lock(RowKey::Cart(customer_id, cart_name.to_string()))
            .await;

        if self.pending.cart_by_key(customer_id, cart_name).is_some()
            || self
                .shared
                .tables
                .read()
                .await
                .cart_by_key(customer_id, cart_name)
                .is_some()
        {
            return Ok(None);
        }

        let cart = Cart {
            id: CartId::new(self.shared.cart_ids.next()),
            customer_id,
            cart_name: cart_name.to_string(),
        };
        self.pending.carts.push(cart.clone());
        Ok(Some(cart))
    }

    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        self.lock(RowKey::Product(product_id)).await;

        let tables = self.shared.tables.read().await;
        Ok(tables.products.get(&product_id).map(|p| {
            let mut product = p.clone();
            if let Some(&stock) = self.pending.product_stock.get(&product_id) {
                product.stock_quantity = stock;
            }
            product
        }))
    }

    async fn find_cart_item_for_update(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        self.lock(RowKey::CartItem(cart_id, product_id)).await;

        if let Some(item) = self.pending.cart_item_by_key(cart_id, product_id) {
            return Ok(Some(item.clone()));
        }
        let tables = self.shared.tables.read().await;
        Ok(tables.cart_item_by_key(cart_id, product_id).cloned())
    }

    async fn insert_cart_item_if_absent(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Option<CartItem>> {
        if quantity <= 0 {
            return Err(StoreError::Constraint(
                "cart_items_quantity_check".to_string(),
            ));
        }
        {
            let tables = self.shared.tables.read().await;
            let cart_known = tables.carts.contains_key(&cart_id)
                || self.pending.carts.iter().any(|c| c.id == cart_id);
            if !cart_known {
                return Err(StoreError::MissingReference(format!("cart {cart_id}")));
            }
            if !tables.products.contains_key(&product_id) {
                return Err(StoreError::MissingReference(format!(
                    "product {product_id}"
                )));
            }
        }

        self.lock(RowKey::CartItem(cart_id, product_id)).await;

        if self.pending.cart_item_by_key(cart_id, product_id).is_some()
            || self
                .shared
                .tables
                .read()
                .await
                .cart_item_by_key(cart_id, product_id)
                .is_some()
        {
            return Ok(None);
        }

        let item = CartItem {
            id: CartItemId::new(self.shared.cart_item_ids.next()),
            cart_id,
            product_id,
            quantity,
        };
        self.pending.cart_items.insert(item.id, item.clone());
        Ok(Some(item))
    }

    async fn set_cart_item_quantity(&mut self, item_id: CartItemId, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return Err(StoreError::Constraint(
                "cart_items_quantity_check".to_string(),
            ));
        }

        let mut item = self
            .current_cart_item(item_id)
            .await
            .ok_or_else(|| StoreError::MissingReference(format!("cart item {item_id}")))?;
        self.lock(RowKey::CartItem(item.cart_id, item.product_id))
            .await;

        item.quantity = quantity;
        self.pending.cart_items.insert(item_id, item);
        Ok(())
    }

    async fn set_product_stock(
        &mut self,
        product_id: ProductId,
        stock_quantity: i64,
    ) -> Result<()> {
        if stock_quantity < 0 {
            return Err(StoreError::Constraint(
                "products_stock_quantity_check".to_string(),
            ));
        }
        if !self
            .shared
            .tables
            .read()
            .await
            .products
            .contains_key(&product_id)
        {
            return Err(StoreError::MissingReference(format!(
                "product {product_id}"
            )));
        }

        self.lock(RowKey::Product(product_id)).await;
        self.pending.product_stock.insert(product_id, stock_quantity);
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        if self.shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit failed".to_string()));
        }

        let pending = std::mem::take(&mut self.pending);
        let mut tables = self.shared.tables.write().await;

        for cart in pending.carts {
            tables
                .cart_index
                .insert((cart.customer_id, cart.cart_name.clone()), cart.id);
            tables.carts.insert(cart.id, cart);
        }
        for (id, item) in pending.cart_items {
            tables
                .cart_item_index
                .insert((item.cart_id, item.product_id), id);
            tables.cart_items.insert(id, item);
        }
        for (product_id, stock) in pending.product_stock {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.stock_quantity = stock;
            }
        }

        // Locks are released by Drop, after the writes above are visible.
        drop(tables);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
