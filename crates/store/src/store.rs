use async_trait::async_trait;

use crate::{
    Cart, CartId, CartItem, CartItemId, CartLine, Customer, CustomerId, NewCustomer, NewProduct,
    Product, ProductFilter, ProductId, Result,
};

/// Handle to the shop's durable state.
///
/// Handles are cheap to clone and are passed to each service at construction.
/// Methods on the store itself only read or write committed state; anything
/// that must land atomically goes through a [`Transaction`] from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit-of-work type produced by [`Store::begin`].
    type Tx: Transaction;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Returns products matching every supplied filter.
    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    /// Retrieves a product by ID.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Looks up a cart by its natural key.
    async fn find_cart(&self, customer_id: CustomerId, cart_name: &str) -> Result<Option<Cart>>;

    /// Lists a cart's items joined with current product name and price,
    /// ordered by item ID.
    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>>;

    /// Inserts a product. Stands in for the external catalog/restock process.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Inserts a customer account.
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer>;

    /// Retrieves a customer by ID.
    async fn get_customer(&self, customer_id: CustomerId) -> Result<Option<Customer>>;

    /// Retrieves a customer by email address.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>>;

    /// Replaces a customer's address.
    ///
    /// Returns false if no such customer exists.
    async fn update_address(&self, customer_id: CustomerId, address: &str) -> Result<bool>;

    /// Replaces a customer's password hash.
    ///
    /// Returns false if no such customer exists.
    async fn update_password_hash(&self, customer_id: CustomerId, hash: &str) -> Result<bool>;
}

/// A single unit of work spanning products, carts and cart items.
///
/// Nothing written through a transaction is visible to other observers until
/// [`Transaction::commit`] succeeds. Dropping a transaction without committing
/// rolls it back and releases every lock it holds.
///
/// Row locks taken by `lock_product` and `find_cart_item_for_update` are held
/// until the transaction ends.
#[async_trait]
pub trait Transaction: Send {
    /// Looks up a cart by natural key, seeing this transaction's own writes.
    async fn find_cart(&mut self, customer_id: CustomerId, cart_name: &str)
    -> Result<Option<Cart>>;

    /// Inserts a cart unless `(customer_id, cart_name)` already exists.
    ///
    /// Waits for any in-flight insert of the same key to finish. Returns `None`
    /// when another writer's row owns the key; the caller should re-read it.
    async fn insert_cart_if_absent(
        &mut self,
        customer_id: CustomerId,
        cart_name: &str,
    ) -> Result<Option<Cart>>;

    /// Reads a product and locks its row for the rest of the transaction.
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    /// Reads a cart item by natural key and locks its row for the rest of the
    /// transaction.
    async fn find_cart_item_for_update(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>>;

    /// Inserts a cart item unless `(cart_id, product_id)` already exists.
    ///
    /// Same conflict semantics as [`Transaction::insert_cart_if_absent`].
    async fn insert_cart_item_if_absent(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Option<CartItem>>;

    /// Overwrites a locked cart item's quantity.
    async fn set_cart_item_quantity(&mut self, item_id: CartItemId, quantity: i64) -> Result<()>;

    /// Overwrites a locked product's stock quantity.
    async fn set_product_stock(&mut self, product_id: ProductId, stock_quantity: i64)
    -> Result<()>;

    /// Makes every write durable and visible, then releases all locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write and releases all locks.
    async fn rollback(self) -> Result<()>;
}
