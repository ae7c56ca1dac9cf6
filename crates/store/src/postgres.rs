use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Cart, CartId, CartItem, CartItemId, CartLine, Customer, CustomerId, Money, NewCustomer,
    NewProduct, Product, ProductFilter, ProductId, Result, StoreError,
    store::{Store, Transaction},
};

const PRODUCT_COLUMNS: &str = "product_id, product_name, description, price_cents, stock_quantity";
const CUSTOMER_COLUMNS: &str = "customer_id, first_name, last_name, email, phone_number, address, password_hash, created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// Transactions run at READ COMMITTED with explicit row locks: the product row
/// and any existing cart item row are taken `FOR UPDATE`, and natural-key
/// inserts use `ON CONFLICT DO NOTHING`, which waits on an in-flight
/// conflicting insert and then yields to the winner's row.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps constraint violations onto store errors; everything else stays a
/// database error.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingReference(constraint);
        }
        if db_err.is_unique_violation() || db_err.is_check_violation() {
            return StoreError::Constraint(constraint);
        }
    }
    StoreError::Database(e)
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("product_id")?),
        name: row.try_get("product_name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_quantity: row.try_get("stock_quantity")?,
    })
}

fn row_to_cart(row: &PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::new(row.try_get("cart_id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        cart_name: row.try_get("cart_name")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::new(row.try_get("cart_item_id")?),
        cart_id: CartId::new(row.try_get("cart_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
    })
}

fn row_to_customer(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("customer_id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        address: row.try_get("address")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await?;
        Ok(PostgresTransaction { tx })
    }

    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1");
        let mut param_count = 0;

        if filter.description.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND strpos(description, ${param_count}) > 0"));
        }
        if filter.min_price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents >= ${param_count}"));
        }
        if filter.max_price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents <= ${param_count}"));
        }
        sql.push_str(" ORDER BY product_id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(ref description) = filter.description {
            query = query.bind(description);
        }
        if let Some(min) = filter.min_price {
            query = query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            query = query.bind(max.cents());
        }

        let rows: Vec<PgRow> = query.fetch(&self.pool).try_collect().await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_cart(&self, customer_id: CustomerId, cart_name: &str) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT cart_id, customer_id, cart_name FROM carts WHERE customer_id = $1 AND cart_name = $2",
        )
        .bind(customer_id.as_i64())
        .bind(cart_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_cart).transpose()
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.cart_item_id, ci.cart_id, ci.product_id, ci.quantity,
                   p.product_name, p.price_cents
            FROM cart_items ci
            JOIN products p ON p.product_id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.cart_item_id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartLine {
                    item: row_to_cart_item(row)?,
                    product_name: row.try_get("product_name")?,
                    price: Money::from_cents(row.try_get("price_cents")?),
                })
            })
            .collect()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (product_name, description, price_cents, stock_quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.stock_quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        row_to_product(&row)
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customers (first_name, last_name, email, phone_number, address, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone_number)
        .bind(&customer.address)
        .bind(&customer.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        row_to_customer(&row)
    }

    async fn get_customer(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE customer_id = $1"
        ))
        .bind(customer_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn update_address(&self, customer_id: CustomerId, address: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE customers SET address = $2, updated_at = NOW() WHERE customer_id = $1",
        )
        .bind(customer_id.as_i64())
        .bind(address)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(&self, customer_id: CustomerId, hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE customers SET password_hash = $2, updated_at = NOW() WHERE customer_id = $1",
        )
        .bind(customer_id.as_i64())
        .bind(hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Unit of work over a [`PostgresStore`].
///
/// Wraps a database transaction; dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn find_cart(
        &mut self,
        customer_id: CustomerId,
        cart_name: &str,
    ) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT cart_id, customer_id, cart_name FROM carts WHERE customer_id = $1 AND cart_name = $2",
        )
        .bind(customer_id.as_i64())
        .bind(cart_name)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_cart).transpose()
    }

    async fn insert_cart_if_absent(
        &mut self,
        customer_id: CustomerId,
        cart_name: &str,
    ) -> Result<Option<Cart>> {
        let row = sqlx::query(
            r#"
            INSERT INTO carts (customer_id, cart_name)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT carts_customer_cart_name_key DO NOTHING
            RETURNING cart_id, customer_id, cart_name
            "#,
        )
        .bind(customer_id.as_i64())
        .bind(cart_name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if row.is_none() {
            tracing::debug!(%customer_id, cart_name, "cart insert yielded to existing row");
        }
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_cart_item_for_update(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            r#"
            SELECT cart_item_id, cart_id, product_id, quantity
            FROM cart_items
            WHERE cart_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(cart_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_cart_item).transpose()
    }

    async fn insert_cart_item_if_absent(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT cart_items_cart_product_key DO NOTHING
            RETURNING cart_item_id, cart_id, product_id, quantity
            "#,
        )
        .bind(cart_id.as_i64())
        .bind(product_id.as_i64())
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if row.is_none() {
            tracing::debug!(%cart_id, %product_id, "cart item insert yielded to existing row");
        }
        row.as_ref().map(row_to_cart_item).transpose()
    }

    async fn set_cart_item_quantity(&mut self, item_id: CartItemId, quantity: i64) -> Result<()> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $2 WHERE cart_item_id = $1")
            .bind(item_id.as_i64())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("cart item {item_id}")));
        }
        Ok(())
    }

    async fn set_product_stock(
        &mut self,
        product_id: ProductId,
        stock_quantity: i64,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock_quantity = $2 WHERE product_id = $1")
            .bind(product_id.as_i64())
            .bind(stock_quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("product {product_id}")));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
