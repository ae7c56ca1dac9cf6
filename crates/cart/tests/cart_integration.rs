//! Integration tests for the add-to-cart unit of work.
//!
//! These tests exercise atomicity, overselling and find-or-create races
//! against the in-memory store.

use std::time::Duration;

use cart::{AddToCart, CartError, CartMutationEngine, QueryService};
use common::{CustomerId, Money, ProductId};
use futures_util::future::join_all;
use store::{InMemoryStore, NewCustomer, NewProduct, ProductFilter, Store, Transaction};

struct TestHarness {
    store: InMemoryStore,
    engine: CartMutationEngine<InMemoryStore>,
    queries: QueryService<InMemoryStore>,
    customer_id: CustomerId,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let customer_id = Self::add_customer(&store, "ada@example.com").await;

        Self {
            engine: CartMutationEngine::new(store.clone()),
            queries: QueryService::new(store.clone()),
            store,
            customer_id,
        }
    }

    async fn add_customer(store: &InMemoryStore, email: &str) -> CustomerId {
        store
            .insert_customer(NewCustomer {
                first_name: "Test".to_string(),
                last_name: "Customer".to_string(),
                email: email.to_string(),
                phone_number: None,
                address: None,
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn add_product(&self, name: &str, cents: i64, stock: i64) -> ProductId {
        self.store
            .insert_product(NewProduct::new(
                name,
                format!("{name} description"),
                Money::from_cents(cents),
                stock,
            ))
            .await
            .unwrap()
            .id
    }

    fn add(&self, cart_name: &str, product_id: ProductId, quantity: i64) -> AddToCart {
        AddToCart::new(self.customer_id, cart_name, product_id, quantity).unwrap()
    }

    async fn stock(&self, product_id: ProductId) -> i64 {
        self.store
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn second_add_beyond_stock_fails_and_changes_nothing() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 5).await;

        let outcome = h.engine.add_to_cart(h.add("default", product_id, 3)).await.unwrap();
        assert_eq!(outcome.remaining_stock, 2);
        assert_eq!(outcome.quantity, 3);

        let result = h.engine.add_to_cart(h.add("default", product_id, 3)).await;
        assert!(matches!(
            result,
            Err(CartError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));

        assert_eq!(h.stock(product_id).await, 2);
        let contents = h.queries.get_cart_items(h.customer_id, "default").await.unwrap();
        assert_eq!(contents.lines.len(), 1);
        assert_eq!(contents.lines[0].item.quantity, 3);
    }

    #[tokio::test]
    async fn add_to_new_cart_name_creates_cart_and_item() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 5).await;

        let outcome = h.engine.add_to_cart(h.add("wishlist", product_id, 2)).await.unwrap();

        assert!(outcome.cart_created);
        assert!(outcome.item_created);
        assert_eq!(h.store.cart_count().await, 1);
        assert_eq!(h.store.cart_item_count().await, 1);
        assert_eq!(h.stock(product_id).await, 3);
    }

    #[tokio::test]
    async fn unknown_product_leaves_no_cart_behind() {
        let h = TestHarness::new().await;

        let result = h
            .engine
            .add_to_cart(h.add("fresh", ProductId::new(999), 1))
            .await;

        assert!(matches!(result, Err(CartError::ProductNotFound(_))));
        assert_eq!(h.store.cart_count().await, 0);
        assert_eq!(h.store.cart_item_count().await, 0);
    }

    #[tokio::test]
    async fn carts_are_scoped_by_name() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 10).await;

        let a = h.engine.add_to_cart(h.add("home", product_id, 1)).await.unwrap();
        let b = h.engine.add_to_cart(h.add("office", product_id, 1)).await.unwrap();

        assert_ne!(a.cart_id, b.cart_id);
        assert_eq!(h.store.cart_item_count().await, 2);
        assert_eq!(h.stock(product_id).await, 8);
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn insufficient_stock_on_new_cart_rolls_back_cart() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 1).await;

        let result = h.engine.add_to_cart(h.add("fresh", product_id, 2)).await;

        assert!(matches!(result, Err(CartError::InsufficientStock { .. })));
        assert_eq!(h.store.cart_count().await, 0);
        assert_eq!(h.stock(product_id).await, 1);
    }

    #[tokio::test]
    async fn commit_failure_leaves_every_row_unchanged() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 5).await;
        h.engine.add_to_cart(h.add("default", product_id, 1)).await.unwrap();
        let items_before = h.store.cart_items().await;

        h.store.fail_next_commit();
        let result = h.engine.add_to_cart(h.add("default", product_id, 2)).await;
        assert!(matches!(result, Err(CartError::Store(_))));

        let second_cart = {
            h.store.fail_next_commit();
            h.engine.add_to_cart(h.add("other", product_id, 1)).await
        };
        assert!(second_cart.is_err());

        assert_eq!(h.store.cart_items().await, items_before);
        assert_eq!(h.store.cart_count().await, 1);
        assert_eq!(h.stock(product_id).await, 4);
    }

    #[tokio::test]
    async fn failed_add_releases_row_locks() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 1).await;

        let _ = h.engine.add_to_cart(h.add("default", product_id, 5)).await;

        let next = tokio::time::timeout(
            Duration::from_secs(1),
            h.engine.add_to_cart(h.add("default", product_id, 1)),
        )
        .await
        .expect("locks from the failed add were not released");
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn cancelled_add_rolls_back() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 5).await;

        // Hold the product row so the add parks after staging its cart.
        let mut blocker = h.store.begin().await.unwrap();
        blocker.lock_product(product_id).await.unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            h.engine.add_to_cart(h.add("fresh", product_id, 1)),
        )
        .await;
        assert!(cancelled.is_err());
        blocker.rollback().await.unwrap();

        assert_eq!(h.store.cart_count().await, 0);
        assert_eq!(h.stock(product_id).await, 5);
        h.engine.add_to_cart(h.add("fresh", product_id, 1)).await.unwrap();
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_never_oversell() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 10).await;

        let mut customers = Vec::new();
        for i in 0..8 {
            customers.push(TestHarness::add_customer(&h.store, &format!("c{i}@example.com")).await);
        }

        let tasks = customers.into_iter().map(|customer_id| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .add_to_cart(AddToCart::new(customer_id, "default", product_id, 3).unwrap())
                    .await
            })
        });
        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count() as i64;
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(CartError::InsufficientStock { .. })))
            .count();

        assert_eq!(succeeded, 3);
        assert_eq!(insufficient, 5);
        assert_eq!(h.stock(product_id).await, 10 - succeeded * 3);

        let reserved: i64 = h.store.cart_items().await.iter().map(|i| i.quantity).sum();
        assert_eq!(reserved, succeeded * 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_adds_converge_on_one_cart_and_item() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 100).await;

        let tasks = (0..10).map(|_| {
            let engine = h.engine.clone();
            let cmd = h.add("shared", product_id, 2);
            tokio::spawn(async move { engine.add_to_cart(cmd).await })
        });
        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        let cart_id = outcomes[0].cart_id;
        assert!(outcomes.iter().all(|o| o.cart_id == cart_id));
        assert_eq!(outcomes.iter().filter(|o| o.cart_created).count(), 1);
        assert_eq!(outcomes.iter().filter(|o| o.item_created).count(), 1);

        assert_eq!(h.store.cart_count().await, 1);
        let items = h.store.cart_items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 20);
        assert_eq!(h.stock(product_id).await, 80);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn disjoint_products_are_not_serialized() {
        let h = TestHarness::new().await;
        let busy = h.add_product("Kettle", 2500, 5).await;
        let free = h.add_product("Teapot", 1800, 5).await;

        let mut blocker = h.store.begin().await.unwrap();
        blocker.lock_product(busy).await.unwrap();

        let other_customer = TestHarness::add_customer(&h.store, "bo@example.com").await;
        let free_add = tokio::time::timeout(
            Duration::from_secs(1),
            h.engine
                .add_to_cart(AddToCart::new(other_customer, "default", free, 1).unwrap()),
        )
        .await
        .expect("add on an unlocked product was blocked");
        assert!(free_add.is_ok());

        let busy_add = {
            let engine = h.engine.clone();
            let cmd = h.add("default", busy, 1);
            tokio::spawn(async move { engine.add_to_cart(cmd).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!busy_add.is_finished());

        blocker.rollback().await.unwrap();
        assert!(busy_add.await.unwrap().is_ok());
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn cart_items_join_product_details() {
        let h = TestHarness::new().await;
        let kettle = h.add_product("Kettle", 2500, 5).await;
        let teapot = h.add_product("Teapot", 1800, 5).await;

        h.engine.add_to_cart(h.add("default", kettle, 1)).await.unwrap();
        h.engine.add_to_cart(h.add("default", teapot, 2)).await.unwrap();

        let contents = h.queries.get_cart_items(h.customer_id, "default").await.unwrap();
        assert_eq!(contents.cart.cart_name, "default");

        let summary: Vec<_> = contents
            .lines
            .iter()
            .map(|l| (l.product_name.as_str(), l.price.cents(), l.item.quantity))
            .collect();
        assert_eq!(summary, vec![("Kettle", 2500, 1), ("Teapot", 1800, 2)]);
    }

    #[tokio::test]
    async fn missing_cart_is_not_found() {
        let h = TestHarness::new().await;

        let result = h.queries.get_cart_items(h.customer_id, "nope").await;
        assert!(matches!(result, Err(CartError::CartNotFound { .. })));
    }

    #[tokio::test]
    async fn carts_are_private_to_their_customer() {
        let h = TestHarness::new().await;
        let product_id = h.add_product("Kettle", 2500, 5).await;
        h.engine.add_to_cart(h.add("default", product_id, 1)).await.unwrap();

        let other = TestHarness::add_customer(&h.store, "eve@example.com").await;
        let result = h.queries.get_cart_items(other, "default").await;
        assert!(matches!(result, Err(CartError::CartNotFound { .. })));
    }

    #[tokio::test]
    async fn search_combines_filters() {
        let h = TestHarness::new().await;
        h.add_product("Kettle", 2500, 5).await;
        h.add_product("Teapot", 1800, 5).await;
        h.add_product("Kettle Deluxe", 6000, 5).await;

        let all = h.queries.search_products(&ProductFilter::new()).await.unwrap();
        assert_eq!(all.len(), 3);

        let kettles = h
            .queries
            .search_products(
                &ProductFilter::new()
                    .description("Kettle")
                    .max_price(Money::from_cents(2500)),
            )
            .await
            .unwrap();
        assert_eq!(kettles.len(), 1);
        assert_eq!(kettles[0].name, "Kettle");
    }
}
