//! Order placement and status changes against a real database.
//!
//! These tests require a `PostgreSQL` server reachable through `DATABASE_URL`.
//!
//! Run with: cargo test -p showcase-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use showcase_core::{OrderStatus, ProductId};
use showcase_integration_tests::TestContext;
use showcase_server::db::{OrderRepository, RepositoryError};
use showcase_server::models::{NewOrder, NewOrderItem, OrderFilter};

fn item(name: &str, price: i64, quantity: i32) -> NewOrderItem {
    NewOrderItem {
        product_id: None,
        product_name: name.to_string(),
        price: Decimal::new(price, 0),
        quantity,
        engraving: None,
    }
}

fn order(total: i64, items: Vec<NewOrderItem>) -> NewOrder {
    NewOrder {
        customer_name: "Dana".to_string(),
        phone: "+7 700 000 00 00".to_string(),
        email: None,
        address: Some("Main st. 1".to_string()),
        comment: None,
        total_amount: Decimal::new(total, 0),
        items,
    }
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_total_is_stored_as_given(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = OrderRepository::new(&ctx.storage);

    let placed = repo
        .create(order(5000, vec![item("Ring", 1200, 2), item("Chain", 900, 1)]))
        .await
        .expect("create failed");

    let found = repo.find_by_id(placed.id).await.unwrap().unwrap();
    assert_eq!(found.status, OrderStatus::New);
    assert_eq!(found.items.len(), 2);
    assert_eq!(found.total_amount, Decimal::new(5000, 0));

    let summed: Decimal = found
        .items
        .iter()
        .map(|i| i.price * Decimal::from(i.quantity))
        .sum();
    assert_eq!(summed, Decimal::new(3300, 0));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_items_are_snapshots_of_the_product(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = OrderRepository::new(&ctx.storage);

    let product_id: i32 = sqlx::query_scalar(
        "INSERT INTO catalog.product (title, price) VALUES ('Ring', 1200) RETURNING id",
    )
    .fetch_one(ctx.storage.pool())
    .await
    .unwrap();

    let mut line = item("Ring", 1200, 1);
    line.product_id = Some(ProductId::new(product_id));
    line.engraving = Some("For A.".to_string());
    let placed = repo.create(order(1200, vec![line])).await.unwrap();

    sqlx::query("UPDATE catalog.product SET title = 'Renamed', price = 99 WHERE id = $1")
        .bind(product_id)
        .execute(ctx.storage.pool())
        .await
        .unwrap();
    sqlx::query("DELETE FROM catalog.product WHERE id = $1")
        .bind(product_id)
        .execute(ctx.storage.pool())
        .await
        .unwrap();

    let found = repo.find_by_id(placed.id).await.unwrap().unwrap();
    let [line] = found.items.as_slice() else {
        panic!("expected one item, got {:?}", found.items);
    };
    assert_eq!(line.product_name, "Ring");
    assert_eq!(line.price, Decimal::new(1200, 0));
    assert_eq!(line.engraving.as_deref(), Some("For A."));
    // The product is gone; the line keeps its snapshot.
    assert_eq!(line.product_id, None);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_any_status_change_is_accepted(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = OrderRepository::new(&ctx.storage);

    let placed = repo.create(order(100, vec![item("Ring", 100, 1)])).await.unwrap();

    let rejected = repo
        .update_status(placed.id, OrderStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);

    let completed = repo
        .update_status(placed.id, OrderStatus::Completed)
        .await
        .expect("leaving a terminal status is allowed");
    assert_eq!(completed.status, OrderStatus::Completed);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_list_filters_by_status_and_counts_with_the_same_filter(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = OrderRepository::new(&ctx.storage);

    for n in 0..3 {
        let placed = repo
            .create(order(100, vec![item("Ring", 100, 1), item("Box", 5, n + 1)]))
            .await
            .unwrap();
        if n == 0 {
            repo.update_status(placed.id, OrderStatus::Shipped)
                .await
                .unwrap();
        }
    }

    let new_orders = repo
        .find_all(&OrderFilter {
            status: Some(OrderStatus::New),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(new_orders.total, 2);
    assert_eq!(new_orders.items.len(), 2);
    assert!(new_orders.items.iter().all(|o| o.items.len() == 2));

    let all = repo
        .find_all(&OrderFilter {
            per_page: Some(1),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.items.len(), 1);
    assert_eq!(all.total_pages(), 3);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn test_delete_cascades_and_missing_order_is_not_found(pool: PgPool) {
    let ctx = TestContext::new(pool);
    let repo = OrderRepository::new(&ctx.storage);

    let placed = repo.create(order(100, vec![item("Ring", 100, 1)])).await.unwrap();
    repo.delete(placed.id).await.unwrap();

    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog.order_item")
        .fetch_one(ctx.storage.pool())
        .await
        .unwrap();
    assert_eq!(items, 0);

    assert!(matches!(
        repo.delete(placed.id).await,
        Err(RepositoryError::NotFound)
    ));
    assert!(matches!(
        repo.update_status(placed.id, OrderStatus::Shipped).await,
        Err(RepositoryError::NotFound)
    ));
}
