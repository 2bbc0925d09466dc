use bigdecimal::BigDecimal;
use common_orders::fixtures::buyer;
use common_orders::{OrderError, OrderStatus, OrderStore, PaymentSignal, PgOrderStore, Reconciliation};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

async fn store() -> (PgOrderStore, i64) {
    let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this ignored test");
    let pool = PgPool::connect(&dsn).await.unwrap();
    sqlx::migrate!("../../order-service/migrations").run(&pool).await.unwrap();

    let product_id = format!("P-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap());
    sqlx::query("INSERT INTO products (id, title, price, currency, weight) VALUES ($1, 'Футболка', 10.00, 'RUB', 300)")
        .bind(&product_id)
        .execute(&pool)
        .await
        .unwrap();
    let color_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_colors (product_id, slug, title, label, hex) VALUES ($1, $1, 'Футболка', 'Black', '#000') RETURNING id",
    )
    .bind(&product_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    let size_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_sizes (product_color_id, size, quantity) VALUES ($1, 'M', 5) RETURNING id",
    )
    .bind(color_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    (PgOrderStore::new(pool), size_id)
}

#[tokio::test]
#[ignore]
async fn pg_concurrent_creation_never_oversells() {
    let (store, size_id) = store().await;
    let store = Arc::new(store);
    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create_order(&buyer(), None, &BTreeMap::from([(size_id, 1)])).await
        }));
    }
    let results = futures::future::join_all(handles).await;
    let created = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    assert_eq!(created, 5);
    let left: i32 = sqlx::query_scalar("SELECT quantity FROM product_sizes WHERE id = $1")
        .bind(size_id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[tokio::test]
#[ignore]
async fn pg_rollback_and_reconcile() {
    let (store, size_id) = store().await;
    let err = store
        .create_order(&buyer(), None, &BTreeMap::from([(size_id, 1), (i64::MAX, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::VariantsNotFound(_)));

    let detail = store.create_order(&buyer(), None, &BTreeMap::from([(size_id, 2)])).await.unwrap();
    assert_eq!(detail.order.total_price, BigDecimal::from_str("20.00").unwrap());
    let id = detail.order.id;

    let applied = store.reconcile_payment(id, PaymentSignal::Succeeded, Some("42")).await.unwrap();
    assert_eq!(applied, Reconciliation::Applied { from: OrderStatus::NotPaid, to: OrderStatus::Paid });
    let replay = store.reconcile_payment(id, PaymentSignal::Succeeded, Some("43")).await.unwrap();
    assert_eq!(replay, Reconciliation::AlreadyApplied { status: OrderStatus::Paid });
    let order = store.get_order(id).await.unwrap().unwrap();
    assert_eq!(order.payment_id.as_deref(), Some("42"));

    let fetched = store.order_detail(id).await.unwrap().unwrap();
    assert_eq!(fetched.products.len(), 1);
    assert_eq!(fetched.products[0].quantity, 2);
}

#[tokio::test]
#[ignore]
async fn pg_carrier_claim_blocks_second_registration() {
    let (store, size_id) = store().await;
    let id = store.create_order(&buyer(), None, &BTreeMap::from([(size_id, 1)])).await.unwrap().order.id;

    store.claim_carrier_registration(id).await.unwrap();
    assert!(matches!(
        store.claim_carrier_registration(id).await,
        Err(OrderError::ShipmentRegistrationPending(_))
    ));
    store.release_carrier_registration(id).await.unwrap();
    store.claim_carrier_registration(id).await.unwrap();
    store.record_carrier_shipment(id, &format!("shipment-{id}")).await.unwrap();
    assert!(matches!(
        store.claim_carrier_registration(id).await,
        Err(OrderError::ShipmentAlreadyRegistered(_))
    ));
}
