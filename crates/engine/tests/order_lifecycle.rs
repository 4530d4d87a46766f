//! End-to-end scenarios against a live Postgres instance. Require
//! `DATABASE_URL` (or a local default) pointing at a disposable database and
//! are `#[ignore]`d by default, same convention the rest of the workspace
//! uses for tests that need a real store.

use {
    bigdecimal::BigDecimal,
    chrono::Utc,
    database::{offers, orders::NewOrder, types::Direction, types::PaymentMethod},
    engine::{BatchWriter, OrderEngine, SubscriptionFabric},
    sqlx::PgPool,
    std::str::FromStr,
};

async fn test_engine() -> (OrderEngine, PgPool) {
    let pool = PgPool::connect("postgresql://").await.unwrap();
    database::clear_DANGER(&pool).await.unwrap();
    let writer = BatchWriter::new(pool.clone(), 500);
    let fabric = SubscriptionFabric::new();
    (OrderEngine::new(pool.clone(), writer, fabric), pool)
}

async fn seed_offer(pool: &PgPool, merchant_id: uuid::Uuid, available: &str) -> uuid::Uuid {
    let id = uuid::Uuid::new_v4();
    sqlx::query(
        "INSERT INTO offers (id, merchant_id, direction, payment_method, rate, available_amount, min_amount, max_amount, active) \
         VALUES ($1, $2, 'buy', 'bank', 3.67, $3, 1, 100000, true)",
    )
    .bind(id)
    .bind(merchant_id)
    .bind(BigDecimal::from_str(available).unwrap())
    .execute(pool)
    .await
    .unwrap();
    id
}

#[tokio::test]
#[ignore]
async fn happy_buy_completes_and_restores_nothing() {
    let (engine, pool) = test_engine().await;
    let (user_id, merchant_id) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
    let offer_id = seed_offer(&pool, merchant_id, "1000").await;

    let order = engine
        .create(
            NewOrder {
                order_number: "ORD-1".into(),
                user_id,
                merchant_id,
                buyer_merchant_id: None,
                offer_id,
                direction: Direction::Buy,
                payment_method: PaymentMethod::Bank,
                crypto_amount: BigDecimal::from_str("100").unwrap(),
                crypto_currency: "USDT".into(),
                fiat_amount: BigDecimal::from_str("367").unwrap(),
                fiat_currency: "AED".into(),
                rate: BigDecimal::from_str("3.67").unwrap(),
                protocol_fee_percent: None,
                protocol_fee_amount: None,
                payment_details: None,
                escrow_tx_hash: None,
                extension_minutes: 30,
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let remaining = offers::read(&mut *pool.acquire().await.unwrap(), offer_id).await.unwrap().unwrap();
    assert_eq!(remaining.available_amount, BigDecimal::from_str("900").unwrap());

    let order = engine
        .escrow_lock(order.id, "0xabc".into(), None, None, true, Utc::now())
        .await
        .unwrap();
    assert!(order.escrow_tx_hash.is_some());
    assert_eq!(order.escrow_debited_entity_id, Some(merchant_id));

    let order = engine.release(order.id, "0xrelease".into(), true, Utc::now()).await.unwrap();
    assert_eq!(order.status, database::types::OrderStatus::Completed);
    assert_eq!(order.release_tx_hash, Some("0xrelease".to_string()));
}

#[tokio::test]
#[ignore]
async fn cancel_after_escrow_refunds_recorded_payer_and_restores_offer() {
    let (engine, pool) = test_engine().await;
    let (user_id, merchant_id) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
    let offer_id = seed_offer(&pool, merchant_id, "1000").await;

    let order = engine
        .create(
            NewOrder {
                order_number: "ORD-2".into(),
                user_id,
                merchant_id,
                buyer_merchant_id: None,
                offer_id,
                direction: Direction::Buy,
                payment_method: PaymentMethod::Bank,
                crypto_amount: BigDecimal::from_str("100").unwrap(),
                crypto_currency: "USDT".into(),
                fiat_amount: BigDecimal::from_str("367").unwrap(),
                fiat_currency: "AED".into(),
                rate: BigDecimal::from_str("3.67").unwrap(),
                protocol_fee_percent: None,
                protocol_fee_amount: None,
                payment_details: None,
                escrow_tx_hash: None,
                extension_minutes: 30,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    let order = engine.escrow_lock(order.id, "0xabc".into(), None, None, true, Utc::now()).await.unwrap();

    let order = engine
        .cancel_with_refund(order.id, database::types::ActorType::User, Some(user_id), Some("changed mind".into()), Utc::now())
        .await
        .unwrap();
    assert_eq!(order.status, database::types::OrderStatus::Cancelled);

    let offer = offers::read(&mut *pool.acquire().await.unwrap(), offer_id).await.unwrap().unwrap();
    assert_eq!(offer.available_amount, BigDecimal::from_str("1000").unwrap());
}

#[tokio::test]
#[ignore]
async fn concurrent_creates_never_oversubscribe_liquidity() {
    let (engine, pool) = test_engine().await;
    let merchant_id = uuid::Uuid::new_v4();
    let offer_id = seed_offer(&pool, merchant_id, "50").await;

    let make = |engine: OrderEngine, n: &'static str| {
        let offer_id = offer_id;
        async move {
            engine
                .create(
                    NewOrder {
                        order_number: format!("ORD-RACE-{n}"),
                        user_id: uuid::Uuid::new_v4(),
                        merchant_id,
                        buyer_merchant_id: None,
                        offer_id,
                        direction: Direction::Buy,
                        payment_method: PaymentMethod::Bank,
                        crypto_amount: BigDecimal::from_str("30").unwrap(),
                        crypto_currency: "USDT".into(),
                        fiat_amount: BigDecimal::from_str("110.1").unwrap(),
                        fiat_currency: "AED".into(),
                        rate: BigDecimal::from_str("3.67").unwrap(),
                        protocol_fee_percent: None,
                        protocol_fee_amount: None,
                        payment_details: None,
                        escrow_tx_hash: None,
                        extension_minutes: 30,
                    },
                    Utc::now(),
                )
                .await
        }
    };

    let (a, b) = tokio::join!(make(engine.clone(), "a"), make(engine.clone(), "b"));
    let successes = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);

    let offer = offers::read(&mut *pool.acquire().await.unwrap(), offer_id).await.unwrap().unwrap();
    assert_eq!(offer.available_amount, BigDecimal::from_str("20").unwrap());
}
