//! Matches buyers to a synthetic-sAED liquidity provider and drives a
//! fulfillment through its own small lifecycle, parallel to but linked from
//! the order it settles.

use {
    crate::error::CorridorError,
    bigdecimal::BigDecimal,
    chrono::{DateTime, Duration, Utc},
    database::{
        PgTransaction,
        balances,
        corridor_fulfillments::{self, CorridorFulfillment},
        corridor_providers,
        ledger::{self, NewLedgerEntry},
        orders,
        types::{EntityType, FulfillmentStatus, LedgerEntryType},
    },
    sqlx::PgPool,
};

const FULFILLMENT_WINDOW: Duration = Duration::minutes(30);

#[derive(Clone)]
pub struct CorridorEngine {
    pool: PgPool,
}

pub struct MatchInput {
    pub order_id: uuid::Uuid,
    pub buyer_entity_type: EntityType,
    pub buyer_entity_id: uuid::Uuid,
    pub fiat_fils: BigDecimal,
}

impl CorridorEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Selects the single cheapest-fee, online, in-hours, amount-capable LP
    /// that is neither buyer nor seller, locks the buyer's sAED for
    /// `fiat + fee` computed from the selected LP's own fee, and opens a
    /// fulfillment. All in one transaction; returns
    /// [`CorridorError::NoLpAvailable`] if nothing matches, leaving the
    /// buyer's balance untouched.
    pub async fn match_order(
        &self,
        id: uuid::Uuid,
        input: MatchInput,
        now: DateTime<Utc>,
    ) -> Result<CorridorFulfillment, CorridorError> {
        let mut tx = self.pool.begin().await?;

        let order =
            orders::lock_for_update(&mut tx, input.order_id).await?.ok_or(CorridorError::OrderNotFound(input.order_id))?;
        let excluded_buyer_merchant =
            (input.buyer_entity_type == EntityType::Merchant).then_some(input.buyer_entity_id);

        let candidates =
            corridor_providers::lock_eligible_for_match(&mut tx, &input.fiat_fils, order.merchant_id, excluded_buyer_merchant)
                .await?;
        let Some(provider) = candidates.into_iter().find(|p| p.in_service_hours(now)) else {
            return Err(CorridorError::NoLpAvailable);
        };

        let fee_fils = (&input.fiat_fils * &provider.fee_percentage / BigDecimal::from(100)).with_scale(0);
        let lock_amount = &input.fiat_fils + &fee_fils;

        let buyer = balances::lock_for_update(&mut tx, input.buyer_entity_type, input.buyer_entity_id)
            .await?
            .ok_or(CorridorError::BuyerNotFound)?;
        if buyer.sinr_balance < lock_amount {
            return Err(CorridorError::InsufficientSaed);
        }

        corridor_providers::reserve(&mut tx, provider.id, &lock_amount)
            .await?
            .ok_or(CorridorError::NoLpAvailable)?;

        let (before, after) =
            balances::adjust_sinr(&mut tx, input.buyer_entity_type, input.buyer_entity_id, &(-&lock_amount), now)
                .await?;
        ledger::insert(
            &mut tx,
            uuid::Uuid::new_v4(),
            NewLedgerEntry {
                entry_type: LedgerEntryType::CorridorSaedLock,
                entity_type: input.buyer_entity_type,
                entity_id: input.buyer_entity_id,
                order_id: Some(input.order_id),
                currency: "saed",
                amount: -lock_amount.clone(),
                balance_before: before,
                balance_after: after,
            },
            now,
        )
        .await?;

        let fulfillment = corridor_fulfillments::insert(
            &mut tx,
            id,
            input.order_id,
            provider.id,
            provider.merchant_id,
            &lock_amount,
            &input.fiat_fils,
            &fee_fils,
            now,
            now + FULFILLMENT_WINDOW,
        )
        .await?;

        tx.commit().await?;
        Ok(fulfillment)
    }

    /// LP marks its fiat leg sent. Rejects if the caller isn't the assigned
    /// provider merchant or if the fulfillment is no longer pending.
    pub async fn mark_payment_sent(
        &self,
        fulfillment_id: uuid::Uuid,
        actor_merchant_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> Result<CorridorFulfillment, CorridorError> {
        let mut tx = self.pool.begin().await?;
        let mut fulfillment = corridor_fulfillments::lock_for_update(&mut tx, fulfillment_id)
            .await?
            .ok_or(CorridorError::FulfillmentNotFound(fulfillment_id))?;
        if fulfillment.provider_merchant_id != actor_merchant_id {
            return Err(CorridorError::NotAuthorized);
        }
        if fulfillment.status != FulfillmentStatus::Pending {
            return Err(CorridorError::InvalidFulfillmentState);
        }
        fulfillment.status = FulfillmentStatus::PaymentSent;
        fulfillment.payment_sent_at = Some(now);
        corridor_fulfillments::save(&mut tx, &fulfillment).await?;
        tx.commit().await?;
        Ok(fulfillment)
    }
}

/// Credits the matched LP and closes out the fulfillment when the order it
/// backs reaches `completed`. Called from inside the order's own completion
/// transaction: a failure here must roll that completion back, which is
/// why this takes the caller's transaction rather than opening its own.
pub async fn bridge_on_completion(
    ex: &mut PgTransaction<'_>,
    fulfillment_id: uuid::Uuid,
    now: DateTime<Utc>,
) -> Result<(), CorridorError> {
    let mut fulfillment = corridor_fulfillments::lock_for_update(ex, fulfillment_id)
        .await?
        .ok_or(CorridorError::FulfillmentNotFound(fulfillment_id))?;
    if fulfillment.status == FulfillmentStatus::Completed {
        return Ok(());
    }

    let (before, after) =
        balances::adjust_sinr(ex, EntityType::Merchant, fulfillment.provider_merchant_id, &fulfillment.saed_amount, now)
            .await?;
    ledger::insert(
        ex,
        uuid::Uuid::new_v4(),
        NewLedgerEntry {
            entry_type: LedgerEntryType::CorridorSaedTransfer,
            entity_type: EntityType::Merchant,
            entity_id: fulfillment.provider_merchant_id,
            order_id: Some(fulfillment.order_id),
            currency: "saed",
            amount: fulfillment.saed_amount.clone(),
            balance_before: before,
            balance_after: after,
        },
        now,
    )
    .await?;

    fulfillment.status = FulfillmentStatus::Completed;
    fulfillment.completed_at = Some(now);
    corridor_fulfillments::save(ex, &fulfillment).await?;
    Ok(())
}

/// Refunds one overdue fulfillment: marks it `failed`, returns the locked
/// sAED to the buyer, and detaches it from its order. Caller (the timeout
/// worker) owns the order-side update of `payment_via`/`corridor_fulfillment_id`
/// back to bank settlement, since this module has no order-table access.
pub async fn timeout_refund(
    ex: &mut PgTransaction<'_>,
    fulfillment: &CorridorFulfillment,
    buyer_entity_type: EntityType,
    buyer_entity_id: uuid::Uuid,
    now: DateTime<Utc>,
) -> Result<(), CorridorError> {
    let (before, after) =
        balances::adjust_sinr(ex, buyer_entity_type, buyer_entity_id, &fulfillment.saed_amount, now).await?;
    ledger::insert(
        ex,
        uuid::Uuid::new_v4(),
        NewLedgerEntry {
            entry_type: LedgerEntryType::CorridorSaedTransfer,
            entity_type: buyer_entity_type,
            entity_id: buyer_entity_id,
            order_id: Some(fulfillment.order_id),
            currency: "saed",
            amount: fulfillment.saed_amount.clone(),
            balance_before: before,
            balance_after: after,
        },
        now,
    )
    .await?;

    let mut updated = fulfillment.clone();
    updated.status = FulfillmentStatus::Failed;
    updated.failed_at = Some(now);
    corridor_fulfillments::save(ex, &updated).await?;
    Ok(())
}
