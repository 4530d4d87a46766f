//! Primary entrypoint for the order lifecycle: create, transition,
//! escrow-lock, release, cancel-with-refund, extension, and dispute. Every
//! operation here opens exactly one transaction, locks what it mutates,
//! commits, and only then fans out audit/notification/reputation rows and a
//! subscription-fabric publish. Those fan-out steps are best-effort and
//! never able to undo the commit.

use {
    crate::{
        batch_writer::{BatchWriter, PendingOrderEvent, PendingOutboxEntry, PendingReputationEvent},
        corridor_engine,
        error::OrderError,
        state_machine::{self, TransitionContext},
        subscription::{OrderEventAddress, SubscriptionFabric},
    },
    bigdecimal::BigDecimal,
    chrono::{DateTime, Duration, Utc},
    database::{
        PgTransaction,
        balances,
        disputes,
        ledger::{self, NewLedgerEntry},
        offers,
        orders::{self, NewOrder, Order},
        types::{ActorType, DisputeResolutionKind, DisputeStatus, EntityType, LedgerEntryType, OrderStatus},
    },
    sqlx::PgPool,
};

const PENDING_WINDOW: Duration = Duration::minutes(15);
const ACCEPTED_WINDOW: Duration = Duration::minutes(120);
const DEFAULT_MAX_EXTENSIONS: i32 = 3;

#[derive(Clone)]
pub struct OrderEngine {
    pool: PgPool,
    batch_writer: BatchWriter,
    fabric: SubscriptionFabric,
}

/// Who pays the escrow debit for an order, per `determineEscrowPayer`:
/// M2M buy keeps the initiating (selling) merchant as payer; M2M sell moves
/// it to the counterparty merchant; otherwise the merchant pays on a buy
/// (they're selling crypto) and the user pays on a sell.
fn determine_escrow_payer(order: &Order) -> (EntityType, uuid::Uuid) {
    use database::types::Direction;
    match (order.buyer_merchant_id, order.direction) {
        (Some(_), Direction::Buy) => (EntityType::Merchant, order.merchant_id),
        (Some(buyer_merchant_id), Direction::Sell) => (EntityType::Merchant, buyer_merchant_id),
        (None, Direction::Buy) => (EntityType::Merchant, order.merchant_id),
        (None, Direction::Sell) => (EntityType::User, order.user_id),
    }
}

/// Public wrapper so the corridor timeout worker can resolve which entity's
/// sAED balance a corridor-routed order locked, without duplicating the
/// buyer-resolution rule.
pub fn corridor_buyer(order: &Order) -> (EntityType, uuid::Uuid) {
    determine_escrow_payer(order)
}

/// Who is credited on release: the counterparty of whoever paid at lock.
fn determine_escrow_recipient(order: &Order) -> (EntityType, uuid::Uuid) {
    use database::types::Direction;
    match (order.buyer_merchant_id, order.direction) {
        (Some(buyer_merchant_id), Direction::Buy) => (EntityType::Merchant, buyer_merchant_id),
        (Some(_), Direction::Sell) => (EntityType::Merchant, order.merchant_id),
        (None, Direction::Buy) => (EntityType::User, order.user_id),
        (None, Direction::Sell) => (EntityType::Merchant, order.merchant_id),
    }
}

fn transition_context(order: &Order, actor_type: ActorType, actor_id: Option<uuid::Uuid>, is_m2m: bool) -> TransitionContext {
    TransitionContext {
        order_user_id: order.user_id,
        order_merchant_id: order.merchant_id,
        order_buyer_merchant_id: order.buyer_merchant_id,
        escrow_tx_hash_set: order.escrow_tx_hash.is_some(),
        release_tx_hash_set: order.release_tx_hash.is_some(),
        is_m2m,
        actor_type,
        actor_id,
    }
}

impl OrderEngine {
    pub fn new(pool: PgPool, batch_writer: BatchWriter, fabric: SubscriptionFabric) -> Self {
        Self { pool, batch_writer, fabric }
    }

    /// Decrements the offer's available liquidity and inserts the order in
    /// one transaction. `INSUFFICIENT_LIQUIDITY` aborts with no partial
    /// effect: the `WHERE available_amount >= $n` guard and the row insert
    /// either both happen or neither does.
    pub async fn create(&self, new: NewOrder, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let id = uuid::Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        if offers::reserve(&mut tx, new.offer_id, &new.crypto_amount).await?.is_none() {
            return Err(OrderError::InsufficientLiquidity);
        }

        let order = orders::insert_order(&mut tx, id, now, now + PENDING_WINDOW, &new).await?;
        tx.commit().await?;

        self.emit_side_effects(&order, "order_created", None, ActorType::System, None, None).await;
        Ok(order)
    }

    /// Drives a state transition: `SELECT ... FOR UPDATE`, validate against
    /// the DAG, apply the timestamp side effects for the target status, and
    /// save the whole row back in the same transaction.
    pub async fn transition(
        &self,
        order_id: uuid::Uuid,
        to: OrderStatus,
        actor_type: ActorType,
        actor_id: Option<uuid::Uuid>,
        reason: Option<String>,
        metadata: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        let from = order.status;

        let is_m2m = order.buyer_merchant_id.is_some() && order.escrow_tx_hash.is_none();
        let ctx = transition_context(&order, actor_type, actor_id, is_m2m);
        state_machine::validate_transition(from, to, &ctx)?;

        if from == to {
            // No-op acceptance of an already-escrowed order: nothing to save.
            tx.commit().await?;
            return Ok(order);
        }

        match to {
            OrderStatus::Accepted => {
                order.accepted_at = Some(now);
                order.expires_at = Some(now + ACCEPTED_WINDOW);
                if let Some(acceptor) = actor_id {
                    // Escrow creator keeps merchant_id; the acceptor becomes
                    // buyer_merchant_id. Regressions are rejected above by
                    // checking escrow_tx_hash before the claim is applied.
                    if order.escrow_tx_hash.is_some() {
                        order.buyer_merchant_id = Some(acceptor);
                    } else if actor_type == ActorType::Merchant && acceptor != order.merchant_id {
                        order.merchant_id = acceptor;
                    }
                }
            }
            OrderStatus::Cancelled => {
                order.cancelled_at = Some(now);
                order.cancelled_by_actor_type = Some(actor_type);
                order.cancelled_by_actor_id = actor_id;
                order.cancellation_reason = reason.clone();
            }
            OrderStatus::Expired => order.expired_at = Some(now),
            OrderStatus::PaymentSent => order.payment_sent_at = Some(now),
            OrderStatus::PaymentConfirmed => order.payment_confirmed_at = Some(now),
            OrderStatus::Completed => {
                order.completed_at = Some(now);
                order.payment_confirmed_at = order.payment_confirmed_at.or(Some(now));
                if let Some(fulfillment_id) = order.corridor_fulfillment_id {
                    corridor_engine::bridge_on_completion(&mut tx, fulfillment_id, now)
                        .await
                        .map_err(|_| OrderError::OrderStatusChanged)?;
                }
            }
            OrderStatus::Disputed => {}
            OrderStatus::Pending | OrderStatus::Escrowed | OrderStatus::EscrowPending | OrderStatus::Releasing => {}
        }

        order.status = to;
        order.order_version += 1;

        if state_machine::should_restore_liquidity(from, to) {
            offers::restore(&mut tx, order.offer_id, &order.crypto_amount).await?;
        }

        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        let event_type = state_machine::transition_event_type(to);
        self.emit_side_effects(&order, &event_type, Some(from), actor_type, actor_id, metadata).await;
        if to.is_terminal() || to == OrderStatus::Disputed {
            self.emit_reputation_for_terminal(&order, to, now).await;
        }
        Ok(order)
    }

    /// Locks escrow for an order: picks the payer, debits them (mock mode
    /// only, real funds are held on chain), and records the immutable
    /// debit that the refund path later relies on.
    pub async fn escrow_lock(
        &self,
        order_id: uuid::Uuid,
        tx_hash: String,
        escrow_creator_wallet: Option<String>,
        escrow_program_address: Option<String>,
        mock_mode: bool,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;

        if order.escrow_tx_hash.is_some() {
            return Err(OrderError::AlreadyEscrowed);
        }
        let ctx = transition_context(&order, ActorType::System, None, false);
        state_machine::validate_transition(order.status, OrderStatus::Escrowed, &ctx)
            .map_err(|_| OrderError::OrderStatusChanged)?;

        let (payer_type, payer_id) = determine_escrow_payer(&order);

        if mock_mode {
            let balance = balances::lock_or_create(&mut tx, payer_type, payer_id, now).await?;
            if balance.usdt_balance < order.crypto_amount {
                return Err(OrderError::InsufficientBalance);
            }
            let (before, after) =
                balances::adjust_usdt(&mut tx, payer_type, payer_id, &(-&order.crypto_amount), now).await?;
            ledger::insert(
                &mut tx,
                uuid::Uuid::new_v4(),
                NewLedgerEntry {
                    entry_type: LedgerEntryType::EscrowLock,
                    entity_type: payer_type,
                    entity_id: payer_id,
                    order_id: Some(order.id),
                    currency: "usdt",
                    amount: -order.crypto_amount.clone(),
                    balance_before: before,
                    balance_after: after,
                },
                now,
            )
            .await?;
        }

        order.status = OrderStatus::Escrowed;
        order.escrowed_at = Some(now);
        order.escrow_tx_hash = Some(tx_hash);
        order.escrow_creator_wallet = escrow_creator_wallet;
        order.escrow_program_address = escrow_program_address;
        order.escrow_debited_entity_type = Some(payer_type);
        order.escrow_debited_entity_id = Some(payer_id);
        order.escrow_debited_amount = Some(order.crypto_amount.clone());
        order.escrow_debited_at = Some(now);
        order.expires_at = Some(now + ACCEPTED_WINDOW);
        order.order_version += 1;

        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        self.emit_side_effects(&order, "status_changed_to_escrowed", None, ActorType::System, None, None).await;
        Ok(order)
    }

    /// Marks an order released: funds have moved on-chain, so this mostly
    /// records the fact. In mock mode it also credits the recipient. The
    /// invariant verifier runs after commit and never undoes it.
    pub async fn release(&self, order_id: uuid::Uuid, tx_hash: String, mock_mode: bool, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        let from = order.status;

        let ctx = transition_context(&order, ActorType::System, None, false);
        let mut release_ctx = ctx;
        release_ctx.release_tx_hash_set = true;
        state_machine::validate_transition(from, OrderStatus::Completed, &release_ctx)?;

        if mock_mode {
            let (recipient_type, recipient_id) = determine_escrow_recipient(&order);
            let (before, after) =
                balances::adjust_usdt(&mut tx, recipient_type, recipient_id, &order.crypto_amount, now).await?;
            ledger::insert(
                &mut tx,
                uuid::Uuid::new_v4(),
                NewLedgerEntry {
                    entry_type: LedgerEntryType::EscrowRelease,
                    entity_type: recipient_type,
                    entity_id: recipient_id,
                    order_id: Some(order.id),
                    currency: "usdt",
                    amount: order.crypto_amount.clone(),
                    balance_before: before,
                    balance_after: after,
                },
                now,
            )
            .await?;
        }

        if let Some(fulfillment_id) = order.corridor_fulfillment_id {
            corridor_engine::bridge_on_completion(&mut tx, fulfillment_id, now)
                .await
                .map_err(|_| OrderError::OrderStatusChanged)?;
        }

        order.status = OrderStatus::Completed;
        order.release_tx_hash = Some(tx_hash);
        order.completed_at = Some(now);
        order.payment_confirmed_at = order.payment_confirmed_at.or(Some(now));
        order.order_version += 1;
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        self.emit_side_effects(&order, "status_changed_to_completed", Some(from), ActorType::System, None, None).await;
        self.emit_reputation_for_terminal(&order, OrderStatus::Completed, now).await;

        let expectation = crate::invariant::ReleaseExpectation { order_id: order.id, expected_min_order_version: order.order_version };
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Ok(mut tx) = pool.begin().await
                && let Err(err) = crate::invariant::verify_release(&mut tx, expectation).await
            {
                tracing::error!(?err, "release invariant check errored");
            }
        });

        Ok(order)
    }

    /// The dedicated atomic refund path: refunds exactly the debit recorded
    /// at lock time, never the order's current face amount, so a rate that
    /// moved between lock and cancel can't create or destroy value.
    pub async fn cancel_with_refund(
        &self,
        order_id: uuid::Uuid,
        actor_type: ActorType,
        actor_id: Option<uuid::Uuid>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        let from = order.status;

        let ctx = transition_context(&order, actor_type, actor_id, false);
        state_machine::validate_transition(from, OrderStatus::Cancelled, &ctx)?;

        let (payer_type, payer_id, amount) = match (order.escrow_debited_entity_type, order.escrow_debited_entity_id, &order.escrow_debited_amount) {
            (Some(t), Some(id), Some(amount)) => (t, id, amount.clone()),
            _ => return Err(OrderError::NoDebitRecord),
        };

        let (before, after) = balances::adjust_usdt(&mut tx, payer_type, payer_id, &amount, now).await?;
        ledger::insert(
            &mut tx,
            uuid::Uuid::new_v4(),
            NewLedgerEntry {
                entry_type: LedgerEntryType::EscrowRefund,
                entity_type: payer_type,
                entity_id: payer_id,
                order_id: Some(order.id),
                currency: "usdt",
                amount: amount.clone(),
                balance_before: before,
                balance_after: after,
            },
            now,
        )
        .await?;

        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(now);
        order.cancelled_by_actor_type = Some(actor_type);
        order.cancelled_by_actor_id = actor_id;
        order.cancellation_reason = reason;
        order.order_version += 1;

        if state_machine::should_restore_liquidity(from, OrderStatus::Cancelled) {
            offers::restore(&mut tx, order.offer_id, &order.crypto_amount).await?;
        }

        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        self.emit_side_effects(&order, "status_changed_to_cancelled", Some(from), actor_type, actor_id, None).await;
        self.emit_reputation_for_terminal(&order, OrderStatus::Cancelled, now).await;

        let mut verify_tx = self.pool.begin().await?;
        let expectation =
            crate::invariant::RefundExpectation { order_id: order.id, expected_min_order_version: order.order_version };
        if !crate::invariant::verify_refund(&mut verify_tx, expectation).await? {
            return Err(OrderError::RefundInvariantFailed(order.id));
        }
        Ok(order)
    }

    /// Routes an order's fiat leg through the sAED corridor once a
    /// fulfillment has been matched for it. Kept separate from
    /// [`crate::corridor_engine::CorridorEngine::match_order`] because that
    /// call has no order-table access of its own.
    pub async fn attach_corridor(&self, order_id: uuid::Uuid, fulfillment_id: uuid::Uuid) -> Result<Order, OrderError> {
        use database::types::PaymentVia;
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        order.payment_via = PaymentVia::SaedCorridor;
        order.corridor_fulfillment_id = Some(fulfillment_id);
        order.order_version += 1;
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Reverts an order to direct bank settlement after its corridor
    /// fulfillment timed out. Called by the corridor timeout worker after
    /// [`crate::corridor_engine::timeout_refund`] has already refunded the
    /// buyer in the same transaction.
    pub async fn detach_corridor_to_bank(&self, order_id: uuid::Uuid, now: DateTime<Utc>) -> Result<Order, OrderError> {
        use database::types::PaymentVia;
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        order.payment_via = PaymentVia::Bank;
        order.corridor_fulfillment_id = None;
        order.order_version += 1;
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        self.batch_writer
            .push_outbox(PendingOutboxEntry {
                id: uuid::Uuid::new_v4(),
                order_id: order.id,
                event_type: "CORRIDOR_TIMEOUT".to_string(),
                payload: serde_json::json!({
                    "order_id": order.id,
                    "order_version": order.order_version,
                }),
                created_at: now,
            })
            .await;
        Ok(order)
    }

    /// Records a pending extension request; does not itself change
    /// `expires_at` until the counterparty accepts via [`Self::accept_extension`].
    pub async fn request_extension(
        &self,
        order_id: uuid::Uuid,
        requested_by: ActorType,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        if order.extension_count >= order.max_extensions.max(DEFAULT_MAX_EXTENSIONS) {
            return Err(OrderError::MaxExtensionsReached);
        }
        order.extension_requested_by = Some(requested_by);
        order.extension_requested_at = Some(now);
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn accept_extension(&self, order_id: uuid::Uuid, now: DateTime<Utc>) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        if order.extension_requested_by.is_none() {
            return Err(OrderError::OrderStatusChanged);
        }
        if order.extension_count >= order.max_extensions {
            return Err(OrderError::MaxExtensionsReached);
        }
        order.expires_at = Some(order.expires_at.unwrap_or(now) + Duration::minutes(order.extension_minutes.into()));
        order.extension_count += 1;
        order.extension_requested_by = None;
        order.extension_requested_at = None;
        order.order_version += 1;
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn open_dispute(
        &self,
        dispute_id: uuid::Uuid,
        order_id: uuid::Uuid,
        raised_by_actor_type: ActorType,
        raised_by_actor_id: uuid::Uuid,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            orders::lock_for_update(&mut tx, order_id).await?.ok_or(OrderError::NotFound(order_id))?;
        let ctx = transition_context(&order, raised_by_actor_type, Some(raised_by_actor_id), false);
        state_machine::validate_transition(order.status, OrderStatus::Disputed, &ctx)?;

        disputes::insert(&mut tx, dispute_id, order_id, raised_by_actor_type, raised_by_actor_id, &reason, now).await?;
        order.status = OrderStatus::Disputed;
        order.order_version += 1;
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        self.emit_side_effects(&order, "status_changed_to_disputed", None, raised_by_actor_type, Some(raised_by_actor_id), None)
            .await;
        self.emit_reputation_for_terminal(&order, OrderStatus::Disputed, now).await;
        Ok(order)
    }

    /// Records one party's confirmation of a proposed resolution. The
    /// second confirmation (from the other party) finalizes it: credits
    /// balances and moves the order to its resolved terminal state. `split`
    /// percentages default to 50/50 when unspecified.
    pub async fn confirm_dispute(
        &self,
        dispute_id: uuid::Uuid,
        confirming_actor: ActorType,
        resolution: DisputeResolutionKind,
        user_split_percent: Option<BigDecimal>,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        let mut dispute = disputes::lock_for_update(&mut tx, dispute_id).await?.ok_or(OrderError::NotFound(dispute_id))?;
        let mut order =
            orders::lock_for_update(&mut tx, dispute.order_id).await?.ok_or(OrderError::NotFound(dispute.order_id))?;

        let next_status = match (dispute.status, confirming_actor) {
            (DisputeStatus::Open, ActorType::User) => DisputeStatus::UserConfirmed,
            (DisputeStatus::Open, ActorType::Merchant) => DisputeStatus::MerchantConfirmed,
            (DisputeStatus::UserConfirmed, ActorType::Merchant) | (DisputeStatus::MerchantConfirmed, ActorType::User) => {
                DisputeStatus::Resolved
            }
            _ => return Err(OrderError::NotAuthorized),
        };

        if next_status != DisputeStatus::Resolved {
            dispute.status = next_status;
            disputes::set_status(&mut tx, dispute_id, next_status).await?;
            tx.commit().await?;
            return Ok(order);
        }

        let (user_pct, merchant_pct) = match resolution {
            DisputeResolutionKind::User => (BigDecimal::from(100), BigDecimal::from(0)),
            DisputeResolutionKind::Merchant => (BigDecimal::from(0), BigDecimal::from(100)),
            DisputeResolutionKind::Split => {
                let user_pct = user_split_percent.unwrap_or_else(|| BigDecimal::from(50));
                let merchant_pct = BigDecimal::from(100) - &user_pct;
                (user_pct, merchant_pct)
            }
        };

        let user_amount = (&order.crypto_amount * &user_pct / BigDecimal::from(100)).with_scale(0);
        let merchant_amount = &order.crypto_amount - &user_amount;
        let _ = merchant_pct;

        if user_amount > BigDecimal::from(0) {
            let (before, after) = balances::adjust_usdt(&mut tx, EntityType::User, order.user_id, &user_amount, now).await?;
            ledger::insert(
                &mut tx,
                uuid::Uuid::new_v4(),
                NewLedgerEntry {
                    entry_type: LedgerEntryType::EscrowRelease,
                    entity_type: EntityType::User,
                    entity_id: order.user_id,
                    order_id: Some(order.id),
                    currency: "usdt",
                    amount: user_amount,
                    balance_before: before,
                    balance_after: after,
                },
                now,
            )
            .await?;
        }
        if merchant_amount > BigDecimal::from(0) {
            let (before, after) =
                balances::adjust_usdt(&mut tx, EntityType::Merchant, order.merchant_id, &merchant_amount, now).await?;
            ledger::insert(
                &mut tx,
                uuid::Uuid::new_v4(),
                NewLedgerEntry {
                    entry_type: LedgerEntryType::EscrowRelease,
                    entity_type: EntityType::Merchant,
                    entity_id: order.merchant_id,
                    order_id: Some(order.id),
                    currency: "usdt",
                    amount: merchant_amount,
                    balance_before: before,
                    balance_after: after,
                },
                now,
            )
            .await?;
        }

        let resolved_order_status =
            if resolution == DisputeResolutionKind::User { OrderStatus::Cancelled } else { OrderStatus::Completed };
        disputes::resolve(&mut tx, dispute_id, resolution, None, now).await?;
        order.status = resolved_order_status;
        order.order_version += 1;
        if resolved_order_status == OrderStatus::Completed {
            order.completed_at = Some(now);
        } else {
            order.cancelled_at = Some(now);
        }
        orders::save(&mut tx, &order).await?;
        tx.commit().await?;

        self.emit_side_effects(
            &order,
            &state_machine::transition_event_type(resolved_order_status),
            Some(OrderStatus::Disputed),
            confirming_actor,
            None,
            None,
        )
        .await;
        self.emit_reputation_for_terminal(&order, resolved_order_status, now).await;
        Ok(order)
    }

    /// Pushes the audit event, outbox notification, and fabric publish for
    /// one committed transition. Always runs after the commit that produced
    /// `order`; never allowed to fail the caller's operation.
    async fn emit_side_effects(
        &self,
        order: &Order,
        event_type: &str,
        previous_status: Option<OrderStatus>,
        actor_type: ActorType,
        actor_id: Option<uuid::Uuid>,
        metadata: Option<serde_json::Value>,
    ) {
        let now = Utc::now();
        self.batch_writer
            .push_order_event(PendingOrderEvent {
                id: uuid::Uuid::new_v4(),
                order_id: order.id,
                event_type: event_type.to_string(),
                actor_type,
                actor_id,
                metadata,
                created_at: now,
            })
            .await;
        self.batch_writer
            .push_outbox(PendingOutboxEntry {
                id: uuid::Uuid::new_v4(),
                order_id: order.id,
                event_type: event_type.to_uppercase(),
                payload: serde_json::json!({
                    "order_id": order.id,
                    "status": order.status.as_str(),
                    "order_version": order.order_version,
                }),
                created_at: now,
            })
            .await;
        self.fabric.publish(&OrderEventAddress {
            event_type: event_type.to_string(),
            order_id: order.id,
            status: order.status,
            order_version: order.order_version,
            previous_status,
            user_id: order.user_id,
            merchant_id: order.merchant_id,
            buyer_merchant_id: order.buyer_merchant_id,
        });
    }

    /// `+5` completed, `-2` cancelled, `-5` disputed/expired, once per party
    /// per order.
    async fn emit_reputation_for_terminal(&self, order: &Order, status: OrderStatus, now: DateTime<Utc>) {
        let weight = match status {
            OrderStatus::Completed => 5,
            OrderStatus::Cancelled => -2,
            OrderStatus::Expired | OrderStatus::Disputed => -5,
            _ => return,
        };
        for (entity_type, entity_id) in [
            (EntityType::User, order.user_id),
            (EntityType::Merchant, order.merchant_id),
        ] {
            self.batch_writer
                .push_reputation(PendingReputationEvent {
                    id: uuid::Uuid::new_v4(),
                    entity_type,
                    entity_id,
                    order_id: Some(order.id),
                    event_type: state_machine::transition_event_type(status),
                    weight,
                    created_at: now,
                })
                .await;
        }
    }
}
