//! In-process coalescer for the three fire-and-forget row kinds: order
//! events, outbox notifications, reputation events. The hot path (order
//! lifecycle) was bottlenecked by one round-trip per side effect per
//! request; batching these into one multi-row insert per kind per flush
//! window cuts that by roughly the flush window's fan-in factor, at the
//! cost of a `flush_ms` visibility lag on non-critical audit rows.
//!
//! Critical rows (balance updates, status changes, ledger entries, offer
//! deltas, corridor settlement) never flow through here; they commit with
//! the order transaction itself.

use {
    chrono::{DateTime, Utc},
    database::types::ActorType,
    sqlx::PgPool,
    std::sync::Arc,
    tokio::sync::Mutex,
    tokio_util::sync::CancellationToken,
};

pub struct PendingOrderEvent {
    pub id: uuid::Uuid,
    pub order_id: uuid::Uuid,
    pub event_type: String,
    pub actor_type: ActorType,
    pub actor_id: Option<uuid::Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub struct PendingOutboxEntry {
    pub id: uuid::Uuid,
    pub order_id: uuid::Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub struct PendingReputationEvent {
    pub id: uuid::Uuid,
    pub entity_type: database::types::EntityType,
    pub entity_id: uuid::Uuid,
    pub order_id: Option<uuid::Uuid>,
    pub event_type: String,
    pub weight: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Buffers {
    order_events: Vec<PendingOrderEvent>,
    outbox: Vec<PendingOutboxEntry>,
    reputation: Vec<PendingReputationEvent>,
}

impl Buffers {
    fn len(&self) -> usize {
        self.order_events.len() + self.outbox.len() + self.reputation.len()
    }
}

struct Inner {
    pool: PgPool,
    max_buffer: usize,
    buffers: Mutex<Buffers>,
}

/// Cheap to clone; all clones share the same buffers and pool.
#[derive(Clone)]
pub struct BatchWriter(Arc<Inner>);

impl BatchWriter {
    pub fn new(pool: PgPool, max_buffer: usize) -> Self {
        Self(Arc::new(Inner { pool, max_buffer, buffers: Mutex::new(Buffers::default()) }))
    }

    /// Runs the size-triggered and timer-triggered flush loop until the
    /// given token is cancelled. One instance of this future should run for
    /// the lifetime of the process that owns the writer.
    pub async fn run(&self, flush_ms: u64, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(flush_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.flush().await {
                        tracing::error!(?err, "batch writer periodic flush failed");
                    }
                }
                () = shutdown.cancelled() => {
                    if let Err(err) = self.flush().await {
                        tracing::error!(?err, "batch writer shutdown flush failed");
                    }
                    break;
                }
            }
        }
    }

    pub async fn push_order_event(&self, event: PendingOrderEvent) {
        let should_flush = {
            let mut buffers = self.0.buffers.lock().await;
            buffers.order_events.push(event);
            buffers.len() >= self.0.max_buffer
        };
        if should_flush {
            self.flush_and_log().await;
        }
    }

    pub async fn push_outbox(&self, entry: PendingOutboxEntry) {
        let should_flush = {
            let mut buffers = self.0.buffers.lock().await;
            buffers.outbox.push(entry);
            buffers.len() >= self.0.max_buffer
        };
        if should_flush {
            self.flush_and_log().await;
        }
    }

    pub async fn push_reputation(&self, event: PendingReputationEvent) {
        let should_flush = {
            let mut buffers = self.0.buffers.lock().await;
            buffers.reputation.push(event);
            buffers.len() >= self.0.max_buffer
        };
        if should_flush {
            self.flush_and_log().await;
        }
    }

    async fn flush_and_log(&self) {
        if let Err(err) = self.flush().await {
            tracing::error!(?err, "batch writer size-triggered flush failed");
        }
    }

    /// Swaps all three buffers out atomically, then issues one multi-row
    /// insert per non-empty buffer, in parallel. A failure on one buffer
    /// does not block or retry the others; the audit log and outbox worker
    /// are the recovery surface for anything dropped here.
    async fn flush(&self) -> Result<(), sqlx::Error> {
        let Buffers { order_events, outbox, reputation } = {
            let mut buffers = self.0.buffers.lock().await;
            std::mem::take(&mut *buffers)
        };

        let (events_result, outbox_result, reputation_result) = tokio::join!(
            flush_order_events(&self.0.pool, &order_events),
            flush_outbox(&self.0.pool, &outbox),
            flush_reputation(&self.0.pool, &reputation),
        );

        for (result, label) in
            [(events_result, "order_events"), (outbox_result, "notification_outbox"), (reputation_result, "reputation_events")]
        {
            if let Err(err) = result {
                tracing::error!(?err, table = label, "batch insert failed");
            }
        }
        Ok(())
    }
}

async fn flush_order_events(pool: &PgPool, rows: &[PendingOrderEvent]) -> Result<(), sqlx::Error> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut builder = sqlx::QueryBuilder::new(
        "INSERT INTO order_events (id, order_id, event_type, actor_type, actor_id, metadata, created_at) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.order_id)
            .push_bind(&row.event_type)
            .push_bind(row.actor_type)
            .push_bind(row.actor_id)
            .push_bind(&row.metadata)
            .push_bind(row.created_at);
    });
    builder.build().execute(pool).await.map(|_| ())
}

async fn flush_outbox(pool: &PgPool, rows: &[PendingOutboxEntry]) -> Result<(), sqlx::Error> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut builder = sqlx::QueryBuilder::new(
        "INSERT INTO notification_outbox (id, order_id, event_type, payload, status, attempts, created_at) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.order_id)
            .push_bind(&row.event_type)
            .push_bind(&row.payload)
            .push_bind("pending")
            .push_bind(0_i32)
            .push_bind(row.created_at);
    });
    builder.build().execute(pool).await.map(|_| ())
}

async fn flush_reputation(pool: &PgPool, rows: &[PendingReputationEvent]) -> Result<(), sqlx::Error> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut builder = sqlx::QueryBuilder::new(
        "INSERT INTO reputation_events (id, entity_type, entity_id, order_id, event_type, weight, created_at) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.entity_type)
            .push_bind(row.entity_id)
            .push_bind(row.order_id)
            .push_bind(&row.event_type)
            .push_bind(row.weight)
            .push_bind(row.created_at);
    });
    builder.push(" ON CONFLICT DO NOTHING");
    builder.build().execute(pool).await.map(|_| ())
}
