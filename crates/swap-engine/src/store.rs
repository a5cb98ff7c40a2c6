//! # Order Store
//!
//! Persists orders and swap records as JSON in a [`KeyValueStore`].
//!
//! Every mutation is a read-modify-write under the store's write lock, so a
//! reader always sees the latest committed record and concurrent updates to
//! the same id cannot be lost. Swap and order changes that belong together
//! are committed in one atomic batch.
//!
//! Keys: `order:<uuid>`, `swap:<uuid>`.

use crate::domain::{
    LegRef, Order, OrderId, OrderParams, OrderStatus, OrderType, PartySpec, SwapError, SwapId,
    SwapRecord, Timelock,
};
use crate::ports::{BatchOperation, KVStoreError, KeyValueStore, TimeSource};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use swap_crypto::generate_secret_and_hashlock;
use tracing::{debug, info, warn};

const ORDER_PREFIX: &str = "order:";
const SWAP_PREFIX: &str = "swap:";

/// Fields an order update may change besides its status.
#[derive(Clone, Debug, Default)]
pub struct OrderPatch {
    /// Record the maker's locked leg.
    pub escrow_source: Option<LegRef>,
    /// Record the taker's locked leg.
    pub escrow_destination: Option<LegRef>,
    /// Revise the taker amount (e.g. after a fresh quote).
    pub taker_amount: Option<u128>,
}

impl OrderPatch {
    fn apply(self, order: &mut Order) {
        if let Some(leg) = self.escrow_source {
            order.escrow.source = Some(leg);
        }
        if let Some(leg) = self.escrow_destination {
            order.escrow.destination = Some(leg);
        }
        if let Some(amount) = self.taker_amount {
            order.taker.amount = amount;
        }
    }
}

/// Filter for [`OrderStore::list_orders`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderFilter {
    /// Only orders in this status.
    pub status: Option<OrderStatus>,
    /// Only orders of this direction.
    pub order_type: Option<OrderType>,
}

impl OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.order_type.map_or(true, |t| order.order_type == t)
    }
}

/// Durable order and swap store.
pub struct OrderStore<KV: KeyValueStore> {
    kv: RwLock<KV>,
    clock: Arc<dyn TimeSource>,
}

fn order_key(id: &OrderId) -> Vec<u8> {
    format!("{}{}", ORDER_PREFIX, id).into_bytes()
}

fn swap_key(id: &SwapId) -> Vec<u8> {
    format!("{}{}", SWAP_PREFIX, id).into_bytes()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SwapError> {
    serde_json::to_vec(value).map_err(|e| SwapError::Storage(format!("encode: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SwapError> {
    serde_json::from_slice(bytes).map_err(|e| {
        KVStoreError::CorruptionError {
            message: e.to_string(),
        }
        .into()
    })
}

impl<KV: KeyValueStore> OrderStore<KV> {
    /// Store over `kv`, timestamps from `clock`.
    pub fn new(kv: KV, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            kv: RwLock::new(kv),
            clock,
        }
    }

    /// Current time of the store clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // =========================================================================
    // Orders
    // =========================================================================

    fn new_order(
        &self,
        order_type: OrderType,
        maker: PartySpec,
        taker: PartySpec,
        timelock: Timelock,
    ) -> Order {
        let (secret, hashlock) = generate_secret_and_hashlock();
        Order::new(
            OrderParams {
                order_type,
                maker,
                taker,
                timelock,
            },
            secret,
            hashlock,
            self.now(),
        )
    }

    /// Create an order in `Created` with a fresh secret and hashlock.
    pub fn create_order(
        &self,
        order_type: OrderType,
        maker: PartySpec,
        taker: PartySpec,
        timelock: Timelock,
    ) -> Result<Order, SwapError> {
        let order = self.new_order(order_type, maker, taker, timelock);
        self.kv.write().put(&order_key(&order.id), &encode(&order)?)?;
        info!(
            "[store] Created order {} ({} -> {}, expires {})",
            order.id, order.maker.chain, order.taker.chain, order.expires_at
        );
        Ok(order)
    }

    /// Create an order and the swap `build` derives from it in one batch.
    ///
    /// `build` sees the order before it is stored; if it fails, or the
    /// batch does, neither record exists afterwards.
    pub fn create_order_with_swap<F>(
        &self,
        order_type: OrderType,
        maker: PartySpec,
        taker: PartySpec,
        timelock: Timelock,
        build: F,
    ) -> Result<(Order, SwapRecord), SwapError>
    where
        F: FnOnce(&Order) -> Result<SwapRecord, SwapError>,
    {
        let order = self.new_order(order_type, maker, taker, timelock);
        let swap = build(&order)?;
        self.kv.write().atomic_batch_write(vec![
            BatchOperation::put(order_key(&order.id), encode(&order)?),
            BatchOperation::put(swap_key(&swap.id), encode(&swap)?),
        ])?;
        info!(
            "[store] Created order {} with swap {} ({} -> {}, expires {})",
            order.id, swap.id, order.maker.chain, order.taker.chain, order.expires_at
        );
        Ok((order, swap))
    }

    /// Fetch an order.
    pub fn get_order(&self, id: &OrderId) -> Result<Order, SwapError> {
        let kv = self.kv.read();
        Self::read_order(&*kv, id)
    }

    fn read_order(kv: &KV, id: &OrderId) -> Result<Order, SwapError> {
        let bytes = kv
            .get(&order_key(id))?
            .ok_or_else(|| SwapError::NotFound(format!("order {}", id)))?;
        decode(&bytes)
    }

    /// Apply `patch` and move the order to `status`.
    ///
    /// Terminal orders reject every update.
    pub fn update_order(
        &self,
        id: &OrderId,
        status: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Order, SwapError> {
        let mut kv = self.kv.write();
        let mut order = Self::read_order(&*kv, id)?;
        order.transition_to(status, self.now())?;
        patch.apply(&mut order);
        kv.put(&order_key(id), &encode(&order)?)?;
        debug!("[store] Order {} -> {:?}", id, status);
        Ok(order)
    }

    /// Orders matching `filter`, newest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, SwapError> {
        let entries = self.kv.read().prefix_scan(ORDER_PREFIX.as_bytes())?;
        let mut orders = entries
            .iter()
            .map(|(_, bytes)| decode::<Order>(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        orders.retain(|order| filter.matches(order));
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    /// Move every non-terminal order past its expiry to `Expired`.
    ///
    /// Escrowed orders expire too; their locked legs stay refundable through
    /// the swap, whose later writes leave the expired order as it is.
    pub fn cleanup_expired_orders(&self) -> Result<usize, SwapError> {
        let now = self.now();
        let mut kv = self.kv.write();

        let mut ops = Vec::new();
        for (key, bytes) in kv.prefix_scan(ORDER_PREFIX.as_bytes())? {
            let mut order: Order = decode(&bytes)?;
            if order.status.is_terminal() || !order.is_expired(now) {
                continue;
            }
            if order.status.holds_escrow() {
                warn!(
                    "[store] Order {} expired with funds in escrow ({:?})",
                    order.id, order.status
                );
            }
            order.transition_to(OrderStatus::Expired, now)?;
            ops.push(BatchOperation::put(key, encode(&order)?));
        }

        let count = ops.len();
        if count > 0 {
            kv.atomic_batch_write(ops)?;
            info!("[store] Expired {} orders", count);
        }
        Ok(count)
    }

    // =========================================================================
    // Swaps
    // =========================================================================

    /// Insert or overwrite a swap record.
    pub fn put_swap(&self, swap: &SwapRecord) -> Result<(), SwapError> {
        self.kv.write().put(&swap_key(&swap.id), &encode(swap)?)?;
        Ok(())
    }

    /// Fetch a swap record.
    pub fn get_swap(&self, id: &SwapId) -> Result<SwapRecord, SwapError> {
        let bytes = self
            .kv
            .read()
            .get(&swap_key(id))?
            .ok_or_else(|| SwapError::NotFound(format!("swap {}", id)))?;
        decode(&bytes)
    }

    /// All swap records, newest first.
    pub fn list_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        let entries = self.kv.read().prefix_scan(SWAP_PREFIX.as_bytes())?;
        let mut swaps = entries
            .iter()
            .map(|(_, bytes)| decode::<SwapRecord>(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        swaps.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(swaps)
    }

    /// Write `swap` and move its order to `status` in one atomic batch.
    ///
    /// The order transition is checked against the stored order under the
    /// write lock; if it is illegal nothing is written. An order the sweep
    /// already expired stays `Expired` and only the swap is written.
    pub fn save_swap_with_order(
        &self,
        swap: &SwapRecord,
        status: OrderStatus,
        patch: OrderPatch,
    ) -> Result<Order, SwapError> {
        let mut kv = self.kv.write();
        let mut order = Self::read_order(&*kv, &swap.order_id)?;
        if order.status == OrderStatus::Expired && status != OrderStatus::Expired {
            kv.put(&swap_key(&swap.id), &encode(swap)?)?;
            debug!(
                "[store] Swap {} -> {}, order {} stays Expired",
                swap.id, swap.status, order.id
            );
            return Ok(order);
        }
        if order.status != status {
            order.transition_to(status, self.now())?;
        }
        patch.apply(&mut order);

        kv.atomic_batch_write(vec![
            BatchOperation::put(swap_key(&swap.id), encode(swap)?),
            BatchOperation::put(order_key(&order.id), encode(&order)?),
        ])?;
        debug!(
            "[store] Swap {} -> {}, order {} -> {:?}",
            swap.id, swap.status, order.id, order.status
        );
        Ok(order)
    }
}
