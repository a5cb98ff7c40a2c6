//! # Leg Execution
//!
//! Source lock, destination lock, then settlement. Each step persists the
//! swap (and its order, atomically) before the next one starts. Precondition
//! failures leave the record untouched; anything failing mid-step marks the
//! swap `Failed` with the captured error.

use super::{token_param, SwapCoordinator};
use crate::domain::{ChainId, LegRef, OrderStatus, SwapError, SwapId, SwapRecord, SwapStatus};
use crate::ports::{HtlcLock, HtlcParams, KeyValueStore};
use crate::store::OrderPatch;
use tracing::{error, info, warn};

fn leg_ref(chain: &ChainId, lock: HtlcLock) -> LegRef {
    LegRef {
        chain: chain.clone(),
        htlc_id: lock.htlc_id,
        tx_id: lock.tx_id,
        escrow: lock.escrow,
    }
}

fn required<'a>(
    value: &'a Option<String>,
    what: &str,
    swap: &SwapId,
) -> Result<&'a str, SwapError> {
    value
        .as_deref()
        .ok_or_else(|| SwapError::InvalidState(format!("swap {} has no {}", swap, what)))
}

impl<KV: KeyValueStore> SwapCoordinator<KV> {
    /// Advance a swap by exactly one step.
    ///
    /// `Initiated` locks the source leg, `SourceLocked` locks the destination
    /// leg and `DestinationLocked` settles both.
    pub async fn step_swap(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError> {
        let guard = self.lock_swap(swap_id).await;
        let result = match self.store.get_swap(swap_id) {
            Ok(mut swap) => self.step(&mut swap).await.map(|()| swap),
            Err(e) => Err(e),
        };
        drop(guard);
        self.release_swap(swap_id);
        result
    }

    /// Run an `Initiated` swap through every step. Caller holds the swap lock.
    pub(crate) async fn run_to_completion(
        &self,
        swap_id: &SwapId,
    ) -> Result<SwapRecord, SwapError> {
        let mut swap = self.store.get_swap(swap_id)?;
        if swap.status != SwapStatus::Initiated {
            return Err(SwapError::InvalidState(format!(
                "swap {} is {}, expected Initiated",
                swap.id, swap.status
            )));
        }
        while swap.status != SwapStatus::Completed {
            self.step(&mut swap).await?;
        }
        Ok(swap)
    }

    async fn step(&self, swap: &mut SwapRecord) -> Result<(), SwapError> {
        match swap.status {
            SwapStatus::Initiated => self.lock_source(swap).await,
            SwapStatus::SourceLocked => self.lock_destination(swap).await,
            SwapStatus::DestinationLocked => self.settle(swap).await,
            other => Err(SwapError::InvalidState(format!(
                "swap {} is {}",
                swap.id, other
            ))),
        }
    }

    /// Record `err` on the swap and return it.
    fn abort(&self, swap: &mut SwapRecord, err: SwapError) -> Result<(), SwapError> {
        if swap.fail(&err, self.store.now()).is_ok() {
            if let Err(store_err) = self.store.put_swap(swap) {
                error!(swap_id = %swap.id, "[swap] Failed to persist failure: {}", store_err);
            }
        }
        error!(swap_id = %swap.id, "[swap] Swap failed: {}", err);
        Err(err)
    }

    async fn lock_source(&self, swap: &mut SwapRecord) -> Result<(), SwapError> {
        let now = self.store.now();
        // Past this point the destination leg can no longer be locked.
        if now >= swap.destination_timelock {
            swap.transition_to(SwapStatus::Expired, now)?;
            self.store
                .save_swap_with_order(swap, OrderStatus::Expired, OrderPatch::default())?;
            warn!(swap_id = %swap.id, "[swap] Swap expired before execution");
            return Err(SwapError::InvalidTime(format!(
                "swap {} expired (destination timelock {} passed)",
                swap.id, swap.destination_timelock
            )));
        }

        let source = self.registry.get(&swap.from_chain)?;
        self.store
            .update_order(&swap.order_id, OrderStatus::Filled, OrderPatch::default())?;

        let params = HtlcParams {
            hashlock: swap.hashlock,
            timelock: swap.source_timelock,
            recipient: None,
            sender: Some(swap.user_address.clone()),
            amount: swap.from_amount,
            token: token_param(source.as_ref(), &swap.from_token),
        };
        let lock = match source.create_htlc(params).await {
            Ok(lock) => lock,
            Err(e) => return self.abort(swap, e),
        };
        swap.txs.source_lock_tx = Some(lock.tx_id.clone());
        swap.source_htlc_id = Some(lock.htlc_id.clone());
        swap.transition_to(SwapStatus::SourceLocked, self.store.now())?;

        let patch = OrderPatch {
            escrow_source: Some(leg_ref(&swap.from_chain, lock)),
            ..OrderPatch::default()
        };
        if let Err(e) = self
            .store
            .save_swap_with_order(swap, OrderStatus::Escrowed, patch)
        {
            return self.abort(swap, e);
        }
        info!(
            swap_id = %swap.id,
            "[swap] Source leg locked on {} ({})",
            swap.from_chain,
            required(&swap.source_htlc_id, "source HTLC", &swap.id)?
        );
        Ok(())
    }

    async fn lock_destination(&self, swap: &mut SwapRecord) -> Result<(), SwapError> {
        let now = self.store.now();
        if now >= swap.destination_timelock {
            return Err(SwapError::InvalidTime(format!(
                "destination timelock {} passed; refund the source leg after {}",
                swap.destination_timelock, swap.source_timelock
            )));
        }

        let destination = self.registry.get(&swap.to_chain)?;
        let order = self.store.get_order(&swap.order_id)?;
        let params = HtlcParams {
            hashlock: swap.hashlock,
            timelock: swap.destination_timelock,
            recipient: Some(order.taker.address),
            sender: None,
            amount: swap.to_amount,
            token: token_param(destination.as_ref(), &swap.to_token),
        };
        let lock = match destination.create_htlc(params).await {
            Ok(lock) => lock,
            Err(e) => return self.abort(swap, e),
        };
        swap.txs.destination_lock_tx = Some(lock.tx_id.clone());
        swap.destination_htlc_id = Some(lock.htlc_id.clone());
        swap.transition_to(SwapStatus::DestinationLocked, self.store.now())?;

        let patch = OrderPatch {
            escrow_destination: Some(leg_ref(&swap.to_chain, lock)),
            ..OrderPatch::default()
        };
        if let Err(e) = self
            .store
            .save_swap_with_order(swap, OrderStatus::Funded, patch)
        {
            return self.abort(swap, e);
        }
        info!(
            swap_id = %swap.id,
            "[swap] Destination leg locked on {} ({})",
            swap.to_chain,
            required(&swap.destination_htlc_id, "destination HTLC", &swap.id)?
        );
        Ok(())
    }

    async fn settle(&self, swap: &mut SwapRecord) -> Result<(), SwapError> {
        // Once the destination leg has expired both legs can only be refunded.
        let now = self.store.now();
        if swap.txs.redeem_tx.is_none() && now >= swap.destination_timelock {
            warn!(swap_id = %swap.id, "[swap] Destination leg expired before settlement");
            return Err(SwapError::InvalidTime(format!(
                "destination timelock {} passed; refund both legs after {}",
                swap.destination_timelock, swap.source_timelock
            )));
        }

        let order = self.store.get_order(&swap.order_id)?;
        let source = self.tracked_adapter(&swap.from_chain, order.escrow.source.as_ref())?;
        let destination =
            self.tracked_adapter(&swap.to_chain, order.escrow.destination.as_ref())?;
        let secret = order.secret.ok_or_else(|| {
            SwapError::InvalidState(format!("order {} holds no secret", order.id))
        })?;
        let source_id = required(&swap.source_htlc_id, "source HTLC", &swap.id)?.to_string();
        let destination_id =
            required(&swap.destination_htlc_id, "destination HTLC", &swap.id)?.to_string();

        if swap.txs.redeem_tx.is_none() {
            match destination.redeem_htlc(&destination_id, secret.as_bytes()).await {
                Ok(tx) => swap.txs.redeem_tx = Some(tx),
                Err(e) => return self.abort(swap, e),
            }
            swap.updated_at = self.store.now();
            if let Err(e) = self.store.put_swap(swap) {
                return self.abort(swap, e);
            }
            info!(swap_id = %swap.id, "[swap] Destination leg redeemed on {}", swap.to_chain);
        }

        match source.redeem_htlc(&source_id, secret.as_bytes()).await {
            Ok(tx) => swap.txs.source_redeem_tx = Some(tx),
            Err(e) => return self.abort(swap, e),
        }
        swap.transition_to(SwapStatus::Completed, self.store.now())?;
        if let Err(e) = self
            .store
            .save_swap_with_order(swap, OrderStatus::Claimed, OrderPatch::default())
        {
            return self.abort(swap, e);
        }
        info!(
            swap_id = %swap.id,
            "[swap] Completed: {} {} -> {} {}",
            swap.from_amount,
            swap.from_token,
            swap.to_amount,
            swap.to_token
        );
        Ok(())
    }
}
