//! # Refunds and Expiry
//!
//! Refunds run only once every still-locked leg has expired on its own
//! ledger, destination first. Swaps that never locked anything are expired
//! by the sweep instead.

use super::SwapCoordinator;
use crate::domain::{ChainId, HtlcState, OrderStatus, SwapError, SwapId, SwapRecord, SwapStatus};
use crate::ports::{ChainAdapter, KeyValueStore};
use crate::store::OrderPatch;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Leg {
    Destination,
    Source,
}

struct PendingRefund {
    leg: Leg,
    adapter: Arc<dyn ChainAdapter>,
    htlc_id: String,
}

impl<KV: KeyValueStore> SwapCoordinator<KV> {
    /// Refund a swap. Caller holds the swap lock.
    pub(crate) async fn refund_locked(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError> {
        let mut swap = self.store.get_swap(swap_id)?;
        if !matches!(
            swap.status,
            SwapStatus::SourceLocked | SwapStatus::DestinationLocked
        ) {
            return Err(SwapError::InvalidState(format!(
                "swap {} is {}, nothing to refund",
                swap.id, swap.status
            )));
        }

        let order = self.store.get_order(&swap.order_id)?;
        let legs = [
            (
                Leg::Destination,
                &swap.to_chain,
                &swap.destination_htlc_id,
                order.escrow.destination.as_ref(),
            ),
            (
                Leg::Source,
                &swap.from_chain,
                &swap.source_htlc_id,
                order.escrow.source.as_ref(),
            ),
        ];
        let mut pending = Vec::new();
        for (leg, chain, htlc_id, escrow) in legs {
            let Some(htlc_id) = htlc_id else { continue };
            let adapter = self.tracked_adapter(chain, escrow)?;
            if let Some(refund) = self.check_leg(leg, adapter, chain, htlc_id).await? {
                pending.push(refund);
            }
        }

        for refund in pending {
            let tx = match refund.adapter.refund_htlc(&refund.htlc_id).await {
                Ok(tx) => tx,
                Err(e) => {
                    let now = self.store.now();
                    if swap.fail(&e, now).is_ok() {
                        if let Err(store_err) = self.store.put_swap(&swap) {
                            error!(
                                swap_id = %swap.id,
                                "[swap] Failed to persist failure: {}", store_err
                            );
                        }
                    }
                    error!(swap_id = %swap.id, "[swap] Refund failed: {}", e);
                    return Err(e);
                }
            };
            match refund.leg {
                Leg::Destination => swap.txs.destination_refund_tx = Some(tx),
                Leg::Source => swap.txs.refund_tx = Some(tx),
            }
            swap.updated_at = self.store.now();
            self.store.put_swap(&swap)?;
        }

        swap.transition_to(SwapStatus::Refunded, self.store.now())?;
        self.store
            .save_swap_with_order(&swap, OrderStatus::Cancelled, OrderPatch::default())?;
        info!(swap_id = %swap.id, "[swap] Refunded");
        Ok(swap)
    }

    /// Refund action for one leg, or `None` when it no longer holds funds.
    async fn check_leg(
        &self,
        leg: Leg,
        adapter: Arc<dyn ChainAdapter>,
        chain: &ChainId,
        htlc_id: &str,
    ) -> Result<Option<PendingRefund>, SwapError> {
        let report = adapter.get_htlc_status(htlc_id).await?;
        match report.status {
            HtlcState::Expired => Ok(Some(PendingRefund {
                leg,
                adapter,
                htlc_id: htlc_id.to_string(),
            })),
            HtlcState::Locked | HtlcState::Pending => Err(SwapError::InvalidTime(format!(
                "HTLC {} on {} not expired (refundable from {})",
                htlc_id, chain, report.timelock
            ))),
            HtlcState::Redeemed | HtlcState::Refunded => {
                warn!("[swap] HTLC {} on {} already {:?}", htlc_id, chain, report.status);
                Ok(None)
            }
        }
    }

    /// Expire every `Initiated` swap past its expiry. Returns how many.
    pub async fn expire_stale_swaps(&self) -> Result<usize, SwapError> {
        let now = self.store.now();
        let stale: Vec<SwapId> = self
            .store
            .list_swaps()?
            .into_iter()
            .filter(|swap| swap.status == SwapStatus::Initiated && now >= swap.expires_at)
            .map(|swap| swap.id)
            .collect();

        let mut expired = 0;
        for id in stale {
            let guard = self.lock_swap(&id).await;
            let mut swap = self.store.get_swap(&id)?;
            if swap.status == SwapStatus::Initiated && now >= swap.expires_at {
                swap.transition_to(SwapStatus::Expired, self.store.now())?;
                self.store
                    .save_swap_with_order(&swap, OrderStatus::Expired, OrderPatch::default())?;
                expired += 1;
            }
            drop(guard);
            self.release_swap(&id);
        }
        if expired > 0 {
            info!("[swap] Expired {} stale swaps", expired);
        }
        Ok(expired)
    }
}
