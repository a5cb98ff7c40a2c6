//! # Swap Coordinator
//!
//! The service implementing [`SwapApi`].
//!
//! ## Architecture
//!
//! The coordinator:
//! 1. Validates requests against the registered chain adapters
//! 2. Records every swap and its backing order in the [`OrderStore`]
//! 3. Drives both HTLC legs through the adapters, persisting after each step
//! 4. Serialises all mutations of one swap behind a per-swap lock
//!
//! Ledger specifics never leak in here; the coordinator only sees
//! [`ChainAdapter`] capabilities.

mod execute;
mod refund;

use crate::algorithms::{calculate_timelocks, order_timelock, resolve_timelock, split_fee};
use crate::domain::{
    ChainFamily, ChainId, LegRef, OrderId, OrderType, PartySpec, Quote, QuoteRequest, ReverseOrder,
    SwapConfig, SwapError, SwapId, SwapRecord, SwapRequest, SwapStatistics, SwapStatus,
    SwapTransactions,
};
use crate::ports::{ChainAdapter, KeyValueStore, PricingService, SwapApi};
use crate::registry::AdapterRegistry;
use crate::store::OrderStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Dependencies for [`SwapCoordinator`].
pub struct SwapDependencies<KV: KeyValueStore> {
    /// Chain adapters, one per ledger.
    pub registry: Arc<AdapterRegistry>,
    /// Durable orders and swap records.
    pub store: Arc<OrderStore<KV>>,
    /// Pricing collaborator; quotes fall back to 1:1 without one.
    pub pricing: Option<Arc<dyn PricingService>>,
}

/// The swap coordinator.
pub struct SwapCoordinator<KV: KeyValueStore> {
    pub(crate) config: SwapConfig,
    pub(crate) registry: Arc<AdapterRegistry>,
    pub(crate) store: Arc<OrderStore<KV>>,
    pub(crate) pricing: Option<Arc<dyn PricingService>>,
    /// Per-swap execution locks.
    locks: parking_lot::Mutex<HashMap<SwapId, Arc<Mutex<()>>>>,
}

/// Validated view of a quote or swap request.
struct ResolvedRequest {
    amount: u128,
    source: Arc<dyn ChainAdapter>,
    destination: Arc<dyn ChainAdapter>,
}

/// Token argument for an adapter: `None` for the ledger's native asset.
pub(crate) fn token_param(adapter: &dyn ChainAdapter, token: &str) -> Option<String> {
    if token.eq_ignore_ascii_case(adapter.native_token()) {
        None
    } else {
        Some(token.to_string())
    }
}

impl<KV: KeyValueStore> SwapCoordinator<KV> {
    /// Create a coordinator over the given dependencies.
    pub fn new(deps: SwapDependencies<KV>, config: SwapConfig) -> Self {
        Self {
            config,
            registry: deps.registry,
            store: deps.store,
            pricing: deps.pricing,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Coordinator configuration.
    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    /// Adapter registry.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Order store.
    pub fn store(&self) -> &Arc<OrderStore<KV>> {
        &self.store
    }

    /// Acquire the execution lock of one swap.
    pub(crate) async fn lock_swap(&self, id: &SwapId) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().entry(*id).or_default().clone();
        lock.lock_owned().await
    }

    /// Forget the lock of a swap once its stored record is terminal.
    ///
    /// A late waiter still holding the old lock only ever observes the
    /// terminal record, which rejects every mutation.
    pub(crate) fn release_swap(&self, id: &SwapId) {
        let terminal = self
            .store
            .get_swap(id)
            .map(|swap| swap.status.is_terminal())
            .unwrap_or(false);
        if terminal {
            self.locks.lock().remove(id);
        }
    }

    /// Adapter for `chain`, made aware of the lock recorded in `leg`.
    pub(crate) fn tracked_adapter(
        &self,
        chain: &ChainId,
        leg: Option<&LegRef>,
    ) -> Result<Arc<dyn ChainAdapter>, SwapError> {
        let adapter = self.registry.get(chain)?;
        if let Some(leg) = leg {
            adapter.track_htlc(&leg.htlc_id, &leg.escrow)?;
        }
        Ok(adapter)
    }

    fn resolve(&self, request: &QuoteRequest) -> Result<ResolvedRequest, SwapError> {
        let amount = request.parse_amount()?;
        let from = request.from_chain_id();
        let to = request.to_chain_id();
        if from == to {
            return Err(SwapError::validation(
                "source and destination chains must differ",
            ));
        }

        let lookup = |chain: &ChainId| {
            self.registry
                .get(chain)
                .map_err(|_| SwapError::validation(format!("unsupported chain: {}", chain)))
        };
        let source = lookup(&from)?;
        let destination = lookup(&to)?;

        if !source.supports_token(&request.from_token) {
            return Err(SwapError::validation(format!(
                "token {} not supported on {}",
                request.from_token, from
            )));
        }
        if !destination.supports_token(&request.to_token) {
            return Err(SwapError::validation(format!(
                "token {} not supported on {}",
                request.to_token, to
            )));
        }
        if !source.validate_address(&request.user_address) {
            return Err(SwapError::validation(format!(
                "invalid user address for {}: {}",
                from, request.user_address
            )));
        }

        Ok(ResolvedRequest {
            amount,
            source,
            destination,
        })
    }

    async fn price(
        &self,
        request: &QuoteRequest,
        resolved: &ResolvedRequest,
    ) -> Result<Quote, SwapError> {
        let both_account = resolved.source.family() == ChainFamily::Account
            && resolved.destination.family() == ChainFamily::Account;
        if let Some(pricing) = &self.pricing {
            if both_account
                && pricing.supports(resolved.source.chain_id(), resolved.destination.chain_id())
            {
                return pricing.quote(request, resolved.amount).await;
            }
        }
        debug!(
            "[swap] No pricing for {} -> {}, quoting 1:1",
            resolved.source.chain_id(),
            resolved.destination.chain_id()
        );
        Ok(Quote::placeholder(resolved.amount))
    }

    /// Price the request and withhold the service fee from the result.
    async fn quote_net(
        &self,
        request: &QuoteRequest,
        resolved: &ResolvedRequest,
    ) -> Result<Quote, SwapError> {
        let mut quote = self.price(request, resolved).await?;
        let (net, fee) = split_fee(quote.to_amount, self.config.fee_bps);
        quote.to_amount = net;
        quote.fee = quote.fee.saturating_add(fee);
        if quote.to_amount == 0 {
            return Err(SwapError::validation("quoted amount rounds to zero"));
        }
        Ok(quote)
    }

    /// Aggregate counts over all recorded swaps.
    pub fn statistics(&self) -> Result<SwapStatistics, SwapError> {
        let mut stats = SwapStatistics::default();
        for swap in self.store.list_swaps()? {
            stats.total += 1;
            match swap.status {
                SwapStatus::Initiated | SwapStatus::SourceLocked | SwapStatus::DestinationLocked => {
                    stats.in_progress += 1
                }
                SwapStatus::Completed => {
                    stats.completed += 1;
                    let volume = stats
                        .completed_volume
                        .entry(swap.from_token.to_ascii_uppercase())
                        .or_default();
                    *volume = volume.saturating_add(swap.from_amount);
                    if swap.fee > 0 {
                        let fees = stats
                            .total_fees
                            .entry(swap.to_token.to_ascii_uppercase())
                            .or_default();
                        *fees = fees.saturating_add(swap.fee);
                    }
                }
                SwapStatus::Refunded => stats.refunded += 1,
                SwapStatus::Failed => stats.failed += 1,
                SwapStatus::Expired => stats.expired += 1,
            }
        }
        Ok(stats)
    }

    /// Order of a swap whose origin is the script ledger, with its legs split out.
    pub fn get_reverse_order(&self, order_id: &OrderId) -> Result<ReverseOrder, SwapError> {
        ReverseOrder::from_order(self.store.get_order(order_id)?)
    }
}

#[async_trait]
impl<KV: KeyValueStore + 'static> SwapApi for SwapCoordinator<KV> {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        let resolved = self.resolve(request)?;
        self.quote_net(request, &resolved).await
    }

    async fn initiate_swap(&self, request: SwapRequest) -> Result<SwapRecord, SwapError> {
        let quote_request = request.quote_request();
        let resolved = self.resolve(&quote_request)?;
        if let Some(recipient) = request.recipient_address.as_deref() {
            if !resolved.destination.validate_address(recipient) {
                return Err(SwapError::validation(format!(
                    "invalid recipient address for {}: {}",
                    resolved.destination.chain_id(),
                    recipient
                )));
            }
        }
        let timelock = resolve_timelock(request.timelock, &self.config)?;
        let quote = self.quote_net(&quote_request, &resolved).await?;

        let from_chain = resolved.source.chain_id().clone();
        let to_chain = resolved.destination.chain_id().clone();
        let order_type = match resolved.source.family() {
            ChainFamily::Utxo => OrderType::BToA,
            _ => OrderType::AToB,
        };
        let beneficiary = request
            .recipient_address
            .clone()
            .unwrap_or_else(|| resolved.destination.account());
        let maker = PartySpec {
            address: request.user_address.clone(),
            chain: from_chain.clone(),
            token: request.from_token.clone(),
            amount: resolved.amount,
        };
        let taker = PartySpec {
            address: beneficiary,
            chain: to_chain.clone(),
            token: request.to_token.clone(),
            amount: quote.to_amount,
        };
        let config = &self.config;
        let (order, swap) = self.store.create_order_with_swap(
            order_type,
            maker,
            taker,
            order_timelock(timelock, config),
            |order| {
                let schedule = calculate_timelocks(order.created_at, timelock, config)?;
                Ok(SwapRecord {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    from_chain,
                    to_chain,
                    from_token: request.from_token,
                    to_token: request.to_token,
                    from_amount: resolved.amount,
                    to_amount: quote.to_amount,
                    fee: quote.fee,
                    user_address: request.user_address,
                    recipient_address: request.recipient_address,
                    hashlock: order.hashlock,
                    status: SwapStatus::Initiated,
                    source_timelock: schedule.source,
                    destination_timelock: schedule.destination,
                    txs: SwapTransactions::default(),
                    source_htlc_id: None,
                    destination_htlc_id: None,
                    error: None,
                    created_at: order.created_at,
                    updated_at: order.created_at,
                    expires_at: schedule.source,
                })
            },
        )?;

        info!(
            swap_id = %swap.id,
            order_id = %order.id,
            "[swap] Initiated {} {} on {} -> {} {} on {} (expires {})",
            swap.from_amount,
            swap.from_token,
            swap.from_chain,
            swap.to_amount,
            swap.to_token,
            swap.to_chain,
            swap.expires_at
        );
        Ok(swap)
    }

    async fn execute_swap(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError> {
        let guard = self.lock_swap(swap_id).await;
        let result = self.run_to_completion(swap_id).await;
        drop(guard);
        self.release_swap(swap_id);
        result
    }

    async fn get_swap_status(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError> {
        self.store.get_swap(swap_id)
    }

    async fn refund_swap(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError> {
        let guard = self.lock_swap(swap_id).await;
        let result = self.refund_locked(swap_id).await;
        drop(guard);
        self.release_swap(swap_id);
        result
    }

    async fn get_user_swaps(&self, address: &str) -> Result<Vec<SwapRecord>, SwapError> {
        Ok(self
            .store
            .list_swaps()?
            .into_iter()
            .filter(|swap| swap.involves(address))
            .collect())
    }
}
