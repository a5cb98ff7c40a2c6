//! # Concurrent Access
//!
//! Execute, refund and the expiry sweep racing on a multi-threaded runtime.
//! Operations on one swap serialize; operations on distinct swaps do not
//! interfere.

#[cfg(test)]
mod tests {
    use super::super::{funded_eth_to_btc, SWAP_AMOUNT};
    use std::sync::Arc;
    use swap_engine::adapters::evm::abi::format_address;
    use swap_engine::adapters::InMemoryKVStore;
    use swap_engine::test_utils::{Devnet, COORDINATOR_EVM, COORDINATOR_FLOAT};
    use swap_engine::{
        ChainAdapter, ChainId, SwapApi, SwapCoordinator, SwapError, SwapRecord, SwapStatus,
    };
    use tokio::task::JoinHandle;

    const RACERS: usize = 8;

    async fn create_test_swap(
        devnet: &Devnet,
    ) -> (Arc<SwapCoordinator<InMemoryKVStore>>, SwapRecord) {
        let coordinator = Arc::new(devnet.coordinator());
        let swap = coordinator
            .initiate_swap(funded_eth_to_btc(devnet, SWAP_AMOUNT))
            .await
            .unwrap();
        (coordinator, swap)
    }

    async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_executes_settle_once() {
        let devnet = Devnet::new();
        let (coordinator, swap) = create_test_swap(&devnet).await;

        let handles = (0..RACERS)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let id = swap.id;
                tokio::spawn(async move { coordinator.execute_swap(&id).await })
            })
            .collect();
        let results = join_all(handles).await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(SwapError::InvalidState(_)))));

        // Exactly one lock per leg reached the ledgers
        let ethereum = devnet.registry.get(&ChainId::new("ethereum")).unwrap();
        assert_eq!(
            ethereum.get_balance(&format_address(&COORDINATOR_EVM)).await.unwrap(),
            COORDINATOR_FLOAT + SWAP_AMOUNT
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_swaps_execute_in_parallel() {
        let devnet = Devnet::new();
        let coordinator = Arc::new(devnet.coordinator());
        let mut swaps = Vec::new();
        for _ in 0..RACERS {
            swaps.push(
                coordinator
                    .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
                    .await
                    .unwrap(),
            );
        }

        let handles = swaps
            .iter()
            .map(|swap| {
                let coordinator = Arc::clone(&coordinator);
                let id = swap.id;
                tokio::spawn(async move { coordinator.execute_swap(&id).await })
            })
            .collect();
        for result in join_all(handles).await {
            assert_eq!(result.unwrap().status, SwapStatus::Completed);
        }

        let stats = coordinator.statistics().unwrap();
        assert_eq!(stats.completed, RACERS);
        assert_eq!(
            stats.completed_volume.get("ETH"),
            Some(&(SWAP_AMOUNT * RACERS as u128))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_refunds_release_once() {
        let devnet = Devnet::new();
        let (coordinator, swap) = create_test_swap(&devnet).await;
        coordinator.step_swap(&swap.id).await.unwrap();
        devnet.clock.set(swap.source_timelock);

        let handles = (0..RACERS)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let id = swap.id;
                tokio::spawn(async move { coordinator.refund_swap(&id).await })
            })
            .collect();
        let results = join_all(handles).await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let ethereum = devnet.registry.get(&ChainId::new("ethereum")).unwrap();
        assert_eq!(
            ethereum.get_balance(&swap.user_address).await.unwrap(),
            SWAP_AMOUNT
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_execute_racing_sweep_at_expiry() {
        let devnet = Devnet::new();
        let (coordinator, swap) = create_test_swap(&devnet).await;
        devnet.clock.set(swap.expires_at);

        let execute = {
            let coordinator = Arc::clone(&coordinator);
            let id = swap.id;
            tokio::spawn(async move { coordinator.execute_swap(&id).await })
        };
        let sweep = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.expire_stale_swaps().await })
        };
        let executed = execute.await.unwrap();
        let swept = sweep.await.unwrap().unwrap();

        // Whoever got the lock first expired the swap; the other saw it expired
        match executed {
            Err(SwapError::InvalidTime(_)) => assert_eq!(swept, 0),
            Err(SwapError::InvalidState(_)) => assert_eq!(swept, 1),
            other => panic!("unexpected execute result: {:?}", other),
        }
        let stored = coordinator.get_swap_status(&swap.id).await.unwrap();
        assert_eq!(stored.status, SwapStatus::Expired);
        assert!(stored.txs.source_lock_tx.is_none());
    }
}
