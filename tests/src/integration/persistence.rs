//! # Durable Store
//!
//! A coordinator restarted over the same RocksDB directory, with freshly built
//! adapters, picks up every swap where the previous process left it. Needs
//! `--features rocksdb`.

#[cfg(all(test, feature = "rocksdb"))]
mod tests {
    use super::super::{funded_eth_to_btc, BOB, SWAP_AMOUNT};
    use std::path::Path;
    use std::sync::Arc;
    use swap_engine::adapters::{RocksDbConfig, RocksDbStore};
    use swap_engine::test_utils::Devnet;
    use swap_engine::{
        ChainId, HtlcState, OrderStatus, OrderStore, SwapApi, SwapConfig, SwapCoordinator,
        SwapStatus,
    };
    use tempfile::TempDir;

    fn kv(dir: &Path) -> RocksDbStore {
        RocksDbStore::open(RocksDbConfig::for_testing(dir.to_string_lossy())).unwrap()
    }

    /// First process: the devnet's own adapters.
    fn open(devnet: &Devnet, dir: &Path) -> SwapCoordinator<RocksDbStore> {
        devnet.coordinator_with(kv(dir), SwapConfig::default())
    }

    /// Restarted process: new adapters holding only the coordinator and `BOB` keys.
    fn reopen(devnet: &Devnet, dir: &Path) -> SwapCoordinator<RocksDbStore> {
        let store = Arc::new(OrderStore::new(kv(dir), devnet.clock.clone()));
        Devnet::coordinator_over(devnet.restarted_registry(&[BOB]), store, SwapConfig::default())
    }

    #[tokio::test]
    async fn test_swap_resumes_after_restart() {
        let devnet = Devnet::new();
        let dir = TempDir::new().unwrap();

        let swap = {
            let coordinator = open(&devnet, dir.path());
            let swap = coordinator
                .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
                .await
                .unwrap();
            let locked = coordinator.step_swap(&swap.id).await.unwrap();
            assert_eq!(locked.status, SwapStatus::SourceLocked);
            locked
        };

        let coordinator = reopen(&devnet, dir.path());
        assert_eq!(coordinator.get_swap_status(&swap.id).await.unwrap(), swap);

        let funded = coordinator.step_swap(&swap.id).await.unwrap();
        assert_eq!(funded.status, SwapStatus::DestinationLocked);
        let done = coordinator.step_swap(&swap.id).await.unwrap();
        assert_eq!(done.status, SwapStatus::Completed);
        assert!(done.txs.redeem_tx.is_some());

        let order = coordinator.store().get_order(&swap.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Claimed);
        assert!(order.secret.is_some());
    }

    #[tokio::test]
    async fn test_refund_after_restart() {
        let devnet = Devnet::new();
        let dir = TempDir::new().unwrap();

        let swap = {
            let coordinator = open(&devnet, dir.path());
            let swap = coordinator
                .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
                .await
                .unwrap();
            coordinator.step_swap(&swap.id).await.unwrap();
            coordinator.step_swap(&swap.id).await.unwrap()
        };
        let fresh = reopen(&devnet, dir.path());
        let bitcoin = fresh.registry().get(&ChainId::new("bitcoin")).unwrap();
        let destination = swap.destination_htlc_id.clone().unwrap();
        assert!(bitcoin.get_htlc_status(&destination).await.is_err());
        drop(fresh);

        devnet.clock.set(swap.source_timelock);
        let coordinator = reopen(&devnet, dir.path());
        let refunded = coordinator.refund_swap(&swap.id).await.unwrap();
        assert_eq!(refunded.status, SwapStatus::Refunded);
        assert!(refunded.txs.destination_refund_tx.is_some());
        assert!(refunded.txs.refund_tx.is_some());

        let bitcoin = coordinator.registry().get(&ChainId::new("bitcoin")).unwrap();
        let destination = refunded.destination_htlc_id.clone().unwrap();
        let status = bitcoin.get_htlc_status(&destination).await.unwrap();
        assert_eq!(status.status, HtlcState::Refunded);

        let users = coordinator.get_user_swaps(&swap.user_address).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].status, SwapStatus::Refunded);
    }
}
