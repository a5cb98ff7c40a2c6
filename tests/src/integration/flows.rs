//! # Cross-Ledger Flows
//!
//! Swaps beyond the basic ETH -> BTC path:
//!
//! - Priced native swaps between the two account ledgers
//! - ERC-20 legs on both sides
//! - Swaps driven through the node runtime and its sweeper

#[cfg(test)]
mod tests {
    use super::super::{funded_eth_to_btc, ALICE, BOB, SWAP_AMOUNT};
    use std::sync::Arc;
    use swap_engine::adapters::{EvmRpc, InMemoryKVStore, ManualTimeSource};
    use swap_engine::test_utils::{Devnet, COORDINATOR_EVM, GENESIS_TIME, USDC};
    use swap_engine::{ChainAdapter, ChainId, OrderStatus, SwapApi, SwapRequest, SwapStatus};
    use swap_node::{sweep, NodeConfig, NodeRuntime, SweepReport};

    const TENTH_ETH: u128 = 100_000_000_000_000_000;
    const CAROL: u8 = 0x55;

    fn account_swap(from_token: &str, to_token: &str, amount: u128) -> SwapRequest {
        SwapRequest {
            from_chain: "ethereum".to_string(),
            to_chain: "polygon".to_string(),
            from_token: from_token.to_string(),
            to_token: to_token.to_string(),
            from_amount: amount.to_string(),
            user_address: Devnet::evm_user(ALICE),
            recipient_address: Some(Devnet::evm_user(CAROL)),
            timelock: Some(7200),
        }
    }

    // =========================================================================
    // Account ledgers
    // =========================================================================

    #[tokio::test]
    async fn test_priced_eth_to_matic() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        devnet.ethereum.mint(Devnet::evm_address(ALICE), TENTH_ETH);

        let swap = coordinator
            .initiate_swap(account_swap("ETH", "MATIC", TENTH_ETH))
            .await
            .unwrap();
        // 2000 MATIC per ETH less 2% slippage
        assert_eq!(swap.to_amount, 196 * TENTH_ETH * 10);

        let done = coordinator.execute_swap(&swap.id).await.unwrap();
        assert_eq!(done.status, SwapStatus::Completed);

        let polygon = devnet.registry.get(&ChainId::new("polygon")).unwrap();
        assert_eq!(
            polygon.get_balance(&Devnet::evm_user(CAROL)).await.unwrap(),
            swap.to_amount
        );
        let ethereum = devnet.registry.get(&ChainId::new("ethereum")).unwrap();
        assert_eq!(ethereum.get_balance(&Devnet::evm_user(ALICE)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_usdc_between_account_ledgers() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let alice = Devnet::evm_address(ALICE);
        let carol = Devnet::evm_address(CAROL);
        devnet.ethereum.mint_token(USDC, alice, 1_000_000);

        let swap = coordinator
            .initiate_swap(account_swap("USDC", "usdc", 1_000_000))
            .await
            .unwrap();
        assert_eq!(swap.to_amount, 980_000);

        let done = coordinator.execute_swap(&swap.id).await.unwrap();
        assert_eq!(done.status, SwapStatus::Completed);

        assert_eq!(devnet.ethereum.balance(&alice, Some(&USDC)).await.unwrap(), 0);
        assert_eq!(
            devnet.polygon.balance(&carol, Some(&USDC)).await.unwrap(),
            980_000
        );
        let ethereum_float = devnet
            .ethereum
            .balance(&COORDINATOR_EVM, Some(&USDC))
            .await
            .unwrap();
        assert_eq!(
            ethereum_float,
            swap_engine::test_utils::COORDINATOR_FLOAT + 1_000_000
        );
        // Native balances untouched
        assert_eq!(devnet.polygon.balance(&carol, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unfunded_token_leg_fails_without_moving_funds() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();

        let swap = coordinator
            .initiate_swap(account_swap("USDC", "USDC", 1_000_000))
            .await
            .unwrap();
        assert!(coordinator.execute_swap(&swap.id).await.is_err());

        let stored = coordinator.get_swap_status(&swap.id).await.unwrap();
        assert_eq!(stored.status, SwapStatus::Failed);
        assert!(stored.txs.destination_lock_tx.is_none());
        let carol = Devnet::evm_address(CAROL);
        assert_eq!(devnet.polygon.balance(&carol, Some(&USDC)).await.unwrap(), 0);
    }

    // =========================================================================
    // Node runtime
    // =========================================================================

    fn create_test_runtime() -> (Arc<ManualTimeSource>, NodeRuntime<InMemoryKVStore>) {
        let clock = Arc::new(ManualTimeSource::new(GENESIS_TIME));
        let runtime =
            NodeRuntime::new(NodeConfig::default(), InMemoryKVStore::new(), clock.clone()).unwrap();
        (clock, runtime)
    }

    #[tokio::test]
    async fn test_node_runtime_settles_swap() {
        let (_clock, runtime) = create_test_runtime();
        runtime.start().await.unwrap();
        let coordinator = runtime.coordinator();
        let ledgers = runtime.ledgers();

        ledgers.ethereum.mint(Devnet::evm_address(ALICE), SWAP_AMOUNT);
        let recipient = ledgers.bitcoin_adapter.import_key(Devnet::key(BOB)).to_hex();
        let swap = coordinator
            .initiate_swap(super::super::eth_to_btc(
                Devnet::evm_user(ALICE),
                Some(recipient.clone()),
                SWAP_AMOUNT,
            ))
            .await
            .unwrap();

        let done = coordinator.execute_swap(&swap.id).await.unwrap();
        assert_eq!(done.status, SwapStatus::Completed);
        let bitcoin = ledgers.registry.get(&ChainId::new("bitcoin")).unwrap();
        assert!(bitcoin.get_balance(&recipient).await.unwrap() > 0);

        runtime.shutdown().await;
        assert!(runtime.ledgers().registry.chains().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_expires_only_idle_swaps() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let idle = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();
        let locked = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();
        coordinator.step_swap(&locked.id).await.unwrap();

        devnet.clock.set(idle.expires_at.max(locked.expires_at));
        let report = sweep(&coordinator).await.unwrap();
        // The idle swap takes its order along; the escrowed order expires on its own
        assert_eq!(report, SweepReport { swaps: 1, orders: 1 });

        let idle = coordinator.get_swap_status(&idle.id).await.unwrap();
        assert_eq!(idle.status, SwapStatus::Expired);
        let order = coordinator.store().get_order(&idle.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Expired);

        // Funds on a locked leg are only released by refund
        let locked = coordinator.get_swap_status(&locked.id).await.unwrap();
        assert_eq!(locked.status, SwapStatus::SourceLocked);
        let locked_order = coordinator.store().get_order(&locked.order_id).unwrap();
        assert_eq!(locked_order.status, OrderStatus::Expired);
        assert!(locked_order.escrow.source.is_some());

        let refunded = coordinator.refund_swap(&locked.id).await.unwrap();
        assert_eq!(refunded.status, SwapStatus::Refunded);
        let locked_order = coordinator.store().get_order(&locked.order_id).unwrap();
        assert_eq!(locked_order.status, OrderStatus::Expired);
        let ethereum = devnet.registry.get(&ChainId::new("ethereum")).unwrap();
        assert_eq!(
            ethereum.get_balance(&Devnet::evm_user(ALICE)).await.unwrap(),
            2 * SWAP_AMOUNT
        );
    }
}
