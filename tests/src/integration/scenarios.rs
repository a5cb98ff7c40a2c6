//! # Swap Lifecycle Scenarios
//!
//! The canonical walk through a swap:
//!
//! 1. Initiation records an `Initiated` swap behind a fresh hashlock
//! 2. Execution locks both legs and settles them with the secret
//! 3. Refund is refused until the source timelock passes
//! 4. HTLC script and address derivation is a pure function of its inputs

#[cfg(test)]
mod tests {
    use super::super::{eth_to_btc, funded_eth_to_btc, ALICE, BOB, SWAP_AMOUNT};
    use bitcoin::Network;
    use swap_crypto::verify_secret;
    use swap_engine::test_utils::Devnet;
    use swap_engine::{
        generate_htlc_address, generate_htlc_script, parse_htlc_script, verify_htlc_script,
        ChainAdapter, ChainId, HtlcScriptParams, HtlcState, OrderStatus, SwapApi, SwapConfig,
        SwapError, SwapStatus,
    };

    // =========================================================================
    // Initiation
    // =========================================================================

    #[tokio::test]
    async fn test_initiate_eth_to_btc_with_default_timelock() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let user = format!("0x{}", "abc0".repeat(10));

        let swap = coordinator
            .initiate_swap(eth_to_btc(user.clone(), None, 100_000_000_000_000_000))
            .await
            .unwrap();

        assert_eq!(swap.status, SwapStatus::Initiated);
        assert_eq!(swap.hashlock.len(), 32);
        assert_ne!(swap.hashlock, [0u8; 32]);
        assert_eq!(
            swap.expires_at,
            swap.created_at + SwapConfig::default().default_timelock_secs
        );
        assert_eq!(swap.user_address, user);

        let order = coordinator.store().get_order(&swap.order_id).unwrap();
        let secret = order.secret.as_ref().unwrap();
        assert!(verify_secret(secret.as_bytes(), &swap.hashlock));
    }

    #[tokio::test]
    async fn test_each_swap_gets_its_own_hashlock() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();

        let first = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();
        let second = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first.hashlock, second.hashlock);
    }

    // =========================================================================
    // Execution
    // =========================================================================

    #[tokio::test]
    async fn test_execute_completes_with_all_transactions() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let swap = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();

        let done = coordinator.execute_swap(&swap.id).await.unwrap();

        assert_eq!(done.status, SwapStatus::Completed);
        assert!(done.txs.source_lock_tx.is_some());
        assert!(done.txs.destination_lock_tx.is_some());
        assert!(done.txs.redeem_tx.is_some());
        assert!(done.txs.refund_tx.is_none());
        assert!(done.updated_at >= swap.updated_at);

        let source = devnet.registry.get(&ChainId::new("ethereum")).unwrap();
        let destination = devnet.registry.get(&ChainId::new("bitcoin")).unwrap();
        let source_leg = done.source_htlc_id.as_deref().unwrap();
        let destination_leg = done.destination_htlc_id.as_deref().unwrap();
        assert_eq!(
            source.get_htlc_status(source_leg).await.unwrap().status,
            HtlcState::Redeemed
        );
        assert_eq!(
            destination.get_htlc_status(destination_leg).await.unwrap().status,
            HtlcState::Redeemed
        );

        let order = coordinator.store().get_order(&swap.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Claimed);
    }

    #[tokio::test]
    async fn test_destination_leg_pays_recipient() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let recipient = devnet.bitcoin_user(BOB);
        let bitcoin = devnet.registry.get(&ChainId::new("bitcoin")).unwrap();
        let before = bitcoin.get_balance(&recipient).await.unwrap();

        let swap = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();
        coordinator.execute_swap(&swap.id).await.unwrap();

        let after = bitcoin.get_balance(&recipient).await.unwrap();
        let fee = u128::from(swap_engine::adapters::bitcoin::DEFAULT_FEE_SATS);
        assert_eq!(after - before, SWAP_AMOUNT - fee);
    }

    // =========================================================================
    // Refund
    // =========================================================================

    #[tokio::test]
    async fn test_refund_source_locked_before_and_after_timelock() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let swap = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();
        let locked = coordinator.step_swap(&swap.id).await.unwrap();
        assert_eq!(locked.status, SwapStatus::SourceLocked);

        devnet.clock.set(swap.source_timelock - 1);
        assert!(matches!(
            coordinator.refund_swap(&swap.id).await,
            Err(SwapError::InvalidTime(_))
        ));
        assert_eq!(
            coordinator.get_swap_status(&swap.id).await.unwrap().status,
            SwapStatus::SourceLocked
        );

        devnet.clock.set(swap.source_timelock);
        let refunded = coordinator.refund_swap(&swap.id).await.unwrap();
        assert_eq!(refunded.status, SwapStatus::Refunded);
        assert!(refunded.txs.refund_tx.is_some());

        let ethereum = devnet.registry.get(&ChainId::new("ethereum")).unwrap();
        assert_eq!(
            ethereum.get_balance(&Devnet::evm_user(ALICE)).await.unwrap(),
            SWAP_AMOUNT
        );
    }

    #[tokio::test]
    async fn test_refund_rejected_for_initiated_and_completed() {
        let devnet = Devnet::new();
        let coordinator = devnet.coordinator();
        let swap = coordinator
            .initiate_swap(funded_eth_to_btc(&devnet, SWAP_AMOUNT))
            .await
            .unwrap();

        assert!(matches!(
            coordinator.refund_swap(&swap.id).await,
            Err(SwapError::InvalidState(_))
        ));
        coordinator.execute_swap(&swap.id).await.unwrap();
        devnet.clock.set(swap.source_timelock + 1);
        assert!(matches!(
            coordinator.refund_swap(&swap.id).await,
            Err(SwapError::InvalidState(_))
        ));
    }

    // =========================================================================
    // Script determinism
    // =========================================================================

    fn script_params() -> HtlcScriptParams {
        HtlcScriptParams {
            hashlock: [0x5a; 32],
            recipient: Devnet::key(0x33).public_key(),
            sender: Devnet::key(0x44).public_key(),
            locktime: 1_700_003_600,
        }
    }

    #[test]
    fn test_htlc_script_and_address_are_deterministic() {
        let params = script_params();

        let first = generate_htlc_script(
            &params.hashlock,
            &params.recipient,
            &params.sender,
            params.locktime,
        );
        let second = params.redeem_script();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert!(verify_htlc_script(&first));
        assert_eq!(parse_htlc_script(&first).unwrap(), params);

        assert_eq!(
            generate_htlc_address(&params, Network::Regtest).unwrap(),
            generate_htlc_address(&params, Network::Regtest).unwrap()
        );
    }

    #[test]
    fn test_every_parameter_changes_the_address() {
        let base = script_params();
        let address = generate_htlc_address(&base, Network::Regtest).unwrap();

        let variants = [
            HtlcScriptParams {
                hashlock: [0x5b; 32],
                ..base
            },
            HtlcScriptParams {
                recipient: Devnet::key(0x55).public_key(),
                ..base
            },
            HtlcScriptParams {
                sender: Devnet::key(0x55).public_key(),
                ..base
            },
            HtlcScriptParams {
                locktime: base.locktime + 1,
                ..base
            },
        ];
        for variant in variants {
            assert_ne!(
                generate_htlc_address(&variant, Network::Regtest).unwrap(),
                address,
                "{:?} should derive a different address",
                variant
            );
        }
    }
}
