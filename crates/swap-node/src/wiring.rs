//! # Adapter Wiring
//!
//! Builds the adapter registry and pricing from [`NodeConfig`]. Every ledger
//! is an in-process devnet sharing the node clock; the adapters only see them
//! through their RPC ports.

use crate::config::{EvmChainConfig, NodeConfig};
use anyhow::{Context, Result};
use bitcoin::Amount;
use std::collections::HashMap;
use std::sync::Arc;
use swap_crypto::Secp256k1KeyPair;
use swap_engine::adapters::{
    BitcoinAdapter, BitcoinConfig, DevnetEvm, EvmAdapter, EvmConfig, FixedRatePricing,
    RegtestBitcoin,
};
use swap_engine::{AdapterRegistry, ChainAdapter, ChainId, TimeSource};
use tracing::{info, warn};

/// Registry plus handles on the devnet ledgers behind it.
pub struct DevnetLedgers {
    /// Adapters by chain id.
    pub registry: Arc<AdapterRegistry>,
    /// Account-based ledger.
    pub ethereum: Arc<DevnetEvm>,
    /// Second account-based ledger, when configured.
    pub polygon: Option<Arc<DevnetEvm>>,
    /// Account-ledger adapters, for runtime token management.
    pub account_adapters: Vec<Arc<EvmAdapter>>,
    /// Script-based ledger.
    pub bitcoin: Arc<RegtestBitcoin>,
    /// Bitcoin adapter, for importing user keys.
    pub bitcoin_adapter: Arc<BitcoinAdapter>,
}

fn coordinator_key(config: &NodeConfig) -> Result<Secp256k1KeyPair> {
    match config.bitcoin.signing_key.as_deref() {
        Some(hex) => Secp256k1KeyPair::from_hex(hex).context("HX_BTC_KEY is not a valid secp256k1 secret"),
        None => {
            warn!("[btc] No signing key configured, using an ephemeral key");
            Ok(Secp256k1KeyPair::generate())
        }
    }
}

/// Devnet account ledger with its contracts deployed, plus its adapter.
fn account_ledger(
    evm: &EvmChainConfig,
    clock: Arc<dyn TimeSource>,
) -> (Arc<DevnetEvm>, Arc<EvmAdapter>) {
    let ledger = Arc::new(DevnetEvm::new(evm.evm_chain_id, clock));
    ledger.deploy_htlc_contract(evm.htlc_contract);
    if let Some(contract) = evm.erc20_htlc_contract {
        ledger.deploy_htlc_contract(contract);
    }
    for (_, token) in &evm.tokens {
        ledger.deploy_token(*token);
        ledger.mint_token(*token, evm.account, evm.devnet_float);
    }
    ledger.mint(evm.account, evm.devnet_float);

    let adapter = Arc::new(EvmAdapter::new(
        EvmConfig {
            chain_id: ChainId::new(&evm.name),
            evm_chain_id: evm.evm_chain_id,
            native_token: evm.native_token.clone(),
            htlc_contract: evm.htlc_contract,
            erc20_htlc_contract: evm.erc20_htlc_contract,
            tokens: evm
                .tokens
                .iter()
                .map(|(symbol, address)| (symbol.to_ascii_uppercase(), *address))
                .collect::<HashMap<_, _>>(),
            account: evm.account,
        },
        ledger.clone(),
    ));
    (ledger, adapter)
}

/// Fixed-rate pricing over every configured account ledger.
pub fn build_pricing(config: &NodeConfig) -> FixedRatePricing {
    let chains = std::iter::once(&config.ethereum)
        .chain(config.polygon.as_ref())
        .map(|evm| ChainId::new(&evm.name));
    let pricing = &config.pricing;
    pricing.rates.iter().fold(
        FixedRatePricing::new(chains)
            .with_slippage_bps(pricing.slippage_bps)
            .with_gas_estimate(pricing.gas_estimate),
        |quotes, rate| quotes.with_rate(&rate.from, &rate.to, rate.numerator, rate.denominator),
    )
}

/// Build the devnet ledgers and register one adapter per ledger.
pub fn build_devnet_registry(
    config: &NodeConfig,
    clock: Arc<dyn TimeSource>,
) -> Result<DevnetLedgers> {
    let (ethereum, ethereum_adapter) = account_ledger(&config.ethereum, clock.clone());
    let mut account_adapters = vec![ethereum_adapter];
    let polygon = config.polygon.as_ref().map(|evm| {
        let (ledger, adapter) = account_ledger(evm, clock.clone());
        account_adapters.push(adapter);
        ledger
    });

    let btc = &config.bitcoin;
    let bitcoin = Arc::new(RegtestBitcoin::new(btc.network, clock));
    bitcoin.credit_wallet(Amount::from_sat(btc.devnet_wallet_sats));
    let bitcoin_adapter = Arc::new(BitcoinAdapter::new(
        BitcoinConfig {
            chain_id: ChainId::new(&btc.name),
            network: btc.network,
            fee_sats: btc.fee_sats,
            native_token: "BTC".to_string(),
        },
        bitcoin.clone(),
        coordinator_key(config)?,
    ));

    let registry = Arc::new(AdapterRegistry::new());
    let adapters = account_adapters
        .iter()
        .map(|adapter| adapter.clone() as Arc<dyn ChainAdapter>)
        .chain(std::iter::once(bitcoin_adapter.clone() as Arc<dyn ChainAdapter>));
    for adapter in adapters {
        registry
            .register(adapter)
            .context("Failed to register chain adapter")?;
    }
    info!("[swap] Registry ready: {:?}", registry.chains());

    Ok(DevnetLedgers {
        registry,
        ethereum,
        polygon,
        account_adapters,
        bitcoin,
        bitcoin_adapter,
    })
}
