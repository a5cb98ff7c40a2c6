//! Chain adapter for script-based UTXO ledgers.
//!
//! Parties are identified by compressed secp256k1 public keys (hex). The
//! adapter funds HTLC outputs from the node wallet and signs spends with keys
//! it holds in its keyring.

use super::rpc::BitcoinRpc;
use crate::algorithms::{
    create_refund_transaction_data, create_withdrawal_transaction_data, generate_htlc_address,
    p2pkh_address, parse_htlc_script, parse_spend_script_sig, FundingUtxo, HtlcScriptParams,
    ParsedSpend, SpendDescriptor,
};
use crate::domain::{
    invariant_hashlock_match, ChainFamily, ChainId, EscrowDetails, HtlcState, ScriptEscrow,
    SwapError,
};
use crate::ports::{ChainAdapter, HtlcLock, HtlcParams, HtlcStatusReport};
use async_trait::async_trait;
use bitcoin::{Address, Amount, Network, ScriptBuf, Txid};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swap_crypto::{Secp256k1KeyPair, Secp256k1PublicKey, Secret};
use tracing::{debug, info};

/// Default flat fee per spend.
pub const DEFAULT_FEE_SATS: u64 = 1_000;

/// Locktimes below this are block heights.
const LOCKTIME_THRESHOLD: u64 = 500_000_000;

/// Bitcoin adapter configuration.
#[derive(Clone, Debug)]
pub struct BitcoinConfig {
    /// Registry identifier, e.g. `bitcoin`.
    pub chain_id: ChainId,
    /// Address network.
    pub network: Network,
    /// Flat fee deducted from each HTLC spend.
    pub fee_sats: u64,
    /// Native asset symbol.
    pub native_token: String,
}

impl BitcoinConfig {
    /// Regtest defaults for `chain_id`.
    pub fn regtest(chain_id: impl AsRef<str>) -> Self {
        Self {
            chain_id: ChainId::new(chain_id),
            network: Network::Regtest,
            fee_sats: DEFAULT_FEE_SATS,
            native_token: "BTC".to_string(),
        }
    }
}

#[derive(Clone)]
struct BookEntry {
    params: HtlcScriptParams,
    utxo: FundingUtxo,
    created_at: u64,
}

/// HTLC adapter over a [`BitcoinRpc`] node.
pub struct BitcoinAdapter {
    config: BitcoinConfig,
    rpc: Arc<dyn BitcoinRpc>,
    account: Secp256k1PublicKey,
    keyring: RwLock<HashMap<Secp256k1PublicKey, Arc<Secp256k1KeyPair>>>,
    book: RwLock<HashMap<String, BookEntry>>,
    initialized: AtomicBool,
}

impl BitcoinAdapter {
    /// Adapter acting as `key` by default.
    pub fn new(config: BitcoinConfig, rpc: Arc<dyn BitcoinRpc>, key: Secp256k1KeyPair) -> Self {
        let account = key.public_key();
        let mut keyring = HashMap::new();
        keyring.insert(account, Arc::new(key));
        Self {
            config,
            rpc,
            account,
            keyring: RwLock::new(keyring),
            book: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Make `key` available for signing spends.
    pub fn import_key(&self, key: Secp256k1KeyPair) -> Secp256k1PublicKey {
        let pubkey = key.public_key();
        self.keyring.write().insert(pubkey, Arc::new(key));
        pubkey
    }

    /// Whether `initialize` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn chain(&self) -> &str {
        self.config.chain_id.as_str()
    }

    fn rpc_err(&self, err: SwapError) -> SwapError {
        match err {
            SwapError::Adapter { message, .. } => SwapError::adapter(self.chain(), message),
            other => other,
        }
    }

    fn party(&self, pubkey: Option<&str>) -> Result<Secp256k1PublicKey, SwapError> {
        match pubkey {
            Some(hex) => Ok(Secp256k1PublicKey::from_hex(hex)?),
            None => Ok(self.account),
        }
    }

    fn signer(&self, pubkey: &Secp256k1PublicKey) -> Result<Arc<Secp256k1KeyPair>, SwapError> {
        self.keyring.read().get(pubkey).cloned().ok_or_else(|| {
            SwapError::adapter(
                self.chain(),
                format!("no signing key for {}", pubkey.to_hex()),
            )
        })
    }

    fn entry(&self, htlc_id: &str) -> Result<BookEntry, SwapError> {
        self.book
            .read()
            .get(htlc_id)
            .cloned()
            .ok_or_else(|| SwapError::NotFound(format!("HTLC {} on {}", htlc_id, self.chain())))
    }

    /// Rebuild a book entry from a persisted escrow, checking that the
    /// script, address and outpoint agree with each other.
    fn restore(&self, htlc_id: &str, escrow: &ScriptEscrow) -> Result<BookEntry, SwapError> {
        let bytes = hex::decode(&escrow.redeem_script)
            .map_err(|e| SwapError::validation(format!("redeem script of {}: {}", htlc_id, e)))?;
        let params = parse_htlc_script(&ScriptBuf::from_bytes(bytes))?;
        if params.locktime != escrow.locktime {
            return Err(SwapError::validation(format!(
                "escrow of {} records locktime {}, script encodes {}",
                htlc_id, escrow.locktime, params.locktime
            )));
        }
        let address = generate_htlc_address(&params, self.config.network)?;
        if address.to_string() != escrow.address {
            return Err(SwapError::validation(format!(
                "escrow of {} records address {}, script hashes to {}",
                htlc_id, escrow.address, address
            )));
        }
        let txid = Txid::from_str(&escrow.funding_txid)
            .map_err(|e| SwapError::validation(format!("funding txid of {}: {}", htlc_id, e)))?;
        if format!("{}:{}", txid, escrow.vout) != htlc_id {
            return Err(SwapError::validation(format!(
                "escrow outpoint {}:{} is not HTLC {}",
                txid, escrow.vout, htlc_id
            )));
        }

        Ok(BookEntry {
            params,
            utxo: FundingUtxo {
                txid,
                vout: escrow.vout,
                value: Amount::from_sat(escrow.value_sats),
            },
            created_at: escrow.funded_at,
        })
    }

    async fn now(&self) -> Result<u64, SwapError> {
        self.rpc.median_time().await.map_err(|e| self.rpc_err(e))
    }

    async fn ensure_unspent(&self, htlc_id: &str, entry: &BookEntry) -> Result<(), SwapError> {
        let txout = self
            .rpc
            .get_txout(&entry.utxo.outpoint())
            .await
            .map_err(|e| self.rpc_err(e))?;
        if txout.is_none() {
            return Err(SwapError::InvalidState(format!(
                "HTLC {} already spent",
                htlc_id
            )));
        }
        Ok(())
    }

    /// Sign with the key for `signer` and broadcast.
    async fn sign_and_send(
        &self,
        descriptor: SpendDescriptor,
        signer: &Secp256k1PublicKey,
    ) -> Result<String, SwapError> {
        let key = self.signer(signer)?;
        let digest = descriptor.signature_hash()?;
        let signature = key
            .sign_digest(&digest)
            .map_err(|e| SwapError::adapter(self.chain(), e.to_string()))?;
        let tx = descriptor.finalize(&signature)?;
        let txid = self.rpc.broadcast(&tx).await.map_err(|e| self.rpc_err(e))?;
        Ok(txid.to_string())
    }
}

#[async_trait]
impl ChainAdapter for BitcoinAdapter {
    fn chain_id(&self) -> &ChainId {
        &self.config.chain_id
    }

    fn family(&self) -> ChainFamily {
        ChainFamily::Utxo
    }

    fn native_token(&self) -> &str {
        &self.config.native_token
    }

    fn supports_token(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(&self.config.native_token)
    }

    fn validate_address(&self, address: &str) -> bool {
        Secp256k1PublicKey::from_hex(address).is_ok()
    }

    fn account(&self) -> String {
        self.account.to_hex()
    }

    async fn initialize(&self) -> Result<(), SwapError> {
        if self.is_initialized() {
            return Ok(());
        }
        let tip_time = self.now().await?;
        self.initialized.store(true, Ordering::SeqCst);
        info!(
            "[btc] {} initialized ({:?}, median time {})",
            self.chain(),
            self.config.network,
            tip_time
        );
        Ok(())
    }

    async fn create_htlc(&self, params: HtlcParams) -> Result<HtlcLock, SwapError> {
        let sender = self.party(params.sender.as_deref())?;
        let recipient = self.party(params.recipient.as_deref())?;
        if let Some(token) = params.token.as_deref() {
            if !self.supports_token(token) {
                return Err(SwapError::validation(format!(
                    "token {} not supported on {}",
                    token,
                    self.chain()
                )));
            }
        }

        let sats = u64::try_from(params.amount)
            .map_err(|_| SwapError::validation("amount exceeds satoshi range"))?;
        if sats <= self.config.fee_sats {
            return Err(SwapError::validation(format!(
                "amount {} sats does not cover the {} sat spend fee",
                sats, self.config.fee_sats
            )));
        }
        if params.timelock < LOCKTIME_THRESHOLD {
            return Err(SwapError::validation("locktime must be a unix timestamp"));
        }
        let locktime = u32::try_from(params.timelock)
            .map_err(|_| SwapError::validation("locktime exceeds u32"))?;
        let now = self.now().await?;
        if params.timelock <= now {
            return Err(SwapError::InvalidTime(format!(
                "locktime {} is not after median time {}",
                params.timelock, now
            )));
        }

        let script_params = HtlcScriptParams {
            hashlock: params.hashlock,
            recipient,
            sender,
            locktime,
        };
        let redeem_script = script_params.redeem_script();
        let encoded = parse_htlc_script(&redeem_script)?;
        invariant_hashlock_match(&params.hashlock, &encoded.hashlock)?;
        if encoded.locktime != locktime {
            return Err(SwapError::validation("script locktime differs from order"));
        }

        let address = generate_htlc_address(&script_params, self.config.network)?;
        let utxo = self
            .rpc
            .send_to_address(&address, Amount::from_sat(sats))
            .await
            .map_err(|e| self.rpc_err(e))?;
        let htlc_id = format!("{}:{}", utxo.txid, utxo.vout);

        self.book.write().insert(
            htlc_id.clone(),
            BookEntry {
                params: script_params,
                utxo,
                created_at: now,
            },
        );
        info!("[btc] Locked {} sats at {} ({})", sats, address, htlc_id);

        Ok(HtlcLock {
            htlc_id,
            tx_id: utxo.txid.to_string(),
            escrow: EscrowDetails::Script(ScriptEscrow {
                address: address.to_string(),
                redeem_script: hex::encode(redeem_script.as_bytes()),
                funding_txid: utxo.txid.to_string(),
                vout: utxo.vout,
                value_sats: sats,
                locktime,
                funded_at: now,
            }),
        })
    }

    fn track_htlc(&self, htlc_id: &str, escrow: &EscrowDetails) -> Result<(), SwapError> {
        if self.book.read().contains_key(htlc_id) {
            return Ok(());
        }
        let EscrowDetails::Script(escrow) = escrow else {
            return Err(SwapError::validation(format!(
                "HTLC {} on {} has no script escrow",
                htlc_id,
                self.chain()
            )));
        };
        let entry = self.restore(htlc_id, escrow)?;
        self.book
            .write()
            .entry(htlc_id.to_string())
            .or_insert(entry);
        info!("[btc] Restored {} from persisted escrow", htlc_id);
        Ok(())
    }

    async fn redeem_htlc(&self, htlc_id: &str, preimage: &[u8]) -> Result<String, SwapError> {
        let entry = self.entry(htlc_id)?;
        self.ensure_unspent(htlc_id, &entry).await?;
        let secret = Secret::from_slice(preimage).ok_or(SwapError::InvalidSecret)?;
        let now = self.now().await?;
        if now >= u64::from(entry.params.locktime) {
            return Err(SwapError::InvalidTime(format!(
                "HTLC {} expired at {}",
                htlc_id, entry.params.locktime
            )));
        }

        let payout = p2pkh_address(&entry.params.recipient, self.config.network)?;
        let descriptor = create_withdrawal_transaction_data(
            &entry.utxo,
            &payout,
            &entry.params,
            &secret,
            self.config.fee_sats,
        )?;
        let txid = self.sign_and_send(descriptor, &entry.params.recipient).await?;
        info!("[btc] Redeemed {} to {} ({})", htlc_id, payout, txid);
        Ok(txid)
    }

    async fn refund_htlc(&self, htlc_id: &str) -> Result<String, SwapError> {
        let entry = self.entry(htlc_id)?;
        self.ensure_unspent(htlc_id, &entry).await?;
        let now = self.now().await?;
        if now < u64::from(entry.params.locktime) {
            return Err(SwapError::InvalidTime(format!(
                "HTLC {} refundable from {}, now {}",
                htlc_id, entry.params.locktime, now
            )));
        }

        let payout = p2pkh_address(&entry.params.sender, self.config.network)?;
        let descriptor = create_refund_transaction_data(
            &entry.utxo,
            &payout,
            &entry.params,
            self.config.fee_sats,
        )?;
        let txid = self.sign_and_send(descriptor, &entry.params.sender).await?;
        info!("[btc] Refunded {} to {} ({})", htlc_id, payout, txid);
        Ok(txid)
    }

    async fn get_balance(&self, address: &str) -> Result<u128, SwapError> {
        let address = match Secp256k1PublicKey::from_hex(address) {
            Ok(pubkey) => p2pkh_address(&pubkey, self.config.network)?,
            Err(_) => Address::from_str(address)
                .map_err(|e| SwapError::validation(format!("address {}: {}", address, e)))?
                .require_network(self.config.network)
                .map_err(|e| SwapError::validation(e.to_string()))?,
        };
        let balance = self.rpc.balance(&address).await.map_err(|e| self.rpc_err(e))?;
        Ok(u128::from(balance.to_sat()))
    }

    async fn get_htlc_status(&self, htlc_id: &str) -> Result<HtlcStatusReport, SwapError> {
        let entry = self.entry(htlc_id)?;
        let outpoint = entry.utxo.outpoint();
        let unspent = self
            .rpc
            .get_txout(&outpoint)
            .await
            .map_err(|e| self.rpc_err(e))?;

        let now = self.now().await?;

        let status = match unspent {
            Some(_) if now >= u64::from(entry.params.locktime) => HtlcState::Expired,
            Some(_) => HtlcState::Locked,
            None => {
                let spend = self
                    .rpc
                    .spending_transaction(&outpoint)
                    .await
                    .map_err(|e| self.rpc_err(e))?;
                let script_sig = spend.as_ref().and_then(|tx| {
                    tx.input
                        .iter()
                        .find(|input| input.previous_output == outpoint)
                        .map(|input| input.script_sig.clone())
                });
                match script_sig.map(|sig| parse_spend_script_sig(&sig)) {
                    Some(Ok(ParsedSpend::Withdrawal { .. })) => HtlcState::Redeemed,
                    Some(Ok(ParsedSpend::Refund { .. })) => HtlcState::Refunded,
                    _ => HtlcState::Pending,
                }
            }
        };
        debug!("[btc] {} status {:?}", htlc_id, status);

        Ok(HtlcStatusReport {
            status,
            hashlock: entry.params.hashlock,
            timelock: u64::from(entry.params.locktime),
            recipient: entry.params.recipient.to_hex(),
            sender: entry.params.sender.to_hex(),
            amount: u128::from(entry.utxo.value.to_sat()),
            created_at: entry.created_at,
            expires_at: u64::from(entry.params.locktime),
        })
    }

    async fn current_time(&self) -> Result<u64, SwapError> {
        self.now().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bitcoin::RegtestBitcoin;
    use crate::adapters::clock::ManualTimeSource;
    use swap_crypto::generate_secret_and_hashlock;

    const NOW: u64 = 1_700_000_000;

    fn create_test_adapter() -> (Arc<ManualTimeSource>, Arc<RegtestBitcoin>, BitcoinAdapter) {
        let clock = Arc::new(ManualTimeSource::new(NOW));
        let node = Arc::new(RegtestBitcoin::new(Network::Regtest, clock.clone()));
        node.credit_wallet(Amount::from_sat(10_000_000));
        let key = Secp256k1KeyPair::from_bytes([3u8; 32]).unwrap();
        let adapter = BitcoinAdapter::new(BitcoinConfig::regtest("bitcoin"), node.clone(), key);
        (clock, node, adapter)
    }

    fn params(hashlock: [u8; 32], sender: Option<String>) -> HtlcParams {
        HtlcParams {
            hashlock,
            timelock: NOW + 3600,
            recipient: None,
            sender,
            amount: 50_000,
            token: Some("BTC".to_string()),
        }
    }

    #[tokio::test]
    async fn test_lock_and_redeem() {
        let (_clock, _node, adapter) = create_test_adapter();
        adapter.initialize().await.unwrap();
        let (secret, hashlock) = generate_secret_and_hashlock();

        let lock = adapter.create_htlc(params(hashlock, None)).await.unwrap();
        match &lock.escrow {
            EscrowDetails::Script(escrow) => {
                assert!(escrow.address.starts_with('2'));
                assert_eq!(escrow.value_sats, 50_000);
                assert_eq!(u64::from(escrow.locktime), NOW + 3600);
            }
            other => panic!("unexpected escrow: {:?}", other),
        }
        assert_eq!(
            adapter.get_htlc_status(&lock.htlc_id).await.unwrap().status,
            HtlcState::Locked
        );

        adapter.redeem_htlc(&lock.htlc_id, secret.as_bytes()).await.unwrap();
        assert_eq!(
            adapter.get_htlc_status(&lock.htlc_id).await.unwrap().status,
            HtlcState::Redeemed
        );
        assert_eq!(adapter.get_balance(&adapter.account()).await.unwrap(), 49_000);
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let (_clock, _node, adapter) = create_test_adapter();
        let (_secret, hashlock) = generate_secret_and_hashlock();
        let lock = adapter.create_htlc(params(hashlock, None)).await.unwrap();

        assert!(matches!(
            adapter.redeem_htlc(&lock.htlc_id, &[1u8; 32]).await,
            Err(SwapError::InvalidSecret)
        ));
        assert!(matches!(
            adapter.redeem_htlc(&lock.htlc_id, &[1u8; 5]).await,
            Err(SwapError::InvalidSecret)
        ));
        assert_eq!(
            adapter.get_htlc_status(&lock.htlc_id).await.unwrap().status,
            HtlcState::Locked
        );
    }

    #[tokio::test]
    async fn test_refund_with_imported_sender_key() {
        let (clock, _node, adapter) = create_test_adapter();
        let user = adapter.import_key(Secp256k1KeyPair::from_bytes([4u8; 32]).unwrap());
        let (_secret, hashlock) = generate_secret_and_hashlock();
        let lock = adapter
            .create_htlc(params(hashlock, Some(user.to_hex())))
            .await
            .unwrap();

        assert!(matches!(
            adapter.refund_htlc(&lock.htlc_id).await,
            Err(SwapError::InvalidTime(_))
        ));
        clock.advance(3600);
        assert_eq!(
            adapter.get_htlc_status(&lock.htlc_id).await.unwrap().status,
            HtlcState::Expired
        );
        adapter.refund_htlc(&lock.htlc_id).await.unwrap();
        assert_eq!(
            adapter.get_htlc_status(&lock.htlc_id).await.unwrap().status,
            HtlcState::Refunded
        );
        assert_eq!(adapter.get_balance(&user.to_hex()).await.unwrap(), 49_000);
        assert!(matches!(
            adapter.refund_htlc(&lock.htlc_id).await,
            Err(SwapError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_without_key_fails() {
        let (clock, _node, adapter) = create_test_adapter();
        let stranger = Secp256k1KeyPair::from_bytes([5u8; 32]).unwrap().public_key();
        let (_secret, hashlock) = generate_secret_and_hashlock();
        let lock = adapter
            .create_htlc(params(hashlock, Some(stranger.to_hex())))
            .await
            .unwrap();
        clock.advance(3600);
        assert!(matches!(
            adapter.refund_htlc(&lock.htlc_id).await,
            Err(SwapError::Adapter { .. })
        ));
    }

    #[tokio::test]
    async fn test_fresh_adapter_tracks_persisted_escrow() {
        let (clock, node, adapter) = create_test_adapter();
        let (_secret, hashlock) = generate_secret_and_hashlock();
        let lock = adapter.create_htlc(params(hashlock, None)).await.unwrap();

        let key = Secp256k1KeyPair::from_bytes([3u8; 32]).unwrap();
        let restarted = BitcoinAdapter::new(BitcoinConfig::regtest("bitcoin"), node, key);
        assert!(matches!(
            restarted.get_htlc_status(&lock.htlc_id).await,
            Err(SwapError::NotFound(_))
        ));

        restarted.track_htlc(&lock.htlc_id, &lock.escrow).unwrap();
        restarted.track_htlc(&lock.htlc_id, &lock.escrow).unwrap();
        let report = restarted.get_htlc_status(&lock.htlc_id).await.unwrap();
        assert_eq!(report.status, HtlcState::Locked);
        assert_eq!(report.hashlock, hashlock);
        assert_eq!(report.amount, 50_000);
        assert_eq!(report.created_at, NOW);

        clock.advance(3600);
        restarted.refund_htlc(&lock.htlc_id).await.unwrap();
        assert_eq!(
            adapter.get_htlc_status(&lock.htlc_id).await.unwrap().status,
            HtlcState::Refunded
        );
    }

    #[tokio::test]
    async fn test_track_rejects_inconsistent_escrow() {
        let (_clock, node, adapter) = create_test_adapter();
        let (_secret, hashlock) = generate_secret_and_hashlock();
        let lock = adapter.create_htlc(params(hashlock, None)).await.unwrap();
        let key = Secp256k1KeyPair::from_bytes([3u8; 32]).unwrap();
        let restarted = BitcoinAdapter::new(BitcoinConfig::regtest("bitcoin"), node, key);

        let EscrowDetails::Script(escrow) = &lock.escrow else {
            panic!("script escrow expected");
        };
        let mut moved = escrow.clone();
        moved.vout += 1;
        assert!(matches!(
            restarted.track_htlc(&lock.htlc_id, &EscrowDetails::Script(moved)),
            Err(SwapError::Validation(_))
        ));
        let mut relocked = escrow.clone();
        relocked.locktime += 1;
        assert!(restarted
            .track_htlc(&lock.htlc_id, &EscrowDetails::Script(relocked))
            .is_err());
        assert!(restarted.get_htlc_status(&lock.htlc_id).await.is_err());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_clock, _node, adapter) = create_test_adapter();
        let (_secret, hashlock) = generate_secret_and_hashlock();

        let mut dust = params(hashlock, None);
        dust.amount = DEFAULT_FEE_SATS as u128;
        assert!(matches!(adapter.create_htlc(dust).await, Err(SwapError::Validation(_))));

        let mut eth = params(hashlock, None);
        eth.token = Some("ETH".to_string());
        assert!(matches!(adapter.create_htlc(eth).await, Err(SwapError::Validation(_))));

        let mut past = params(hashlock, None);
        past.timelock = NOW - 1;
        assert!(matches!(adapter.create_htlc(past).await, Err(SwapError::InvalidTime(_))));

        let mut huge = params(hashlock, None);
        huge.amount = 1_000_000_000;
        assert!(matches!(adapter.create_htlc(huge).await, Err(SwapError::Adapter { .. })));

        assert!(adapter.validate_address(&adapter.account()));
        assert!(!adapter.validate_address("0x0000000000000000000000000000000000000001"));
    }
}
