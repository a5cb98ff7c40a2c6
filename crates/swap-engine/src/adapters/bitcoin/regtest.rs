//! In-process regtest ledger for HTLC outputs.
//!
//! Tracks a UTXO set funded from a single node wallet and validates HTLC
//! spends: script hash, hashlock, signatures over the legacy sighash, and
//! CLTV finality against a settable median time.

use super::rpc::BitcoinRpc;
use crate::algorithms::{parse_htlc_script, parse_spend_script_sig, FundingUtxo, ParsedSpend};
use crate::domain::SwapError;
use crate::ports::TimeSource;
use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::locktime::absolute::LockTime;
use bitcoin::script::ScriptBuf;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use swap_crypto::verify_secret;
use tracing::debug;

/// Locktimes below this are block heights.
const LOCKTIME_THRESHOLD: u32 = 500_000_000;

#[derive(Default)]
struct RegtestState {
    utxos: HashMap<OutPoint, TxOut>,
    spends: HashMap<OutPoint, Transaction>,
    wallet: Amount,
    funding_count: u64,
}

/// Local regtest node.
pub struct RegtestBitcoin {
    network: Network,
    clock: Arc<dyn TimeSource>,
    state: RwLock<RegtestState>,
}

fn reject(reason: impl Into<String>) -> SwapError {
    SwapError::adapter("btc-rpc", reason)
}

impl RegtestBitcoin {
    /// Empty node with an empty wallet.
    pub fn new(network: Network, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            network,
            clock,
            state: RwLock::new(RegtestState::default()),
        }
    }

    /// Add spendable funds to the node wallet.
    pub fn credit_wallet(&self, amount: Amount) {
        let mut state = self.state.write();
        state.wallet = state.wallet.checked_add(amount).unwrap_or(Amount::MAX_MONEY);
    }

    /// Spendable wallet funds.
    pub fn wallet_balance(&self) -> Amount {
        self.state.read().wallet
    }

    /// Check every input of `tx` against the UTXO set and the HTLC rules.
    fn verify(&self, state: &RegtestState, tx: &Transaction) -> Result<(), SwapError> {
        if tx.input.is_empty() || tx.output.is_empty() {
            return Err(reject("bad-txns-vin-or-vout-empty"));
        }

        let cache = SighashCache::new(tx);
        let mut input_total = Amount::ZERO;
        for (index, input) in tx.input.iter().enumerate() {
            let prevout = state
                .utxos
                .get(&input.previous_output)
                .ok_or_else(|| reject("bad-txns-inputs-missingorspent"))?;
            input_total = input_total
                .checked_add(prevout.value)
                .ok_or_else(|| reject("bad-txns-inputvalues-outofrange"))?;

            if !prevout.script_pubkey.is_p2sh() {
                return Err(reject("only HTLC outputs are spendable on this node"));
            }

            let spend = parse_spend_script_sig(&input.script_sig)
                .map_err(|e| reject(format!("scriptsig: {}", e)))?;
            let (signature, redeem_script) = match &spend {
                ParsedSpend::Withdrawal {
                    signature,
                    redeem_script,
                    ..
                }
                | ParsedSpend::Refund {
                    signature,
                    redeem_script,
                } => (signature, redeem_script),
            };

            let expected = Address::p2sh(redeem_script, self.network)
                .map_err(|e| reject(e.to_string()))?
                .script_pubkey();
            if expected != prevout.script_pubkey {
                return Err(reject("redeem script does not match script hash"));
            }
            let params = parse_htlc_script(redeem_script)
                .map_err(|e| reject(format!("redeem script: {}", e)))?;

            let (der, flag) = match signature.split_last() {
                Some((flag, der)) => (der, *flag),
                None => return Err(reject("empty signature")),
            };
            if u32::from(flag) != EcdsaSighashType::All.to_u32() {
                return Err(reject("only SIGHASH_ALL is accepted"));
            }
            let digest = cache
                .legacy_signature_hash(index, redeem_script, EcdsaSighashType::All.to_u32())
                .map_err(|e| reject(e.to_string()))?
                .to_byte_array();

            match &spend {
                ParsedSpend::Withdrawal { secret, .. } => {
                    if !verify_secret(secret, &params.hashlock) {
                        return Err(reject("hashlock mismatch"));
                    }
                    params
                        .recipient
                        .verify_digest(&digest, der)
                        .map_err(|_| reject("recipient signature invalid"))?;
                }
                ParsedSpend::Refund { .. } => {
                    self.check_locktime(tx, input, params.locktime)?;
                    params
                        .sender
                        .verify_digest(&digest, der)
                        .map_err(|_| reject("sender signature invalid"))?;
                }
            }
        }

        let output_total = tx
            .output
            .iter()
            .try_fold(Amount::ZERO, |acc, out| acc.checked_add(out.value))
            .ok_or_else(|| reject("bad-txns-txouttotal-toolarge"))?;
        if output_total > input_total {
            return Err(reject("bad-txns-in-belowout"));
        }
        Ok(())
    }

    /// CLTV plus transaction finality.
    fn check_locktime(&self, tx: &Transaction, input: &TxIn, locktime: u32) -> Result<(), SwapError> {
        let tx_lock = tx.lock_time.to_consensus_u32();
        if input.sequence == Sequence::MAX {
            return Err(reject("CLTV requires a non-final sequence"));
        }
        if (tx_lock < LOCKTIME_THRESHOLD) != (locktime < LOCKTIME_THRESHOLD) {
            return Err(reject("locktime type mismatch"));
        }
        if tx_lock < LOCKTIME_THRESHOLD {
            return Err(reject("height locktimes are not supported"));
        }
        if tx_lock < locktime {
            return Err(reject("Locktime requirement not satisfied"));
        }
        if u64::from(tx_lock) > self.clock.now() {
            return Err(reject("non-final"));
        }
        Ok(())
    }
}

#[async_trait]
impl BitcoinRpc for RegtestBitcoin {
    async fn median_time(&self) -> Result<u64, SwapError> {
        Ok(self.clock.now())
    }

    async fn send_to_address(
        &self,
        address: &Address,
        amount: Amount,
    ) -> Result<FundingUtxo, SwapError> {
        let mut state = self.state.write();
        let remaining = state
            .wallet
            .checked_sub(amount)
            .ok_or_else(|| reject(format!("insufficient wallet funds for {}", amount)))?;

        state.funding_count += 1;
        let funding = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(
                    Txid::hash(&state.funding_count.to_be_bytes()),
                    0,
                ),
                ..TxIn::default()
            }],
            output: vec![TxOut {
                value: amount,
                script_pubkey: address.script_pubkey(),
            }],
        };
        let txid = funding.compute_txid();
        state.utxos.insert(OutPoint::new(txid, 0), funding.output[0].clone());
        state.wallet = remaining;

        debug!("[btc] Funded {} with {} in {}", address, amount, txid);
        Ok(FundingUtxo {
            txid,
            vout: 0,
            value: amount,
        })
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, SwapError> {
        let mut state = self.state.write();
        self.verify(&state, tx)?;

        let txid = tx.compute_txid();
        for input in &tx.input {
            state.utxos.remove(&input.previous_output);
            state.spends.insert(input.previous_output, tx.clone());
        }
        for (vout, output) in tx.output.iter().enumerate() {
            state
                .utxos
                .insert(OutPoint::new(txid, vout as u32), output.clone());
        }
        debug!("[btc] Accepted {}", txid);
        Ok(txid)
    }

    async fn balance(&self, address: &Address) -> Result<Amount, SwapError> {
        let script: ScriptBuf = address.script_pubkey();
        Ok(self
            .state
            .read()
            .utxos
            .values()
            .filter(|out| out.script_pubkey == script)
            .map(|out| out.value)
            .fold(Amount::ZERO, |acc, v| acc.checked_add(v).unwrap_or(Amount::MAX_MONEY)))
    }

    async fn get_txout(&self, outpoint: &OutPoint) -> Result<Option<TxOut>, SwapError> {
        Ok(self.state.read().utxos.get(outpoint).cloned())
    }

    async fn spending_transaction(
        &self,
        outpoint: &OutPoint,
    ) -> Result<Option<Transaction>, SwapError> {
        Ok(self.state.read().spends.get(outpoint).cloned())
    }
}
