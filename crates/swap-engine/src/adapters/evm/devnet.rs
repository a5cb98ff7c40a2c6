//! In-process EVM ledger running the hashed-timelock contract semantics.
//!
//! Accounts are unlocked: any `from` may submit. A transaction either applies
//! fully or reverts with no effect.

use super::abi::{
    self, contract_id, decode_call, selector, word_to_address, word_to_u128, EvmAddress, Word,
    APPROVE, NEW_CONTRACT_ERC20, NEW_CONTRACT_ETH, REFUND, WITHDRAW,
};
use super::rpc::{ContractView, EvmRpc, EvmTransaction};
use crate::domain::SwapError;
use crate::ports::TimeSource;
use async_trait::async_trait;
use parking_lot::RwLock;
use sha3::{Digest, Keccak256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use swap_crypto::verify_secret;
use tracing::debug;

#[derive(Default)]
struct DevnetState {
    balances: HashMap<EvmAddress, u128>,
    /// (token, owner) -> balance
    token_balances: HashMap<(EvmAddress, EvmAddress), u128>,
    /// (token, owner, spender) -> allowance
    allowances: HashMap<(EvmAddress, EvmAddress, EvmAddress), u128>,
    contracts: HashMap<(EvmAddress, Word), ContractView>,
    htlc_contracts: HashSet<EvmAddress>,
    tokens: HashSet<EvmAddress>,
    nonce: u64,
}

type Revert = String;

impl DevnetState {
    fn native_balance(&self, owner: &EvmAddress) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn token_balance(&self, token: &EvmAddress, owner: &EvmAddress) -> u128 {
        self.token_balances
            .get(&(*token, *owner))
            .copied()
            .unwrap_or(0)
    }

    fn move_native(&mut self, from: EvmAddress, to: EvmAddress, amount: u128) -> Result<(), Revert> {
        let available = self.native_balance(&from);
        if available < amount {
            return Err(format!("insufficient funds: have {}, need {}", available, amount));
        }
        self.balances.insert(from, available - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn move_token(
        &mut self,
        token: EvmAddress,
        from: EvmAddress,
        to: EvmAddress,
        amount: u128,
    ) -> Result<(), Revert> {
        let available = self.token_balance(&token, &from);
        if available < amount {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }
        self.token_balances.insert((token, from), available - amount);
        *self.token_balances.entry((token, to)).or_insert(0) += amount;
        Ok(())
    }

    fn pay_out(&mut self, htlc: EvmAddress, view: &ContractView, to: EvmAddress) -> Result<(), Revert> {
        match view.token {
            Some(token) => self.move_token(token, htlc, to, view.amount),
            None => self.move_native(htlc, to, view.amount),
        }
    }

    fn apply(&mut self, tx: &EvmTransaction, now: u64) -> Result<(), Revert> {
        if self.tokens.contains(&tx.to) {
            return self.apply_token_call(tx);
        }
        if !self.htlc_contracts.contains(&tx.to) {
            // Plain value transfer
            if !tx.data.is_empty() {
                return Err("call to non-contract".to_string());
            }
            return self.move_native(tx.from, tx.to, tx.value);
        }

        let (sel, args) = decode_call(&tx.data).map_err(|e| e.to_string())?;
        if sel == selector(NEW_CONTRACT_ETH) && args.len() == 3 {
            self.new_contract(tx, &args, None, now)
        } else if sel == selector(NEW_CONTRACT_ERC20) && args.len() == 5 {
            let token = word_to_address(&args[3]).map_err(|e| e.to_string())?;
            self.new_contract(tx, &args, Some(token), now)
        } else if sel == selector(WITHDRAW) && args.len() == 2 {
            self.withdraw(tx, &args[0], &args[1], now)
        } else if sel == selector(REFUND) && args.len() == 1 {
            self.refund(tx, &args[0], now)
        } else {
            Err("unknown function selector".to_string())
        }
    }

    fn apply_token_call(&mut self, tx: &EvmTransaction) -> Result<(), Revert> {
        let (sel, args) = decode_call(&tx.data).map_err(|e| e.to_string())?;
        if sel != selector(APPROVE) || args.len() != 2 {
            return Err("unsupported token call".to_string());
        }
        if tx.value != 0 {
            return Err("non-payable function".to_string());
        }
        let spender = word_to_address(&args[0]).map_err(|e| e.to_string())?;
        let amount = word_to_u128(&args[1]).map_err(|e| e.to_string())?;
        self.allowances.insert((tx.to, tx.from, spender), amount);
        Ok(())
    }

    fn new_contract(
        &mut self,
        tx: &EvmTransaction,
        args: &[Word],
        token: Option<EvmAddress>,
        now: u64,
    ) -> Result<(), Revert> {
        let receiver = word_to_address(&args[0]).map_err(|e| e.to_string())?;
        let hashlock = args[1];
        let timelock = word_to_u128(&args[2]).map_err(|e| e.to_string())?;
        let timelock = u64::try_from(timelock).map_err(|_| "timelock out of range".to_string())?;

        let amount = match token {
            None => tx.value,
            Some(_) => {
                if tx.value != 0 {
                    return Err("non-payable function".to_string());
                }
                word_to_u128(&args[4]).map_err(|e| e.to_string())?
            }
        };
        if amount == 0 {
            return Err("amount must be > 0".to_string());
        }
        if timelock <= now {
            return Err("timelock time must be in the future".to_string());
        }

        let id = contract_id(&tx.from, &receiver, token.as_ref(), amount, &hashlock, timelock);
        if self.contracts.contains_key(&(tx.to, id)) {
            return Err("Contract already exists".to_string());
        }

        match token {
            None => self.move_native(tx.from, tx.to, amount)?,
            Some(token) => {
                let key = (token, tx.from, tx.to);
                let allowance = self.allowances.get(&key).copied().unwrap_or(0);
                if allowance < amount {
                    return Err("token allowance must be >= amount".to_string());
                }
                self.move_token(token, tx.from, tx.to, amount)?;
                self.allowances.insert(key, allowance - amount);
            }
        }

        self.contracts.insert(
            (tx.to, id),
            ContractView {
                sender: tx.from,
                receiver,
                token,
                amount,
                hashlock,
                timelock,
                withdrawn: false,
                refunded: false,
                preimage: None,
            },
        );
        Ok(())
    }

    fn withdraw(&mut self, tx: &EvmTransaction, id: &Word, preimage: &Word, now: u64) -> Result<(), Revert> {
        if tx.value != 0 {
            return Err("non-payable function".to_string());
        }
        let view = self
            .contracts
            .get(&(tx.to, *id))
            .cloned()
            .ok_or_else(|| "contractId does not exist".to_string())?;
        if view.receiver != tx.from {
            return Err("withdrawable: not receiver".to_string());
        }
        if view.withdrawn {
            return Err("withdrawable: already withdrawn".to_string());
        }
        if view.timelock <= now {
            return Err("withdrawable: timelock time must be in the future".to_string());
        }
        if !verify_secret(preimage, &view.hashlock) {
            return Err("hashlock hash does not match".to_string());
        }

        self.pay_out(tx.to, &view, view.receiver)?;
        if let Some(entry) = self.contracts.get_mut(&(tx.to, *id)) {
            entry.withdrawn = true;
            entry.preimage = Some(*preimage);
        }
        Ok(())
    }

    fn refund(&mut self, tx: &EvmTransaction, id: &Word, now: u64) -> Result<(), Revert> {
        if tx.value != 0 {
            return Err("non-payable function".to_string());
        }
        let view = self
            .contracts
            .get(&(tx.to, *id))
            .cloned()
            .ok_or_else(|| "contractId does not exist".to_string())?;
        if view.sender != tx.from {
            return Err("refundable: not sender".to_string());
        }
        if view.refunded {
            return Err("refundable: already refunded".to_string());
        }
        if view.withdrawn {
            return Err("refundable: already withdrawn".to_string());
        }
        if view.timelock > now {
            return Err("refundable: timelock not yet passed".to_string());
        }

        self.pay_out(tx.to, &view, view.sender)?;
        if let Some(entry) = self.contracts.get_mut(&(tx.to, *id)) {
            entry.refunded = true;
        }
        Ok(())
    }
}

/// Local EVM ledger.
pub struct DevnetEvm {
    chain_id: u64,
    clock: Arc<dyn TimeSource>,
    state: RwLock<DevnetState>,
}

impl DevnetEvm {
    /// Empty devnet with the given chain id, timestamps from `clock`.
    pub fn new(chain_id: u64, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            chain_id,
            clock,
            state: RwLock::new(DevnetState::default()),
        }
    }

    /// Deploy a hashed-timelock contract at `address`.
    pub fn deploy_htlc_contract(&self, address: EvmAddress) {
        self.state.write().htlc_contracts.insert(address);
    }

    /// Deploy an ERC-20 token at `address`.
    pub fn deploy_token(&self, address: EvmAddress) {
        self.state.write().tokens.insert(address);
    }

    /// Credit native balance.
    pub fn mint(&self, owner: EvmAddress, amount: u128) {
        *self.state.write().balances.entry(owner).or_insert(0) += amount;
    }

    /// Credit token balance.
    pub fn mint_token(&self, token: EvmAddress, owner: EvmAddress, amount: u128) {
        *self
            .state
            .write()
            .token_balances
            .entry((token, owner))
            .or_insert(0) += amount;
    }

    fn tx_hash(nonce: u64, tx: &EvmTransaction) -> String {
        let mut hasher = Keccak256::new();
        hasher.update(nonce.to_be_bytes());
        hasher.update(tx.from);
        hasher.update(tx.to);
        hasher.update(tx.value.to_be_bytes());
        hasher.update(&tx.data);
        let digest: Word = hasher.finalize().into();
        abi::format_word(&digest)
    }
}

#[async_trait]
impl EvmRpc for DevnetEvm {
    async fn chain_id(&self) -> Result<u64, SwapError> {
        Ok(self.chain_id)
    }

    async fn block_timestamp(&self) -> Result<u64, SwapError> {
        Ok(self.clock.now())
    }

    async fn balance(
        &self,
        owner: &EvmAddress,
        token: Option<&EvmAddress>,
    ) -> Result<u128, SwapError> {
        let state = self.state.read();
        Ok(match token {
            Some(token) => state.token_balance(token, owner),
            None => state.native_balance(owner),
        })
    }

    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, SwapError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        state
            .apply(&tx, now)
            .map_err(|reason| SwapError::adapter("evm-rpc", format!("execution reverted: {}", reason)))?;
        state.nonce += 1;
        let hash = Self::tx_hash(state.nonce, &tx);
        debug!("[evm] Mined {} from {}", hash, abi::format_address(&tx.from));
        Ok(hash)
    }

    async fn get_contract(
        &self,
        contract: &EvmAddress,
        id: &Word,
    ) -> Result<Option<ContractView>, SwapError> {
        Ok(self.state.read().contracts.get(&(*contract, *id)).cloned())
    }
}
