//! Chain adapter for EVM ledgers with a deployed hashed-timelock contract.

use super::abi::{
    contract_id, encode_call, format_address, format_word, parse_address, parse_word, EvmAddress,
    Token, Word, APPROVE, NEW_CONTRACT_ERC20, NEW_CONTRACT_ETH, REFUND, WITHDRAW,
};
use super::rpc::{ContractView, EvmRpc, EvmTransaction};
use crate::domain::{ChainFamily, ChainId, ContractEscrow, EscrowDetails, HtlcState, SwapError};
use crate::ports::{ChainAdapter, HtlcLock, HtlcParams, HtlcStatusReport};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swap_crypto::verify_secret;
use tracing::{debug, info};

/// EVM adapter configuration.
#[derive(Clone, Debug)]
pub struct EvmConfig {
    /// Registry identifier, e.g. `ethereum`.
    pub chain_id: ChainId,
    /// EIP-155 chain id the node must report.
    pub evm_chain_id: u64,
    /// Native asset symbol.
    pub native_token: String,
    /// Hashed-timelock contract for native value.
    pub htlc_contract: EvmAddress,
    /// Hashed-timelock contract for ERC-20 tokens.
    pub erc20_htlc_contract: Option<EvmAddress>,
    /// Token symbol (upper case) to contract address at startup.
    pub tokens: HashMap<String, EvmAddress>,
    /// The coordinator's account.
    pub account: EvmAddress,
}

struct BookEntry {
    contract: EvmAddress,
    created_at: u64,
}

/// HTLC adapter over an [`EvmRpc`] connection.
pub struct EvmAdapter {
    config: EvmConfig,
    rpc: Arc<dyn EvmRpc>,
    initialized: AtomicBool,
    tokens: RwLock<HashMap<String, EvmAddress>>,
    book: RwLock<HashMap<Word, BookEntry>>,
}

impl EvmAdapter {
    /// Adapter for `config` talking through `rpc`.
    pub fn new(config: EvmConfig, rpc: Arc<dyn EvmRpc>) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|(symbol, contract)| (symbol.to_ascii_uppercase(), *contract))
            .collect();
        Self {
            config,
            rpc,
            initialized: AtomicBool::new(false),
            tokens: RwLock::new(tokens),
            book: RwLock::new(HashMap::new()),
        }
    }

    /// Accept `symbol` for new locks, held at `contract`.
    pub fn add_supported_token(&self, symbol: &str, contract: EvmAddress) {
        self.tokens
            .write()
            .insert(symbol.to_ascii_uppercase(), contract);
        info!(
            "[evm] {} supports {} at {}",
            self.chain(),
            symbol,
            format_address(&contract)
        );
    }

    /// Stop accepting `symbol` for new locks. Existing locks settle as before.
    pub fn remove_supported_token(&self, symbol: &str) -> bool {
        let removed = self
            .tokens
            .write()
            .remove(&symbol.to_ascii_uppercase())
            .is_some();
        if removed {
            info!("[evm] {} no longer supports {}", self.chain(), symbol);
        }
        removed
    }

    /// Whether `initialize` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn chain(&self) -> &str {
        self.config.chain_id.as_str()
    }

    /// Re-attribute ledger errors to this chain.
    fn rpc_err(&self, err: SwapError) -> SwapError {
        match err {
            SwapError::Adapter { message, .. } => SwapError::adapter(self.chain(), message),
            other => other,
        }
    }

    fn party(&self, address: Option<&str>) -> Result<EvmAddress, SwapError> {
        match address {
            Some(addr) => parse_address(addr),
            None => Ok(self.config.account),
        }
    }

    /// Resolve a token symbol to `None` (native) or its contract.
    fn token_contract(&self, token: Option<&str>) -> Result<Option<EvmAddress>, SwapError> {
        match token {
            None => Ok(None),
            Some(sym) if sym.eq_ignore_ascii_case(&self.config.native_token) => Ok(None),
            Some(sym) => self
                .tokens
                .read()
                .get(&sym.to_ascii_uppercase())
                .copied()
                .map(Some)
                .ok_or_else(|| {
                    SwapError::validation(format!("token {} not supported on {}", sym, self.chain()))
                }),
        }
    }

    async fn send(&self, tx: EvmTransaction) -> Result<String, SwapError> {
        self.rpc.send_transaction(tx).await.map_err(|e| self.rpc_err(e))
    }

    async fn now(&self) -> Result<u64, SwapError> {
        self.rpc.block_timestamp().await.map_err(|e| self.rpc_err(e))
    }

    /// Find a lock by id, in the book first, then on both contracts.
    async fn lookup(&self, id: &Word) -> Result<(EvmAddress, ContractView, u64), SwapError> {
        let booked = self
            .book
            .read()
            .get(id)
            .map(|entry| (entry.contract, entry.created_at));

        let candidates: Vec<(EvmAddress, u64)> = match booked {
            Some(entry) => vec![entry],
            None => std::iter::once(self.config.htlc_contract)
                .chain(self.config.erc20_htlc_contract)
                .map(|contract| (contract, 0))
                .collect(),
        };

        for (contract, created_at) in candidates {
            let view = self
                .rpc
                .get_contract(&contract, id)
                .await
                .map_err(|e| self.rpc_err(e))?;
            if let Some(view) = view {
                return Ok((contract, view, created_at));
            }
        }
        Err(SwapError::NotFound(format!(
            "HTLC {} on {}",
            format_word(id),
            self.chain()
        )))
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> &ChainId {
        &self.config.chain_id
    }

    fn family(&self) -> ChainFamily {
        ChainFamily::Account
    }

    fn native_token(&self) -> &str {
        &self.config.native_token
    }

    fn supports_token(&self, token: &str) -> bool {
        self.token_contract(Some(token)).is_ok()
    }

    fn validate_address(&self, address: &str) -> bool {
        parse_address(address).is_ok()
    }

    fn account(&self) -> String {
        format_address(&self.config.account)
    }

    async fn initialize(&self) -> Result<(), SwapError> {
        if self.is_initialized() {
            return Ok(());
        }
        let reported = self.rpc.chain_id().await.map_err(|e| self.rpc_err(e))?;
        if reported != self.config.evm_chain_id {
            return Err(SwapError::adapter(
                self.chain(),
                format!(
                    "node reports chain id {}, expected {}",
                    reported, self.config.evm_chain_id
                ),
            ));
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!(
            "[evm] {} initialized (chain id {}, htlc {})",
            self.chain(),
            reported,
            format_address(&self.config.htlc_contract)
        );
        Ok(())
    }

    async fn create_htlc(&self, params: HtlcParams) -> Result<HtlcLock, SwapError> {
        let sender = self.party(params.sender.as_deref())?;
        let receiver = self.party(params.recipient.as_deref())?;
        let token = self.token_contract(params.token.as_deref())?;
        if params.amount == 0 {
            return Err(SwapError::validation("HTLC amount must be non-zero"));
        }
        let now = self.now().await?;
        if params.timelock <= now {
            return Err(SwapError::InvalidTime(format!(
                "timelock {} is not after ledger time {}",
                params.timelock, now
            )));
        }

        let timelock_arg = Token::Uint(u128::from(params.timelock));
        let (contract, value, data) = match token {
            None => (
                self.config.htlc_contract,
                params.amount,
                encode_call(
                    NEW_CONTRACT_ETH,
                    &[Token::Address(receiver), Token::Bytes32(params.hashlock), timelock_arg],
                ),
            ),
            Some(token) => {
                let contract = self.config.erc20_htlc_contract.ok_or_else(|| {
                    SwapError::validation(format!("{} has no ERC-20 HTLC contract", self.chain()))
                })?;
                self.send(EvmTransaction {
                    from: sender,
                    to: token,
                    value: 0,
                    data: encode_call(
                        APPROVE,
                        &[Token::Address(contract), Token::Uint(params.amount)],
                    ),
                })
                .await?;
                (
                    contract,
                    0,
                    encode_call(
                        NEW_CONTRACT_ERC20,
                        &[
                            Token::Address(receiver),
                            Token::Bytes32(params.hashlock),
                            timelock_arg,
                            Token::Address(token),
                            Token::Uint(params.amount),
                        ],
                    ),
                )
            }
        };

        let tx_hash = self
            .send(EvmTransaction {
                from: sender,
                to: contract,
                value,
                data,
            })
            .await?;

        let id = contract_id(
            &sender,
            &receiver,
            token.as_ref(),
            params.amount,
            &params.hashlock,
            params.timelock,
        );
        self.book.write().insert(
            id,
            BookEntry {
                contract,
                created_at: now,
            },
        );

        info!(
            "[evm] Locked {} on {} as {} (tx {})",
            params.amount,
            self.chain(),
            format_word(&id),
            tx_hash
        );

        Ok(HtlcLock {
            htlc_id: format_word(&id),
            tx_id: tx_hash.clone(),
            escrow: EscrowDetails::Contract(ContractEscrow {
                contract_address: format_address(&contract),
                contract_id: format_word(&id),
                tx_hash,
            }),
        })
    }

    async fn redeem_htlc(&self, htlc_id: &str, preimage: &[u8]) -> Result<String, SwapError> {
        let id = parse_word(htlc_id)?;
        let (contract, view, _) = self.lookup(&id).await?;
        if view.withdrawn || view.refunded {
            return Err(SwapError::InvalidState(format!(
                "HTLC {} already settled",
                htlc_id
            )));
        }
        if !verify_secret(preimage, &view.hashlock) {
            return Err(SwapError::InvalidSecret);
        }
        let preimage: Word = preimage.try_into().map_err(|_| SwapError::InvalidSecret)?;
        let now = self.now().await?;
        if now >= view.timelock {
            return Err(SwapError::InvalidTime(format!(
                "HTLC {} expired at {}",
                htlc_id, view.timelock
            )));
        }

        let tx_hash = self
            .send(EvmTransaction {
                from: view.receiver,
                to: contract,
                value: 0,
                data: encode_call(WITHDRAW, &[Token::Bytes32(id), Token::Bytes32(preimage)]),
            })
            .await?;
        info!("[evm] Redeemed {} on {} (tx {})", htlc_id, self.chain(), tx_hash);
        Ok(tx_hash)
    }

    async fn refund_htlc(&self, htlc_id: &str) -> Result<String, SwapError> {
        let id = parse_word(htlc_id)?;
        let (contract, view, _) = self.lookup(&id).await?;
        if view.withdrawn || view.refunded {
            return Err(SwapError::InvalidState(format!(
                "HTLC {} already settled",
                htlc_id
            )));
        }
        let now = self.now().await?;
        if now < view.timelock {
            return Err(SwapError::InvalidTime(format!(
                "HTLC {} refundable from {}, now {}",
                htlc_id, view.timelock, now
            )));
        }

        let tx_hash = self
            .send(EvmTransaction {
                from: view.sender,
                to: contract,
                value: 0,
                data: encode_call(REFUND, &[Token::Bytes32(id)]),
            })
            .await?;
        info!("[evm] Refunded {} on {} (tx {})", htlc_id, self.chain(), tx_hash);
        Ok(tx_hash)
    }

    async fn get_balance(&self, address: &str) -> Result<u128, SwapError> {
        let owner = parse_address(address)?;
        self.rpc.balance(&owner, None).await.map_err(|e| self.rpc_err(e))
    }

    async fn get_htlc_status(&self, htlc_id: &str) -> Result<HtlcStatusReport, SwapError> {
        let id = parse_word(htlc_id)?;
        let (_, view, created_at) = self.lookup(&id).await?;
        let now = self.now().await?;
        let status = if view.withdrawn {
            HtlcState::Redeemed
        } else if view.refunded {
            HtlcState::Refunded
        } else if now >= view.timelock {
            HtlcState::Expired
        } else {
            HtlcState::Locked
        };
        debug!("[evm] {} status {:?}", htlc_id, status);

        Ok(HtlcStatusReport {
            status,
            hashlock: view.hashlock,
            timelock: view.timelock,
            recipient: format_address(&view.receiver),
            sender: format_address(&view.sender),
            amount: view.amount,
            created_at,
            expires_at: view.timelock,
        })
    }

    async fn current_time(&self) -> Result<u64, SwapError> {
        self.now().await
    }
}
