//! # Requests and Responses
//!
//! Ledger-agnostic shapes exchanged with external callers.

use super::errors::SwapError;
use super::value_objects::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quote request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Source ledger.
    pub from_chain: String,
    /// Destination ledger.
    pub to_chain: String,
    /// Source token symbol.
    pub from_token: String,
    /// Destination token symbol.
    pub to_token: String,
    /// Decimal amount in the source token's base unit.
    pub from_amount: String,
    /// Initiating user on the source ledger.
    pub user_address: String,
}

impl QuoteRequest {
    /// Parse `from_amount`, rejecting malformed and zero amounts.
    pub fn parse_amount(&self) -> Result<u128, SwapError> {
        let amount: u128 = self
            .from_amount
            .trim()
            .parse()
            .map_err(|_| SwapError::validation(format!("invalid amount: {:?}", self.from_amount)))?;
        if amount == 0 {
            return Err(SwapError::validation("amount must be non-zero"));
        }
        Ok(amount)
    }

    /// Source chain id.
    pub fn from_chain_id(&self) -> ChainId {
        ChainId::new(&self.from_chain)
    }

    /// Destination chain id.
    pub fn to_chain_id(&self) -> ChainId {
        ChainId::new(&self.to_chain)
    }
}

/// Swap initiation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    /// Source ledger.
    pub from_chain: String,
    /// Destination ledger.
    pub to_chain: String,
    /// Source token symbol.
    pub from_token: String,
    /// Destination token symbol.
    pub to_token: String,
    /// Decimal amount in the source token's base unit.
    pub from_amount: String,
    /// Initiating user on the source ledger.
    pub user_address: String,
    /// Beneficiary on the destination ledger.
    #[serde(default)]
    pub recipient_address: Option<String>,
    /// Timelock in seconds; the configured default when absent.
    #[serde(default)]
    pub timelock: Option<u64>,
}

impl SwapRequest {
    /// The quote request for the same exchange.
    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest {
            from_chain: self.from_chain.clone(),
            to_chain: self.to_chain.clone(),
            from_token: self.from_token.clone(),
            to_token: self.to_token.clone(),
            from_amount: self.from_amount.clone(),
            user_address: self.user_address.clone(),
        }
    }
}

/// Where a quote came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteSource {
    /// Priced by the pricing collaborator.
    Priced,
    /// No collaborator for this ledger pair; 1:1 placeholder.
    Placeholder,
}

/// Quote response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Amount receivable on the destination ledger, net of the service fee.
    pub to_amount: u128,
    /// Service fee withheld from the destination amount.
    #[serde(default)]
    pub fee: u128,
    /// Destination units per source unit.
    pub price: String,
    /// Estimated gas for the contract-chain leg.
    pub gas_estimate: u64,
    /// Quote provenance.
    pub source: QuoteSource,
}

impl Quote {
    /// 1:1 placeholder used when no pricing collaborator covers a pair.
    pub fn placeholder(from_amount: u128) -> Self {
        Self {
            to_amount: from_amount,
            fee: 0,
            price: "1.0".to_string(),
            gas_estimate: 0,
            source: QuoteSource::Placeholder,
        }
    }
}

/// Aggregate counts over all swaps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStatistics {
    /// All swaps ever initiated.
    pub total: usize,
    /// Initiated or partially locked.
    pub in_progress: usize,
    /// Completed.
    pub completed: usize,
    /// Refunded.
    pub refunded: usize,
    /// Failed.
    pub failed: usize,
    /// Expired.
    pub expired: usize,
    /// Completed source volume per token.
    pub completed_volume: BTreeMap<String, u128>,
    /// Fees withheld by completed swaps, per destination token.
    #[serde(default)]
    pub total_fees: BTreeMap<String, u128>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: &str) -> QuoteRequest {
        QuoteRequest {
            from_chain: "Ethereum".into(),
            to_chain: "bitcoin".into(),
            from_token: "ETH".into(),
            to_token: "BTC".into(),
            from_amount: amount.into(),
            user_address: "0xabc".into(),
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(request("100000000000000000").parse_amount().unwrap(), 10u128.pow(17));
    }

    #[test]
    fn test_parse_amount_rejects_zero_and_garbage() {
        assert!(matches!(request("0").parse_amount(), Err(SwapError::Validation(_))));
        assert!(matches!(request("-5").parse_amount(), Err(SwapError::Validation(_))));
        assert!(matches!(request("1.5").parse_amount(), Err(SwapError::Validation(_))));
        assert!(matches!(request("").parse_amount(), Err(SwapError::Validation(_))));
    }

    #[test]
    fn test_chain_ids_normalised() {
        assert_eq!(request("1").from_chain_id(), ChainId::new("ethereum"));
    }

    #[test]
    fn test_swap_request_camel_case() {
        let json = r#"{"fromChain":"ethereum","toChain":"bitcoin","fromToken":"ETH",
            "toToken":"BTC","fromAmount":"1","userAddress":"0xabc"}"#;
        let req: SwapRequest = serde_json::from_str(json).unwrap();
        assert!(req.recipient_address.is_none());
        assert!(req.timelock.is_none());
        assert_eq!(req.quote_request().from_amount, "1");
    }
}
