//! Fixed-rate pricing collaborator.

use crate::algorithms::BPS_DENOMINATOR;
use crate::domain::{ChainId, Quote, QuoteRequest, QuoteSource, SwapError};
use crate::ports::PricingService;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Default slippage: 2%.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 200;

/// Default gas estimate for a contract-chain lock.
pub const DEFAULT_GAS_ESTIMATE: u64 = 150_000;

const PRICE_DECIMALS: u32 = 6;

/// Quotes from a configured rate table.
///
/// Rates are rationals in base units: `to = from * num / den`, less slippage.
/// Unlisted pairs of the same token trade 1:1.
#[derive(Clone, Debug)]
pub struct FixedRatePricing {
    chains: HashSet<ChainId>,
    rates: HashMap<(String, String), (u128, u128)>,
    slippage_bps: u32,
    gas_estimate: u64,
}

impl FixedRatePricing {
    /// Pricing for the given ledgers with no rates configured.
    pub fn new(chains: impl IntoIterator<Item = ChainId>) -> Self {
        Self {
            chains: chains.into_iter().collect(),
            rates: HashMap::new(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            gas_estimate: DEFAULT_GAS_ESTIMATE,
        }
    }

    /// Add a rate for `from -> to`.
    pub fn with_rate(mut self, from: &str, to: &str, numerator: u128, denominator: u128) -> Self {
        self.rates.insert(
            (from.to_ascii_uppercase(), to.to_ascii_uppercase()),
            (numerator, denominator.max(1)),
        );
        self
    }

    /// Override slippage (basis points, capped at 100%).
    pub fn with_slippage_bps(mut self, bps: u32) -> Self {
        self.slippage_bps = bps.min(BPS_DENOMINATOR as u32);
        self
    }

    /// Override the gas estimate.
    pub fn with_gas_estimate(mut self, gas: u64) -> Self {
        self.gas_estimate = gas;
        self
    }

    fn rate(&self, from: &str, to: &str) -> Option<(u128, u128)> {
        let key = (from.to_ascii_uppercase(), to.to_ascii_uppercase());
        match self.rates.get(&key) {
            Some(rate) => Some(*rate),
            None if key.0 == key.1 => Some((1, 1)),
            None => None,
        }
    }
}

/// Decimal rendering of `num / den`, trailing zeros trimmed.
fn format_price(num: u128, den: u128) -> String {
    let whole = num / den;
    let scale = 10u128.pow(PRICE_DECIMALS);
    let frac = (num % den).saturating_mul(scale) / den;
    let digits = format!("{:0width$}", frac, width = PRICE_DECIMALS as usize);
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, trimmed)
    }
}

#[async_trait]
impl PricingService for FixedRatePricing {
    fn supports(&self, from: &ChainId, to: &ChainId) -> bool {
        self.chains.contains(from) && self.chains.contains(to)
    }

    async fn quote(&self, request: &QuoteRequest, from_amount: u128) -> Result<Quote, SwapError> {
        let (num, den) = self.rate(&request.from_token, &request.to_token).ok_or_else(|| {
            SwapError::validation(format!(
                "no rate for {}/{}",
                request.from_token, request.to_token
            ))
        })?;

        let keep = BPS_DENOMINATOR - u128::from(self.slippage_bps);
        let to_amount = from_amount
            .checked_mul(num)
            .map(|v| v / den)
            .and_then(|v| v.checked_mul(keep))
            .map(|v| v / BPS_DENOMINATOR)
            .ok_or_else(|| SwapError::validation("quote amount overflows"))?;

        debug!(
            "[swap] Priced {} {} -> {} {}",
            from_amount, request.from_token, to_amount, request.to_token
        );

        Ok(Quote {
            to_amount,
            fee: 0,
            price: format_price(num, den),
            gas_estimate: self.gas_estimate,
            source: QuoteSource::Priced,
        })
    }
}
