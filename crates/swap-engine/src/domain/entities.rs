//! # Domain Entities
//!
//! Orders, their reverse-direction view, and the coordinator-side swap
//! record.

use super::errors::SwapError;
use super::value_objects::{ChainId, OrderStatus, OrderType, SwapStatus};
use serde::{Deserialize, Serialize};
use swap_crypto::{Hashlock, Secret};
use uuid::Uuid;

/// Order identifier.
pub type OrderId = Uuid;

/// Swap identifier.
pub type SwapId = Uuid;

/// One side of an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySpec {
    /// Party's address on `chain`.
    pub address: String,
    /// Ledger holding the asset.
    pub chain: ChainId,
    /// Token symbol.
    pub token: String,
    /// Amount in the token's base unit.
    pub amount: u128,
}

/// Timelock periods, relative to order creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelock {
    /// Seconds during which the destination leg can be redeemed.
    pub withdrawal_period: u64,
    /// Seconds until the source leg becomes refundable.
    pub cancellation_period: u64,
}

/// Script-chain escrow: P2SH output holding the funds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEscrow {
    /// Locking address derived from the redeem script.
    pub address: String,
    /// Hex-encoded redeem script.
    pub redeem_script: String,
    /// Funding transaction id.
    pub funding_txid: String,
    /// Output index of the HTLC output.
    pub vout: u32,
    /// Output value in satoshis.
    pub value_sats: u64,
    /// Absolute locktime encoded in the script.
    pub locktime: u32,
    /// Ledger time the output was funded at.
    #[serde(default)]
    pub funded_at: u64,
}

/// Smart-contract-chain escrow: an entry in an HTLC contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEscrow {
    /// HTLC contract address.
    pub contract_address: String,
    /// Contract-side id of the lock.
    pub contract_id: String,
    /// Transaction that created the lock.
    pub tx_hash: String,
}

/// Ledger-specific details of a lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowDetails {
    /// UTXO/script ledger.
    Script(ScriptEscrow),
    /// Account/contract ledger.
    Contract(ContractEscrow),
}

/// Reference to one locked leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegRef {
    /// Ledger of the leg.
    pub chain: ChainId,
    /// Adapter-level HTLC id.
    pub htlc_id: String,
    /// Lock transaction id.
    pub tx_id: String,
    /// Ledger-specific escrow details.
    pub escrow: EscrowDetails,
}

/// Per-chain escrow references of an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRefs {
    /// Maker's leg.
    pub source: Option<LegRef>,
    /// Taker's leg.
    pub destination: Option<LegRef>,
}

/// The logical exchange agreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier.
    pub id: OrderId,
    /// Direction of asset flow.
    pub order_type: OrderType,
    /// Current status.
    pub status: OrderStatus,
    /// Party locking first.
    pub maker: PartySpec,
    /// Party locking second.
    pub taker: PartySpec,
    /// SHA-256 of the secret.
    #[serde(with = "hex_hashlock")]
    pub hashlock: Hashlock,
    /// Secret, held by the party entitled to redeem.
    pub secret: Option<Secret>,
    /// Timelock periods.
    pub timelock: Timelock,
    /// Escrow references, filled as legs lock.
    pub escrow: EscrowRefs,
    /// Creation timestamp.
    pub created_at: u64,
    /// Last mutation timestamp.
    pub updated_at: u64,
    /// `created_at + timelock.cancellation_period`.
    pub expires_at: u64,
}

/// Fields needed to create an order.
#[derive(Clone, Debug)]
pub struct OrderParams {
    /// Direction of asset flow.
    pub order_type: OrderType,
    /// Party locking first.
    pub maker: PartySpec,
    /// Party locking second.
    pub taker: PartySpec,
    /// Timelock periods.
    pub timelock: Timelock,
}

impl Order {
    /// Create a new order in `Created`.
    pub fn new(params: OrderParams, secret: Secret, hashlock: Hashlock, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_type: params.order_type,
            status: OrderStatus::Created,
            maker: params.maker,
            taker: params.taker,
            hashlock,
            secret: Some(secret),
            timelock: params.timelock,
            escrow: EscrowRefs::default(),
            created_at: now,
            updated_at: now,
            expires_at: now.saturating_add(params.timelock.cancellation_period),
        }
    }

    /// Check if the order is past its expiry.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Transition to new status.
    pub fn transition_to(&mut self, next: OrderStatus, now: u64) -> Result<(), SwapError> {
        if !self.status.can_transition_to(next) {
            return Err(SwapError::InvalidState(format!(
                "order {}: {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Script-chain sub-record of a reverse order.
pub type ScriptLeg = ScriptEscrow;

/// Contract-chain sub-record of a reverse order.
pub type ContractLeg = ContractEscrow;

/// An order whose origin is the script ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseOrder {
    /// The underlying order.
    pub order: Order,
    /// P2SH lock on the script ledger, once funded.
    pub script_leg: Option<ScriptLeg>,
    /// Contract lock on the smart-contract ledger, once created.
    pub contract_leg: Option<ContractLeg>,
}

impl ReverseOrder {
    /// View a `B_TO_A` order with its escrow sub-records split out.
    pub fn from_order(order: Order) -> Result<Self, SwapError> {
        if order.order_type != OrderType::BToA {
            return Err(SwapError::InvalidState(format!(
                "order {} is not a reverse order",
                order.id
            )));
        }
        let legs = [&order.escrow.source, &order.escrow.destination];
        let script_leg = legs.iter().find_map(|leg| match leg {
            Some(LegRef {
                escrow: EscrowDetails::Script(s),
                ..
            }) => Some(s.clone()),
            _ => None,
        });
        let contract_leg = legs.iter().find_map(|leg| match leg {
            Some(LegRef {
                escrow: EscrowDetails::Contract(c),
                ..
            }) => Some(c.clone()),
            _ => None,
        });
        Ok(Self {
            order,
            script_leg,
            contract_leg,
        })
    }
}

/// Per-leg transaction references of a swap.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTransactions {
    /// Source HTLC creation.
    pub source_lock_tx: Option<String>,
    /// Destination HTLC creation.
    pub destination_lock_tx: Option<String>,
    /// Destination redeem (reveals the secret).
    pub redeem_tx: Option<String>,
    /// Source refund.
    pub refund_tx: Option<String>,
    /// Source claim with the revealed secret.
    pub source_redeem_tx: Option<String>,
    /// Destination refund.
    pub destination_refund_tx: Option<String>,
}

/// Live coordinator-side record of a swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Unique swap identifier.
    pub id: SwapId,
    /// Order backing this swap.
    pub order_id: OrderId,
    /// Source ledger.
    pub from_chain: ChainId,
    /// Destination ledger.
    pub to_chain: ChainId,
    /// Source token.
    pub from_token: String,
    /// Destination token.
    pub to_token: String,
    /// Amount locked on the source ledger.
    pub from_amount: u128,
    /// Amount locked on the destination ledger.
    pub to_amount: u128,
    /// Service fee withheld from the quoted destination amount.
    #[serde(default)]
    pub fee: u128,
    /// Initiating user on the source ledger.
    pub user_address: String,
    /// Beneficiary on the destination ledger.
    pub recipient_address: Option<String>,
    /// Hashlock shared by both legs.
    #[serde(with = "hex_hashlock")]
    pub hashlock: Hashlock,
    /// Current status.
    pub status: SwapStatus,
    /// Absolute source timelock.
    pub source_timelock: u64,
    /// Absolute destination timelock, strictly before the source one.
    pub destination_timelock: u64,
    /// Per-leg transaction references.
    pub txs: SwapTransactions,
    /// Source HTLC id.
    pub source_htlc_id: Option<String>,
    /// Destination HTLC id.
    pub destination_htlc_id: Option<String>,
    /// Captured failure when status is `Failed`.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: u64,
    /// Last mutation timestamp.
    pub updated_at: u64,
    /// `created_at + timelock`.
    pub expires_at: u64,
}

impl SwapRecord {
    /// Transition to new status.
    pub fn transition_to(&mut self, next: SwapStatus, now: u64) -> Result<(), SwapError> {
        if !self.status.can_transition_to(next) {
            return Err(SwapError::InvalidState(format!(
                "swap {}: {} -> {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Mark failed, capturing the error.
    pub fn fail(&mut self, error: &SwapError, now: u64) -> Result<(), SwapError> {
        self.transition_to(SwapStatus::Failed, now)?;
        self.error = Some(error.to_string());
        Ok(())
    }

    /// Address matches the user or the recipient (case-insensitive).
    pub fn involves(&self, address: &str) -> bool {
        self.user_address.eq_ignore_ascii_case(address)
            || self
                .recipient_address
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(address))
    }
}

/// Hex (de)serialisation for 32-byte hashlocks.
pub(crate) mod hex_hashlock {
    use serde::{Deserialize, Deserializer, Serializer};
    use swap_crypto::{parse_hashlock, Hashlock};

    pub fn serialize<S: Serializer>(value: &Hashlock, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hashlock, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_hashlock(&s).map_err(serde::de::Error::custom)
    }
}
