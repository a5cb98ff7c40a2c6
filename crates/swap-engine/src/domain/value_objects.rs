//! # Domain Value Objects
//!
//! Chain identifiers and the three state machines: orders, swaps and
//! individual HTLC legs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger identifier (`"ethereum"`, `"bitcoin"`, ...), stored lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Create a chain id, normalising case and surrounding whitespace.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Transaction model of a ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainFamily {
    /// Account-based smart-contract chain.
    Account,
    /// Script-based UTXO chain.
    Utxo,
    /// Object-model chain.
    Object,
}

/// Direction of asset flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Smart-contract ledger is the origin.
    #[serde(rename = "A_TO_B")]
    AToB,
    /// Script ledger is the origin.
    #[serde(rename = "B_TO_A")]
    BToA,
}

/// Order lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Agreement recorded, nothing locked.
    #[default]
    Created,
    /// A counterparty committed to the order.
    Filled,
    /// Maker's funds are locked.
    Escrowed,
    /// Both sides locked.
    Funded,
    /// Secret revealed and funds claimed.
    Claimed,
    /// Abandoned, locked funds returned.
    Cancelled,
    /// Passed its expiry without settling.
    Expired,
}

impl OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Filled => 1,
            Self::Escrowed => 2,
            Self::Funded => 3,
            Self::Claimed | Self::Cancelled | Self::Expired => 4,
        }
    }

    /// Check if transition is valid.
    ///
    /// The happy path only moves forward one step at a time; any non-terminal
    /// status may drop to `Cancelled` or `Expired`. Re-asserting the current
    /// non-terminal status is allowed so patches can be applied in place.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled | Self::Expired => true,
            _ if next == *self => true,
            _ => next.rank() == self.rank() + 1,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Claimed | Self::Cancelled | Self::Expired)
    }

    /// Funds sit in at least one escrow; only a claim or cancel ends it.
    pub fn holds_escrow(&self) -> bool {
        matches!(self, Self::Escrowed | Self::Funded)
    }
}

/// Coordinator-side swap lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    /// Record created, nothing locked.
    #[default]
    Initiated,
    /// Source HTLC locked.
    SourceLocked,
    /// Both HTLCs locked.
    DestinationLocked,
    /// Destination redeemed, source claimed.
    Completed,
    /// Locked legs returned to their senders.
    Refunded,
    /// Timelock passed with no action taken.
    ///
    /// Allowed from every non-terminal state. The coordinator only sets it on
    /// swaps that never locked a leg, leaving locked legs to `Refunded`.
    Expired,
    /// Unrecoverable adapter error, see `error`.
    Failed,
}

impl SwapStatus {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        match (self, next) {
            (Self::Initiated, Self::SourceLocked) => true,
            (Self::Initiated, Self::Failed | Self::Expired) => true,
            (Self::SourceLocked, Self::DestinationLocked) => true,
            (Self::DestinationLocked, Self::Completed) => true,
            (
                Self::SourceLocked | Self::DestinationLocked,
                Self::Refunded | Self::Failed | Self::Expired,
            ) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Refunded | Self::Expired | Self::Failed
        )
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of one HTLC on its ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HtlcState {
    /// Submitted, not yet observed on the ledger.
    #[default]
    Pending,
    /// Funds locked, awaiting redeem or expiry.
    Locked,
    /// Secret revealed, funds moved to the recipient.
    Redeemed,
    /// Funds returned to the sender.
    Refunded,
    /// Past timelock and still unspent.
    Expired,
}

impl HtlcState {
    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redeemed | Self::Refunded)
    }

    /// Funds are still held by the HTLC.
    pub fn holds_funds(&self) -> bool {
        matches!(self, Self::Locked | Self::Expired)
    }
}
