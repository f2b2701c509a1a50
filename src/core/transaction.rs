// Transaction data structures

use crate::core::{Address, Amount, Canonical, CanonicalWriter, UnixMillis, sha256_hex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Contribution,
    Withdrawal,
    Credit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Contribution => "contribution",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Credit => "credit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(TransactionKind::Transfer),
            "contribution" => Ok(TransactionKind::Contribution),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "credit" => Ok(TransactionKind::Credit),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// Transfer of value between two addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub timestamp: UnixMillis,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, rename = "campaignId", skip_serializing_if = "Option::is_none")]
    pub campaign_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        amount: Amount,
        kind: TransactionKind,
        timestamp: UnixMillis,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp,
            kind,
            campaign_ref: None,
            signature: None,
        }
    }

    /// Attach a campaign reference
    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign_ref = Some(campaign.into());
        self
    }

    /// Bytes covered by the signature.
    ///
    /// Exactly `sender, recipient, amount, kind, timestamp` in that order; the
    /// signature and campaign reference are never part of the payload.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut out = CanonicalWriter::new();
        out.begin_object()
            .field_str("sender", self.sender.as_str())
            .field_str("recipient", self.recipient.as_str())
            .field_amount("amount", self.amount)
            .field_str("kind", self.kind.as_str())
            .field_u64("timestamp", self.timestamp)
            .end_object();
        out.into_bytes()
    }

    /// Receipt identifier for a transaction sealed in `block_index`
    pub fn receipt_hash(&self, block_index: u64) -> String {
        let mut out = CanonicalWriter::new();
        out.begin_object()
            .field_str("sender", self.sender.as_str())
            .field_str("recipient", self.recipient.as_str())
            .field_amount("amount", self.amount)
            .field_u64("timestamp", self.timestamp)
            .field_u64("blockIndex", block_index)
            .end_object();
        format!("0x{}", sha256_hex(&out.into_bytes()))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Whether the address takes part in this transaction
    pub fn involves(&self, address: &str) -> bool {
        self.sender.matches(address) || self.recipient.matches(address)
    }
}

impl Canonical for Transaction {
    fn write_canonical(&self, out: &mut CanonicalWriter) {
        out.begin_object()
            .field_str("sender", self.sender.as_str())
            .field_str("recipient", self.recipient.as_str())
            .field_amount("amount", self.amount)
            .field_str("kind", self.kind.as_str())
            .field_u64("timestamp", self.timestamp)
            .field_opt_str("campaign_ref", self.campaign_ref.as_deref())
            .field_opt_str("signature", self.signature.as_deref())
            .end_object();
    }
}
