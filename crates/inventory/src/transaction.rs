use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Entity, ItemId, TransactionId, UserId};

use crate::stock::{StockError, StockLevels, StockOperation};

/// Kind of a stock transaction row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Issue,
    Receive,
    Adjust,
    Return,
    Dispose,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Issue,
        TransactionType::Receive,
        TransactionType::Adjust,
        TransactionType::Return,
        TransactionType::Dispose,
    ];

    /// Stable name, as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Issue => "ISSUE",
            TransactionType::Receive => "RECEIVE",
            TransactionType::Adjust => "ADJUST",
            TransactionType::Return => "RETURN",
            TransactionType::Dispose => "DISPOSE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// Change to on-hand stock implied by a row of this type with quantity `qty`.
    pub fn stock_delta(&self, qty: i64) -> i64 {
        match self {
            TransactionType::Issue | TransactionType::Dispose => -qty,
            TransactionType::Receive | TransactionType::Adjust | TransactionType::Return => qty,
        }
    }

    /// Change to the issued counter implied by a row of this type with quantity `qty`.
    pub fn issued_delta(&self, qty: i64) -> i64 {
        match self {
            TransactionType::Issue => qty,
            TransactionType::Return => -qty,
            _ => 0,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction row staged inside a unit of work, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockTransaction {
    pub item_id: ItemId,
    pub kind: TransactionType,
    pub qty: i64,
    pub stock_after: i64,
    pub issued_after: i64,
    pub note: Option<String>,
    pub actor: UserId,
}

impl NewStockTransaction {
    /// Row describing `op` having moved the item to `after`.
    pub fn for_operation(
        item_id: ItemId,
        op: &StockOperation,
        after: StockLevels,
        note: Option<String>,
        actor: UserId,
    ) -> Self {
        Self {
            item_id,
            kind: op.kind(),
            qty: op.quantity(),
            stock_after: after.stock,
            issued_after: after.issued,
            note: note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            actor,
        }
    }

    pub fn commit(self, id: TransactionId, created_at: DateTime<Utc>) -> StockTransaction {
        StockTransaction {
            id,
            item_id: self.item_id,
            kind: self.kind,
            qty: self.qty,
            stock_after: self.stock_after,
            issued_after: self.issued_after,
            note: self.note,
            actor: self.actor,
            created_at,
        }
    }
}

/// Immutable, append-only record of one stock operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub item_id: ItemId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub qty: i64,
    pub stock_after: i64,
    pub issued_after: i64,
    pub note: Option<String>,
    pub actor: UserId,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    pub fn stock_delta(&self) -> i64 {
        self.kind.stock_delta(self.qty)
    }

    pub fn issued_delta(&self) -> i64 {
        self.kind.issued_delta(self.qty)
    }

    pub fn operation(&self) -> StockOperation {
        StockOperation::new(self.kind, self.qty)
    }

    pub fn levels_after(&self) -> StockLevels {
        StockLevels::new(self.stock_after, self.issued_after)
    }
}

impl Entity for StockTransaction {
    type Id = TransactionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Rebuild counters by replaying rows (oldest first) from zero.
///
/// Fails on the first row that the ledger rules would have rejected, which
/// means the log does not describe a valid history.
pub fn replay<'a, I>(transactions: I) -> Result<StockLevels, StockError>
where
    I: IntoIterator<Item = &'a StockTransaction>,
{
    transactions
        .into_iter()
        .try_fold(StockLevels::default(), |levels, txn| levels.apply(&txn.operation()))
}
