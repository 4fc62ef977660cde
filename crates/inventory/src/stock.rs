//! Stock counters and the rules for the five ledger operations.
//!
//! `StockLevels::apply` is the single decision point: it either returns the
//! levels after an operation or says why the operation must be rejected. It
//! never mutates in place, so a rejected operation cannot leave partial state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::ValueObject;

use crate::transaction::TransactionType;

/// Rejection reasons for a stock operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("return exceeds issued count: requested {requested}, issued {issued}")]
    ReturnExceedsIssued { requested: i64, issued: i64 },

    #[error("resulting stock would be negative: stock {stock}, delta {delta}")]
    NegativeResultingStock { stock: i64, delta: i64 },
}

/// On-hand and checked-out counters of one item.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockLevels {
    pub stock: i64,
    pub issued: i64,
}

impl ValueObject for StockLevels {}

/// A requested change to an item's counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockOperation {
    /// Move units from the shelf to checked-out.
    Issue { qty: i64 },
    /// Add newly acquired units to the shelf.
    Receive { qty: i64 },
    /// Manual correction; the sign of `delta` is the direction.
    Adjust { delta: i64 },
    /// Move previously issued units back to the shelf.
    Return { qty: i64 },
    /// Permanently remove units from the shelf.
    Dispose { qty: i64 },
}

impl ValueObject for StockOperation {}

impl StockOperation {
    /// Build the operation for a transaction type and the quantity recorded for it.
    pub fn new(kind: TransactionType, qty: i64) -> Self {
        match kind {
            TransactionType::Issue => Self::Issue { qty },
            TransactionType::Receive => Self::Receive { qty },
            TransactionType::Adjust => Self::Adjust { delta: qty },
            TransactionType::Return => Self::Return { qty },
            TransactionType::Dispose => Self::Dispose { qty },
        }
    }

    pub fn kind(&self) -> TransactionType {
        match self {
            Self::Issue { .. } => TransactionType::Issue,
            Self::Receive { .. } => TransactionType::Receive,
            Self::Adjust { .. } => TransactionType::Adjust,
            Self::Return { .. } => TransactionType::Return,
            Self::Dispose { .. } => TransactionType::Dispose,
        }
    }

    /// Quantity as recorded on the transaction row (signed only for ADJUST).
    pub fn quantity(&self) -> i64 {
        match *self {
            Self::Issue { qty }
            | Self::Receive { qty }
            | Self::Return { qty }
            | Self::Dispose { qty } => qty,
            Self::Adjust { delta } => delta,
        }
    }

    /// Check the quantity alone, before any state is read.
    pub fn validate(&self) -> Result<(), StockError> {
        match *self {
            Self::Adjust { delta } if delta == 0 => Err(StockError::InvalidQuantity(
                "adjustment cannot be zero".to_string(),
            )),
            Self::Adjust { .. } => Ok(()),
            _ => {
                let qty = self.quantity();
                if qty <= 0 {
                    Err(StockError::InvalidQuantity(format!(
                        "{} quantity must be positive, got {qty}",
                        self.kind().as_str().to_lowercase()
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl StockLevels {
    pub fn new(stock: i64, issued: i64) -> Self {
        Self { stock, issued }
    }

    /// Levels after `op`, or the reason it is rejected.
    pub fn apply(self, op: &StockOperation) -> Result<StockLevels, StockError> {
        op.validate()?;

        let next = match *op {
            StockOperation::Issue { qty } => {
                if self.stock < qty {
                    return Err(StockError::InsufficientStock {
                        requested: qty,
                        available: self.stock,
                    });
                }
                StockLevels {
                    stock: self.stock - qty,
                    issued: checked(self.issued.checked_add(qty))?,
                }
            }
            StockOperation::Receive { qty } => StockLevels {
                stock: checked(self.stock.checked_add(qty))?,
                issued: self.issued,
            },
            StockOperation::Adjust { delta } => {
                let stock = checked(self.stock.checked_add(delta))?;
                if stock < 0 {
                    return Err(StockError::NegativeResultingStock {
                        stock: self.stock,
                        delta,
                    });
                }
                StockLevels {
                    stock,
                    issued: self.issued,
                }
            }
            StockOperation::Return { qty } => {
                if self.issued < qty {
                    return Err(StockError::ReturnExceedsIssued {
                        requested: qty,
                        issued: self.issued,
                    });
                }
                StockLevels {
                    stock: checked(self.stock.checked_add(qty))?,
                    issued: self.issued - qty,
                }
            }
            StockOperation::Dispose { qty } => {
                if self.stock < qty {
                    return Err(StockError::InsufficientStock {
                        requested: qty,
                        available: self.stock,
                    });
                }
                StockLevels {
                    stock: self.stock - qty,
                    issued: self.issued,
                }
            }
        };

        Ok(next)
    }

    pub fn is_valid(&self) -> bool {
        self.stock >= 0 && self.issued >= 0
    }
}

fn checked(value: Option<i64>) -> Result<i64, StockError> {
    value.ok_or_else(|| StockError::InvalidQuantity("quantity overflows stock counter".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn levels(stock: i64, issued: i64) -> StockLevels {
        StockLevels::new(stock, issued)
    }

    #[test]
    fn issue_moves_units_to_issued() {
        let after = levels(10, 0).apply(&StockOperation::Issue { qty: 5 }).unwrap();
        assert_eq!(after, levels(5, 5));
    }

    #[test]
    fn issue_more_than_on_hand_is_rejected() {
        let err = levels(5, 5).apply(&StockOperation::Issue { qty: 10 }).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                requested: 10,
                available: 5
            }
        );
    }

    #[test]
    fn receive_adds_to_stock_only() {
        let after = levels(2, 3).apply(&StockOperation::Receive { qty: 4 }).unwrap();
        assert_eq!(after, levels(6, 3));
    }

    #[test]
    fn return_more_than_issued_is_rejected() {
        let err = levels(5, 5).apply(&StockOperation::Return { qty: 6 }).unwrap_err();
        assert_eq!(
            err,
            StockError::ReturnExceedsIssued {
                requested: 6,
                issued: 5
            }
        );
    }

    #[test]
    fn adjust_cannot_drive_stock_negative() {
        let err = levels(3, 0).apply(&StockOperation::Adjust { delta: -5 }).unwrap_err();
        assert_eq!(err, StockError::NegativeResultingStock { stock: 3, delta: -5 });

        let after = levels(3, 0).apply(&StockOperation::Adjust { delta: -3 }).unwrap();
        assert_eq!(after, levels(0, 0));
    }

    #[test]
    fn zero_adjustment_is_invalid() {
        let err = levels(3, 0).apply(&StockOperation::Adjust { delta: 0 }).unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity(_)));
    }

    #[test]
    fn dispose_leaves_issued_untouched() {
        let after = levels(4, 2).apply(&StockOperation::Dispose { qty: 4 }).unwrap();
        assert_eq!(after, levels(0, 2));

        let err = levels(4, 2).apply(&StockOperation::Dispose { qty: 5 }).unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { .. }));
    }

    #[test]
    fn non_positive_quantities_are_invalid() {
        for op in [
            StockOperation::Issue { qty: 0 },
            StockOperation::Receive { qty: -1 },
            StockOperation::Return { qty: 0 },
            StockOperation::Dispose { qty: -7 },
        ] {
            assert!(
                matches!(levels(10, 10).apply(&op), Err(StockError::InvalidQuantity(_))),
                "{op:?} should be rejected"
            );
        }
    }

    #[test]
    fn overflow_is_rejected_instead_of_wrapping() {
        let err = levels(i64::MAX, 0).apply(&StockOperation::Receive { qty: 1 }).unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity(_)));
    }

    #[test]
    fn operation_round_trips_through_kind_and_quantity() {
        let op = StockOperation::Adjust { delta: -4 };
        assert_eq!(StockOperation::new(op.kind(), op.quantity()), op);
    }

    fn any_operation() -> impl Strategy<Value = StockOperation> {
        prop_oneof![
            (-5i64..50).prop_map(|qty| StockOperation::Issue { qty }),
            (-5i64..50).prop_map(|qty| StockOperation::Receive { qty }),
            (-50i64..50).prop_map(|delta| StockOperation::Adjust { delta }),
            (-5i64..50).prop_map(|qty| StockOperation::Return { qty }),
            (-5i64..50).prop_map(|qty| StockOperation::Dispose { qty }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence is attempted, the counters never go negative
        /// and a rejected operation leaves them unchanged.
        #[test]
        fn counters_never_go_negative(ops in prop::collection::vec(any_operation(), 0..64)) {
            let mut current = StockLevels::default();
            for op in ops {
                if let Ok(next) = current.apply(&op) {
                    current = next;
                }
                prop_assert!(current.is_valid());
            }
        }

        /// Property: ISSUE followed by RETURN of the same quantity is the identity.
        #[test]
        fn issue_then_return_restores_levels(stock in 0i64..1_000, issued in 0i64..1_000, qty in 1i64..1_000) {
            prop_assume!(qty <= stock);
            let start = StockLevels::new(stock, issued);
            let after = start
                .apply(&StockOperation::Issue { qty })
                .and_then(|l| l.apply(&StockOperation::Return { qty }))
                .unwrap();
            prop_assert_eq!(after, start);
        }

        /// Property: stock + issued is conserved by ISSUE and RETURN.
        #[test]
        fn issue_and_return_conserve_total(stock in 0i64..1_000, issued in 0i64..1_000, qty in 1i64..100) {
            let start = StockLevels::new(stock, issued);
            for op in [StockOperation::Issue { qty }, StockOperation::Return { qty }] {
                if let Ok(next) = start.apply(&op) {
                    prop_assert_eq!(next.stock + next.issued, start.stock + start.issued);
                }
            }
        }
    }
}
