//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity: two instances with the same attributes are
/// interchangeable. In this workspace that covers quantities and stock levels,
/// as opposed to entities such as inventory items, which keep their identity
/// while their counters change.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// struct StockLevels { stock: i64, issued: i64 }
///
/// impl ValueObject for StockLevels {}
///
/// assert_eq!(StockLevels { stock: 1, issued: 0 }, StockLevels { stock: 1, issued: 0 });
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
