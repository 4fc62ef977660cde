//! `stockroom-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and marker traits. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, TransactionId, UserId};
pub use value_object::ValueObject;
