//! Core building blocks: identifiers, deadline comparison, and the
//! `Contract` trait consumed by the engine.

pub mod contract;
pub mod time;
pub mod types;

pub use contract::{ActionError, Contract};
pub use types::ContractId;
