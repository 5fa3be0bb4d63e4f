//! Durable client storage
//!
//! - File system key/value records
//! - Persisted record envelopes and well-known keys

mod file_system;
mod models;

pub use file_system::Storage;
pub use models::{Persisted, CONTRACT_ADDRESSES_KEY, SELECTED_SUBNET_KEY};
