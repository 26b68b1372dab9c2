//! Error handling for codec operations
//!
//! This module re-exports the error type used throughout the crate. Malformed
//! frames, configuration mistakes and FIFO misuse each have their own variant.

pub use crate::common::MaskPackError;
pub use crate::common::Result;
