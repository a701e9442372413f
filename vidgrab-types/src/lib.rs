//! Vidgrab Types
//!
//! Shared media metadata and error types used across all vidgrab crates.
//! Telegram wire types come from `teloxide`.

pub mod media;
pub mod error;

pub use media::*;
pub use error::*;
