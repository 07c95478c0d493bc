//! Download client for the CFTC Commitments of Traders history archives.
//!
//! Each archive is a zip file holding one comma-separated text file. This
//! crate fetches the zip and hands back the decompressed entry bytes; it knows
//! nothing about report schemas.

mod client;
mod errors;
pub mod extract;
pub use self::client::{Client, DEFAULT_BASE_URL};
pub use self::errors::Error;
