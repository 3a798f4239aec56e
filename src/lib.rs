pub mod adaptive;
pub mod bitpacker;
pub mod cli;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod gradient;
pub mod metrics;
pub mod selector;
pub mod simple_lsb;
pub mod steganalysis;

pub use error::{Result, SteganographyError};
