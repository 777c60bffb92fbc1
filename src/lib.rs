#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod log;

mod error;

pub mod bsc;
pub mod config;
pub mod interface;
pub mod params;
pub mod registers;
pub mod scd30;

#[cfg(test)]
mod sim;

pub use crate::bsc::Bsc;
pub use crate::config::BscConfig;
pub use crate::error::{BscError, Error, Result};
pub use crate::scd30::{Measurement, Scd30};
