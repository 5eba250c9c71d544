//! Scripts for deploying and configuring the NFT liquidation contracts.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod chain;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod deployments;
pub mod errors;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod pragma;
mod solidity;
#[cfg(test)]
mod test_helpers;
pub mod utils;
