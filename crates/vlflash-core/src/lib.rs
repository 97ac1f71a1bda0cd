//! vlflash-core - Core library for SPI flash programming
//!
//! This crate provides the programmer-facing building blocks shared by all
//! vlflash backends: the [`SpiMaster`](programmer::SpiMaster) trait, the
//! [`SpiCommand`](spi::SpiCommand) transaction type and the common SPI25
//! command sequences. It is designed to be `no_std` compatible.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation (required for the provided
//!   `execute`/`read`/`write` trait methods)
//!
//! # Example
//!
//! ```ignore
//! use vlflash_core::{protocol, programmer::SpiMaster};
//!
//! fn identify<M: SpiMaster>(master: &mut M) {
//!     match protocol::read_jedec_id(master) {
//!         Ok((mfr, dev)) => println!("JEDEC ID: {:02X} {:04X}", mfr, dev),
//!         Err(e) => println!("probe failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod programmer;
#[cfg(feature = "alloc")]
pub mod protocol;
pub mod spi;

pub use error::{Error, Result};
