//! SPI flash protocol implementations

mod spi25;

pub use spi25::*;
