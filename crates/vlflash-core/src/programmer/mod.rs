//! Programmer abstractions
//!
//! A programmer is a piece of hardware (or software) that gives us access
//! to a SPI flash chip. Backends implement the [`SpiMaster`] trait and are
//! handed to the surrounding flash framework as trait objects.

mod traits;

pub use traits::{ProgrammerInfo, SpiFeatures, SpiMaster};
