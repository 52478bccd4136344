//! Playback input path: double-buffered file reading for the decoders.
//!
//! # Modules
//!
//! - [`read_buffer`] - fill loop, slot pool and the primary read window
//! - [`source`] - [`ByteSource`](source::ByteSource), the surface decoders parse from
//!
//! # Features
//!
//! - `std`: host build; adds `ReadBufferThread` (fill loop on an OS thread)
//! - `defmt`: log through defmt and derive `defmt::Format` (hardware)
//! - `tracing`: log through tracing (emulator, host tools)
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

#[macro_use]
mod fmt;

pub mod read_buffer;
pub mod source;

pub use read_buffer::{split, Control, FillLoop, ReadBuffer, ReadBufferConfig, ReadBufferError};
pub use source::ByteSource;
