//! Reads a serial ADC by [bit banging] three [`embedded-hal`] pins.
//!
//! [bit banging]: https://en.wikipedia.org/wiki/Bit_banging
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! The [`adc`] module holds the transaction itself and builds without `std`.
//! With the default `std` feature the crate also provides a periodic
//! [`poller`] that runs reads on a background thread and the Linux sysfs
//! [`gpio`] layer used by the `bitbang-adc` binary.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod adc;

#[cfg(feature = "std")]
pub mod gpio;
#[cfg(feature = "std")]
pub mod poller;
