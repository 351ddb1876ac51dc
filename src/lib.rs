//! Control library for PAX Calima bluetooth bathroom fans.
//!
//! [`infrastructure::bluetooth::FanService`] is the entry point: it owns a
//! [`infrastructure::bluetooth::transport::GattTransport`], authenticates with
//! the fan's pin and exposes one typed getter or setter per characteristic.

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

pub use error::{Error, Result};
