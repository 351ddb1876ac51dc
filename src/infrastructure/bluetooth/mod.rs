//! Bluetooth Module
//!
//! Provides BLE communication with PAX Calima fans.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       FanService                         │
//! │  (Device facade - one method per characteristic)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ GattTransport
//!         ┌─────────────┼─────────────┬─────────────┐
//!         │             │             │             │
//!         ▼             ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │  │  Codec   │
//! │           │  │            │  │          │  │          │
//! │ - BLE     │  │ - btleplug │  │ - UUIDs  │  │ - Packed │
//! │ discovery │  │ - GATT I/O │  │ - Handles│  │  layouts │
//! └───────────┘  └────────────┘  └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic set and its UUID/handle addressing
//! - [`codec`] - Byte layouts of every characteristic value
//! - [`transport`] - The GATT read/write seam the facade is written against
//! - [`scanner`] - BLE device discovery
//! - [`connection`] - btleplug-backed transport
//! - [`service`] - The device facade

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod transport;

// Re-export main service for convenience
pub use service::FanService;
