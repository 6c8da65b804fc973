#![deny(unsafe_code)]
#![warn(missing_docs)]

//! A client for the Intelligent Platform Management Interface (IPMI) over
//! LAN, speaking IPMI v2.0 / RMCP+ to a Baseboard Management Controller on
//! UDP port 623.
//!
//! The crate implements:
//! - RMCP/ASF presence detection
//! - RMCP+ Open Session and RAKP 1-4 key exchange (cipher suites 0-3)
//! - Integrity (HMAC-SHA1-96) and confidentiality (AES-CBC-128)
//! - Typed request/response commands with completion-code handling
//! - SDR repository and SEL traversal with reservation recovery
//!
//! ```no_run
//! use ipmilan::{Client, PrivilegeLevel, commands::GetDeviceId};
//!
//! # fn main() -> ipmilan::Result<()> {
//! let mut client = Client::builder("10.0.0.10")
//!     .username("admin")
//!     .password("secret")
//!     .cipher_suite_id(3)
//!     .privilege_level(PrivilegeLevel::Administrator)
//!     .build()?;
//!
//! let mut device = GetDeviceId::default();
//! client.execute(&mut device)?;
//! println!("firmware {}.{}", device.firmware_major, device.firmware_minor);
//!
//! for record in ipmilan::sdr::get_all_records(&mut client)? {
//!     println!("record {:#06x}", record.id());
//! }
//! client.close()?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod commands;
mod crypto;
mod debug;
mod error;
mod observe;
mod protocol;
pub mod sdr;
pub mod sel;
mod session;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use crate::client::{Client, ClientBuilder};
pub use crate::error::{Error, Result};
pub use crate::types::{
    CompletionCode, EventType, NetFn, NetFnRsLun, PrivilegeLevel, SensorType, ThresholdStatus,
    Timestamp, UnitType, Version,
};
