//! Common network types for the AMPR tunnel mesh daemon.
//!
//! This crate provides type-safe representations of the IPv4 primitives used
//! throughout the daemon:
//!
//! - [`Ipv4Address`]: a 32-bit IPv4 address kept in host byte order
//! - [`Netmask`]: a contiguous IPv4 netmask
//! - [`Ipv4Net`]: a CIDR network prefix (address plus prefix length)
//!
//! Addresses stay in host byte order everywhere in the daemon's core; the
//! kernel adapter converts to network byte order at the system boundary.

mod ip;

pub use ip::{Ipv4Address, Ipv4Net, Netmask};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("invalid network prefix: {0}")]
    InvalidPrefix(String),

    #[error("prefix length {0} exceeds 32")]
    InvalidPrefixLength(u8),

    #[error("non-contiguous netmask: {0:#010x}")]
    InvalidNetmask(u32),
}
