//! RIPv2 advertisement parsing and authentication.
//!
//! Packets are a 4-byte header followed by fixed 20-byte entries. The first
//! entry may be a simple-password authentication entry (family 0xffff,
//! auth type 2) carrying a 16-byte plaintext password; the daemon drops any
//! packet whose password does not match the configured one. Everything on
//! the wire is big-endian; values are converted to host order here and
//! nowhere else on the receive path.

use ampr_types::{Ipv4Address, Netmask};
use thiserror::Error;

/// RIPv2 multicast group.
pub const RIP_GROUP: Ipv4Address = Ipv4Address::from_octets(224, 0, 0, 9);

/// RIPv2 UDP port.
pub const RIP_PORT: u16 = 520;

/// Length of the plaintext password field.
pub const PASSWORD_LEN: usize = 16;

const HEADER_LEN: usize = 4;
const ENTRY_LEN: usize = 20;

const COMMAND_RESPONSE: u8 = 2;
const VERSION_2: u8 = 2;
const AF_INET: u16 = 2;
const AF_AUTH: u16 = 0xffff;
const AUTH_SIMPLE_PASSWORD: u16 = 2;

/// Parse and authentication failures.
///
/// Packet-level errors drop the whole datagram; entry-level errors
/// ([`RipError::BadFamily`], [`RipError::BadNetmask`],
/// [`RipError::ZeroNextHop`]) skip one entry and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RipError {
    #[error("packet too short: {0} bytes")]
    Truncated(usize),

    #[error("packet body is not a whole number of entries: {0} bytes")]
    RaggedBody(usize),

    #[error("unexpected command {0}")]
    BadCommand(u8),

    #[error("unsupported version {0}")]
    BadVersion(u8),

    #[error("packet carries no authentication entry")]
    MissingAuth,

    #[error("unsupported authentication type {0}")]
    BadAuthType(u16),

    #[error("password mismatch")]
    BadPassword,

    #[error("entry {0} out of range")]
    BadIndex(usize),

    #[error("unsupported address family {0}")]
    BadFamily(u16),

    #[error("non-contiguous netmask {0:#010x}")]
    BadNetmask(u32),

    #[error("entry has no next hop")]
    ZeroNextHop,
}

/// One advertised network, already converted to host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipResponse {
    pub tag: u16,
    pub net: Ipv4Address,
    pub mask: Netmask,
    pub next_hop: Ipv4Address,
    pub metric: u32,
}

/// A structurally valid RIPv2 response packet, borrowing the receive
/// buffer. Entries are parsed lazily so one bad entry does not poison the
/// rest of the datagram.
#[derive(Debug)]
pub struct RipPacket<'a> {
    auth: Option<&'a [u8]>,
    entries: &'a [u8],
}

impl<'a> RipPacket<'a> {
    /// Validates the header and splits off the authentication entry.
    pub fn parse(buf: &'a [u8]) -> Result<Self, RipError> {
        if buf.len() < HEADER_LEN {
            return Err(RipError::Truncated(buf.len()));
        }
        let command = buf[0];
        let version = buf[1];
        if command != COMMAND_RESPONSE {
            return Err(RipError::BadCommand(command));
        }
        if version != VERSION_2 {
            return Err(RipError::BadVersion(version));
        }
        let body = &buf[HEADER_LEN..];
        if body.len() % ENTRY_LEN != 0 {
            return Err(RipError::RaggedBody(body.len()));
        }
        let (auth, entries) = match body.get(..ENTRY_LEN) {
            Some(first) if read_u16(first, 0) == AF_AUTH => (Some(first), &body[ENTRY_LEN..]),
            _ => (None, body),
        };
        Ok(RipPacket { auth, entries })
    }

    /// Number of response entries (the authentication entry excluded).
    pub fn responses(&self) -> usize {
        self.entries.len() / ENTRY_LEN
    }

    /// Compares the packet's plaintext password against `password`.
    pub fn verify_auth(&self, password: &[u8; PASSWORD_LEN]) -> Result<(), RipError> {
        let auth = self.auth.ok_or(RipError::MissingAuth)?;
        let auth_type = read_u16(auth, 2);
        if auth_type != AUTH_SIMPLE_PASSWORD {
            return Err(RipError::BadAuthType(auth_type));
        }
        if auth[4..4 + PASSWORD_LEN] != password[..] {
            return Err(RipError::BadPassword);
        }
        Ok(())
    }

    /// Parses response entry `index`.
    pub fn response(&self, index: usize) -> Result<RipResponse, RipError> {
        let offset = index * ENTRY_LEN;
        let entry = self
            .entries
            .get(offset..offset + ENTRY_LEN)
            .ok_or(RipError::BadIndex(index))?;
        let family = read_u16(entry, 0);
        if family != AF_INET {
            return Err(RipError::BadFamily(family));
        }
        let mask_bits = read_u32(entry, 8);
        let mask = Netmask::from_host_order(mask_bits).map_err(|_| RipError::BadNetmask(mask_bits))?;
        let next_hop = Ipv4Address::from_host_order(read_u32(entry, 12));
        if next_hop.is_unspecified() {
            return Err(RipError::ZeroNextHop);
        }
        Ok(RipResponse {
            tag: read_u16(entry, 2),
            net: Ipv4Address::from_host_order(read_u32(entry, 4)),
            mask,
            next_hop,
            metric: read_u32(entry, 16),
        })
    }
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Pads or truncates a configured password string to the wire field width.
pub fn wire_password(password: &str) -> [u8; PASSWORD_LEN] {
    let mut wire = [0u8; PASSWORD_LEN];
    let bytes = password.as_bytes();
    let n = bytes.len().min(PASSWORD_LEN);
    wire[..n].copy_from_slice(&bytes[..n]);
    wire
}
