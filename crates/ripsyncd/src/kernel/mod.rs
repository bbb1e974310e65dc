//! Kernel adapter: interface ioctls, routing-socket messages and state
//! discovery.
//!
//! The engine talks to the operating system through the [`Kernel`] trait so
//! it carries no platform vocabulary; the real adapter drives the BSD
//! control and routing sockets, and [`mock::MockKernel`] records every call
//! for the test suite. Addresses cross this boundary in host byte order and
//! are converted to network byte order inside the adapter.

use ampr_types::{Ipv4Address, Netmask};
use std::io;
use thiserror::Error;

use crate::model::{Route, Tunnel};

pub mod mock;

#[cfg(target_os = "freebsd")]
mod freebsd;
#[cfg(target_os = "freebsd")]
pub use freebsd::{discover, open_listener, PlatformKernel};

#[cfg(not(target_os = "freebsd"))]
mod unsupported;
#[cfg(not(target_os = "freebsd"))]
pub use unsupported::{discover, open_listener, PlatformKernel};

/// Errors from kernel interface and routing operations. All of these are
/// fatal to the daemon except where an adapter absorbs them internally
/// (the "no such entry" cases on change and delete).
#[derive(Debug, Error)]
pub enum KernelError {
    /// An interface ioctl failed.
    #[error("{op} {ifname} failed: {source}")]
    Interface {
        op: &'static str,
        ifname: String,
        #[source]
        source: io::Error,
    },

    /// A routing-socket message was rejected.
    #[error("route {op} {dest} failed: {source}")]
    Route {
        op: &'static str,
        dest: String,
        #[source]
        source: io::Error,
    },

    /// Control, routing or listener socket setup failed.
    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),

    /// The routing-table dump could not be fetched or parsed.
    #[error("route table dump failed: {0}")]
    Dump(String),

    /// This build has no kernel adapter for the running platform.
    #[error("tunnel management is not supported on this platform")]
    Unsupported,
}

impl KernelError {
    pub fn interface(op: &'static str, ifname: &str, source: io::Error) -> Self {
        KernelError::Interface {
            op,
            ifname: ifname.to_string(),
            source,
        }
    }

    pub fn route(op: &'static str, route: &Route, source: io::Error) -> Self {
        KernelError::Route {
            op,
            dest: route.prefix().to_string(),
            source,
        }
    }
}

/// Mutating operations the reconciliation engine needs from the kernel.
///
/// Semantics every implementation must honor:
///
/// - `up_tunnel` sequencing is mandatory: create the interface, configure
///   the outer endpoints, bind the routing table, mark it up and running,
///   then assign the inner addresses. Inner addressing before the interface
///   is up does not stick.
/// - `add_route` is a no-op returning success when the route duplicates the
///   host route the kernel itself inserts for the tunnel's inner
///   destination (see [`duplicates_auto_host_route`]).
/// - `change_route` falls back to a raw delete followed by a raw add when
///   the stack reports no such entry; the fallback never re-enters tunnel
///   rebase logic.
/// - `remove_route` silently tolerates "no such entry".
pub trait Kernel {
    /// Creates and fully configures the tunnel interface in `rtable`.
    fn up_tunnel(&mut self, tunnel: &Tunnel, rtable: u32) -> Result<(), KernelError>;

    /// Destroys the tunnel interface.
    fn down_tunnel(&mut self, tunnel: &Tunnel) -> Result<(), KernelError>;

    /// Assigns the tunnel's inner source/destination addresses.
    fn set_inner(&mut self, tunnel: &Tunnel) -> Result<(), KernelError>;

    /// Deletes the tunnel's inner address configuration. The kernel drops
    /// every route it had attached to the interface along with it.
    fn clear_inner(&mut self, tunnel: &Tunnel) -> Result<(), KernelError>;

    fn add_route(&mut self, route: &Route, tunnel: &Tunnel, rtable: u32)
        -> Result<(), KernelError>;

    fn change_route(
        &mut self,
        route: &Route,
        tunnel: &Tunnel,
        rtable: u32,
    ) -> Result<(), KernelError>;

    fn remove_route(&mut self, route: &Route, rtable: u32) -> Result<(), KernelError>;
}

/// True when `route` is the host route the kernel auto-inserts for the
/// tunnel's inner destination; adding it again would be rejected as a
/// duplicate, so `add_route` treats it as already present.
pub fn duplicates_auto_host_route(route: &Route, tunnel: &Tunnel) -> bool {
    route.mask.is_host() && route.net == tunnel.inner_remote
}

/// Everything learned from one pass over kernel state: all tunnel
/// interfaces bound to the route table, then all routes in it.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub interfaces: Vec<DiscoveredInterface>,
    pub routes: Vec<DiscoveredRoute>,
}

/// One existing tunnel interface.
#[derive(Debug, Clone)]
pub struct DiscoveredInterface {
    pub name: String,
    pub ifnum: usize,
    pub outer_local: Ipv4Address,
    pub outer_remote: Ipv4Address,
    pub inner_local: Ipv4Address,
    pub inner_remote: Ipv4Address,
}

/// One existing route. Interface-reference gateways are resolved to the
/// interface name during the dump, using the interfaces seen in the
/// preceding pass.
#[derive(Debug, Clone)]
pub struct DiscoveredRoute {
    pub net: Ipv4Address,
    pub mask: Netmask,
    pub gateway: DiscoveredGateway,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveredGateway {
    /// The gateway slot held an IPv4 address.
    Address(Ipv4Address),
    /// The gateway slot named an interface.
    Interface(String),
}
