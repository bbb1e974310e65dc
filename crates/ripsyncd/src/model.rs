//! In-memory model of routes and tunnels.
//!
//! The two prefix maps own all storage: `routes` keyed by `(net, cidr)` and
//! `tunnels` keyed by the remote outer endpoint at /32. A route's
//! back-reference to its tunnel is the tunnel's map key, and a tunnel's
//! member list is a vector of route map keys, so there are no ownership
//! cycles and no aliasing between the containers.

use ampr_prefix_map::PrefixMap;
use ampr_types::{Ipv4Address, Ipv4Net, Netmask};
use std::ops::ControlFlow;

/// Absolute wall-clock time in seconds since the Unix epoch.
pub type UnixSecs = u64;

/// One advertised network and the tunnel it is steered through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Network address; `net & mask == net` always holds.
    pub net: Ipv4Address,
    pub mask: Netmask,
    /// Remote outer endpoint this network is reached through, or
    /// unspecified while the route is not linked to a tunnel.
    pub gateway: Ipv4Address,
    /// Key of the owning tunnel in the tunnels map.
    pub tunnel: Option<Ipv4Address>,
    /// Absolute expiry time; the route is destroyed once this passes.
    pub expires: UnixSecs,
}

impl Route {
    pub fn new(net: Ipv4Address, mask: Netmask, gateway: Ipv4Address) -> Self {
        Route {
            net: net.masked(mask),
            mask,
            gateway,
            tunnel: None,
            expires: 0,
        }
    }

    /// The route's key in the routes map.
    pub fn prefix(&self) -> Ipv4Net {
        Ipv4Net::truncating(self.net, self.mask)
    }
}

/// One IPv4-in-IPv4 encapsulation interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    /// Kernel interface name, e.g. `gif3`.
    pub ifname: String,
    /// Interface ordinal drawn from the allocation bitmap.
    pub ifnum: usize,
    pub outer_local: Ipv4Address,
    pub outer_remote: Ipv4Address,
    pub inner_local: Ipv4Address,
    /// Inner destination address; always equals the network address of one
    /// member route (the basis route).
    pub inner_remote: Ipv4Address,
    /// Keys of the member routes in the routes map.
    pub routes: Vec<Ipv4Net>,
}

impl Tunnel {
    pub fn new(
        ifname: String,
        ifnum: usize,
        outer_local: Ipv4Address,
        outer_remote: Ipv4Address,
        inner_local: Ipv4Address,
        inner_remote: Ipv4Address,
    ) -> Self {
        Tunnel {
            ifname,
            ifnum,
            outer_local,
            outer_remote,
            inner_local,
            inner_remote,
            routes: Vec::new(),
        }
    }

    /// Number of routes referencing this tunnel. Zero means the tunnel is
    /// eligible for teardown.
    pub fn nref(&self) -> usize {
        self.routes.len()
    }

    /// The tunnel's key in the tunnels map.
    pub fn key(&self) -> Ipv4Net {
        Ipv4Net::host(self.outer_remote)
    }
}

/// The route/tunnel graph.
#[derive(Debug, Default)]
pub struct Model {
    pub routes: PrefixMap<Route>,
    pub tunnels: PrefixMap<Tunnel>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn tunnel(&self, outer_remote: Ipv4Address) -> Option<&Tunnel> {
        self.tunnels.find(Ipv4Net::host(outer_remote))
    }

    pub fn tunnel_mut(&mut self, outer_remote: Ipv4Address) -> Option<&mut Tunnel> {
        self.tunnels.find_mut(Ipv4Net::host(outer_remote))
    }

    /// Links `route_key` to the tunnel keyed by `outer_remote`: the route
    /// joins the tunnel's member list and takes the tunnel's remote outer
    /// endpoint as its gateway.
    pub fn link_route(&mut self, outer_remote: Ipv4Address, route_key: Ipv4Net) {
        if let Some(tunnel) = self.tunnel_mut(outer_remote) {
            if !tunnel.routes.contains(&route_key) {
                tunnel.routes.push(route_key);
            }
        }
        if let Some(route) = self.routes.find_mut(route_key) {
            route.tunnel = Some(outer_remote);
            route.gateway = outer_remote;
        }
    }

    /// Unlinks `route_key` from the tunnel keyed by `outer_remote`,
    /// clearing the route's gateway and back-reference. Passing `None` is
    /// a no-op (a route that never had a tunnel).
    pub fn unlink_route(&mut self, outer_remote: Option<Ipv4Address>, route_key: Ipv4Net) {
        let Some(outer_remote) = outer_remote else {
            return;
        };
        if let Some(tunnel) = self.tunnel_mut(outer_remote) {
            tunnel.routes.retain(|k| *k != route_key);
        }
        if let Some(route) = self.routes.find_mut(route_key) {
            if route.tunnel == Some(outer_remote) {
                route.tunnel = None;
                route.gateway = Ipv4Address::UNSPECIFIED;
            }
        }
    }

    /// Returns the key of the tunnel's basis route, the member whose
    /// network equals the tunnel's inner destination.
    pub fn basis_route(&self, tunnel: &Tunnel) -> Option<Ipv4Net> {
        tunnel
            .routes
            .iter()
            .copied()
            .find(|k| k.addr() == tunnel.inner_remote)
    }

    /// Validates the link invariants between the two maps. Used by the
    /// test suite after every engine operation; the daemon itself never
    /// runs with a model this would reject.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut failure = None;
        self.tunnels.traverse(|key, tunnel| {
            if key != Ipv4Net::host(tunnel.outer_remote) {
                failure = Some(format!(
                    "tunnel {} keyed at {} instead of its remote outer endpoint",
                    tunnel.ifname, key
                ));
                return ControlFlow::Break(());
            }
            let mut basis = 0;
            for member in &tunnel.routes {
                let Some(route) = self.routes.find(*member) else {
                    failure = Some(format!(
                        "tunnel {} lists {} but the routes map has no such entry",
                        tunnel.ifname, member
                    ));
                    return ControlFlow::Break(());
                };
                if route.tunnel != Some(tunnel.outer_remote) {
                    failure = Some(format!(
                        "route {} is listed by tunnel {} but does not point back",
                        member, tunnel.ifname
                    ));
                    return ControlFlow::Break(());
                }
                if route.gateway != tunnel.outer_remote {
                    failure = Some(format!(
                        "route {} gateway {} disagrees with tunnel {}",
                        member, route.gateway, tunnel.outer_remote
                    ));
                    return ControlFlow::Break(());
                }
                if route.net == tunnel.inner_remote {
                    basis += 1;
                }
            }
            if tunnel.nref() > 0 && basis != 1 {
                failure = Some(format!(
                    "tunnel {} has {} basis routes for inner remote {}",
                    tunnel.ifname, basis, tunnel.inner_remote
                ));
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        if let Some(f) = failure.take() {
            return Err(f);
        }
        self.routes.traverse(|key, route| {
            if route.prefix() != key {
                failure = Some(format!("route {} stored under key {}", route.prefix(), key));
                return ControlFlow::Break(());
            }
            let Some(outer_remote) = route.tunnel else {
                failure = Some(format!("route {} has no tunnel", key));
                return ControlFlow::Break(());
            };
            match self.tunnel(outer_remote) {
                Some(tunnel) if tunnel.routes.contains(&key) => {}
                Some(tunnel) => {
                    failure = Some(format!(
                        "route {} points at tunnel {} which does not list it",
                        key, tunnel.ifname
                    ));
                    return ControlFlow::Break(());
                }
                None => {
                    failure = Some(format!("route {} points at unknown tunnel {}", key, outer_remote));
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });
        match failure {
            Some(f) => Err(f),
            None => Ok(()),
        }
    }
}
