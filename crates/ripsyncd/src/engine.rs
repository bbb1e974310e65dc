//! Reconciliation engine: drives the model and the kernel from incoming
//! advertisements.
//!
//! Every advertisement is reduced to one of a few transitions (new route,
//! route moved between tunnels, refresh), and each transition's kernel
//! effect is issued before the model is updated to match. Tunnel lifetime
//! follows route lifetime through the member count: the first route needing
//! a remote endpoint brings its tunnel up, and the last route leaving a
//! tunnel tears it down.

use ampr_prefix_map::{Bitvec, PrefixMap};
use ampr_types::{Ipv4Address, Ipv4Net};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::kernel::Kernel;
use crate::model::{Model, Route, Tunnel, UnixSecs};
use crate::rip::RipResponse;

/// Default route table for created interfaces and routes.
pub const DEFAULT_ROUTE_TABLE: u32 = 44;

/// Route lifetime granted by one advertisement: 7 days, much longer than
/// the expected interval between broadcasts.
pub const ROUTE_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Per-prefix acceptance policy, looked up by longest-prefix match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Accept,
    Ignore,
}

/// Engine configuration fixed at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local outer endpoint of every tunnel.
    pub local_outer: Ipv4Address,
    /// Local inner address assigned to every tunnel interface.
    pub local_inner: Ipv4Address,
    /// Route table interfaces and routes are created in.
    pub rtable: u32,
    /// Seconds of life granted to a route per advertisement.
    pub timeout: u64,
}

/// The reconciliation engine.
///
/// Owns the model, the acceptance policy, the interface ordinal bitmaps
/// and the kernel adapter. Single-threaded by construction; every method
/// completes all of its kernel effects before returning.
pub struct Reconciler<K: Kernel> {
    kernel: K,
    model: Model,
    policy: PrefixMap<PolicyAction>,
    interfaces: Bitvec,
    static_interfaces: Bitvec,
    config: EngineConfig,
}

impl<K: Kernel> Reconciler<K> {
    pub fn new(
        kernel: K,
        model: Model,
        policy: PrefixMap<PolicyAction>,
        interfaces: Bitvec,
        static_interfaces: Bitvec,
        config: EngineConfig,
    ) -> Self {
        Reconciler {
            kernel,
            model,
            policy,
            interfaces,
            static_interfaces,
            config,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn policy(&self) -> &PrefixMap<PolicyAction> {
        &self.policy
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Processes one advertised `(net, mask, next_hop)` record.
    pub fn process_response(&mut self, resp: &RipResponse, now: UnixSecs) -> Result<()> {
        let cidr = resp.mask.cidr();
        if resp.net.to_host_order() & !resp.mask.to_host_order() != 0 {
            warn!(
                "network {} has more bits than its /{} mask, normalizing",
                resp.net, cidr
            );
        }
        let net = resp.net.masked(resp.mask);
        let key = Ipv4Net::truncating(net, resp.mask);
        let next_hop = resp.next_hop;
        debug!("advertisement: {} -> {}", key, next_hop);

        if next_hop == self.config.local_outer {
            info!("skipping route for {} to local address", key);
            return Ok(());
        }
        if next_hop.masked(resp.mask) == net {
            info!("skipping gateway inside of subnet ({} -> {})", key, next_hop);
            return Ok(());
        }
        if !matches!(self.policy.nearest(net, cidr), Some(PolicyAction::Accept)) {
            info!("skipping ignored network {}", key);
            return Ok(());
        }

        if self.model.tunnel(next_hop).is_none() {
            debug!("creating new tunnel for {} -> {}", key, next_hop);
            let (ifnum, ifname) = self.allocate_interface();
            let tunnel = Tunnel::new(
                ifname,
                ifnum,
                self.config.local_outer,
                next_hop,
                self.config.local_inner,
                net,
            );
            self.kernel.up_tunnel(&tunnel, self.config.rtable)?;
            self.model.tunnels.insert(tunnel.key(), tunnel);
        }

        if self.model.routes.find(key).is_none() {
            if let Some(cover) = self.model.routes.nearest(net, cidr) {
                if cover.tunnel == Some(next_hop) {
                    info!(
                        "skipping network {} because it is served by {}",
                        key,
                        cover.prefix()
                    );
                    return Ok(());
                }
                debug!("branching network {} off of {}", key, cover.prefix());
            }
            self.model
                .routes
                .insert(key, Route::new(net, resp.mask, next_hop));
            info!("added route {} -> {}", key, next_hop);
        }

        let previous = self.model.routes.find(key).and_then(|r| r.tunnel);
        if previous != Some(next_hop) {
            // the route is new or moved to a different tunnel
            if let Some(prev) = previous {
                debug!("tunnel for {} changed, moving to {}", key, next_hop);
                self.rebase(prev, key)?;
                let route = self.model.routes.find(key).unwrap();
                let tunnel = self.model.tunnel(next_hop).unwrap();
                self.kernel.change_route(route, tunnel, self.config.rtable)?;
            } else {
                let route = self.model.routes.find(key).unwrap();
                let tunnel = self.model.tunnel(next_hop).unwrap();
                self.kernel.add_route(route, tunnel, self.config.rtable)?;
            }
            self.model.unlink_route(previous, key);
            if let Some(prev) = previous {
                self.collapse(prev)?;
            }
            self.model.link_route(next_hop, key);
        }

        if let Some(route) = self.model.routes.find_mut(key) {
            route.expires = now + self.config.timeout;
        }
        Ok(())
    }

    /// Moves a tunnel's inner addressing off of `lost`, the route about to
    /// disappear. A no-op when `lost` is not the tunnel's basis route, so
    /// callers may invoke it unconditionally.
    ///
    /// Deleting the inner configuration drops every route the kernel had
    /// attached to the interface, so all surviving members are re-added
    /// once the new inner destination is installed. The adapter suppresses
    /// the one that duplicates the fresh auto-inserted host route.
    pub fn rebase(&mut self, outer_remote: Ipv4Address, lost: Ipv4Net) -> Result<()> {
        let Some(tunnel) = self.model.tunnel(outer_remote) else {
            return Ok(());
        };
        if tunnel.inner_remote != lost.addr() {
            return Ok(());
        }
        debug!("rebasing tunnel {} off of {}", tunnel.ifname, lost);
        self.kernel.clear_inner(tunnel)?;
        if tunnel.nref() <= 1 {
            // the lost route was the only member; the caller collapses the
            // tunnel momentarily
            return Ok(());
        }
        let Some(new_basis) = tunnel.routes.iter().copied().find(|k| *k != lost) else {
            return Ok(());
        };
        self.model.tunnel_mut(outer_remote).unwrap().inner_remote = new_basis.addr();
        let tunnel = self.model.tunnel(outer_remote).unwrap();
        info!("rebased tunnel {} onto {}", tunnel.ifname, new_basis);
        self.kernel.set_inner(tunnel)?;
        let members = tunnel.routes.clone();
        for member in members {
            if member == lost {
                continue;
            }
            let route = self.model.routes.find(member).unwrap();
            let tunnel = self.model.tunnel(outer_remote).unwrap();
            self.kernel.add_route(route, tunnel, self.config.rtable)?;
        }
        Ok(())
    }

    /// Destroys every route whose expiry time has passed, cascading into
    /// tunnel teardown where a tunnel loses its last member.
    pub fn expire(&mut self, now: UnixSecs) -> Result<()> {
        let mut doomed = Vec::new();
        self.model.routes.traverse(|key, route| {
            if route.expires <= now {
                info!("expiring route {} -> {}", key, route.gateway);
                doomed.push(key);
            }
            ControlFlow::Continue(())
        });
        for key in doomed {
            self.destroy_route(key)?;
        }
        Ok(())
    }

    /// Removes one route from the kernel and the model, rebasing its
    /// tunnel first if the route was the basis. The route is not re-added
    /// anywhere: this is removal, not movement.
    fn destroy_route(&mut self, key: Ipv4Net) -> Result<()> {
        let Some(route) = self.model.routes.find(key) else {
            return Ok(());
        };
        let tunnel_key = route.tunnel;
        info!("destroying route {} -> {}", key, route.gateway);
        if let Some(outer) = tunnel_key {
            self.rebase(outer, key)?;
        }
        let route = self.model.routes.find(key).unwrap();
        self.kernel.remove_route(route, self.config.rtable)?;
        self.model.routes.remove(key);
        self.model.unlink_route(tunnel_key, key);
        if let Some(outer) = tunnel_key {
            self.collapse(outer)?;
        }
        Ok(())
    }

    /// Tears the tunnel down if its member count has reached zero.
    pub fn collapse(&mut self, outer_remote: Ipv4Address) -> Result<()> {
        let Some(tunnel) = self.model.tunnel(outer_remote) else {
            return Ok(());
        };
        if tunnel.nref() > 0 {
            return Ok(());
        }
        let tunnel = self
            .model
            .tunnels
            .remove(Ipv4Net::host(outer_remote))
            .unwrap();
        info!("tearing down tunnel interface {}", tunnel.ifname);
        self.kernel.down_tunnel(&tunnel)?;
        if !self.static_interfaces.get(tunnel.ifnum) {
            self.interfaces.clear(tunnel.ifnum);
        }
        Ok(())
    }

    /// Collapses every tunnel that ended up with no member routes.
    /// Run once after bootstrap, when discovery may have produced tunnels
    /// serving no networks at all.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut empty = Vec::new();
        self.model.tunnels.traverse(|_, tunnel| {
            if tunnel.nref() == 0 {
                empty.push(tunnel.outer_remote);
            }
            ControlFlow::Continue(())
        });
        for outer in empty {
            self.collapse(outer)?;
        }
        Ok(())
    }

    fn allocate_interface(&mut self) -> (usize, String) {
        let ifnum = self.interfaces.next_clear();
        self.interfaces.set(ifnum);
        let ifname = format!("gif{}", ifnum);
        info!("allocating tunnel interface {}", ifname);
        (ifnum, ifname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::mock::{KernelOp, MockKernel};
    use crate::rip::RipResponse;
    use ampr_types::Netmask;

    fn addr(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn accept_all() -> PrefixMap<PolicyAction> {
        let mut policy = PrefixMap::new();
        policy.insert(net("0.0.0.0/0"), PolicyAction::Accept);
        policy
    }

    fn reconciler(policy: PrefixMap<PolicyAction>) -> Reconciler<MockKernel> {
        Reconciler::new(
            MockKernel::new(),
            Model::new(),
            policy,
            Bitvec::new(),
            Bitvec::new(),
            EngineConfig {
                local_outer: addr("192.0.2.1"),
                local_inner: addr("44.131.0.1"),
                rtable: DEFAULT_ROUTE_TABLE,
                timeout: ROUTE_TIMEOUT_SECS,
            },
        )
    }

    fn response(net: &str, cidr: u8, next_hop: &str) -> RipResponse {
        RipResponse {
            tag: 0,
            net: net.parse().unwrap(),
            mask: Netmask::from_cidr(cidr).unwrap(),
            next_hop: next_hop.parse().unwrap(),
            metric: 1,
        }
    }

    #[test]
    fn test_self_advertisement_dropped() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.10.0.0", 16, "192.0.2.1"), 1000)
            .unwrap();
        assert!(rec.model().tunnels.is_empty());
        assert!(rec.kernel().ops().is_empty());
    }

    #[test]
    fn test_gateway_inside_subnet_dropped() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.10.0.0", 16, "44.10.0.1"), 1000)
            .unwrap();
        assert!(rec.model().tunnels.is_empty());
        assert!(rec.kernel().ops().is_empty());
    }

    #[test]
    fn test_host_bits_normalized() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.10.0.7", 16, "198.51.100.7"), 1000)
            .unwrap();
        assert!(rec.model().routes.find(net("44.10.0.0/16")).is_some());
        rec.model().check_invariants().unwrap();
    }

    #[test]
    fn test_refresh_extends_expiry_without_kernel_effect() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.10.0.0", 16, "198.51.100.7"), 1000)
            .unwrap();
        rec.kernel_mut().take_ops();
        rec.process_response(&response("44.10.0.0", 16, "198.51.100.7"), 2000)
            .unwrap();
        assert!(rec.kernel().ops().is_empty());
        let route = rec.model().routes.find(net("44.10.0.0/16")).unwrap();
        assert_eq!(route.expires, 2000 + ROUTE_TIMEOUT_SECS);
        rec.model().check_invariants().unwrap();
    }

    #[test]
    fn test_interface_ordinals_are_reused() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.10.0.0", 16, "198.51.100.7"), 1000)
            .unwrap();
        rec.process_response(&response("44.20.0.0", 16, "198.51.100.8"), 5000)
            .unwrap();
        assert_eq!(rec.model().tunnel(addr("198.51.100.7")).unwrap().ifnum, 0);
        assert_eq!(rec.model().tunnel(addr("198.51.100.8")).unwrap().ifnum, 1);
        // only the first tunnel's route has aged out, freeing gif0
        rec.expire(1000 + ROUTE_TIMEOUT_SECS).unwrap();
        assert!(rec.model().tunnel(addr("198.51.100.7")).is_none());
        assert!(rec.model().tunnel(addr("198.51.100.8")).is_some());
        rec.process_response(&response("44.30.0.0", 16, "198.51.100.9"), 6000)
            .unwrap();
        assert_eq!(rec.model().tunnel(addr("198.51.100.9")).unwrap().ifnum, 0);
        rec.model().check_invariants().unwrap();
    }

    #[test]
    fn test_static_ordinal_never_allocated() {
        let mut statics = Bitvec::new();
        statics.set(0);
        let mut interfaces = Bitvec::new();
        interfaces.set(0);
        let mut rec = Reconciler::new(
            MockKernel::new(),
            Model::new(),
            accept_all(),
            interfaces,
            statics,
            EngineConfig {
                local_outer: addr("192.0.2.1"),
                local_inner: addr("44.131.0.1"),
                rtable: DEFAULT_ROUTE_TABLE,
                timeout: ROUTE_TIMEOUT_SECS,
            },
        );
        rec.process_response(&response("44.10.0.0", 16, "198.51.100.7"), 1000)
            .unwrap();
        assert_eq!(rec.model().tunnel(addr("198.51.100.7")).unwrap().ifnum, 1);
    }

    #[test]
    fn test_rebase_noop_for_non_basis_route() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.20.0.0", 16, "198.51.100.7"), 1000)
            .unwrap();
        rec.process_response(&response("44.30.0.0", 16, "198.51.100.7"), 1000)
            .unwrap();
        rec.kernel_mut().take_ops();
        // 44.30.0.0/16 is not the basis; rebase must do nothing
        rec.rebase(addr("198.51.100.7"), net("44.30.0.0/16")).unwrap();
        assert!(rec.kernel().ops().is_empty());
        rec.model().check_invariants().unwrap();
    }

    #[test]
    fn test_expire_keeps_fresh_routes() {
        let mut rec = reconciler(accept_all());
        rec.process_response(&response("44.10.0.0", 16, "198.51.100.7"), 1000)
            .unwrap();
        rec.expire(1000).unwrap();
        // expires == now destroys; a fresh route has expires > now
        assert!(rec.model().routes.find(net("44.10.0.0/16")).is_some());
        rec.expire(1000 + ROUTE_TIMEOUT_SECS).unwrap();
        assert!(rec.model().routes.find(net("44.10.0.0/16")).is_none());
        assert!(rec
            .kernel()
            .ops()
            .contains(&KernelOp::DownTunnel { ifname: "gif0".into() }));
        rec.model().check_invariants().unwrap();
    }
}
