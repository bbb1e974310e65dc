//! Recording kernel adapter for tests.
//!
//! Mirrors the documented adapter semantics (auto-host-route add
//! suppression, change falling back to raw delete+add on a missing entry,
//! delete tolerating a missing entry) while capturing every resulting
//! operation so tests can assert on the exact kernel effect of an engine
//! action.

use ampr_types::Ipv4Net;

use super::{duplicates_auto_host_route, Kernel, KernelError};
use crate::model::{Route, Tunnel};

/// One recorded kernel mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelOp {
    UpTunnel { ifname: String, inner_remote: Ipv4Net },
    DownTunnel { ifname: String },
    SetInner { ifname: String, inner_remote: Ipv4Net },
    ClearInner { ifname: String },
    AddRoute { dest: Ipv4Net, gateway: Ipv4Net },
    ChangeRoute { dest: Ipv4Net, gateway: Ipv4Net },
    RemoveRoute { dest: Ipv4Net },
}

/// A kernel adapter that records operations instead of performing them.
#[derive(Debug, Default)]
pub struct MockKernel {
    ops: Vec<KernelOp>,
    /// Destinations for which the next change reports "no such entry",
    /// exercising the raw delete+add fallback.
    missing_on_change: Vec<Ipv4Net>,
}

impl MockKernel {
    pub fn new() -> Self {
        MockKernel::default()
    }

    /// All operations recorded so far, in issue order.
    pub fn ops(&self) -> &[KernelOp] {
        &self.ops
    }

    /// Drains and returns the recorded operations.
    pub fn take_ops(&mut self) -> Vec<KernelOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn count_up_tunnels(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, KernelOp::UpTunnel { .. }))
            .count()
    }

    pub fn count_add_routes(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, KernelOp::AddRoute { .. }))
            .count()
    }

    /// Makes the next change for `dest` report "no such entry".
    pub fn fail_change_with_missing_entry(&mut self, dest: Ipv4Net) {
        self.missing_on_change.push(dest);
    }
}

impl Kernel for MockKernel {
    fn up_tunnel(&mut self, tunnel: &Tunnel, _rtable: u32) -> Result<(), KernelError> {
        self.ops.push(KernelOp::UpTunnel {
            ifname: tunnel.ifname.clone(),
            inner_remote: Ipv4Net::host(tunnel.inner_remote),
        });
        Ok(())
    }

    fn down_tunnel(&mut self, tunnel: &Tunnel) -> Result<(), KernelError> {
        self.ops.push(KernelOp::DownTunnel {
            ifname: tunnel.ifname.clone(),
        });
        Ok(())
    }

    fn set_inner(&mut self, tunnel: &Tunnel) -> Result<(), KernelError> {
        self.ops.push(KernelOp::SetInner {
            ifname: tunnel.ifname.clone(),
            inner_remote: Ipv4Net::host(tunnel.inner_remote),
        });
        Ok(())
    }

    fn clear_inner(&mut self, tunnel: &Tunnel) -> Result<(), KernelError> {
        self.ops.push(KernelOp::ClearInner {
            ifname: tunnel.ifname.clone(),
        });
        Ok(())
    }

    fn add_route(
        &mut self,
        route: &Route,
        tunnel: &Tunnel,
        _rtable: u32,
    ) -> Result<(), KernelError> {
        if duplicates_auto_host_route(route, tunnel) {
            return Ok(());
        }
        self.ops.push(KernelOp::AddRoute {
            dest: route.prefix(),
            gateway: Ipv4Net::host(tunnel.outer_remote),
        });
        Ok(())
    }

    fn change_route(
        &mut self,
        route: &Route,
        tunnel: &Tunnel,
        _rtable: u32,
    ) -> Result<(), KernelError> {
        let dest = route.prefix();
        if let Some(pos) = self.missing_on_change.iter().position(|d| *d == dest) {
            self.missing_on_change.remove(pos);
            // raw fallback: no rebase involvement
            self.ops.push(KernelOp::RemoveRoute { dest });
            self.ops.push(KernelOp::AddRoute {
                dest,
                gateway: Ipv4Net::host(tunnel.outer_remote),
            });
            return Ok(());
        }
        self.ops.push(KernelOp::ChangeRoute {
            dest,
            gateway: Ipv4Net::host(tunnel.outer_remote),
        });
        Ok(())
    }

    fn remove_route(&mut self, route: &Route, _rtable: u32) -> Result<(), KernelError> {
        // "no such entry" is tolerated, so removal always records and succeeds
        self.ops.push(KernelOp::RemoveRoute {
            dest: route.prefix(),
        });
        Ok(())
    }
}
