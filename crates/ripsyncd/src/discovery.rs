//! Bootstrap: builds the model from discovered kernel state.
//!
//! Unlike advertisement processing, discovery is strict. The daemon is the
//! only writer of the mesh's tunnels and routes, so kernel state it cannot
//! account for (say, an acceptable network routed somewhere unknown, or a
//! foreign network sitting on a managed tunnel) means some other agent is
//! fighting over the table, and starting up would make things worse. Those
//! cases are fatal.

use ampr_prefix_map::{Bitvec, PrefixMap};
use ampr_types::{Ipv4Address, Ipv4Net};
use std::ops::ControlFlow;
use tracing::{debug, info};

use crate::engine::PolicyAction;
use crate::error::{DaemonError, Result};
use crate::kernel::{DiscoveredGateway, DiscoveredInterface, DiscoveredRoute, Discovery};
use crate::model::{Model, Route, Tunnel, UnixSecs};

/// Builds the route/tunnel model from one discovery pass, prunes the
/// kernel-auto-inserted host routes, and stamps every surviving route with
/// the same initial expiry.
pub fn build_model(
    discovery: &Discovery,
    policy: &PrefixMap<PolicyAction>,
    interfaces: &mut Bitvec,
    static_interfaces: &Bitvec,
    expires: UnixSecs,
) -> Result<Model> {
    let mut model = Model::new();

    for iface in &discovery.interfaces {
        learn_interface(&mut model, policy, interfaces, static_interfaces, iface)?;
    }
    for route in &discovery.routes {
        learn_route(&mut model, policy, route)?;
    }

    fix_overlaps(&mut model);

    model.routes.for_each_mut(|_, route| route.expires = expires);
    info!(
        "discovered {} tunnels and {} routes",
        model.tunnels.len(),
        model.routes.len()
    );
    Ok(model)
}

fn learn_interface(
    model: &mut Model,
    policy: &PrefixMap<PolicyAction>,
    interfaces: &mut Bitvec,
    static_interfaces: &Bitvec,
    iface: &DiscoveredInterface,
) -> Result<()> {
    if static_interfaces.get(iface.ifnum) {
        debug!("skipping static interface {}", iface.name);
        return Ok(());
    }
    if interfaces.get(iface.ifnum) {
        return Err(DaemonError::discovery(format!(
            "interface {} reuses an allocated ordinal",
            iface.name
        )));
    }
    if !matches!(
        policy.nearest(iface.inner_remote, 32),
        Some(PolicyAction::Accept)
    ) {
        return Err(DaemonError::discovery(format!(
            "interface {} has unacceptable destination {}",
            iface.name, iface.inner_remote
        )));
    }
    let tunnel = Tunnel::new(
        iface.name.clone(),
        iface.ifnum,
        iface.outer_local,
        iface.outer_remote,
        iface.inner_local,
        iface.inner_remote,
    );
    let key = tunnel.key();
    if model.tunnels.insert(key, tunnel).is_some() {
        return Err(DaemonError::discovery(format!(
            "interface {} duplicates another interface at {}",
            iface.name, key
        )));
    }
    interfaces.set(iface.ifnum);
    debug!("learned tunnel {} -> {}", iface.name, iface.outer_remote);
    Ok(())
}

fn learn_route(
    model: &mut Model,
    policy: &PrefixMap<PolicyAction>,
    discovered: &DiscoveredRoute,
) -> Result<()> {
    let key = Ipv4Net::truncating(discovered.net, discovered.mask);
    let tunnel_key = match &discovered.gateway {
        DiscoveredGateway::Address(dest) => find_tunnel(model, |t| t.inner_remote == *dest),
        DiscoveredGateway::Interface(name) => find_tunnel(model, |t| t.ifname == *name),
    };
    let accepted = matches!(
        policy.nearest(key.addr(), key.cidr()),
        Some(PolicyAction::Accept)
    );

    let Some(tunnel_key) = tunnel_key else {
        if accepted {
            return Err(DaemonError::discovery(format!(
                "acceptable network {} routed to unknown destination",
                key
            )));
        }
        return Ok(());
    };
    if !accepted {
        return Err(DaemonError::discovery(format!(
            "unacceptable network {} found with managed tunnel",
            key
        )));
    }

    let route = Route::new(discovered.net, discovered.mask, tunnel_key);
    if let Some(rejected) = model.routes.insert(key, route) {
        let existing = model.routes.find(key).unwrap();
        if existing.net != rejected.net
            || existing.mask != rejected.mask
            || existing.gateway != rejected.gateway
        {
            return Err(DaemonError::discovery(format!(
                "duplicate route for {} -> {} (other {} -> {})",
                key,
                rejected.gateway,
                existing.prefix(),
                existing.gateway
            )));
        }
        return Ok(());
    }
    model.link_route(tunnel_key, key);
    debug!("learned route {} -> {}", key, tunnel_key);
    Ok(())
}

fn find_tunnel<F>(model: &Model, mut pred: F) -> Option<Ipv4Address>
where
    F: FnMut(&Tunnel) -> bool,
{
    let mut found = None;
    model.tunnels.traverse(|_, tunnel| {
        if pred(tunnel) {
            found = Some(tunnel.outer_remote);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    found
}

/// Unlinks routes made redundant by a covering member of the same tunnel.
///
/// Assigning a tunnel's inner destination always makes the kernel insert a
/// host route to it, and discovery reads that host route back even when an
/// advertised network on the same tunnel covers it. A private per-tunnel
/// prefix map walked in covering-before-covered order spots the shadowed
/// members.
fn fix_overlaps(model: &mut Model) {
    let mut tunnel_keys = Vec::new();
    model.tunnels.traverse(|_, tunnel| {
        tunnel_keys.push(tunnel.outer_remote);
        ControlFlow::Continue(())
    });
    for tunnel_key in tunnel_keys {
        let members = match model.tunnel(tunnel_key) {
            Some(tunnel) => tunnel.routes.clone(),
            None => continue,
        };
        let mut coverage = PrefixMap::new();
        for member in members {
            coverage.insert(member, member);
        }
        let mut cover: Option<Ipv4Net> = None;
        let mut redundant = Vec::new();
        coverage.traverse_topdown(|key, _| {
            match cover {
                Some(c) if c.contains(key.addr()) => redundant.push(key),
                _ => cover = Some(key),
            }
            ControlFlow::Continue(())
        });
        for key in redundant {
            info!("dropping redundant discovered route {}", key);
            model.unlink_route(Some(tunnel_key), key);
            model.routes.remove(key);
        }
    }
}
