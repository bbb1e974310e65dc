//! End-to-end scenarios against the recording kernel adapter.
//!
//! Each test drives the reconciliation engine the way the receive loop
//! does and asserts on the exact sequence of kernel operations plus the
//! model invariants afterwards.

use ampr_prefix_map::{Bitvec, PrefixMap};
use ampr_types::{Ipv4Address, Ipv4Net, Netmask};
use ripsyncd::discovery;
use ripsyncd::engine::{EngineConfig, PolicyAction, Reconciler, ROUTE_TIMEOUT_SECS};
use ripsyncd::kernel::mock::{KernelOp, MockKernel};
use ripsyncd::kernel::{DiscoveredGateway, DiscoveredInterface, DiscoveredRoute, Discovery};
use ripsyncd::rip::RipResponse;

fn addr(s: &str) -> Ipv4Address {
    s.parse().unwrap()
}

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn policy(entries: &[(&str, PolicyAction)]) -> PrefixMap<PolicyAction> {
    let mut map = PrefixMap::new();
    for (prefix, action) in entries {
        map.insert(net(prefix), *action);
    }
    map
}

fn accept_all() -> PrefixMap<PolicyAction> {
    policy(&[("0.0.0.0/0", PolicyAction::Accept)])
}

fn reconciler(policy: PrefixMap<PolicyAction>) -> Reconciler<MockKernel> {
    Reconciler::new(
        MockKernel::new(),
        ripsyncd::Model::new(),
        policy,
        Bitvec::new(),
        Bitvec::new(),
        EngineConfig {
            local_outer: addr("192.0.2.1"),
            local_inner: addr("44.131.0.1"),
            rtable: 44,
            timeout: ROUTE_TIMEOUT_SECS,
        },
    )
}

fn advertise(rec: &mut Reconciler<MockKernel>, prefix: &str, next_hop: &str, now: u64) {
    let prefix = net(prefix);
    let response = RipResponse {
        tag: 0,
        net: prefix.addr(),
        mask: prefix.mask(),
        next_hop: addr(next_hop),
        metric: 1,
    };
    rec.process_response(&response, now).unwrap();
    rec.model().check_invariants().unwrap();
}

#[test]
fn scenario_tunnel_creation() {
    let mut rec = reconciler(accept_all());
    advertise(&mut rec, "44.10.0.0/16", "198.51.100.7", 1000);

    let tunnel = rec.model().tunnel(addr("198.51.100.7")).unwrap();
    assert_eq!(tunnel.inner_remote, addr("44.10.0.0"));
    assert_eq!(tunnel.outer_local, addr("192.0.2.1"));
    assert_eq!(tunnel.routes, vec![net("44.10.0.0/16")]);

    let route = rec.model().routes.find(net("44.10.0.0/16")).unwrap();
    assert_eq!(route.tunnel, Some(addr("198.51.100.7")));
    assert_eq!(route.gateway, addr("198.51.100.7"));

    // one interface brought up and exactly one route added: the /16,
    // distinct from the kernel's own host route to the inner destination
    assert_eq!(rec.kernel().count_up_tunnels(), 1);
    assert_eq!(rec.kernel().count_add_routes(), 1);
    assert_eq!(
        rec.kernel().ops(),
        &[
            KernelOp::UpTunnel {
                ifname: "gif0".into(),
                inner_remote: net("44.10.0.0/32"),
            },
            KernelOp::AddRoute {
                dest: net("44.10.0.0/16"),
                gateway: net("198.51.100.7/32"),
            },
        ]
    );
}

#[test]
fn scenario_covered_advertisement() {
    let mut rec = reconciler(accept_all());
    advertise(&mut rec, "44.10.0.0/16", "198.51.100.7", 1000);
    rec.kernel_mut().take_ops();

    // a narrower network on the same tunnel is already served
    advertise(&mut rec, "44.10.5.0/24", "198.51.100.7", 1000);

    assert!(rec.kernel().ops().is_empty());
    assert!(rec.model().routes.find(net("44.10.5.0/24")).is_none());
    assert_eq!(rec.model().tunnel(addr("198.51.100.7")).unwrap().nref(), 1);
}

#[test]
fn scenario_covered_only_on_same_tunnel() {
    let mut rec = reconciler(accept_all());
    advertise(&mut rec, "44.10.0.0/16", "198.51.100.7", 1000);

    // the same narrower network via a different next hop branches off
    advertise(&mut rec, "44.10.5.0/24", "198.51.100.8", 1000);
    let route = rec.model().routes.find(net("44.10.5.0/24")).unwrap();
    assert_eq!(route.tunnel, Some(addr("198.51.100.8")));
}

#[test]
fn scenario_tunnel_move() {
    let mut rec = reconciler(accept_all());
    advertise(&mut rec, "44.10.0.0/16", "198.51.100.7", 1000);
    rec.kernel_mut().take_ops();

    advertise(&mut rec, "44.10.0.0/16", "198.51.100.8", 2000);

    // new tunnel for .8; the old tunnel lost its only route and went away
    assert!(rec.model().tunnel(addr("198.51.100.7")).is_none());
    let tunnel = rec.model().tunnel(addr("198.51.100.8")).unwrap();
    assert_eq!(tunnel.nref(), 1);
    assert_eq!(tunnel.inner_remote, addr("44.10.0.0"));
    let route = rec.model().routes.find(net("44.10.0.0/16")).unwrap();
    assert_eq!(route.gateway, addr("198.51.100.8"));

    assert_eq!(
        rec.kernel().ops(),
        &[
            KernelOp::UpTunnel {
                ifname: "gif1".into(),
                inner_remote: net("44.10.0.0/32"),
            },
            // the moving route was the old tunnel's basis: inner config
            // is torn off, and with no other member the interface is left
            // for the teardown that follows
            KernelOp::ClearInner {
                ifname: "gif0".into(),
            },
            KernelOp::ChangeRoute {
                dest: net("44.10.0.0/16"),
                gateway: net("198.51.100.8/32"),
            },
            KernelOp::DownTunnel {
                ifname: "gif0".into(),
            },
        ]
    );
}

#[test]
fn scenario_rebase_on_expiry_of_basis_route() {
    let mut rec = reconciler(accept_all());
    advertise(&mut rec, "44.20.0.0/16", "198.51.100.7", 1000);
    advertise(&mut rec, "44.30.0.0/16", "198.51.100.7", 5000);
    let tunnel = rec.model().tunnel(addr("198.51.100.7")).unwrap();
    assert_eq!(tunnel.inner_remote, addr("44.20.0.0"));
    assert_eq!(tunnel.nref(), 2);
    rec.kernel_mut().take_ops();

    // only the basis route has aged out
    rec.expire(1000 + ROUTE_TIMEOUT_SECS).unwrap();
    rec.model().check_invariants().unwrap();

    let tunnel = rec.model().tunnel(addr("198.51.100.7")).unwrap();
    assert_eq!(tunnel.inner_remote, addr("44.30.0.0"));
    assert_eq!(tunnel.nref(), 1);
    assert!(rec.model().routes.find(net("44.20.0.0/16")).is_none());

    assert_eq!(
        rec.kernel().ops(),
        &[
            KernelOp::ClearInner {
                ifname: "gif0".into(),
            },
            KernelOp::SetInner {
                ifname: "gif0".into(),
                inner_remote: net("44.30.0.0/32"),
            },
            // surviving member re-added after the inner config wiped it
            KernelOp::AddRoute {
                dest: net("44.30.0.0/16"),
                gateway: net("198.51.100.7/32"),
            },
            // removal of the expired route; the stack may answer ESRCH,
            // which the adapter tolerates
            KernelOp::RemoveRoute {
                dest: net("44.20.0.0/16"),
            },
        ]
    );
}

#[test]
fn scenario_discovery_deduplication() {
    let discovered = Discovery {
        interfaces: vec![DiscoveredInterface {
            name: "gif3".into(),
            ifnum: 3,
            outer_local: addr("192.0.2.1"),
            outer_remote: addr("198.51.100.7"),
            inner_local: addr("44.131.0.1"),
            inner_remote: addr("44.40.0.0"),
        }],
        routes: vec![
            DiscoveredRoute {
                net: addr("44.40.0.0"),
                mask: Netmask::HOST,
                gateway: DiscoveredGateway::Address(addr("44.40.0.0")),
            },
            DiscoveredRoute {
                net: addr("44.40.0.0"),
                mask: Netmask::from_cidr(16).unwrap(),
                gateway: DiscoveredGateway::Interface("gif3".into()),
            },
        ],
    };
    let policy = accept_all();
    let mut interfaces = Bitvec::new();
    let model = discovery::build_model(&discovered, &policy, &mut interfaces, &Bitvec::new(), 9999)
        .unwrap();
    model.check_invariants().unwrap();

    // the kernel-auto host route is gone; the explicit /16 remains linked
    let tunnel = model.tunnel(addr("198.51.100.7")).unwrap();
    assert_eq!(tunnel.routes, vec![net("44.40.0.0/16")]);
    assert!(model.routes.find(net("44.40.0.0/32")).is_none());
    assert!(model.routes.find(net("44.40.0.0/16")).is_some());

    // a populated tunnel survives the post-bootstrap cleanup pass
    let mut rec = Reconciler::new(
        MockKernel::new(),
        model,
        policy,
        interfaces,
        Bitvec::new(),
        EngineConfig {
            local_outer: addr("192.0.2.1"),
            local_inner: addr("44.131.0.1"),
            rtable: 44,
            timeout: ROUTE_TIMEOUT_SECS,
        },
    );
    rec.cleanup().unwrap();
    assert!(rec.model().tunnel(addr("198.51.100.7")).is_some());
    assert!(rec.kernel().ops().is_empty());
}

#[test]
fn scenario_acceptance_policy() {
    let mut rec = reconciler(policy(&[
        ("0.0.0.0/0", PolicyAction::Ignore),
        ("44.0.0.0/8", PolicyAction::Accept),
    ]));

    advertise(&mut rec, "10.0.0.0/8", "198.51.100.7", 1000);
    assert!(rec.model().tunnels.is_empty());
    assert!(rec.kernel().ops().is_empty());

    advertise(&mut rec, "44.1.0.0/16", "198.51.100.7", 1000);
    assert!(rec.model().routes.find(net("44.1.0.0/16")).is_some());
    assert_eq!(rec.kernel().count_up_tunnels(), 1);
}

#[test]
fn scenario_expiry_cascades_into_teardown() {
    let mut rec = reconciler(accept_all());
    advertise(&mut rec, "44.10.0.0/16", "198.51.100.7", 1000);
    rec.kernel_mut().take_ops();

    rec.expire(1000 + ROUTE_TIMEOUT_SECS).unwrap();
    rec.model().check_invariants().unwrap();

    assert!(rec.model().routes.is_empty());
    assert!(rec.model().tunnels.is_empty());
    assert_eq!(
        rec.kernel().ops(),
        &[
            // the expiring route is the basis; with no other member the
            // inner config is dropped and the interface goes down whole
            KernelOp::ClearInner {
                ifname: "gif0".into(),
            },
            KernelOp::RemoveRoute {
                dest: net("44.10.0.0/16"),
            },
            KernelOp::DownTunnel {
                ifname: "gif0".into(),
            },
        ]
    );
}
