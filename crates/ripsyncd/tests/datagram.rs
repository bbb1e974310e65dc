//! Datagram-level tests: wire bytes in, kernel operations and model out.

use ampr_prefix_map::{Bitvec, PrefixMap};
use ampr_types::{Ipv4Address, Ipv4Net};
use ripsyncd::engine::{EngineConfig, PolicyAction, Reconciler, ROUTE_TIMEOUT_SECS};
use ripsyncd::frontend::process_datagram;
use ripsyncd::kernel::mock::MockKernel;
use ripsyncd::rip::wire_password;
use ripsyncd::Model;

fn addr(s: &str) -> Ipv4Address {
    s.parse().unwrap()
}

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn reconciler() -> Reconciler<MockKernel> {
    let mut policy = PrefixMap::new();
    policy.insert(net("0.0.0.0/0"), PolicyAction::Accept);
    Reconciler::new(
        MockKernel::new(),
        Model::new(),
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

fn entry(family: u16, net: [u8; 4], mask: [u8; 4], next_hop: [u8; 4]) -> Vec<u8> {
    let mut e = Vec::new();
    e.extend_from_slice(&family.to_be_bytes());
    e.extend_from_slice(&0u16.to_be_bytes());
    e.extend_from_slice(&net);
    e.extend_from_slice(&mask);
    e.extend_from_slice(&next_hop);
    e.extend_from_slice(&1u32.to_be_bytes());
    e
}

fn packet(password: &str, entries: &[Vec<u8>]) -> Vec<u8> {
    let mut pkt = vec![2, 2, 0, 0];
    pkt.extend_from_slice(&0xffffu16.to_be_bytes());
    pkt.extend_from_slice(&2u16.to_be_bytes());
    pkt.extend_from_slice(&wire_password(password));
    for e in entries {
        pkt.extend_from_slice(e);
    }
    pkt
}

#[test]
fn datagram_applies_all_responses_and_expires_once() {
    let mut rec = reconciler();
    let pkt = packet(
        "sekrit",
        &[
            entry(2, [44, 10, 0, 0], [255, 255, 0, 0], [198, 51, 100, 7]),
            entry(2, [44, 20, 0, 0], [255, 255, 0, 0], [198, 51, 100, 8]),
        ],
    );
    process_datagram(&pkt, &mut rec, &wire_password("sekrit"), 1000).unwrap();

    rec.model().check_invariants().unwrap();
    assert!(rec.model().routes.find(net("44.10.0.0/16")).is_some());
    assert!(rec.model().routes.find(net("44.20.0.0/16")).is_some());
    assert_eq!(rec.kernel().count_up_tunnels(), 2);

    // a later datagram's expiry pass ages both out
    let empty = packet("sekrit", &[]);
    process_datagram(
        &empty,
        &mut rec,
        &wire_password("sekrit"),
        1000 + ROUTE_TIMEOUT_SECS,
    )
    .unwrap();
    assert!(rec.model().routes.is_empty());
    assert!(rec.model().tunnels.is_empty());
}

#[test]
fn datagram_with_wrong_password_is_dropped() {
    let mut rec = reconciler();
    let pkt = packet(
        "wrong",
        &[entry(2, [44, 10, 0, 0], [255, 255, 0, 0], [198, 51, 100, 7])],
    );
    process_datagram(&pkt, &mut rec, &wire_password("sekrit"), 1000).unwrap();
    assert!(rec.model().routes.is_empty());
    assert!(rec.kernel().ops().is_empty());
}

#[test]
fn datagram_garbage_is_dropped() {
    let mut rec = reconciler();
    process_datagram(&[0x17, 0x2a], &mut rec, &wire_password("sekrit"), 1000).unwrap();
    process_datagram(&[], &mut rec, &wire_password("sekrit"), 1000).unwrap();
    assert!(rec.model().routes.is_empty());
}

#[test]
fn datagram_bad_entry_does_not_poison_the_rest() {
    let mut rec = reconciler();
    let pkt = packet(
        "sekrit",
        &[
            // non-contiguous mask: skipped
            entry(2, [44, 10, 0, 0], [255, 0, 255, 0], [198, 51, 100, 7]),
            entry(2, [44, 20, 0, 0], [255, 255, 0, 0], [198, 51, 100, 8]),
        ],
    );
    process_datagram(&pkt, &mut rec, &wire_password("sekrit"), 1000).unwrap();
    assert!(rec.model().routes.find(net("44.10.0.0/16")).is_none());
    assert!(rec.model().routes.find(net("44.20.0.0/16")).is_some());
}
