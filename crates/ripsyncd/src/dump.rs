//! Human-readable dump of discovered state (`-D`).

use ampr_prefix_map::PrefixMap;
use std::io::{self, Write};
use std::ops::ControlFlow;

use crate::engine::PolicyAction;
use crate::model::Model;

/// Writes the acceptance policy (covering entries first) and every tunnel
/// with its routed networks.
pub fn dump_all<W: Write>(
    out: &mut W,
    policy: &PrefixMap<PolicyAction>,
    model: &Model,
) -> io::Result<()> {
    let mut result = Ok(());

    writeln!(out, "Acceptance policy:")?;
    policy.traverse_topdown(|net, action| {
        let label = match action {
            PolicyAction::Accept => "ACCEPT",
            PolicyAction::Ignore => "IGNORE",
        };
        match writeln!(out, "\t{} -> {}", net, label) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                result = Err(e);
                ControlFlow::Break(())
            }
        }
    });
    result?;

    let mut result = Ok(());
    model.tunnels.traverse(|_, tunnel| {
        let write = (|| -> io::Result<()> {
            writeln!(out, "Tunnel interface {}:", tunnel.ifname)?;
            writeln!(out, "\tOuter {} -> {}", tunnel.outer_local, tunnel.outer_remote)?;
            writeln!(out, "\tInner {} -> {}", tunnel.inner_local, tunnel.inner_remote)?;
            writeln!(out, "\tRouted networks:")?;
            for member in &tunnel.routes {
                writeln!(out, "\t\t{}", member)?;
            }
            Ok(())
        })();
        match write {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                result = Err(e);
                ControlFlow::Break(())
            }
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Route, Tunnel};
    use ampr_types::Ipv4Net;

    #[test]
    fn test_dump_format() {
        let mut policy = PrefixMap::new();
        policy.insert("0.0.0.0/0".parse().unwrap(), PolicyAction::Ignore);
        policy.insert("44.0.0.0/8".parse().unwrap(), PolicyAction::Accept);

        let mut model = Model::default();
        let tunnel = Tunnel::new(
            "gif2".into(),
            2,
            "192.0.2.1".parse().unwrap(),
            "198.51.100.7".parse().unwrap(),
            "44.131.0.1".parse().unwrap(),
            "44.10.0.0".parse().unwrap(),
        );
        let remote = tunnel.outer_remote;
        model.tunnels.insert(tunnel.key(), tunnel);
        let key: Ipv4Net = "44.10.0.0/16".parse().unwrap();
        model
            .routes
            .insert(key, Route::new(key.addr(), key.mask(), remote));
        model.link_route(remote, key);

        let mut out = Vec::new();
        dump_all(&mut out, &policy, &model).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "\
Acceptance policy:
\t0.0.0.0/0 -> IGNORE
\t44.0.0.0/8 -> ACCEPT
Tunnel interface gif2:
\tOuter 192.0.2.1 -> 198.51.100.7
\tInner 44.131.0.1 -> 44.10.0.0
\tRouted networks:
\t\t44.10.0.0/16
";
        assert_eq!(text, expected);
    }
}
