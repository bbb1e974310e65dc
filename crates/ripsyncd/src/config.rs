//! Daemon configuration assembled from the command line.

use ampr_prefix_map::PrefixMap;
use ampr_types::{Ipv4Address, Ipv4Net};
use std::path::PathBuf;

use crate::engine::{EngineConfig, PolicyAction, DEFAULT_ROUTE_TABLE, ROUTE_TIMEOUT_SECS};
use crate::rip::{wire_password, PASSWORD_LEN};

/// The advertisement password the mesh has always used.
pub const DEFAULT_PASSWORD: &str = "pLaInTeXtpAsSwD";

/// Fully parsed daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Local outer (physical) endpoint address.
    pub local_outer: Ipv4Address,
    /// Local inner (mesh) address.
    pub local_inner: Ipv4Address,
    /// Route table for created interfaces and routes.
    pub rtable_create: u32,
    /// Route table the listener socket binds to.
    pub rtable_bind: u32,
    /// Acceptance policy entries in the order given on the command line.
    pub policy: Vec<(Ipv4Net, PolicyAction)>,
    /// Interface ordinals that are never allocated or torn down.
    pub static_interfaces: Vec<usize>,
    /// Advertisement password.
    pub password: String,
    /// Replay file instead of the multicast socket.
    pub replay_file: Option<PathBuf>,
    /// Stay in the foreground.
    pub foreground: bool,
    /// Dump discovered state and exit.
    pub dump: bool,
}

impl DaemonConfig {
    /// Builds the acceptance-policy map. With no configured entries the
    /// policy is accept-everything.
    pub fn build_policy(&self) -> PrefixMap<PolicyAction> {
        let mut map = PrefixMap::new();
        if self.policy.is_empty() {
            let everything = Ipv4Net::truncating(
                Ipv4Address::UNSPECIFIED,
                ampr_types::Netmask::from_cidr(0).unwrap(),
            );
            map.insert(everything, PolicyAction::Accept);
            return map;
        }
        for (net, action) in &self.policy {
            map.insert(*net, *action);
        }
        map
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            local_outer: self.local_outer,
            local_inner: self.local_inner,
            rtable: self.rtable_create,
            timeout: ROUTE_TIMEOUT_SECS,
        }
    }

    pub fn wire_password(&self) -> [u8; PASSWORD_LEN] {
        wire_password(&self.password)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            local_outer: Ipv4Address::UNSPECIFIED,
            local_inner: Ipv4Address::UNSPECIFIED,
            rtable_create: DEFAULT_ROUTE_TABLE,
            rtable_bind: DEFAULT_ROUTE_TABLE,
            policy: Vec::new(),
            static_interfaces: Vec::new(),
            password: DEFAULT_PASSWORD.to_string(),
            replay_file: None,
            foreground: false,
            dump: false,
        }
    }
}
