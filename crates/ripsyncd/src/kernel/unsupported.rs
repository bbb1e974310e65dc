//! Fallback for platforms without a kernel adapter.
//!
//! Lets the daemon crate build and its engine run under test everywhere;
//! actually starting the daemon requires a platform with gif(4)-style
//! tunnels and a BSD routing socket.

use ampr_types::Ipv4Address;

use super::{Discovery, Kernel, KernelError};
use crate::model::{Route, Tunnel};

pub struct PlatformKernel;

impl PlatformKernel {
    pub fn new(_rtable: u32) -> Result<Self, KernelError> {
        Err(KernelError::Unsupported)
    }
}

impl Kernel for PlatformKernel {
    fn up_tunnel(&mut self, _tunnel: &Tunnel, _rtable: u32) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn down_tunnel(&mut self, _tunnel: &Tunnel) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn set_inner(&mut self, _tunnel: &Tunnel) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn clear_inner(&mut self, _tunnel: &Tunnel) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn add_route(
        &mut self,
        _route: &Route,
        _tunnel: &Tunnel,
        _rtable: u32,
    ) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn change_route(
        &mut self,
        _route: &Route,
        _tunnel: &Tunnel,
        _rtable: u32,
    ) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn remove_route(&mut self, _route: &Route, _rtable: u32) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }
}

pub fn open_listener(
    _group: Ipv4Address,
    _port: u16,
    _rtable: u32,
) -> Result<std::net::UdpSocket, KernelError> {
    Err(KernelError::Unsupported)
}

pub fn discover(_rtable: u32) -> Result<Discovery, KernelError> {
    Err(KernelError::Unsupported)
}
