//! FreeBSD kernel adapter: gif(4) interface ioctls, PF_ROUTE messages and
//! the NET_RT_DUMP discovery walk.

use ampr_types::{Ipv4Address, Netmask};
use nix::sys::socket::{
    self, sockopt, AddressFamily, IpMembershipRequest, SockFlag, SockType, SockaddrIn,
};
use nix::{ioctl_readwrite, ioctl_write_ptr};
use std::collections::HashMap;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::ptr;
use tracing::debug;

use super::{
    duplicates_auto_host_route, DiscoveredGateway, DiscoveredInterface, DiscoveredRoute,
    Discovery, Kernel, KernelError,
};
use crate::model::{Route, Tunnel};

const IFNAMSIZ: usize = 16;

const RTM_VERSION: u8 = 5;
const RTM_ADD: u8 = 1;
const RTM_DELETE: u8 = 2;
const RTM_CHANGE: u8 = 3;

const RTA_DST: libc::c_int = 0x1;
const RTA_GATEWAY: libc::c_int = 0x2;
const RTA_NETMASK: libc::c_int = 0x4;
const RTA_MAX_SLOTS: usize = 8;

const RTF_UP: libc::c_int = 0x1;
const RTF_GATEWAY: libc::c_int = 0x2;
const RTF_HOST: libc::c_int = 0x4;
const RTF_LLDATA: libc::c_int = 0x400;
const RTF_LOCAL: libc::c_int = 0x200000;
const RTF_BROADCAST: libc::c_int = 0x400000;
const RTF_MULTICAST: libc::c_int = 0x800000;

const NET_RT_DUMP: libc::c_int = 1;

#[repr(C)]
union IfrIfru {
    addr: libc::sockaddr_in,
    flags: [libc::c_short; 2],
    fib: libc::c_int,
}

/// `struct ifreq`.
#[repr(C)]
struct IfReq {
    name: [libc::c_char; IFNAMSIZ],
    ifru: IfrIfru,
}

impl IfReq {
    fn named(ifname: &str) -> Self {
        let mut ifr: IfReq = unsafe { mem::zeroed() };
        copy_ifname(&mut ifr.name, ifname);
        ifr
    }
}

/// `struct in_aliasreq`.
#[repr(C)]
struct InAliasReq {
    name: [libc::c_char; IFNAMSIZ],
    addr: libc::sockaddr_in,
    dstaddr: libc::sockaddr_in,
    mask: libc::sockaddr_in,
    vhid: libc::c_int,
}

impl InAliasReq {
    fn named(ifname: &str) -> Self {
        let mut ifar: InAliasReq = unsafe { mem::zeroed() };
        copy_ifname(&mut ifar.name, ifname);
        ifar
    }
}

ioctl_write_ptr!(ioctl_if_create, b'i', 122, IfReq);
ioctl_write_ptr!(ioctl_if_destroy, b'i', 121, IfReq);
ioctl_write_ptr!(ioctl_set_phys_addr, b'i', 70, InAliasReq);
ioctl_write_ptr!(ioctl_set_tunnel_fib, b'i', 95, IfReq);
ioctl_write_ptr!(ioctl_set_if_fib, b'i', 93, IfReq);
ioctl_readwrite!(ioctl_get_if_fib, b'i', 92, IfReq);
ioctl_readwrite!(ioctl_get_flags, b'i', 17, IfReq);
ioctl_write_ptr!(ioctl_set_flags, b'i', 16, IfReq);
ioctl_write_ptr!(ioctl_add_addr, b'i', 26, InAliasReq);
ioctl_write_ptr!(ioctl_del_addr, b'i', 25, IfReq);
ioctl_readwrite!(ioctl_get_phys_src, b'i', 71, IfReq);
ioctl_readwrite!(ioctl_get_phys_dst, b'i', 72, IfReq);

fn copy_ifname(dst: &mut [libc::c_char; IFNAMSIZ], name: &str) {
    for (slot, byte) in dst[..IFNAMSIZ - 1].iter_mut().zip(name.bytes()) {
        *slot = byte as libc::c_char;
    }
}

fn ioerr(errno: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno as i32)
}

fn sockaddr_in(addr: Ipv4Address) -> libc::sockaddr_in {
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
    sin.sin_family = libc::AF_INET as u8;
    sin.sin_addr.s_addr = addr.to_host_order().to_be();
    sin
}

fn sockaddr_in_mask(mask: Netmask) -> libc::sockaddr_in {
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
    sin.sin_family = libc::AF_INET as u8;
    sin.sin_addr.s_addr = mask.to_host_order().to_be();
    sin
}

fn set_fib(fd: RawFd, rtable: u32) -> Result<(), KernelError> {
    let fib = rtable as libc::c_int;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SETFIB,
            &fib as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(KernelError::Socket(io::Error::last_os_error()));
    }
    Ok(())
}

/// `struct rt_metrics`.
#[repr(C)]
#[derive(Clone, Copy)]
struct RtMetrics {
    rmx_locks: libc::c_ulong,
    rmx_mtu: libc::c_ulong,
    rmx_hopcount: libc::c_ulong,
    rmx_expire: libc::c_ulong,
    rmx_recvpipe: libc::c_ulong,
    rmx_sendpipe: libc::c_ulong,
    rmx_ssthresh: libc::c_ulong,
    rmx_rtt: libc::c_ulong,
    rmx_rttvar: libc::c_ulong,
    rmx_pksent: libc::c_ulong,
    rmx_weight: libc::c_ulong,
    rmx_nhidx: libc::c_ulong,
    rmx_filler: [libc::c_ulong; 2],
}

/// `struct rt_msghdr`.
#[repr(C)]
#[derive(Clone, Copy)]
struct RtMsgHdr {
    rtm_msglen: libc::c_ushort,
    rtm_version: libc::c_uchar,
    rtm_type: libc::c_uchar,
    rtm_index: libc::c_ushort,
    rtm_spare1: libc::c_ushort,
    rtm_flags: libc::c_int,
    rtm_addrs: libc::c_int,
    rtm_pid: libc::pid_t,
    rtm_seq: libc::c_int,
    rtm_errno: libc::c_int,
    rtm_fmask: libc::c_int,
    rtm_inits: libc::c_ulong,
    rtm_rmx: RtMetrics,
}

#[repr(C)]
struct RouteMsg {
    header: RtMsgHdr,
    dst: libc::sockaddr_in,
    gateway: libc::sockaddr_in,
    netmask: libc::sockaddr_in,
}

/// The real kernel adapter: one control socket for interface ioctls, one
/// write-only PF_ROUTE socket bound to the route table.
pub struct PlatformKernel {
    ctl: OwnedFd,
    route: OwnedFd,
    seq: libc::c_int,
}

impl PlatformKernel {
    /// Opens and binds the control and routing sockets.
    ///
    /// The route table cannot be switched per message on FreeBSD, only per
    /// socket, so it is fixed here for the life of the process.
    pub fn new(rtable: u32) -> Result<Self, KernelError> {
        let ctl = socket::socket(
            AddressFamily::Inet,
            SockType::Datagram,
            SockFlag::empty(),
            None,
        )
        .map_err(|e| KernelError::Socket(ioerr(e)))?;
        let route = socket::socket(
            AddressFamily::Route,
            SockType::Raw,
            SockFlag::empty(),
            None,
        )
        .map_err(|e| KernelError::Socket(ioerr(e)))?;
        socket::shutdown(route.as_raw_fd(), socket::Shutdown::Read)
            .map_err(|e| KernelError::Socket(ioerr(e)))?;
        set_fib(route.as_raw_fd(), rtable)?;
        Ok(PlatformKernel {
            ctl,
            route,
            seq: 0,
        })
    }

    fn next_seq(&mut self) -> libc::c_int {
        let seq = self.seq;
        self.seq += 1;
        if self.seq == libc::c_int::MAX {
            self.seq = 0;
        }
        seq
    }

    fn build_route_msg(
        &mut self,
        cmd: u8,
        route: &Route,
        gateway: Option<Ipv4Address>,
    ) -> (RouteMsg, usize) {
        let mut msg: RouteMsg = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<RouteMsg>();
        msg.header.rtm_version = RTM_VERSION;
        msg.header.rtm_type = cmd;
        msg.header.rtm_flags = RTF_UP
            | if route.mask.is_host() {
                RTF_HOST
            } else {
                RTF_GATEWAY
            };
        msg.header.rtm_addrs = RTA_DST | RTA_NETMASK;
        msg.header.rtm_pid = nix::unistd::getpid().as_raw();
        msg.header.rtm_seq = self.next_seq();
        msg.dst = sockaddr_in(route.net);
        match gateway {
            Some(gw) => {
                msg.header.rtm_addrs |= RTA_GATEWAY;
                msg.gateway = sockaddr_in(gw);
                msg.netmask = sockaddr_in_mask(route.mask);
            }
            None => {
                // on DELETE the netmask rides in the gateway slot and the
                // message shrinks by one sockaddr
                msg.gateway = sockaddr_in_mask(route.mask);
                len -= mem::size_of::<libc::sockaddr_in>();
            }
        }
        msg.header.rtm_msglen = len as libc::c_ushort;
        (msg, len)
    }

    fn send_route_msg(&self, msg: &RouteMsg, len: usize) -> io::Result<()> {
        let written = unsafe {
            libc::write(
                self.route.as_raw_fd(),
                msg as *const RouteMsg as *const libc::c_void,
                len,
            )
        };
        if written != len as isize {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn send_delete(&mut self, route: &Route) -> io::Result<()> {
        let (msg, len) = self.build_route_msg(RTM_DELETE, route, None);
        match self.send_route_msg(&msg, len) {
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
            other => other,
        }
    }
}

impl Kernel for PlatformKernel {
    /// Ordering matters: the interface must be created, configured,
    /// FIB-bound and marked up before inner addressing will stick.
    fn up_tunnel(&mut self, tunnel: &Tunnel, rtable: u32) -> Result<(), KernelError> {
        let fd = self.ctl.as_raw_fd();
        let ifname = tunnel.ifname.as_str();

        let ifr = IfReq::named(ifname);
        unsafe { ioctl_if_create(fd, &ifr) }
            .map_err(|e| KernelError::interface("create", ifname, ioerr(e)))?;

        let mut ifar = InAliasReq::named(ifname);
        ifar.addr = sockaddr_in(tunnel.outer_local);
        ifar.dstaddr = sockaddr_in(tunnel.outer_remote);
        unsafe { ioctl_set_phys_addr(fd, &ifar) }
            .map_err(|e| KernelError::interface("set tunnel endpoints on", ifname, ioerr(e)))?;

        let mut ifr = IfReq::named(ifname);
        ifr.ifru.fib = rtable as libc::c_int;
        unsafe { ioctl_set_tunnel_fib(fd, &ifr) }
            .map_err(|e| KernelError::interface("set tunnel fib on", ifname, ioerr(e)))?;
        unsafe { ioctl_set_if_fib(fd, &ifr) }
            .map_err(|e| KernelError::interface("set interface fib on", ifname, ioerr(e)))?;

        let mut ifr = IfReq::named(ifname);
        unsafe { ioctl_get_flags(fd, &mut ifr) }
            .map_err(|e| KernelError::interface("get flags of", ifname, ioerr(e)))?;
        let flags = unsafe { ifr.ifru.flags[0] };
        ifr.ifru.flags = [
            flags | (libc::IFF_UP | libc::IFF_RUNNING) as libc::c_short,
            0,
        ];
        unsafe { ioctl_set_flags(fd, &ifr) }
            .map_err(|e| KernelError::interface("set flags of", ifname, ioerr(e)))?;

        self.set_inner(tunnel)
    }

    fn down_tunnel(&mut self, tunnel: &Tunnel) -> Result<(), KernelError> {
        let ifr = IfReq::named(&tunnel.ifname);
        unsafe { ioctl_if_destroy(self.ctl.as_raw_fd(), &ifr) }
            .map_err(|e| KernelError::interface("destroy", &tunnel.ifname, ioerr(e)))?;
        Ok(())
    }

    fn set_inner(&mut self, tunnel: &Tunnel) -> Result<(), KernelError> {
        let mut ifar = InAliasReq::named(&tunnel.ifname);
        ifar.addr = sockaddr_in(tunnel.inner_local);
        ifar.dstaddr = sockaddr_in(tunnel.inner_remote);
        ifar.mask = sockaddr_in_mask(Netmask::HOST);
        unsafe { ioctl_add_addr(self.ctl.as_raw_fd(), &ifar) }
            .map_err(|e| KernelError::interface("assign inner addresses on", &tunnel.ifname, ioerr(e)))?;
        Ok(())
    }

    fn clear_inner(&mut self, tunnel: &Tunnel) -> Result<(), KernelError> {
        let mut ifr = IfReq::named(&tunnel.ifname);
        ifr.ifru.addr = sockaddr_in(tunnel.inner_local);
        unsafe { ioctl_del_addr(self.ctl.as_raw_fd(), &ifr) }
            .map_err(|e| KernelError::interface("delete inner addresses of", &tunnel.ifname, ioerr(e)))?;
        Ok(())
    }

    fn add_route(
        &mut self,
        route: &Route,
        tunnel: &Tunnel,
        _rtable: u32,
    ) -> Result<(), KernelError> {
        if duplicates_auto_host_route(route, tunnel) {
            debug!(
                "route {} duplicates the auto host route of {}",
                route.prefix(),
                tunnel.ifname
            );
            return Ok(());
        }
        let (msg, len) = self.build_route_msg(RTM_ADD, route, Some(tunnel.outer_remote));
        self.send_route_msg(&msg, len)
            .map_err(|e| KernelError::route("add", route, e))
    }

    fn change_route(
        &mut self,
        route: &Route,
        tunnel: &Tunnel,
        _rtable: u32,
    ) -> Result<(), KernelError> {
        let (msg, len) = self.build_route_msg(RTM_CHANGE, route, Some(tunnel.outer_remote));
        match self.send_route_msg(&msg, len) {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
                // no such entry: fall back to a raw delete plus add
                debug!("change of missing route {}, re-adding", route.prefix());
                self.send_delete(route)
                    .map_err(|e| KernelError::route("remove", route, e))?;
                let (msg, len) = self.build_route_msg(RTM_ADD, route, Some(tunnel.outer_remote));
                self.send_route_msg(&msg, len)
                    .map_err(|e| KernelError::route("add", route, e))
            }
            Err(e) => Err(KernelError::route("change", route, e)),
        }
    }

    fn remove_route(&mut self, route: &Route, _rtable: u32) -> Result<(), KernelError> {
        self.send_delete(route)
            .map_err(|e| KernelError::route("remove", route, e))
    }
}

/// Opens the advertisement listener: reusable, FIB-bound, bound to the RIP
/// port on all interfaces and joined to the multicast group.
pub fn open_listener(
    group: Ipv4Address,
    port: u16,
    rtable: u32,
) -> Result<std::net::UdpSocket, KernelError> {
    let fd = socket::socket(
        AddressFamily::Inet,
        SockType::Datagram,
        SockFlag::empty(),
        None,
    )
    .map_err(|e| KernelError::Socket(ioerr(e)))?;
    socket::setsockopt(&fd, sockopt::ReuseAddr, &true)
        .map_err(|e| KernelError::Socket(ioerr(e)))?;
    set_fib(fd.as_raw_fd(), rtable)?;
    socket::bind(fd.as_raw_fd(), &SockaddrIn::new(0, 0, 0, 0, port))
        .map_err(|e| KernelError::Socket(ioerr(e)))?;
    let membership = IpMembershipRequest::new(group.into(), None);
    socket::setsockopt(&fd, sockopt::IpAddMembership, &membership)
        .map_err(|e| KernelError::Socket(ioerr(e)))?;
    Ok(std::net::UdpSocket::from(fd))
}

/// Reads back kernel state: every gif interface bound to `rtable` with its
/// outer and inner endpoints, then every route in `rtable`.
pub fn discover(rtable: u32) -> Result<Discovery, KernelError> {
    let ctl = socket::socket(
        AddressFamily::Inet,
        SockType::Datagram,
        SockFlag::empty(),
        None,
    )
    .map_err(|e| KernelError::Socket(ioerr(e)))?;

    let mut discovery = Discovery::default();
    let mut index_to_name = HashMap::new();

    // inner endpoints come from the address list; collect them per name
    let mut inner: HashMap<String, (Ipv4Address, Ipv4Address)> = HashMap::new();
    let addrs =
        nix::ifaddrs::getifaddrs().map_err(|e| KernelError::Dump(format!("getifaddrs: {}", e)))?;
    for ifaddr in addrs {
        let Some(local) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        let Some(remote) = ifaddr.destination.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        inner.insert(
            ifaddr.interface_name.clone(),
            (Ipv4Address::from(local.ip()), Ipv4Address::from(remote.ip())),
        );
    }

    for (name, (inner_local, inner_remote)) in &inner {
        let Some(ifnum) = name.strip_prefix("gif").and_then(|s| s.parse::<usize>().ok()) else {
            continue;
        };
        let mut ifr = IfReq::named(name);
        unsafe { ioctl_get_if_fib(ctl.as_raw_fd(), &mut ifr) }
            .map_err(|e| KernelError::interface("get fib of", name, ioerr(e)))?;
        if unsafe { ifr.ifru.fib } != rtable as libc::c_int {
            continue;
        }

        let mut ifr = IfReq::named(name);
        unsafe { ioctl_get_phys_src(ctl.as_raw_fd(), &mut ifr) }
            .map_err(|e| KernelError::interface("get outer source of", name, ioerr(e)))?;
        let outer_local = Ipv4Address::from_host_order(u32::from_be(unsafe {
            ifr.ifru.addr.sin_addr.s_addr
        }));
        let mut ifr = IfReq::named(name);
        unsafe { ioctl_get_phys_dst(ctl.as_raw_fd(), &mut ifr) }
            .map_err(|e| KernelError::interface("get outer destination of", name, ioerr(e)))?;
        let outer_remote = Ipv4Address::from_host_order(u32::from_be(unsafe {
            ifr.ifru.addr.sin_addr.s_addr
        }));

        if let Ok(index) = nix::net::if_::if_nametoindex(name.as_str()) {
            index_to_name.insert(index as u16, name.clone());
        }
        discovery.interfaces.push(DiscoveredInterface {
            name: name.clone(),
            ifnum,
            outer_local,
            outer_remote,
            inner_local: *inner_local,
            inner_remote: *inner_remote,
        });
    }

    discovery.routes = dump_routes(rtable, &index_to_name)?;
    Ok(discovery)
}

fn dump_routes(
    rtable: u32,
    index_to_name: &HashMap<u16, String>,
) -> Result<Vec<DiscoveredRoute>, KernelError> {
    let mut mib: [libc::c_int; 7] = [
        libc::CTL_NET,
        libc::PF_ROUTE,
        0,
        libc::AF_INET,
        NET_RT_DUMP,
        0,
        rtable as libc::c_int,
    ];
    let mut needed: libc::size_t = 0;
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            ptr::null_mut(),
            &mut needed,
            ptr::null_mut(),
            0,
        )
    };
    if rc < 0 {
        return Err(KernelError::Dump(io::Error::last_os_error().to_string()));
    }
    let mut buf = vec![0u8; needed];
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut needed,
            ptr::null_mut(),
            0,
        )
    };
    if rc < 0 {
        return Err(KernelError::Dump(io::Error::last_os_error().to_string()));
    }
    buf.truncate(needed);

    let mut routes = Vec::new();
    let mut offset = 0;
    while offset + mem::size_of::<RtMsgHdr>() <= buf.len() {
        let header: RtMsgHdr =
            unsafe { ptr::read_unaligned(buf[offset..].as_ptr() as *const RtMsgHdr) };
        let msglen = header.rtm_msglen as usize;
        if msglen < mem::size_of::<RtMsgHdr>() || offset + msglen > buf.len() {
            return Err(KernelError::Dump("truncated route message".to_string()));
        }
        if header.rtm_version == RTM_VERSION {
            if let Some(route) = parse_route_msg(
                &header,
                &buf[offset + mem::size_of::<RtMsgHdr>()..offset + msglen],
                index_to_name,
            )? {
                routes.push(route);
            }
        }
        offset += msglen;
    }
    Ok(routes)
}

fn parse_route_msg(
    header: &RtMsgHdr,
    addrs: &[u8],
    index_to_name: &HashMap<u16, String>,
) -> Result<Option<DiscoveredRoute>, KernelError> {
    if header.rtm_flags & (RTF_LLDATA | RTF_LOCAL | RTF_BROADCAST | RTF_MULTICAST) != 0 {
        return Ok(None);
    }

    let mut net = None;
    let mut gateway = None;
    let mut mask_bits: u32 = 0;
    let mut offset = 0;
    for slot in 0..RTA_MAX_SLOTS {
        if header.rtm_addrs & (1 << slot) == 0 {
            continue;
        }
        if offset >= addrs.len() {
            break;
        }
        let sa = &addrs[offset..];
        let sa_len = sa[0] as usize;
        let family = sa.get(1).copied().unwrap_or(0) as libc::c_int;
        match 1 << slot {
            RTA_DST if family == libc::AF_INET => {
                net = Some(Ipv4Address::from_host_order(read_sin_addr(sa)));
            }
            RTA_GATEWAY => {
                if family == libc::AF_INET {
                    gateway = Some(DiscoveredGateway::Address(Ipv4Address::from_host_order(
                        read_sin_addr(sa),
                    )));
                } else if family == libc::AF_LINK {
                    // sockaddr_dl carries the interface index at offset 2
                    if sa.len() >= 4 {
                        let index = u16::from_ne_bytes([sa[2], sa[3]]);
                        gateway = index_to_name
                            .get(&index)
                            .cloned()
                            .or_else(|| {
                                nix::net::if_::if_indextoname(index as libc::c_uint)
                                    .ok()
                                    .and_then(|n| n.into_string().ok())
                            })
                            .map(DiscoveredGateway::Interface);
                    }
                }
            }
            RTA_NETMASK => {
                // the netmask sockaddr is routinely truncated to sa_len
                mask_bits = read_sin_addr(sa);
            }
            _ => {}
        }
        // sockaddrs are padded to long-word boundaries
        let step = if sa_len == 0 {
            mem::size_of::<libc::c_long>()
        } else {
            (sa_len + mem::size_of::<libc::c_long>() - 1) & !(mem::size_of::<libc::c_long>() - 1)
        };
        offset += step;
    }

    let (Some(net), Some(gateway)) = (net, gateway) else {
        return Ok(None);
    };
    // a host route carries no netmask sockaddr at all
    if header.rtm_flags & RTF_HOST != 0 {
        mask_bits = u32::MAX;
    }
    let mask = Netmask::from_host_order(mask_bits).map_err(|_| {
        KernelError::Dump(format!(
            "unusual netmask {:#010x} on routed network {}",
            mask_bits, net
        ))
    })?;
    Ok(Some(DiscoveredRoute { net, mask, gateway }))
}

/// Reads the (possibly truncated) `sin_addr` field out of a raw sockaddr,
/// returning host-order bits.
fn read_sin_addr(sa: &[u8]) -> u32 {
    let sa_len = sa[0] as usize;
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        let at = 4 + i;
        if at < sa_len && at < sa.len() {
            *octet = sa[at];
        }
    }
    u32::from_be_bytes(octets)
}
