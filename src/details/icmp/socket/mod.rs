use crate::details::icmp::Ttl;
use crate::AddressFamily;
use std::net::IpAddr;
use std::{io, time::Duration};

pub(crate) use raw_socket::RawSocket;

pub(crate) mod raw_socket;

pub(crate) trait TSocket {
    fn set_ttl(&self, ttl: Ttl) -> io::Result<()>;
    /// Applies to both reads and writes. `timeout` must be non-zero.
    fn set_timeout(&self, timeout: Duration) -> io::Result<()>;
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    /// Fills `buf` with the ICMP message only, IP header removed.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)>;
}

/// Opens one endpoint per probe; dropping the endpoint releases it.
pub(crate) trait SocketOpener {
    type Socket: TSocket;

    fn open(&self, family: AddressFamily) -> io::Result<Self::Socket>;
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RawSocketOpener;

impl SocketOpener for RawSocketOpener {
    type Socket = RawSocket;

    fn open(&self, family: AddressFamily) -> io::Result<RawSocket> {
        RawSocket::new(family)
    }
}
