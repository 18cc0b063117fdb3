use super::TSocket;
use crate::details::icmp::Ttl;
use crate::AddressFamily;
use pnet_packet::ipv4::Ipv4Packet;
use socket2::{Domain, Protocol, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::{io, time::Duration};

const RECV_BUFFER_LEN: usize = 1500;

pub(crate) struct RawSocket {
    socket: socket2::Socket,
    family: AddressFamily,
}

impl RawSocket {
    pub(crate) fn new(family: AddressFamily) -> Result<Self, io::Error> {
        let (domain, protocol, wildcard) = match family {
            AddressFamily::V4 => (Domain::IPV4, Protocol::ICMPV4, IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            AddressFamily::V6 => (Domain::IPV6, Protocol::ICMPV6, IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        };
        tracing::trace!("creating RawSocket for {family:?}");
        let socket = socket2::Socket::new(domain, Type::RAW, Some(protocol))?;
        socket.bind(&SocketAddr::new(wildcard, 0).into())?;
        Ok(RawSocket { socket, family })
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        tracing::trace!("closing RawSocket for {:?}", self.family);
    }
}

impl TSocket for RawSocket {
    fn set_ttl(&self, ttl: Ttl) -> io::Result<()> {
        match self.family {
            AddressFamily::V4 => self.socket.set_ttl(ttl.into()),
            AddressFamily::V6 => self.socket.set_unicast_hops_v6(ttl.into()),
        }
    }

    fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.socket.set_read_timeout(Some(timeout))?;
        self.socket.set_write_timeout(Some(timeout))
    }

    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        let mut recv_buf = [0u8; RECV_BUFFER_LEN];

        // Socket2 gives a safety guaranty which allows us to do an unsafe cast from `&mut [u8]`
        // to `&mut [std::mem::MaybeUninit<u8>]`: it never writes uninitialised bytes.
        // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
        let (n_bytes, socket_addr) = self.socket.recv_from(unsafe {
            &mut *(std::ptr::addr_of_mut!(recv_buf) as *mut [u8] as *mut [std::mem::MaybeUninit<u8>])
        })?;
        let from = socket_addr
            .as_socket()
            .map(|addr| addr.ip())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "datagram without an IP source address"))?;

        // A raw IPv4 socket hands us the IP header too, a raw IPv6 socket does not.
        let datagram = &recv_buf[..n_bytes];
        let icmp = match self.family {
            AddressFamily::V4 => {
                let ipv4_packet = Ipv4Packet::new(datagram)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated IPv4 header"))?;
                let header_len = usize::from(ipv4_packet.get_header_length()) * 4;
                if header_len > datagram.len() {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "IPv4 header length exceeds datagram"));
                }
                &datagram[header_len..]
            }
            AddressFamily::V6 => datagram,
        };

        let len = icmp.len().min(buf.len());
        buf[..len].copy_from_slice(&icmp[..len]);
        Ok((len, from))
    }
}
