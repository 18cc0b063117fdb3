use crate::details::icmp::SequenceNumber;
use crate::{AddressFamily, ProbeError};
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket,
    echo_request::{EchoRequestPacket, MutableEchoRequestPacket},
    IcmpCode, IcmpPacket, IcmpTypes,
};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::Packet;

/// Type, code, checksum, identifier and sequence number. Echo data is empty.
pub(crate) const ECHO_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReplyInfo {
    pub family: AddressFamily,
    pub icmp_type: u8,
    pub is_echo_reply: bool,
    pub identifier: u16,
    pub sequence_number: SequenceNumber,
    /// Identifier and sequence number of the echo request an ICMP error message quotes.
    pub quoted_request: Option<(u16, SequenceNumber)>,
}

impl ReplyInfo {
    /// `Ok(true)` when this is the echo reply for the given request and an error when this is an
    /// ICMP error message quoting that request. Everything else is `Ok(false)`: replies to other
    /// requests, errors about other traffic, and informational types such as the looped-back
    /// request or neighbour discovery, which are skipped rather than failing the probe.
    pub(crate) fn matches_request(
        &self,
        identifier: u16,
        sequence_number: SequenceNumber,
    ) -> Result<bool, ProbeError> {
        if self.is_echo_reply {
            return Ok(self.identifier == identifier && self.sequence_number == sequence_number);
        }
        if self.is_error_message() && self.quoted_request == Some((identifier, sequence_number)) {
            return Err(ProbeError::UnexpectedReplyType(self.icmp_type));
        }
        Ok(false)
    }

    pub(crate) fn is_error_message(&self) -> bool {
        is_error_type(self.family, self.icmp_type)
    }
}

fn is_error_type(family: AddressFamily, icmp_type: u8) -> bool {
    match family {
        // destination unreachable, source quench, redirect, time exceeded, parameter problem
        AddressFamily::V4 => matches!(icmp_type, 3 | 4 | 5 | 11 | 12),
        AddressFamily::V6 => icmp_type < 128,
    }
}

pub(crate) fn encode_request(
    family: AddressFamily,
    identifier: u16,
    sequence_number: SequenceNumber,
) -> Result<Vec<u8>, ProbeError> {
    match family {
        AddressFamily::V4 => encode_request_v4(identifier, sequence_number),
        AddressFamily::V6 => encode_request_v6(identifier, sequence_number),
    }
}

fn encode_request_v4(identifier: u16, sequence_number: SequenceNumber) -> Result<Vec<u8>, ProbeError> {
    let buf = vec![0u8; EchoRequestPacket::minimum_packet_size()];
    let mut package = MutableEchoRequestPacket::owned(buf)
        .ok_or_else(|| ProbeError::Encode("buffer too small for ICMPv4 echo request".to_owned()))?;
    package.set_icmp_type(IcmpTypes::EchoRequest);
    package.set_icmp_code(IcmpCode::new(0));
    package.set_identifier(identifier);
    package.set_sequence_number(sequence_number.into());

    package.set_checksum(0_u16);
    let icmp_packet = IcmpPacket::new(package.packet())
        .ok_or_else(|| ProbeError::Encode("could not view echo request as ICMP packet".to_owned()))?;
    let checksum = pnet_packet::icmp::checksum(&icmp_packet);
    package.set_checksum(checksum);
    Ok(package.packet().to_vec())
}

// The ICMPv6 checksum covers a pseudo header with the source address, which only the kernel
// knows; raw ICMPv6 sockets always fill it in on send.
fn encode_request_v6(identifier: u16, sequence_number: SequenceNumber) -> Result<Vec<u8>, ProbeError> {
    let buf = vec![0u8; ECHO_HEADER_LEN];
    let mut package = MutableIcmpv6Packet::owned(buf)
        .ok_or_else(|| ProbeError::Encode("buffer too small for ICMPv6 echo request".to_owned()))?;
    package.set_icmpv6_type(Icmpv6Types::EchoRequest);
    package.set_icmpv6_code(Icmpv6Code::new(0));
    package.set_checksum(0_u16);

    let mut body = [0u8; ECHO_HEADER_LEN - 4];
    body[..2].copy_from_slice(&identifier.to_be_bytes());
    body[2..].copy_from_slice(&u16::from(sequence_number).to_be_bytes());
    package.set_payload(&body);
    Ok(package.packet().to_vec())
}

/// Parses an ICMP message (no IP header) received on a socket of the given family.
/// The checksum is not verified; the network stack already did.
pub(crate) fn decode_reply(buf: &[u8], family: AddressFamily) -> Result<ReplyInfo, ProbeError> {
    if buf.len() < ECHO_HEADER_LEN {
        return Err(ProbeError::MalformedPacket(format!(
            "{} bytes is shorter than an ICMP header",
            buf.len()
        )));
    }
    match family {
        AddressFamily::V4 => decode_reply_v4(buf),
        AddressFamily::V6 => decode_reply_v6(buf),
    }
}

fn decode_reply_v4(buf: &[u8]) -> Result<ReplyInfo, ProbeError> {
    let package = EchoReplyPacket::new(buf)
        .ok_or_else(|| ProbeError::MalformedPacket("could not parse ICMPv4 message".to_owned()))?;
    let icmp_type = package.get_icmp_type();
    Ok(ReplyInfo {
        family: AddressFamily::V4,
        icmp_type: icmp_type.0,
        is_echo_reply: icmp_type == IcmpTypes::EchoReply,
        identifier: package.get_identifier(),
        sequence_number: package.get_sequence_number().into(),
        quoted_request: quoted_request(buf, AddressFamily::V4),
    })
}

fn decode_reply_v6(buf: &[u8]) -> Result<ReplyInfo, ProbeError> {
    let package = Icmpv6Packet::new(buf)
        .ok_or_else(|| ProbeError::MalformedPacket("could not parse ICMPv6 message".to_owned()))?;
    let icmp_type = package.get_icmpv6_type();
    let body = package.payload();
    if body.len() < 4 {
        return Err(ProbeError::MalformedPacket("ICMPv6 message body too short".to_owned()));
    }
    Ok(ReplyInfo {
        family: AddressFamily::V6,
        icmp_type: icmp_type.0,
        is_echo_reply: icmp_type == Icmpv6Types::EchoReply,
        identifier: u16::from_be_bytes([body[0], body[1]]),
        sequence_number: u16::from_be_bytes([body[2], body[3]]).into(),
        quoted_request: quoted_request(buf, AddressFamily::V6),
    })
}

/// An ICMP error message carries the offending datagram after its 8 byte header: the IP header
/// followed by at least the first 8 bytes of its payload. Returns the identifier and sequence
/// number when that payload is one of our echo requests.
fn quoted_request(buf: &[u8], family: AddressFamily) -> Option<(u16, SequenceNumber)> {
    if !is_error_type(family, buf[0]) {
        return None;
    }
    let datagram = &buf[ECHO_HEADER_LEN..];
    let (icmp, request_type) = match family {
        AddressFamily::V4 => {
            let ip = Ipv4Packet::new(datagram)?;
            let header_len = usize::from(ip.get_header_length()) * 4;
            if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp
                || header_len < Ipv4Packet::minimum_packet_size()
            {
                return None;
            }
            (datagram.get(header_len..)?, IcmpTypes::EchoRequest.0)
        }
        AddressFamily::V6 => {
            let ip = Ipv6Packet::new(datagram)?;
            if ip.get_next_header() != IpNextHeaderProtocols::Icmpv6 {
                return None;
            }
            (datagram.get(Ipv6Packet::minimum_packet_size()..)?, Icmpv6Types::EchoRequest.0)
        }
    };
    if icmp.len() < ECHO_HEADER_LEN || icmp[0] != request_type {
        return None;
    }
    Some((u16::from_be_bytes([icmp[4], icmp[5]]), u16::from_be_bytes([icmp[6], icmp[7]]).into()))
}
