use crate::details::icmp::echo_codec;
use crate::details::icmp::socket::{SocketOpener, TSocket};
use crate::details::icmp::SequenceNumber;
use crate::{ProbeConfig, ProbeError, Prober, Target};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const RECEIVE_BUFFER_LEN: usize = 1500;

pub(crate) struct Transport<O> {
    opener: O,
}

impl<O> Transport<O>
where
    O: SocketOpener,
{
    pub(crate) fn new(opener: O) -> Self {
        Transport { opener }
    }
}

impl<O> Prober for Transport<O>
where
    O: SocketOpener,
{
    fn probe_once(
        &mut self,
        target: &Target,
        config: &ProbeConfig,
        sequence_number: SequenceNumber,
    ) -> Result<Duration, ProbeError> {
        let family = target.family();
        if config.family() != family {
            return Err(ProbeError::InvalidConfig(format!(
                "{} probe configured for target {target}",
                config.family()
            )));
        }
        // The socket lives for this transaction only and is closed on every return path.
        let socket = self.opener.open(family).map_err(ProbeError::TransportOpen)?;
        socket.set_ttl(config.ttl()).map_err(ProbeError::Send)?;

        let deadline = Instant::now() + config.probe_deadline();
        let start = Instant::now();

        let request = echo_codec::encode_request(family, config.identifier(), sequence_number)?;
        socket.set_timeout(remaining(deadline)?).map_err(ProbeError::Send)?;
        let addr: socket2::SockAddr = SocketAddr::new(target.addr(), 0).into();
        socket.send_to(&request, &addr).map_err(ProbeError::from_send)?;
        tracing::trace!("echo request {sequence_number} sent to {target}");

        let mut buf = [0u8; RECEIVE_BUFFER_LEN];
        loop {
            socket.set_timeout(remaining(deadline)?).map_err(ProbeError::Receive)?;
            let (n_bytes, from) = socket.recv_from(&mut buf).map_err(ProbeError::from_receive)?;
            let duration = start.elapsed();

            let reply = echo_codec::decode_reply(&buf[..n_bytes], family)?;
            if reply.matches_request(config.identifier(), sequence_number)? {
                if duration >= config.probe_deadline() {
                    return Err(ProbeError::Timeout);
                }
                return Ok(duration);
            }
            if reply.is_error_message() {
                tracing::debug!("ignoring ICMP error type {} from {from} about other traffic", reply.icmp_type);
                continue;
            }
            tracing::trace!(
                "ignoring ICMP type {} from {from} (identifier {}, sequence {})",
                reply.icmp_type,
                reply.identifier,
                reply.sequence_number
            );
        }
    }
}

fn remaining(deadline: Instant) -> Result<Duration, ProbeError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(ProbeError::Timeout);
    }
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::socket::tests::{OnReceive, OnSend, SocketMock, SocketOpenerMock};
    use crate::details::icmp::Ttl;
    use crate::AddressFamily;
    use more_asserts as ma;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn target_v4() -> Target {
        Target::new(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)))
    }

    fn config(family: AddressFamily) -> ProbeConfig {
        ProbeConfig::new(Ttl(64), family).with_identifier(0x4242)
    }

    fn transport(socket: &SocketMock) -> (Transport<SocketOpenerMock>, SocketOpenerMock) {
        let opener = SocketOpenerMock::new(socket.clone());
        (Transport::new(opener.clone()), opener)
    }

    #[test]
    fn matching_echo_reply_v4_succeeds() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::EchoReply]);
        let (mut transport, opener) = transport(&socket);
        let config = config(AddressFamily::V4);

        let duration = transport.probe_once(&target_v4(), &config, SequenceNumber::from(5)).unwrap();

        ma::assert_lt!(duration, config.probe_deadline());
        socket
            .should_send_number_of_messages(1)
            .should_send_to_address(&target_v4().addr())
            .should_receive_number_of_messages(1)
            .should_set_ttl(Ttl(64));
        assert_eq!(1, opener.opened_count());
        assert_eq!(1, socket.dropped_count());
    }

    #[test]
    fn matching_echo_reply_v6_succeeds() {
        let target = Target::new(IpAddr::V6(Ipv6Addr::LOCALHOST));
        let socket = SocketMock::new(AddressFamily::V6, OnSend::ReturnDefault, vec![OnReceive::EchoReply]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target, &config(AddressFamily::V6), SequenceNumber::from(0));

        assert!(result.is_ok());
        let sent = socket.sent_messages();
        assert_eq!(128, sent[0][0]);
    }

    #[test]
    fn request_carries_identifier_and_sequence_number() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::EchoReply]);
        let (mut transport, _opener) = transport(&socket);

        transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(513)).unwrap();

        let sent = socket.sent_messages();
        assert_eq!(8, sent[0][0]);
        assert_eq!(0x4242, u16::from_be_bytes([sent[0][4], sent[0][5]]));
        assert_eq!(513, u16::from_be_bytes([sent[0][6], sent[0][7]]));
    }

    #[test]
    fn silence_is_a_timeout() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::ReturnWouldBlock]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        assert!(matches!(result, Err(ProbeError::Timeout)));
        assert_eq!(1, socket.dropped_count());
    }

    #[test]
    fn send_failure_is_a_send_error() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnErr, vec![OnReceive::EchoReply]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        assert!(matches!(result, Err(ProbeError::Send(_))));
        socket.should_receive_number_of_messages(0);
        assert_eq!(1, socket.dropped_count());
    }

    #[test]
    fn receive_failure_is_a_receive_error() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::ReturnErr]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        assert!(matches!(result, Err(ProbeError::Receive(_))));
        assert_eq!(1, socket.dropped_count());
    }

    #[test]
    fn truncated_datagram_is_malformed() {
        let socket =
            SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::Bytes(vec![0, 0, 0, 0])]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        assert!(matches!(result, Err(ProbeError::MalformedPacket(_))));
        assert_eq!(1, socket.dropped_count());
    }

    #[test]
    fn time_exceeded_for_this_request_is_an_unexpected_reply_type() {
        let socket =
            SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::ErrorQuotingRequest(11)]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        assert!(matches!(result, Err(ProbeError::UnexpectedReplyType(11))));
        assert_eq!(1, socket.dropped_count());
    }

    #[test]
    fn unreachable_for_this_request_v6_is_an_unexpected_reply_type() {
        let target = Target::new(IpAddr::V6(Ipv6Addr::LOCALHOST));
        let socket = SocketMock::new(
            AddressFamily::V6,
            OnSend::ReturnDefault,
            vec![OnReceive::ErrorQuotingRequest(1), OnReceive::EchoReply],
        );
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target, &config(AddressFamily::V6), SequenceNumber::from(0));

        assert!(matches!(result, Err(ProbeError::UnexpectedReplyType(1))));
        socket.should_receive_number_of_messages(1);
    }

    #[test]
    fn error_about_other_traffic_is_skipped_until_the_reply_arrives() {
        let socket = SocketMock::new(
            AddressFamily::V4,
            OnSend::ReturnDefault,
            vec![OnReceive::Bytes(echo_codec::tests::udp_port_unreachable_v4()), OnReceive::EchoReply],
        );
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        assert!(result.is_ok());
        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn error_about_an_earlier_request_is_skipped() {
        let config = config(AddressFamily::V4);
        let earlier_request = echo_codec::encode_request(AddressFamily::V4, config.identifier(), SequenceNumber::from(0)).unwrap();
        let earlier = echo_codec::tests::as_error_quoting(&earlier_request, AddressFamily::V4, 11);
        let socket = SocketMock::new(
            AddressFamily::V4,
            OnSend::ReturnDefault,
            vec![OnReceive::Bytes(earlier), OnReceive::EchoReply],
        );
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config, SequenceNumber::from(1));

        assert!(result.is_ok());
        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn family_mismatch_is_rejected_before_opening_a_socket() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::EchoReply]);
        let (mut transport, opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V6), SequenceNumber::from(0));

        let error = result.unwrap_err();
        assert!(matches!(error, ProbeError::InvalidConfig(_)));
        assert!(error.is_fatal());
        assert_eq!(0, opener.opened_count());
    }

    #[test]
    fn stale_reply_is_skipped_until_the_matching_one_arrives() {
        let socket = SocketMock::new(
            AddressFamily::V4,
            OnSend::ReturnDefault,
            vec![OnReceive::StaleEchoReply, OnReceive::EchoReply],
        );
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(9));

        assert!(result.is_ok());
        socket.should_receive_number_of_messages(2);
    }

    #[test]
    fn stale_reply_alone_times_out() {
        let socket = SocketMock::new(AddressFamily::V4, OnSend::ReturnDefault, vec![OnReceive::StaleEchoReply]);
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(9));

        assert!(matches!(result, Err(ProbeError::Timeout)));
    }

    #[test]
    fn looped_back_request_is_skipped() {
        let socket = SocketMock::new(
            AddressFamily::V4,
            OnSend::ReturnDefault,
            vec![OnReceive::WithIcmpType(8), OnReceive::EchoReply],
        );
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(1));

        assert!(result.is_ok());
    }

    #[test]
    fn neighbour_discovery_is_skipped_on_v6() {
        let target = Target::new(IpAddr::V6(Ipv6Addr::LOCALHOST));
        let socket = SocketMock::new(
            AddressFamily::V6,
            OnSend::ReturnDefault,
            vec![OnReceive::WithIcmpType(135), OnReceive::EchoReply],
        );
        let (mut transport, _opener) = transport(&socket);

        let result = transport.probe_once(&target, &config(AddressFamily::V6), SequenceNumber::from(1));

        assert!(result.is_ok());
    }

    #[test]
    fn open_failure_is_fatal() {
        let mut transport = Transport::new(SocketOpenerMock::failing());

        let result = transport.probe_once(&target_v4(), &config(AddressFamily::V4), SequenceNumber::from(0));

        let error = result.unwrap_err();
        assert!(matches!(error, ProbeError::TransportOpen(_)));
        assert!(error.is_fatal());
    }

    #[test]
    fn each_probe_opens_and_releases_its_own_socket() {
        let socket = SocketMock::new(
            AddressFamily::V4,
            OnSend::ReturnDefault,
            vec![OnReceive::EchoReply, OnReceive::ReturnWouldBlock, OnReceive::EchoReply],
        );
        let (mut transport, opener) = transport(&socket);
        let config = config(AddressFamily::V4);

        for sequence_number in 0..3_u16 {
            let _ = transport.probe_once(&target_v4(), &config, sequence_number.into());
        }

        assert_eq!(3, opener.opened_count());
        assert_eq!(3, socket.dropped_count());
    }
}
