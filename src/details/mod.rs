pub(crate) mod icmp;
pub(crate) mod transport;
