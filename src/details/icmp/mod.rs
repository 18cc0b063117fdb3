pub(crate) mod echo_codec;
mod sequence_number;
pub(crate) mod socket;
mod ttl;

pub use sequence_number::SequenceNumber;
pub use ttl::Ttl;
