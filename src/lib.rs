#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub use details::icmp::{SequenceNumber, Ttl};
pub use echo_transport::*;
pub use ping_error::*;
pub use ping_output::*;
pub use ping_runner::*;
pub use probe_config::*;
pub use probe_stats::*;
pub use stop_condition::*;
pub use target::*;

mod details;
mod echo_transport;
mod ping_error;
mod ping_output;
mod ping_runner;
mod probe_config;
mod probe_stats;
mod stop_condition;
mod target;
