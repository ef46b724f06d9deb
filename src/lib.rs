
use thiserror::Error;

pub mod config;
pub mod correlator;
pub mod filters;
pub mod io;
pub mod gnss;
pub mod telemetry;

pub mod utils;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum DigSigProcErr {
	#[error("invalid configuration: {0}")]
	InvalidConfig(&'static str),
	#[error("channel index {0} is outside the channel pool")]
	InvalidChannel(usize),
	#[error("PRN {0} is not a valid satellite index")]
	InvalidPrn(usize),
	#[error("PRN {prn} is already assigned to channel {channel}")]
	PrnInUse { prn: usize, channel: usize },
	#[error("channel {0} is already assigned")]
	ChannelBusy(usize),
	#[error("sample source error: {0}")]
	SampleSource(String),
	#[error("{0}")]
	Other(&'static str),
}
