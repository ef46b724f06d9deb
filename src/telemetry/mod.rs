
use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::correlator::{Accumulators, TicMeasurement};
use crate::gnss::channel::{Channel, ChannelReport, ChannelState};

/// Optional sink for per-interval tracking events. Called from the interval path, so
/// implementations must not block.
pub trait TrackingObserver {

	fn on_interval(&mut self, _from:ChannelState, _chn:&Channel) {}
	fn on_state_change(&mut self, _from:ChannelState, _report:&ChannelReport) {}
	fn on_bit(&mut self, _report:&ChannelReport, _bit:bool) {}
	fn on_tic(&mut self, _channel:usize, _prn:usize, _meas:&TicMeasurement) {}

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryMessage {
	StateChange{ from:ChannelState, report:ChannelReport },
	Bit{ channel:usize, prn:usize, bit:bool },
	Tic{ channel:usize, prn:usize, measurement:TicMeasurement },
}

/// Forwards tracking events to a lower-priority task over a bounded queue. Messages that
/// don't fit are dropped and counted.
pub struct TelemetrySender {
	tx: mpsc::Sender<TelemetryMessage>,
	dropped: u64,
}

impl TelemetrySender {

	pub fn new(tx:mpsc::Sender<TelemetryMessage>) -> Self { Self { tx, dropped: 0 } }

	pub fn channel(capacity:usize) -> (Self, mpsc::Receiver<TelemetryMessage>) {
		let (tx, rx) = mpsc::channel(capacity);
		(Self::new(tx), rx)
	}

	pub fn dropped(&self) -> u64 { self.dropped }

	fn send(&mut self, msg:TelemetryMessage) {
		if self.tx.try_send(msg).is_err() {
			self.dropped += 1;
			if self.dropped.is_power_of_two() {
				warn!("Telemetry queue full, {} messages dropped so far", self.dropped);
			}
		}
	}

}

impl TrackingObserver for TelemetrySender {

	fn on_state_change(&mut self, from:ChannelState, report:&ChannelReport) {
		self.send(TelemetryMessage::StateChange{ from, report: report.clone() });
	}

	fn on_bit(&mut self, report:&ChannelReport, bit:bool) {
		self.send(TelemetryMessage::Bit{ channel: report.channel, prn: report.prn, bit });
	}

	fn on_tic(&mut self, channel:usize, prn:usize, meas:&TicMeasurement) {
		self.send(TelemetryMessage::Tic{ channel, prn, measurement: *meas });
	}

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullInCapture {
	pub prn: usize,
	pub accumulators: Vec<Accumulators>,
}

/// Captures the accumulators of each channel's latest pull-in attempt, up to `max_len`
/// intervals per attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullInRecorder {
	max_len: usize,
	captures: BTreeMap<usize, PullInCapture>,
}

impl PullInRecorder {

	pub fn new(max_len:usize) -> Self { Self { max_len, captures: BTreeMap::new() } }

	pub fn capture(&self, channel:usize) -> Option<&PullInCapture> { self.captures.get(&channel) }

	pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string_pretty(&self.captures) }

}

impl TrackingObserver for PullInRecorder {

	fn on_interval(&mut self, from:ChannelState, chn:&Channel) {
		if from != ChannelState::PullIn { return; }
		if let Some(capture) = self.captures.get_mut(&chn.index) {
			if capture.accumulators.len() < self.max_len {
				capture.accumulators.push(chn.accum);
			}
		}
	}

	fn on_state_change(&mut self, _from:ChannelState, report:&ChannelReport) {
		if report.state == ChannelState::PullIn {
			self.captures.insert(report.channel, PullInCapture{ prn: report.prn, accumulators: vec![] });
		}
	}

}
