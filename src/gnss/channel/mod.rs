
use serde::{Serialize, Deserialize};

use crate::config::{SignalReference, SignalReferences};
use crate::correlator::Accumulators;
use crate::filters::{CarrierLoopFilter, CodeLoopFilter, LoopFilter, LoopFilterCoefficients};
use crate::gnss::GnssSystem;
use crate::gnss::tracking::lock_detectors::LockDetector;

pub mod state_machine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
	Off,
	Acquisition,
	Confirm,
	PullIn,
	Tracking,
}

/// Lock status bitfield as reported by hardware-style receivers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus(pub u8);

impl LockStatus {

	pub const CODE_LOCK:u8  = 0x01;
	pub const CARR_LOCK:u8  = 0x02;
	pub const PHASE_LOCK:u8 = 0x04;
	pub const BIT_SYNC:u8   = 0x08;
	pub const FRAME_SYNC:u8 = 0x10;

	pub fn contains(&self, bits:u8) -> bool { self.0 & bits == bits }
	pub fn insert(&mut self, bits:u8) { self.0 |= bits; }
	pub fn remove(&mut self, bits:u8) { self.0 &= !bits; }
	pub fn set(&mut self, bits:u8, value:bool) { if value { self.insert(bits) } else { self.remove(bits) } }
	pub fn clear(&mut self) { self.0 = 0; }

}

/// Register writes requested by one state machine step
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NcoCommands {
	pub carrier: Option<u32>,
	pub code: Option<u32>,
	pub slew: Option<u16>,
	/// Millisecond and bit counters to load into the epoch register
	pub epoch_load: Option<(u8, u8)>,
	pub bit: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
	pub n_freq: i32,
	pub del_freq: i32,
	pub codes: u32,
	pub sweeps: u32,
	/// Warm-start offsets from the reference words, in control-word units
	pub carrier_cold_corr: i64,
	pub code_cold_corr: i64,
	pub exhausted: bool,
}

impl Default for SearchState {
	fn default() -> Self {
		Self { n_freq: 0, del_freq: 1, codes: 0, sweeps: 0, carrier_cold_corr: 0, code_cold_corr: 0, exhausted: false }
	}
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfirmState {
	pub i_confirm: u32,
	pub n_thresh: u32,
	pub early_mag: i64,
	pub prompt_mag: i64,
	pub late_mag: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitSyncState {
	pub ch_time: u32,
	pub sign_pos: u32,
	pub prev_sign_pos: u32,
	pub sign_count: u32,
	pub ms_sign: u32,
	pub ms_count: u32,
	pub ms_set: bool,
	pub bit: Option<bool>,
}

/// One correlator channel. Channels live in a fixed pool indexed by `index` and are reused
/// for the lifetime of the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
	pub index: usize,
	pub prn: usize,
	pub system: GnssSystem,
	pub state: ChannelState,
	pub lock_status: LockStatus,

	pub accum: Accumulators,
	pub prev_accum: Accumulators,

	pub search: SearchState,
	pub confirm: ConfirmState,
	pub bit_sync: BitSyncState,

	pub freq_error: i64,
	pub carr_error: i64,
	pub code_error: i64,
	pub carr_freq_basis: u32,
	pub carr_freq: u32,
	pub code_freq_basis: u32,
	pub code_freq: u32,

	carrier_loop: CarrierLoopFilter,
	code_loop: CodeLoopFilter,
	lock: LockDetector,
}

/// Read-only snapshot handed to navigation-layer consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
	pub channel: usize,
	pub prn: usize,
	pub system: GnssSystem,
	pub state: ChannelState,
	pub lock_status: LockStatus,
	pub carrier_frequency_hz: f64,
	pub code_frequency_hz: f64,
	pub doppler_hz: f64,
	pub prompt_bit: Option<bool>,
}

impl Channel {

	pub fn new(index:usize, coeffs:&LoopFilterCoefficients) -> Self {
		Self {
			index,
			prn: 0,
			system: GnssSystem::Gps,
			state: ChannelState::Off,
			lock_status: LockStatus::default(),
			accum: Accumulators::default(),
			prev_accum: Accumulators::default(),
			search: SearchState::default(),
			confirm: ConfirmState::default(),
			bit_sync: BitSyncState::default(),
			freq_error: 0,
			carr_error: 0,
			code_error: 0,
			carr_freq_basis: 0,
			carr_freq: 0,
			code_freq_basis: 0,
			code_freq: 0,
			carrier_loop: CarrierLoopFilter::new(coeffs),
			code_loop: CodeLoopFilter::new(coeffs),
			lock: LockDetector::default(),
		}
	}

	pub fn is_idle(&self) -> bool { self.prn == 0 }
	pub fn is_exhausted(&self) -> bool { self.search.exhausted }
	pub fn lock_detector(&self) -> &LockDetector { &self.lock }

	/// Binds a satellite and starts the search from Doppler bin 0
	pub fn start(&mut self, prn:usize, system:GnssSystem, signal:&SignalReference) -> NcoCommands {
		self.start_with_hint(prn, system, signal, 0, 0)
	}

	/// Like `start`, but the Doppler spiral and the code rate are centered on the reference words
	/// plus the given offsets, e.g. from an almanac prediction
	pub fn start_with_hint(&mut self, prn:usize, system:GnssSystem, signal:&SignalReference, carrier_corr:i64, code_corr:i64) -> NcoCommands {
		self.prn = prn;
		self.system = system;
		self.search = SearchState { carrier_cold_corr: carrier_corr, code_cold_corr: code_corr, ..SearchState::default() };
		self.restart_search(signal)
	}

	/// Returns the channel to the idle pool
	pub fn release(&mut self) {
		self.prn = 0;
		self.state = ChannelState::Off;
		self.lock_status.clear();
		self.search = SearchState::default();
		self.confirm = ConfirmState::default();
		self.bit_sync = BitSyncState::default();
		self.reset_loops();
		self.accum = Accumulators::default();
		self.prev_accum = Accumulators::default();
		self.carr_freq_basis = 0;
		self.carr_freq = 0;
		self.code_freq_basis = 0;
		self.code_freq = 0;
	}

	pub fn report(&self, refs:&SignalReferences) -> ChannelReport {
		let signal = refs.for_system(self.system);
		let prompt_bit = match self.state {
			ChannelState::Tracking => self.bit_sync.bit,
			_ => None,
		};
		let doppler_hz = match self.state {
			ChannelState::Off => 0.0,
			_ => (self.carr_freq as f64 - signal.carrier_ref as f64) * refs.carrier_resolution_hz,
		};
		ChannelReport {
			channel: self.index,
			prn: self.prn,
			system: self.system,
			state: self.state,
			lock_status: self.lock_status,
			carrier_frequency_hz: self.carr_freq as f64 * refs.carrier_resolution_hz,
			code_frequency_hz: self.code_freq as f64 * refs.code_resolution_hz,
			doppler_hz,
			prompt_bit,
		}
	}

	fn reset_loops(&mut self) {
		self.carrier_loop.initialize();
		self.code_loop.initialize();
		self.freq_error = 0;
		self.carr_error = 0;
		self.code_error = 0;
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	use crate::config::ReceiverConfig;
	use crate::filters::CarrierErrors;
	use crate::gnss::gps_l1_ca::test_vectors;

	#[test]
	fn lock_status_bits() {
		let mut status = LockStatus::default();
		status.insert(LockStatus::CODE_LOCK | LockStatus::CARR_LOCK);
		assert!(status.contains(LockStatus::CODE_LOCK));
		assert!(!status.contains(LockStatus::CODE_LOCK | LockStatus::PHASE_LOCK));
		status.set(LockStatus::CARR_LOCK, false);
		assert_eq!(status, LockStatus(LockStatus::CODE_LOCK));
	}

	#[test]
	fn start_programs_reference_words() {
		let config = test_vectors::config(1);
		let refs = SignalReferences::from_config(&config);
		let mut chn = Channel::new(0, &LoopFilterCoefficients::from_config(&config));
		assert!(chn.is_idle());

		let cmd = chn.start(9, GnssSystem::Gps, &refs.gps);
		assert_eq!(chn.state, ChannelState::Acquisition);
		assert_eq!(cmd.carrier, Some(refs.gps.carrier_ref));
		assert_eq!(cmd.code, Some(refs.gps.code_ref));

		let report = chn.report(&refs);
		assert_eq!(report.prn, 9);
		assert_eq!(report.doppler_hz, 0.0);
		assert!((report.carrier_frequency_hz - test_vectors::SAMPLE_RATE_HZ / 4.0).abs() < 1.0);
		assert!((report.code_frequency_hz - 1.023e6).abs() < 1.0);

		chn.release();
		assert!(chn.is_idle());
		assert_eq!(chn.state, ChannelState::Off);
	}

	#[test]
	fn released_channel_reports_nothing_stale() {
		let config = test_vectors::config(1);
		let refs = SignalReferences::from_config(&config);
		let coeffs = LoopFilterCoefficients::from_config(&config);
		let mut chn = Channel::new(0, &coeffs);
		assert_eq!(chn.report(&refs).doppler_hz, 0.0);

		chn.start_with_hint(9, GnssSystem::Gps, &refs.gps, 250, -3);
		chn.carrier_loop.apply(CarrierErrors{ phase: 4000, freq: 0 });
		chn.code_loop.apply(2000);
		chn.carr_freq_basis = chn.carr_freq;
		chn.code_freq_basis = chn.code_freq;

		chn.release();
		assert_eq!((chn.carr_freq, chn.carr_freq_basis, chn.code_freq, chn.code_freq_basis), (0, 0, 0, 0));
		assert_eq!(chn.carrier_loop.nco(), 0);
		assert_eq!(chn.code_loop.old_error(), 0);
		assert_eq!(chn.search, SearchState::default());

		let report = chn.report(&refs);
		assert_eq!(report.doppler_hz, 0.0);
		assert_eq!(report.carrier_frequency_hz, 0.0);
		assert_eq!(report.prompt_bit, None);
	}

	#[test]
	fn hint_offsets_the_first_words() {
		let config = test_vectors::config(1);
		let refs = SignalReferences::from_config(&config);
		let mut chn = Channel::new(0, &LoopFilterCoefficients::from_config(&config));

		let cmd = chn.start_with_hint(9, GnssSystem::Gps, &refs.gps, 1200, -40);
		assert_eq!(cmd.carrier, Some(refs.gps.carrier_ref + 1200));
		assert_eq!(cmd.code, Some(refs.gps.code_ref - 40));
		assert_eq!(chn.search.carrier_cold_corr, 1200);
		assert_eq!(chn.search.code_cold_corr, -40);
		assert!((chn.report(&refs).doppler_hz - 1200.0 * refs.carrier_resolution_hz).abs() < 1e-6);
	}

	#[test]
	fn report_serializes_to_json() {
		let config = ReceiverConfig::default();
		let refs = SignalReferences::from_config(&config);
		let chn = Channel::new(4, &LoopFilterCoefficients::from_config(&config));
		let json = serde_json::to_string(&chn.report(&refs)).unwrap();
		assert!(json.contains("\"channel\":4"));
		assert!(json.contains("\"state\":\"Off\""));
	}

}
