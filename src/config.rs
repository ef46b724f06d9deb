
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::DigSigProcErr;
use crate::correlator::nco;
use crate::gnss::GnssSystem;
use crate::gnss::constants::{gps, glonass};

pub const MAX_CHANNELS:usize = 32;
pub const MAX_SATELLITES:usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleMode {
	IOnly,
	Iq,
}

/// How the PRN key register is interpreted by the correlator behind the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrnKeyStyle {
	/// G2 register initial state, used by the software correlator
	InitialState,
	/// G2 delay key as loaded into FPGA code generators
	Hardware,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopBandwidths {
	pub pll_hz: f64,
	pub fll_hz: f64,
	pub dll_hz: f64,
	pub integration_time_ms: f64,
}

impl Default for LoopBandwidths {
	fn default() -> Self {
		Self { pll_hz: 25.0, fll_hz: 1400.0, dll_hz: 2.0, integration_time_ms: 1.0 }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
	pub n_channels: usize,
	pub sample_rate_hz: f64,
	pub clock_multiplier: u32,
	pub carrier_digit_capacity: u32,
	pub code_digit_capacity: u32,
	pub sample_mode: SampleMode,
	pub prn_key_style: PrnKeyStyle,

	// Signal plan
	pub gps_intermediate_freq_hz: f64,
	pub gps_chip_rate_hz: f64,
	pub glonass_intermediate_freq_hz: f64,
	pub glonass_chip_rate_hz: f64,

	// Acquisition search
	pub freq_bin_width_hz: f64,
	pub search_max_f: i32,
	pub gps_search_max_delay: u32,
	pub glonass_search_max_delay: u32,
	pub max_search_sweeps: u32,
	pub acq_threshold: i64,
	pub confirm_m: u32,
	pub n_of_m_thresh: u32,

	// Pull-in and bit synchronization
	pub pull_in_timeout: u32,
	pub bit_sync_edge_count: u32,
	pub min_bit_period: u32,

	// Loop filters and discriminators
	pub loop_bandwidths: LoopBandwidths,
	pub carrier_loop_normalizer: i64,
	pub code_loop_normalizer: i64,
	pub code_k1_bias: i64,
	pub freq_discriminator_shift: u32,
	pub carrier_error_divisor: i64,
	pub accumulator_shift: u32,

	// Lock detection on smoothed prompt powers
	pub carr_lock_power: i64,
	pub carr_loss_power: i64,
	pub phase_lock_intervals: u32,

	// Correlator timing
	pub tic_period_s: f64,
	pub accum_interval_s: f64,

	// Allocator
	pub prn_stride: usize,
	/// Seconds between allocator runs; zero disables the periodic run
	pub alloc_period_s: f64,
}

impl Default for ReceiverConfig {
	fn default() -> Self {
		Self {
			n_channels: 12,
			sample_rate_hz: 16.0e6,
			clock_multiplier: 3,
			carrier_digit_capacity: 30,
			code_digit_capacity: 29,
			sample_mode: SampleMode::Iq,
			prn_key_style: PrnKeyStyle::InitialState,

			gps_intermediate_freq_hz: 2.42e6,
			gps_chip_rate_hz: gps::CHIP_RATE_HZ,
			glonass_intermediate_freq_hz: 0.0,
			glonass_chip_rate_hz: glonass::CHIP_RATE_HZ,

			freq_bin_width_hz: 1000.0,
			search_max_f: 5,
			gps_search_max_delay: 2045,
			glonass_search_max_delay: 1021,
			max_search_sweeps: 1,
			acq_threshold: 2500,
			confirm_m: 3,
			n_of_m_thresh: 2,

			pull_in_timeout: 3000,
			bit_sync_edge_count: 30,
			min_bit_period: 19,

			loop_bandwidths: LoopBandwidths::default(),
			carrier_loop_normalizer: 51472,
			code_loop_normalizer: 8192,
			code_k1_bias: 1,
			freq_discriminator_shift: 8,
			carrier_error_divisor: 2,
			accumulator_shift: 0,

			carr_lock_power: 2500 * 2500,
			carr_loss_power: 1250 * 1250,
			phase_lock_intervals: 1000,

			tic_period_s: 0.1,
			accum_interval_s: 500.0e-6,

			prn_stride: 1,
			alloc_period_s: 1.0,
		}
	}
}

impl ReceiverConfig {

	pub fn from_json_file<P: AsRef<Path>>(path:P) -> Result<Self, DigSigProcErr> {
		let file = File::open(path).map_err(|e| DigSigProcErr::SampleSource(format!("unable to open config: {}", e)))?;
		let config:Self = serde_json::from_reader(BufReader::new(file)).map_err(|_| DigSigProcErr::InvalidConfig("unable to parse JSON config"))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), DigSigProcErr> {
		if self.n_channels == 0 || self.n_channels > MAX_CHANNELS {
			return Err(DigSigProcErr::InvalidConfig("n_channels must be between 1 and 32"));
		}
		if self.carrier_digit_capacity == 0 || self.carrier_digit_capacity > 32 || self.code_digit_capacity == 0 || self.code_digit_capacity > 32 {
			return Err(DigSigProcErr::InvalidConfig("NCO digit capacity must be between 1 and 32 bits"));
		}
		if self.clock_multiplier == 0 {
			return Err(DigSigProcErr::InvalidConfig("clock_multiplier must be nonzero"));
		}
		// One code NCO wrap per sample at most, otherwise half-chips are skipped
		if self.sample_rate_hz <= 2.0 * self.gps_chip_rate_hz {
			return Err(DigSigProcErr::InvalidConfig("sample rate must exceed the half-chip rate"));
		}
		if self.confirm_m == 0 || self.n_of_m_thresh > self.confirm_m {
			return Err(DigSigProcErr::InvalidConfig("n_of_m_thresh must not exceed confirm_m"));
		}
		if self.prn_stride == 0 || gcd(self.prn_stride, MAX_SATELLITES) != 1 {
			return Err(DigSigProcErr::InvalidConfig("prn_stride must be coprime with the number of satellites"));
		}
		if self.search_max_f < 0 || self.freq_bin_width_hz <= 0.0 {
			return Err(DigSigProcErr::InvalidConfig("invalid Doppler search range"));
		}
		if self.carrier_loop_normalizer == 0 || self.code_loop_normalizer == 0 || self.carrier_error_divisor == 0 {
			return Err(DigSigProcErr::InvalidConfig("loop normalizers must be nonzero"));
		}
		if self.alloc_period_s < 0.0 {
			return Err(DigSigProcErr::InvalidConfig("alloc_period_s must not be negative"));
		}
		if self.accum_interval_s <= 0.0 || self.accum_interval_s > 1.0e-3 || self.tic_period_s <= 0.0 {
			return Err(DigSigProcErr::InvalidConfig("accumulation interval must be positive and no longer than one code period"));
		}
		Ok(())
	}

	pub fn samples_per_interval(&self) -> usize { (self.sample_rate_hz * self.accum_interval_s).round() as usize }
	/// Allocator cadence in accumulation intervals
	pub fn alloc_period_intervals(&self) -> u64 { (self.alloc_period_s / self.accum_interval_s).round() as u64 }
	pub fn samples_per_tic(&self) -> u32 { (self.sample_rate_hz * self.tic_period_s).round() as u32 }

	pub fn carrier_resolution_hz(&self) -> f64 { nco::resolution_hz(self.sample_rate_hz, self.clock_multiplier, self.carrier_digit_capacity) }
	pub fn code_resolution_hz(&self) -> f64 { nco::resolution_hz(self.sample_rate_hz, self.clock_multiplier, self.code_digit_capacity) }

}

fn gcd(a:usize, b:usize) -> usize { if b == 0 { a } else { gcd(b, a % b) } }

/// Reference control words for one signal, computed once from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReference {
	pub code_ref: u32,
	pub carrier_ref: u32,
	pub doppler_step: u32,
	pub search_max_delay: u32,
	pub code_period_half_chips: u32,
	pub ms_per_bit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReferences {
	pub gps: SignalReference,
	pub glonass: SignalReference,
	pub carrier_resolution_hz: f64,
	pub code_resolution_hz: f64,
}

impl SignalReferences {

	pub fn from_config(config:&ReceiverConfig) -> Self {
		let carrier_resolution_hz = config.carrier_resolution_hz();
		let code_resolution_hz = config.code_resolution_hz();
		let doppler_step = (config.freq_bin_width_hz / carrier_resolution_hz) as u32;

		let gps = SignalReference {
			code_ref: (config.gps_chip_rate_hz / code_resolution_hz) as u32,
			carrier_ref: (config.gps_intermediate_freq_hz / carrier_resolution_hz) as u32,
			doppler_step,
			search_max_delay: config.gps_search_max_delay,
			code_period_half_chips: 2*gps::CODE_LENGTH as u32,
			ms_per_bit: gps::MS_PER_BIT,
		};

		let glonass = SignalReference {
			code_ref: (config.glonass_chip_rate_hz / code_resolution_hz) as u32,
			carrier_ref: (config.glonass_intermediate_freq_hz / carrier_resolution_hz) as u32,
			doppler_step,
			search_max_delay: config.glonass_search_max_delay,
			code_period_half_chips: 2*glonass::CODE_LENGTH as u32,
			ms_per_bit: glonass::MS_PER_BIT,
		};

		Self { gps, glonass, carrier_resolution_hz, code_resolution_hz }
	}

	pub fn for_system(&self, system:GnssSystem) -> &SignalReference {
		match system {
			GnssSystem::Gps     => &self.gps,
			GnssSystem::Glonass => &self.glonass,
		}
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn default_config_is_valid() {
		assert_eq!(ReceiverConfig::default().validate(), Ok(()));
	}

	#[test]
	fn reference_words_match_nco_resolution() {
		let config = ReceiverConfig{ sample_rate_hz: 4.092e6, clock_multiplier: 1, gps_intermediate_freq_hz: 1.023e6, ..ReceiverConfig::default() };
		let refs = SignalReferences::from_config(&config);

		// fs/4 on both NCOs is an exact power-of-two fraction
		assert_eq!(refs.gps.code_ref, 1 << 27);
		assert_eq!(refs.gps.carrier_ref, 1 << 28);
		assert_eq!(refs.glonass.carrier_ref, 0);
		assert_eq!(refs.glonass.search_max_delay, 1021);
		assert_eq!(refs.gps.doppler_step, (1000.0 / refs.carrier_resolution_hz) as u32);
	}

	#[test]
	fn allocator_runs_once_per_second() {
		let config = ReceiverConfig::default();
		assert_eq!(config.alloc_period_intervals(), 2000);

		let slower = ReceiverConfig{ accum_interval_s: 1.0e-3, ..ReceiverConfig::default() };
		assert_eq!(slower.alloc_period_intervals(), 1000);

		let off = ReceiverConfig{ alloc_period_s: 0.0, ..ReceiverConfig::default() };
		assert_eq!(off.alloc_period_intervals(), 0);
		assert!(ReceiverConfig{ alloc_period_s: -1.0, ..ReceiverConfig::default() }.validate().is_err());
	}

	#[test]
	fn rejects_oversized_channel_pool() {
		let config = ReceiverConfig{ n_channels: 33, ..ReceiverConfig::default() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let config:ReceiverConfig = serde_json::from_str(r#"{ "n_channels": 4, "loop_bandwidths": { "pll_hz": 18.0 } }"#).unwrap();
		assert_eq!(config.n_channels, 4);
		assert_eq!(config.loop_bandwidths.pll_hz, 18.0);
		assert_eq!(config.loop_bandwidths.fll_hz, 1400.0);
		assert_eq!(config.acq_threshold, 2500);
	}

}
