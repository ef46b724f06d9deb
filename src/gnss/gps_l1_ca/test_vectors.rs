
use std::f64::consts::PI;

use num_complex::Complex;

use crate::config::{ReceiverConfig, SampleMode};
use crate::gnss::gps_l1_ca::signal_modulation::{self, HalfChipTables};

// Four samples per chip with the IF at a quarter of the sample rate keeps every
// reference control word an exact power of two
pub const SAMPLE_RATE_HZ:f64 = 4.092e6;
pub const SAMPLES_PER_MS:usize = 4092;

pub fn config(n_channels:usize) -> ReceiverConfig {
	ReceiverConfig {
		n_channels,
		sample_rate_hz: SAMPLE_RATE_HZ,
		clock_multiplier: 1,
		gps_intermediate_freq_hz: SAMPLE_RATE_HZ / 4.0,
		sample_mode: SampleMode::Iq,
		..ReceiverConfig::default()
	}
}

/// Noise-free C/A signal aligned with the prompt replica of a channel started at sample zero,
/// at zero Doppler, with data bits alternating every 20 ms
pub struct SyntheticSignal {
	tables: HalfChipTables,
	amplitude: f64,
	idx: usize,
}

impl SyntheticSignal {

	pub fn new(prn:usize, amplitude:f64) -> Self {
		Self { tables: HalfChipTables::from_key(signal_modulation::G2_INITIAL_STATE[prn]), amplitude, idx: 0 }
	}

	pub fn take_ms(&mut self, ms:usize) -> Vec<Complex<i8>> {
		self.by_ref().take(ms*SAMPLES_PER_MS).collect()
	}

}

impl Iterator for SyntheticSignal {
	type Item = Complex<i8>;

	fn next(&mut self) -> Option<Complex<i8>> {
		let k = self.idx;
		self.idx += 1;

		let chip = self.tables.prompt[(k / 2) % self.tables.len()] as f64;
		let bit = if (k / SAMPLES_PER_MS / 20) % 2 == 0 { 1.0 } else { -1.0 };

		// Phase offset puts the carrier at the center of the mixer table's first octant
		let theta = (1.0_f64).atan2(2.0) + (k % 4) as f64 * PI / 2.0;
		let a = self.amplitude * chip * bit;
		Some(Complex::new((a * theta.cos()).round() as i8, (a * theta.sin()).round() as i8))
	}
}
