
use std::f64::consts::SQRT_2;

use crate::config::ReceiverConfig;

/// A fixed-point loop filter driven once per accumulation interval. The output is a
/// correction in NCO control-word units relative to the basis latched at pull-in.
pub trait LoopFilter<E> {

	fn apply(&mut self, error:E) -> i64;
	fn initialize(&mut self);
	fn old_error(&self) -> i64;

}

/// Filter gains in NCO control-word units, derived once from the loop bandwidths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFilterCoefficients {
	pub carr_k1: i64,
	pub carr_k2: i64,
	pub carr_k3: i64,
	pub carr_normalizer: i64,
	pub code_k1: i64,
	pub code_k2: i64,
	pub code_bias: i64,
	pub code_normalizer: i64,
}

impl LoopFilterCoefficients {

	pub fn from_config(config:&ReceiverConfig) -> Self {
		let bw = &config.loop_bandwidths;
		let t = bw.integration_time_ms * 1.0e-3;
		let clock = config.sample_rate_hz * config.clock_multiplier as f64;
		let carr_scale = 2.0_f64.powi(config.carrier_digit_capacity as i32) / clock;
		let code_scale = 2.0_f64.powi(config.code_digit_capacity as i32) / clock;

		// FLL-assisted PLL
		let wnp = bw.pll_hz / 0.53;
		let wnf = bw.fll_hz / 0.25;
		let carr_k1 = t*wnp*wnp + SQRT_2*wnp;
		let carr_k2 = SQRT_2*wnp;
		let carr_k3 = t*wnf;

		// Second order DLL
		let wnd = bw.dll_hz / 0.53;
		let code_k1 = t*wnd*wnd + SQRT_2*wnd;
		let code_k2 = SQRT_2*wnd;

		Self {
			carr_k1: (carr_k1 * carr_scale) as i64,
			carr_k2: (carr_k2 * carr_scale) as i64,
			carr_k3: (carr_k3 * carr_scale) as i64,
			carr_normalizer: config.carrier_loop_normalizer,
			code_k1: (code_k1 * code_scale) as i64,
			code_k2: (code_k2 * code_scale) as i64,
			code_bias: config.code_k1_bias,
			code_normalizer: config.code_loop_normalizer,
		}
	}

}

/// Input to the carrier filter: phase error and frequency error, both in 1 rad = 16384 units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierErrors {
	pub phase: i64,
	pub freq: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierLoopFilter {
	k1: i64,
	k2: i64,
	k3: i64,
	normalizer: i64,
	nco: i64,
	old_error: i64,
}

impl CarrierLoopFilter {

	pub fn new(c:&LoopFilterCoefficients) -> Self {
		Self { k1: c.carr_k1, k2: c.carr_k2, k3: c.carr_k3, normalizer: c.carr_normalizer, nco: 0, old_error: 0 }
	}

	pub fn nco(&self) -> i64 { self.nco }

}

impl LoopFilter<CarrierErrors> for CarrierLoopFilter {

	fn apply(&mut self, e:CarrierErrors) -> i64 {
		self.nco += (self.k1*e.phase - self.k2*self.old_error - self.k3*e.freq) / self.normalizer;
		self.old_error = e.phase;
		self.nco
	}

	fn initialize(&mut self) {
		self.nco = 0;
		self.old_error = 0;
	}

	fn old_error(&self) -> i64 { self.old_error }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLoopFilter {
	k1: i64,
	k2: i64,
	normalizer: i64,
	nco: i64,
	old_error: i64,
}

impl CodeLoopFilter {

	pub fn new(c:&LoopFilterCoefficients) -> Self {
		Self { k1: c.code_k1 + c.code_bias, k2: c.code_k2, normalizer: c.code_normalizer, nco: 0, old_error: 0 }
	}

	pub fn nco(&self) -> i64 { self.nco }

}

impl LoopFilter<i64> for CodeLoopFilter {

	fn apply(&mut self, e:i64) -> i64 {
		self.nco += (self.k1*e - self.k2*self.old_error) / self.normalizer;
		self.old_error = e;
		self.nco
	}

	fn initialize(&mut self) {
		self.nco = 0;
		self.old_error = 0;
	}

	fn old_error(&self) -> i64 { self.old_error }

}
