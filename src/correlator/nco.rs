
/// Frequency step of one control-word unit for an NCO clocked at `clock_hz * multiplier`
pub fn resolution_hz(clock_hz:f64, multiplier:u32, digit_capacity:u32) -> f64 {
	clock_hz * (multiplier as f64) / 2.0_f64.powi(digit_capacity as i32)
}

// Cosine and sine of the center of each eighth of a cycle, scaled by two
const COS_TABLE:[i32; 8] = [ 2,  1, -1, -2, -2, -1,  1,  2];
const SIN_TABLE:[i32; 8] = [ 1,  2,  2,  1, -1, -2, -2, -1];

/// A `digit_capacity`-bit phase accumulator kept in the top bits of a `u32` so that
/// its wraparound coincides with unsigned overflow
#[derive(Debug, Clone)]
pub struct PhaseAccumulator {
	phase: u32,
	increment: u32,
	shift: u32,
	multiplier: u32,
}

impl PhaseAccumulator {

	pub fn new(digit_capacity:u32, multiplier:u32) -> Self {
		Self { phase: 0, increment: 0, shift: 32 - digit_capacity, multiplier }
	}

	pub fn set_control_word(&mut self, word:u32) {
		self.increment = (word << self.shift).wrapping_mul(self.multiplier);
	}

	/// Advances by `n` increments and returns true on wraparound
	pub fn advance_by(&mut self, n:u32) -> bool {
		let (next, wrapped) = self.phase.overflowing_add(self.increment.wrapping_mul(n));
		self.phase = next;
		wrapped
	}

	pub fn phase(&self) -> u32 { self.phase }
	pub fn reset(&mut self) { self.phase = 0; }

}

#[derive(Debug, Clone)]
pub struct CarrierNco {
	acc: PhaseAccumulator,
	cycles: u32,
}

impl CarrierNco {

	pub fn new(digit_capacity:u32, multiplier:u32) -> Self {
		Self { acc: PhaseAccumulator::new(digit_capacity, multiplier), cycles: 0 }
	}

	pub fn set_control_word(&mut self, word:u32) { self.acc.set_control_word(word); }

	/// Local oscillator (cos, sin) for the current phase
	pub fn mixer(&self) -> (i32, i32) {
		let idx = (self.acc.phase() >> 29) as usize;
		(COS_TABLE[idx], SIN_TABLE[idx])
	}

	pub fn advance(&mut self) {
		if self.acc.advance_by(1) {
			self.cycles = self.cycles.wrapping_add(1);
		}
	}

	pub fn phase(&self) -> u32 { self.acc.phase() }
	pub fn cycles(&self) -> u32 { self.cycles }
	pub fn reset_cycles(&mut self) { self.cycles = 0; }

	pub fn reset(&mut self) {
		self.acc.reset();
		self.cycles = 0;
	}

}

/// Code NCO advanced at double rate, so one wraparound is one half-chip
#[derive(Debug, Clone)]
pub struct CodeNco {
	acc: PhaseAccumulator,
	half_chips: u32,
}

impl CodeNco {

	pub fn new(digit_capacity:u32, multiplier:u32) -> Self {
		Self { acc: PhaseAccumulator::new(digit_capacity, multiplier), half_chips: 0 }
	}

	pub fn set_control_word(&mut self, word:u32) { self.acc.set_control_word(word); }

	/// Returns true when a half-chip boundary was crossed
	pub fn advance(&mut self) -> bool {
		let tick = self.acc.advance_by(2);
		if tick { self.half_chips += 1; }
		tick
	}

	pub fn half_chips(&self) -> u32 { self.half_chips }
	pub fn phase(&self) -> u32 { self.acc.phase() }
	pub fn restart_epoch(&mut self) { self.half_chips = 0; }

	pub fn reset(&mut self) {
		self.acc.reset();
		self.half_chips = 0;
	}

}
