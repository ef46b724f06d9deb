
use crate::correlator::Accumulators;

// One step of a 1/256 exponential smoother with rounding
fn smooth(p:i64, x:i64) -> i64 { p + ((x - p + 128) >> 8) }

/// Smoothed prompt powers. `pow_code` is the total prompt power and `pow_carr` is the
/// in-phase excess I^2 - Q^2, which only builds up once the carrier phase is held.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LockDetector {
	pub pow_code: i64,
	pub pow_carr: i64,
	carr_locked: bool,
	locked_intervals: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockIndication {
	pub carrier: bool,
	pub phase: bool,
}

impl LockDetector {

	pub fn initialize(&mut self, power:i64) {
		self.pow_code = power;
		self.pow_carr = power;
		self.carr_locked = false;
		self.locked_intervals = 0;
	}

	pub fn update(&mut self, accum:&Accumulators, lock_power:i64, loss_power:i64, phase_lock_intervals:u32) -> LockIndication {
		let i2 = (accum.i_prompt as i64) * (accum.i_prompt as i64);
		let q2 = (accum.q_prompt as i64) * (accum.q_prompt as i64);
		self.pow_code = smooth(self.pow_code, i2.saturating_add(q2));
		self.pow_carr = smooth(self.pow_carr, i2 - q2);

		// Hysteresis between the lock and loss thresholds
		if self.pow_carr > lock_power {
			self.carr_locked = true;
		} else if self.pow_carr < loss_power {
			self.carr_locked = false;
		}

		self.locked_intervals = if self.carr_locked { self.locked_intervals.saturating_add(1) } else { 0 };

		LockIndication {
			carrier: self.carr_locked,
			phase: self.carr_locked && self.locked_intervals >= phase_lock_intervals,
		}
	}

}
