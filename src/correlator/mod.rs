
use serde::{Serialize, Deserialize};

use tracing::warn;

pub mod memory;
pub mod mmio;
pub mod nco;
pub mod register_map;
pub mod software;

use self::register_map as reg;

/// Typed access to a correlator's 16/32-bit register file. Reads take `&mut self` because
/// latched hardware registers may clear on read.
pub trait Registers {

	fn read16(&mut self, offset:usize) -> u16;
	fn write16(&mut self, offset:usize, value:u16);

	fn read32(&mut self, offset:usize) -> u32 {
		let lo = self.read16(offset) as u32;
		let hi = self.read16(offset + 2) as u32;
		(hi << 16) | lo
	}

	fn write32(&mut self, offset:usize, value:u32) {
		self.write16(offset, (value & 0xFFFF) as u16);
		self.write16(offset + 2, (value >> 16) as u16);
	}

}

/// One dump worth of correlation sums
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulators {
	pub i_early: i32,
	pub q_early: i32,
	pub i_prompt: i32,
	pub q_prompt: i32,
	pub i_late: i32,
	pub q_late: i32,
}

impl Accumulators {

	pub fn prompt(i_prompt:i32, q_prompt:i32) -> Self { Self { i_prompt, q_prompt, ..Self::default() } }

}

/// Phase measurements latched at a TIC boundary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicMeasurement {
	pub carrier_phase: u32,
	pub carrier_cycles: u32,
	pub code_half_chips: u32,
	pub code_phase: u32,
	pub epoch: u16,
}

/// Channel-level driver on top of a raw register file
pub struct CorrelatorBus<R: Registers> {
	regs: R,
	accumulator_shift: u32,
}

impl<R: Registers> CorrelatorBus<R> {

	pub fn new(regs:R, accumulator_shift:u32) -> Self { Self { regs, accumulator_shift } }

	pub fn registers(&self) -> &R { &self.regs }
	pub fn registers_mut(&mut self) -> &mut R { &mut self.regs }
	pub fn into_registers(self) -> R { self.regs }

	// Global registers
	pub fn new_data(&mut self) -> u32 { self.regs.read32(reg::NEW_DATA) }
	pub fn status(&mut self) -> u16 { self.regs.read16(reg::STATUS) }
	pub fn tic_pending(&mut self) -> bool { self.status() & reg::STATUS_TIC != 0 }

	pub fn missed(&mut self) -> u32 {
		let missed = self.regs.read32(reg::ACCUM_MISSED);
		if missed > 0 {
			warn!("{} accumulator dumps were overwritten before being read", missed);
		}
		missed
	}

	pub fn reset(&mut self) { self.regs.write16(reg::RESET, 1); }
	pub fn program_tic(&mut self, samples:u32) { self.regs.write32(reg::PROG_TIC, samples); }
	pub fn program_accum_interval(&mut self, samples:u32) { self.regs.write32(reg::PROG_ACCUM_INT, samples); }

	// Per-channel registers
	pub fn set_prn_key(&mut self, ch:usize, key:u16) { self.regs.write16(reg::channel_register(ch, reg::PRN_KEY), key); }
	pub fn set_carrier(&mut self, ch:usize, word:u32) { self.regs.write32(reg::channel_register(ch, reg::CARR_NCO), word); }
	pub fn set_code(&mut self, ch:usize, word:u32) { self.regs.write32(reg::channel_register(ch, reg::CODE_NCO), word); }
	pub fn slew(&mut self, ch:usize, half_chips:u16) { self.regs.write16(reg::channel_register(ch, reg::CODE_SLEW), half_chips); }

	/// Loads the millisecond (low byte) and bit (high byte) epoch counters
	pub fn epoch_load(&mut self, ch:usize, ms:u8, bits:u8) {
		self.regs.write16(reg::channel_register(ch, reg::EPOCH_LOAD), ((bits as u16) << 8) | ms as u16);
	}

	pub fn epoch(&mut self, ch:usize) -> u16 { self.regs.read16(reg::channel_register(ch, reg::EPOCH)) }

	pub fn accumulators(&mut self, ch:usize) -> Accumulators {
		let shift = self.accumulator_shift;
		let mut read = |r:usize| (self.regs.read32(reg::channel_register(ch, r)) as i32) >> shift;
		Accumulators {
			i_early:  read(reg::I_EARLY),
			q_early:  read(reg::Q_EARLY),
			i_prompt: read(reg::I_PROMPT),
			q_prompt: read(reg::Q_PROMPT),
			i_late:   read(reg::I_LATE),
			q_late:   read(reg::Q_LATE),
		}
	}

	pub fn measurement(&mut self, ch:usize) -> TicMeasurement {
		let code_meas = self.regs.read32(reg::channel_register(ch, reg::CODE_MEAS));
		TicMeasurement {
			carrier_phase:   self.regs.read32(reg::channel_register(ch, reg::CARR_MEAS)),
			carrier_cycles:  self.regs.read32(reg::channel_register(ch, reg::CARR_CYCLE)),
			code_half_chips: code_meas >> 10,
			code_phase:      code_meas & 0x3FF,
			epoch:           self.regs.read16(reg::channel_register(ch, reg::EPOCH_MEAS)),
		}
	}

}

#[cfg(test)]
mod tests {

	use super::*;
	use super::memory::MemoryRegisters;

	#[test]
	fn write32_splits_into_halves() {
		let mut bus = CorrelatorBus::new(MemoryRegisters::new(), 0);
		bus.set_carrier(3, 0x1234_5678);

		let base = reg::channel_register(3, reg::CARR_NCO);
		assert_eq!(bus.registers_mut().read16(base), 0x5678);
		assert_eq!(bus.registers_mut().read16(base + 2), 0x1234);
	}

	#[test]
	fn accumulators_are_sign_extended_and_scaled() {
		let mut bus = CorrelatorBus::new(MemoryRegisters::new(), 2);
		bus.registers_mut().write32(reg::channel_register(1, reg::I_PROMPT), (-400i32) as u32);
		bus.registers_mut().write32(reg::channel_register(1, reg::Q_LATE), 4000);

		let accum = bus.accumulators(1);
		assert_eq!(accum.i_prompt, -100);
		assert_eq!(accum.q_late, 1000);
		assert_eq!(accum.i_early, 0);
	}

	#[test]
	fn epoch_load_packs_bytes() {
		let mut bus = CorrelatorBus::new(MemoryRegisters::new(), 0);
		bus.epoch_load(0, 1, 7);
		assert_eq!(bus.registers_mut().read16(reg::channel_register(0, reg::EPOCH_LOAD)), 0x0701);
	}

}
