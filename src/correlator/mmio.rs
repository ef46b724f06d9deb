
use std::ptr;

use super::Registers;

/// Correlator registers behind a memory-mapped bus (FPGA or SoC peripheral)
pub struct MmioRegisters {
	base: *mut u8,
	size: usize,
}

// The mapping is owned exclusively by whoever holds this value
unsafe impl Send for MmioRegisters {}

impl MmioRegisters {

	/// # Safety
	/// `base` must point to a mapping of at least `size` bytes that stays valid and
	/// is not aliased for as long as this value is alive.
	pub unsafe fn new(base:*mut u8, size:usize) -> Self { Self { base, size } }

	pub fn size(&self) -> usize { self.size }

	fn in_range(&self, offset:usize, width:usize) -> bool {
		offset % width == 0 && offset + width <= self.size
	}

}

impl Registers for MmioRegisters {

	fn read16(&mut self, offset:usize) -> u16 {
		if !self.in_range(offset, 2) { return 0; }
		unsafe { ptr::read_volatile(self.base.add(offset) as *const u16) }
	}

	fn write16(&mut self, offset:usize, value:u16) {
		if !self.in_range(offset, 2) { return; }
		unsafe { ptr::write_volatile(self.base.add(offset) as *mut u16, value) }
	}

	fn read32(&mut self, offset:usize) -> u32 {
		if !self.in_range(offset, 4) { return 0; }
		unsafe { ptr::read_volatile(self.base.add(offset) as *const u32) }
	}

	fn write32(&mut self, offset:usize, value:u32) {
		if !self.in_range(offset, 4) { return; }
		unsafe { ptr::write_volatile(self.base.add(offset) as *mut u32, value) }
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn volatile_access_over_plain_memory() {
		let mut backing:Vec<u32> = vec![0; 16];
		let mut regs = unsafe { MmioRegisters::new(backing.as_mut_ptr() as *mut u8, 64) };

		regs.write32(8, 0x0102_0304);
		regs.write16(12, 0xABCD);
		assert_eq!(regs.read32(8), 0x0102_0304);
		assert_eq!(regs.read16(12), 0xABCD);

		// Misaligned and out-of-range accesses never touch memory
		regs.write32(62, 0xFFFF_FFFF);
		assert_eq!(regs.read32(62), 0);
		assert_eq!(regs.read16(3), 0);

		drop(regs);
		assert_eq!(backing[2], 0x0102_0304);
	}

}
