
use byteorder::{ByteOrder, LittleEndian};

use super::Registers;
use super::register_map::REGISTER_SPACE;

/// Plain in-memory register file with no side effects; reads return whatever was last written
pub struct MemoryRegisters {
	bytes: Vec<u8>,
}

impl MemoryRegisters {

	pub fn new() -> Self { Self { bytes: vec![0; REGISTER_SPACE] } }

	pub fn clear(&mut self) {
		for b in self.bytes.iter_mut() { *b = 0; }
	}

}

impl Default for MemoryRegisters {
	fn default() -> Self { Self::new() }
}

impl Registers for MemoryRegisters {

	// Accesses outside the register space read as zero and drop writes, like an unmapped bus
	fn read16(&mut self, offset:usize) -> u16 {
		match self.bytes.get(offset..offset+2) {
			Some(b) => LittleEndian::read_u16(b),
			None => 0
		}
	}

	fn write16(&mut self, offset:usize, value:u16) {
		if let Some(b) = self.bytes.get_mut(offset..offset+2) {
			LittleEndian::write_u16(b, value);
		}
	}

	fn read32(&mut self, offset:usize) -> u32 {
		match self.bytes.get(offset..offset+4) {
			Some(b) => LittleEndian::read_u32(b),
			None => 0
		}
	}

	fn write32(&mut self, offset:usize, value:u32) {
		if let Some(b) = self.bytes.get_mut(offset..offset+4) {
			LittleEndian::write_u32(b, value);
		}
	}

}
