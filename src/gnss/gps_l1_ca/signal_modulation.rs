
use crate::DigSigProcErr;
use crate::config::PrnKeyStyle;
use crate::gnss::constants::gps;

// G2 register state one chip into the code period, indexed by PRN (index 0 unused)
pub const G2_INITIAL_STATE:[u16; 33] = [
	0x000,
	0x3f6, 0x3ec, 0x3d8, 0x3b0, 0x04b, 0x096, 0x2cb, 0x196,
	0x32c, 0x3ba, 0x374, 0x1d0, 0x3a0, 0x340, 0x280, 0x100,
	0x113, 0x226, 0x04c, 0x098, 0x130, 0x260, 0x267, 0x338,
	0x270, 0x0e0, 0x1c0, 0x380, 0x22b, 0x056, 0x0ac, 0x158,
];

// G2 delay keys as loaded into FPGA code generators, PRN 1 first
pub const HARDWARE_PRN_KEY:[u16; 32] = [
	0x3EC, 0x3D8, 0x3B0, 0x360, 0x096, 0x12C, 0x196, 0x32C,
	0x258, 0x374, 0x2E8, 0x3A0, 0x340, 0x280, 0x100, 0x200,
	0x226, 0x04C, 0x098, 0x130, 0x260, 0x0C0, 0x0CE, 0x270,
	0x0E0, 0x1C0, 0x380, 0x300, 0x056, 0x0AC, 0x158, 0x2B0,
];

pub fn prn_key(prn:usize, style:PrnKeyStyle) -> Result<u16, DigSigProcErr> {
	if prn < 1 || prn > 32 { return Err(DigSigProcErr::InvalidPrn(prn)); }
	Ok(match style {
		PrnKeyStyle::InitialState => G2_INITIAL_STATE[prn],
		PrnKeyStyle::Hardware     => HARDWARE_PRN_KEY[prn-1],
	})
}

/// C/A code as 0/1 chips for a G2 initial state. G1 starts at all ones.
pub fn ca_code_from_key(key:u16) -> [u8; gps::CODE_LENGTH] {
	let mut code = [0u8; gps::CODE_LENGTH];
	let mut g1:u32 = 0x1FF;
	let mut g2:u32 = (key & 0x3FF) as u32;

	// The key is one chip in, so the generator fills chips 1..1023 and
	// its last output is chip 0, which is a one for every code in the family
	code[0] = 1;
	for chip in 1..gps::CODE_LENGTH {
		code[chip] = ((g1 ^ g2) & 1) as u8;
		g1 = (g1 >> 1) | (((g1 << 2) ^ (g1 << 9)) & 0x200);
		g2 = (g2 >> 1) | (((g2 << 1) ^ (g2 << 2) ^ (g2 << 5) ^ (g2 << 7) ^ (g2 << 8) ^ (g2 << 9)) & 0x200);
	}
	code
}

pub fn ca_code(prn:usize) -> Result<[u8; gps::CODE_LENGTH], DigSigProcErr> {
	Ok(ca_code_from_key(prn_key(prn, PrnKeyStyle::InitialState)?))
}

/// Early, prompt and late chips (+1/-1) for every half-chip position of one code period.
/// Consecutive replicas are one half-chip apart.
#[derive(Debug, Clone)]
pub struct HalfChipTables {
	pub early:  Vec<i8>,
	pub prompt: Vec<i8>,
	pub late:   Vec<i8>,
}

impl HalfChipTables {

	pub fn from_key(key:u16) -> Self {
		let code = ca_code_from_key(key);
		let n = 2*gps::CODE_LENGTH;
		let chip = |hc:usize| -> i8 { if code[(hc % n) >> 1] == 1 { 1 } else { -1 } };

		Self {
			early:  (0..n).map(|hc| chip(hc)).collect(),
			prompt: (0..n).map(|hc| chip(hc + 1)).collect(),
			late:   (0..n).map(|hc| chip(hc + 2)).collect(),
		}
	}

	pub fn len(&self) -> usize { self.prompt.len() }

}
