
use std::collections::HashMap;
use std::sync::Arc;

use num_complex::Complex;

use crate::config::{ReceiverConfig, SampleMode};
use crate::gnss::constants::gps;
use crate::gnss::gps_l1_ca::signal_modulation::{self, HalfChipTables};

use super::Registers;
use super::memory::MemoryRegisters;
use super::nco::{CarrierNco, CodeNco};
use super::register_map as reg;

struct EngineChannel {
	tables: Option<Arc<HalfChipTables>>,
	carrier: CarrierNco,
	code: CodeNco,
	slew: u32,
	sums: [i32; 6],
	ms_counter: u32,
	bit_counter: u32,
}

impl EngineChannel {

	fn new(config:&ReceiverConfig) -> Self {
		Self {
			tables: None,
			carrier: CarrierNco::new(config.carrier_digit_capacity, config.clock_multiplier),
			code: CodeNco::new(config.code_digit_capacity, config.clock_multiplier),
			slew: 0,
			sums: [0; 6],
			ms_counter: 0,
			bit_counter: 0,
		}
	}

	fn restart(&mut self) {
		self.carrier.reset();
		self.code.reset();
		self.slew = 0;
		self.sums = [0; 6];
		self.ms_counter = 0;
		self.bit_counter = 0;
	}

	fn epoch(&self) -> u16 { (self.ms_counter | (self.bit_counter << 8)) as u16 }

}

/// Sample-by-sample emulation of a GPS C/A correlator behind the same register map a
/// hardware correlator exposes. NEW_DATA, ACCUM_MISSED and STATUS clear when read.
pub struct SoftwareCorrelator {
	regs: MemoryRegisters,
	channels: Vec<EngineChannel>,
	code_tables: HashMap<u16, Arc<HalfChipTables>>,
	sample_mode: SampleMode,
	tic_period: u32,
	tic_counter: u32,
	sample_count: u64,
}

impl SoftwareCorrelator {

	pub fn new(config:&ReceiverConfig) -> Self {
		// Replica tables for the whole constellation are built once, up front
		let code_tables:HashMap<u16, Arc<HalfChipTables>> = signal_modulation::G2_INITIAL_STATE.iter().skip(1)
			.map(|key| (*key, Arc::new(HalfChipTables::from_key(*key))))
			.collect();

		let mut ans = Self {
			regs: MemoryRegisters::new(),
			channels: (0..config.n_channels).map(|_| EngineChannel::new(config)).collect(),
			code_tables,
			sample_mode: config.sample_mode,
			tic_period: 0,
			tic_counter: 0,
			sample_count: 0,
		};

		ans.write32(reg::PROG_TIC, config.samples_per_tic());
		ans.write32(reg::PROG_ACCUM_INT, config.samples_per_interval() as u32);
		ans
	}

	pub fn n_channels(&self) -> usize { self.channels.len() }
	pub fn sample_count(&self) -> u64 { self.sample_count }

	/// Number of samples per accumulation interval as programmed through PROG_ACCUM_INT
	pub fn interval_samples(&mut self) -> usize { self.regs.read32(reg::PROG_ACCUM_INT) as usize }

	pub fn correlate(&mut self, samples:&[Complex<i8>]) {
		let Self { regs, channels, sample_mode, tic_period, tic_counter, sample_count, .. } = self;

		for s in samples {
			let x:Complex<i32> = match sample_mode {
				SampleMode::Iq    => Complex::new(s.re as i32, s.im as i32),
				SampleMode::IOnly => Complex::new(s.re as i32, 0),
			};

			for (ch, c) in channels.iter_mut().enumerate() {
				let tables = match &c.tables {
					Some(t) => t,
					None => continue,
				};

				// Remove the carrier
				let (cos, sin) = c.carrier.mixer();
				let bb = x * Complex::new(cos, sin).conj();

				// Multiply by the code replicas and integrate
				let hc = (c.code.half_chips() as usize) % tables.len();
				let e = tables.early[hc] as i32;
				let p = tables.prompt[hc] as i32;
				let l = tables.late[hc] as i32;
				c.sums[0] = c.sums[0].wrapping_add(bb.re * e);
				c.sums[1] = c.sums[1].wrapping_add(bb.im * e);
				c.sums[2] = c.sums[2].wrapping_add(bb.re * p);
				c.sums[3] = c.sums[3].wrapping_add(bb.im * p);
				c.sums[4] = c.sums[4].wrapping_add(bb.re * l);
				c.sums[5] = c.sums[5].wrapping_add(bb.im * l);

				c.carrier.advance();
				if c.code.advance() && c.code.half_chips() >= tables.len() as u32 + c.slew {
					dump(regs, ch, c);
				}
			}

			*sample_count += 1;
			*tic_counter += 1;
			if *tic_period > 0 && *tic_counter >= *tic_period {
				*tic_counter = 0;
				latch_tic(regs, channels);
			}
		}
	}

	fn assign_key(&mut self, ch:usize, key:u16) {
		let tables = if key == 0 {
			None
		} else {
			let entry = self.code_tables.entry(key).or_insert_with(|| Arc::new(HalfChipTables::from_key(key)));
			Some(entry.clone())
		};

		if let Some(c) = self.channels.get_mut(ch) {
			c.tables = tables;
			c.restart();
		}
	}

	fn reset(&mut self) {
		self.regs.clear();
		for c in self.channels.iter_mut() {
			c.tables = None;
			c.restart();
		}
		self.tic_period = 0;
		self.tic_counter = 0;
	}

	fn on_write(&mut self, offset:usize) {
		if offset >= reg::GLOBAL_BASE {
			match offset {
				reg::RESET => self.reset(),
				o if o == reg::PROG_TIC || o == reg::PROG_TIC + 2 => {
					self.tic_period = self.regs.read32(reg::PROG_TIC);
					self.tic_counter = 0;
				},
				_ => {},
			}
			return;
		}

		let ch = offset / reg::CHANNEL_STRIDE;
		if ch >= self.channels.len() { return; }
		let base = ch * reg::CHANNEL_STRIDE;

		match offset - base {
			reg::PRN_KEY => {
				let key = self.regs.read16(offset);
				self.assign_key(ch, key);
			},
			r if r == reg::CARR_NCO || r == reg::CARR_NCO + 2 => {
				let word = self.regs.read32(base + reg::CARR_NCO);
				self.channels[ch].carrier.set_control_word(word);
			},
			r if r == reg::CODE_NCO || r == reg::CODE_NCO + 2 => {
				let word = self.regs.read32(base + reg::CODE_NCO);
				self.channels[ch].code.set_control_word(word);
			},
			reg::CODE_SLEW => {
				let slew = self.regs.read16(offset) as u32;
				self.channels[ch].slew += slew;
			},
			reg::EPOCH_LOAD => {
				let load = self.regs.read16(offset) as u32;
				let c = &mut self.channels[ch];
				c.ms_counter = (load & 0xFF) % gps::MS_PER_BIT;
				c.bit_counter = (load >> 8) % gps::BITS_PER_FRAME;
				let epoch = c.epoch();
				self.regs.write16(base + reg::EPOCH, epoch);
			},
			_ => {},
		}
	}

}

fn dump(regs:&mut MemoryRegisters, ch:usize, c:&mut EngineChannel) {
	let base = ch * reg::CHANNEL_STRIDE;
	for (r, value) in [reg::I_EARLY, reg::Q_EARLY, reg::I_PROMPT, reg::Q_PROMPT, reg::I_LATE, reg::Q_LATE].iter().zip(c.sums.iter()) {
		regs.write32(base + r, *value as u32);
	}

	let new_data = regs.read32(reg::NEW_DATA);
	if new_data & (1 << ch) != 0 {
		let missed = regs.read32(reg::ACCUM_MISSED);
		regs.write32(reg::ACCUM_MISSED, missed.wrapping_add(1));
	}
	regs.write32(reg::NEW_DATA, new_data | (1 << ch));

	c.sums = [0; 6];
	c.slew = 0;
	c.code.restart_epoch();

	c.ms_counter = (c.ms_counter + 1) % gps::MS_PER_BIT;
	if c.ms_counter == 0 {
		c.bit_counter = (c.bit_counter + 1) % gps::BITS_PER_FRAME;
	}
	regs.write16(base + reg::EPOCH, c.epoch());
}

fn latch_tic(regs:&mut MemoryRegisters, channels:&mut [EngineChannel]) {
	for (ch, c) in channels.iter_mut().enumerate() {
		let base = ch * reg::CHANNEL_STRIDE;
		regs.write32(base + reg::CARR_MEAS, c.carrier.phase() >> 22);
		regs.write32(base + reg::CARR_CYCLE, c.carrier.cycles());
		regs.write32(base + reg::CODE_MEAS, (c.code.half_chips() << 10) | (c.code.phase() >> 22));
		regs.write16(base + reg::EPOCH_MEAS, c.epoch());
		c.carrier.reset_cycles();
	}
	let status = regs.read16(reg::STATUS);
	regs.write16(reg::STATUS, status | reg::STATUS_TIC);
}

impl Registers for SoftwareCorrelator {

	fn read16(&mut self, offset:usize) -> u16 {
		let value = self.regs.read16(offset);
		if offset == reg::STATUS { self.regs.write16(offset, 0); }
		value
	}

	fn write16(&mut self, offset:usize, value:u16) {
		self.regs.write16(offset, value);
		self.on_write(offset);
	}

	fn read32(&mut self, offset:usize) -> u32 {
		let value = self.regs.read32(offset);
		if offset == reg::NEW_DATA || offset == reg::ACCUM_MISSED { self.regs.write32(offset, 0); }
		value
	}

	fn write32(&mut self, offset:usize, value:u32) {
		self.regs.write32(offset, value);
		self.on_write(offset);
	}

}
