
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use num_complex::Complex;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::DigSigProcErr;

pub const BUFFER_SIZE:usize = 2048;

// Two-bit sign/magnitude codes as recorded by the front end
const PACKED2_LUT:[i8; 4] = [-3, -1, 1, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
	/// Signed 8-bit real samples
	I8,
	/// Signed 8-bit samples, I then Q
	Iq8,
	/// Four real 2-bit samples per byte, least significant pair first
	Packed2,
	/// Two complex 2-bit samples per byte, I then Q, least significant pair first
	Packed2Iq,
}

impl FromStr for SampleFormat {
	type Err = DigSigProcErr;

	fn from_str(s:&str) -> Result<Self, Self::Err> {
		match s {
			"i8"         => Ok(Self::I8),
			"iq8"        => Ok(Self::Iq8),
			"packed2"    => Ok(Self::Packed2),
			"packed2_iq" => Ok(Self::Packed2Iq),
			_ => Err(DigSigProcErr::InvalidConfig("sample format must be one of i8, iq8, packed2, packed2_iq")),
		}
	}
}

impl SampleFormat {

	pub fn is_complex(&self) -> bool {
		match self {
			Self::Iq8 | Self::Packed2Iq => true,
			Self::I8 | Self::Packed2    => false,
		}
	}

}

/// Buffered sample reader. End of stream ends the iterator; it is not an error.
pub struct SampleSource<S: Read> {
	src: S,
	format: SampleFormat,
	samples: Vec<Complex<i8>>,
	sample_idx: usize,
	carry: Option<u8>,
	total: usize,
}

impl<S: Read> SampleSource<S> {

	pub fn new(src:S, format:SampleFormat) -> Self {
		Self { src, format, samples: Vec::with_capacity(4*BUFFER_SIZE), sample_idx: 0, carry: None, total: 0 }
	}

	pub fn format(&self) -> SampleFormat { self.format }

	/// Number of samples handed out so far
	pub fn samples_read(&self) -> usize { self.total }

	/// Up to `n` samples; shorter only at end of stream
	pub fn next_block(&mut self, n:usize) -> Vec<Complex<i8>> {
		self.by_ref().take(n).collect()
	}

	// Returns false once the source is exhausted
	fn buffer_samples(&mut self) -> Result<bool, DigSigProcErr> {
		let mut raw = [0u8; BUFFER_SIZE];
		let n = loop {
			match self.src.read(&mut raw) {
				Ok(n) => break n,
				Err(e) if e.kind() == ErrorKind::Interrupted => continue,
				Err(e) => return Err(DigSigProcErr::SampleSource(e.to_string())),
			}
		};
		if n == 0 { return Ok(false); }

		self.samples.clear();
		self.sample_idx = 0;

		match self.format {
			SampleFormat::I8 => {
				self.samples.extend(raw[..n].iter().map(|b| Complex::new(*b as i8, 0)));
			},
			SampleFormat::Iq8 => {
				// A sample may straddle two reads
				let mut bytes = raw[..n].iter().map(|b| *b as i8);
				if let Some(i) = self.carry.take() {
					if let Some(q) = bytes.next() { self.samples.push(Complex::new(i as i8, q)); }
				}
				let rest:Vec<i8> = bytes.collect();
				for pair in rest.chunks(2) {
					match pair {
						[i, q] => self.samples.push(Complex::new(*i, *q)),
						[i]    => self.carry = Some(*i as u8),
						_ => {},
					}
				}
			},
			SampleFormat::Packed2 => {
				for b in raw[..n].iter() {
					for k in 0..4 {
						self.samples.push(Complex::new(PACKED2_LUT[((b >> (2*k)) & 0x3) as usize], 0));
					}
				}
			},
			SampleFormat::Packed2Iq => {
				for b in raw[..n].iter() {
					for k in 0..2 {
						let i = PACKED2_LUT[((b >> (4*k)) & 0x3) as usize];
						let q = PACKED2_LUT[((b >> (4*k + 2)) & 0x3) as usize];
						self.samples.push(Complex::new(i, q));
					}
				}
			},
		}

		Ok(true)
	}

}

impl<S: Read> Iterator for SampleSource<S> {
	type Item = Complex<i8>;

	fn next(&mut self) -> Option<Complex<i8>> {
		// A read can return only the first byte of an I/Q pair, so keep going until a sample decodes
		while self.sample_idx >= self.samples.len() {
			match self.buffer_samples() {
				Ok(true) => {},
				Ok(false) => return None,
				Err(e) => {
					warn!("Sample source stopped: {}", e);
					return None;
				},
			}
		}

		let ans = self.samples[self.sample_idx];
		self.sample_idx += 1;
		self.total += 1;
		Some(ans)
	}
}

pub fn file_source<P: AsRef<Path>>(path:P, format:SampleFormat) -> Result<SampleSource<BufReader<File>>, DigSigProcErr> {
	let file = File::open(path).map_err(|e| DigSigProcErr::SampleSource(e.to_string()))?;
	Ok(SampleSource::new(BufReader::new(file), format))
}
