
use num_complex::Complex;
use tracing::{debug, info};

use crate::DigSigProcErr;
use crate::config::{ReceiverConfig, SignalReferences};
use crate::correlator::{CorrelatorBus, Registers};
use crate::correlator::software::SoftwareCorrelator;
use crate::filters::LoopFilterCoefficients;
use crate::gnss::allocator::{self, Allocator};
use crate::gnss::channel::{Channel, ChannelReport};
use crate::telemetry::TrackingObserver;

pub mod discriminators;
pub mod lock_detectors;

/// Per-interval driver for a fixed pool of channels behind one correlator
pub struct TrackingCore<R: Registers> {
	bus: CorrelatorBus<R>,
	channels: Vec<Channel>,
	config: ReceiverConfig,
	refs: SignalReferences,
	coeffs: LoopFilterCoefficients,
	allocator: Allocator,
	observer: Option<Box<dyn TrackingObserver + Send>>,
	interval: u64,
}

impl<R: Registers> TrackingCore<R> {

	pub fn new(regs:R, config:ReceiverConfig) -> Result<Self, DigSigProcErr> {
		config.validate()?;

		let refs = SignalReferences::from_config(&config);
		let coeffs = LoopFilterCoefficients::from_config(&config);
		let channels = (0..config.n_channels).map(|ch| Channel::new(ch, &coeffs)).collect();

		let mut bus = CorrelatorBus::new(regs, config.accumulator_shift);
		bus.program_tic(config.samples_per_tic());
		bus.program_accum_interval(config.samples_per_interval() as u32);

		info!("Tracking core with {} channels, carrier resolution {:.4} [Hz], code resolution {:.4} [Hz]",
			config.n_channels, refs.carrier_resolution_hz, refs.code_resolution_hz);
		debug!("Loop filter coefficients: {:?}", coeffs);

		Ok(Self { bus, channels, allocator: Allocator::new(&config), config, refs, coeffs, observer: None, interval: 0 })
	}

	pub fn with_observer(mut self, observer:Box<dyn TrackingObserver + Send>) -> Self {
		self.observer = Some(observer);
		self
	}

	pub fn take_observer(&mut self) -> Option<Box<dyn TrackingObserver + Send>> { self.observer.take() }

	// Read-only getter methods
	pub fn config(&self) -> &ReceiverConfig { &self.config }
	pub fn references(&self) -> &SignalReferences { &self.refs }
	pub fn coefficients(&self) -> &LoopFilterCoefficients { &self.coeffs }
	pub fn channels(&self) -> &[Channel] { &self.channels }
	pub fn channel(&self, ch:usize) -> Option<&Channel> { self.channels.get(ch) }
	pub fn interval_count(&self) -> u64 { self.interval }
	pub fn bus_mut(&mut self) -> &mut CorrelatorBus<R> { &mut self.bus }

	pub fn reports(&self) -> Vec<ChannelReport> {
		self.channels.iter().map(|c| c.report(&self.refs)).collect()
	}

	/// Handles one accumulation interval: drains every channel with new data, steps its state
	/// machine and writes the resulting NCO commands back. Returns the number of channels serviced.
	pub fn process_interval(&mut self) -> usize {
		let Self { bus, channels, config, refs, observer, .. } = self;

		let new_data = bus.new_data();
		bus.missed();

		let mut serviced = 0;
		for chn in channels.iter_mut() {
			if new_data & (1 << chn.index) == 0 { continue; }

			let accum = bus.accumulators(chn.index);
			let from = chn.state;
			let cmd = chn.update(&accum, config, refs.for_system(chn.system));
			allocator::apply_commands(bus, chn.index, &cmd);
			serviced += 1;

			if let Some(obs) = observer.as_mut() {
				obs.on_interval(from, chn);
				if from != chn.state || cmd.bit.is_some() {
					let report = chn.report(refs);
					if from != chn.state { obs.on_state_change(from, &report); }
					if let Some(bit) = cmd.bit { obs.on_bit(&report, bit); }
				}
			}
		}

		if bus.tic_pending() {
			for chn in channels.iter().filter(|c| !c.is_idle()) {
				let meas = bus.measurement(chn.index);
				if let Some(obs) = observer.as_mut() { obs.on_tic(chn.index, chn.prn, &meas); }
			}
		}

		self.interval += 1;
		let alloc_period = self.config.alloc_period_intervals();
		if alloc_period > 0 && self.interval % alloc_period == 0 {
			self.allocate();
		}

		serviced
	}

	/// Runs the allocator immediately; returns the number of new assignments
	pub fn allocate(&mut self) -> usize {
		self.allocator.allocate(&mut self.channels, &mut self.bus, &self.refs)
	}

	pub fn assign(&mut self, ch:usize, prn:usize) -> Result<(), DigSigProcErr> {
		self.allocator.assign(ch, prn, &mut self.channels, &mut self.bus, &self.refs)
	}

	/// Warm start: the search is centered on the reference words plus the given offsets
	pub fn assign_with_hint(&mut self, ch:usize, prn:usize, carrier_corr:i64, code_corr:i64) -> Result<(), DigSigProcErr> {
		self.allocator.assign_with_hint(ch, prn, carrier_corr, code_corr, &mut self.channels, &mut self.bus, &self.refs)
	}

	/// Restarts the search on a channel that lost lock for reasons outside the tracking loops
	pub fn reacquire(&mut self, ch:usize) -> Result<(), DigSigProcErr> {
		let chn = self.channels.get_mut(ch).ok_or(DigSigProcErr::InvalidChannel(ch))?;
		if chn.is_idle() { return Err(DigSigProcErr::InvalidChannel(ch)); }
		let cmd = chn.reacquire(self.refs.for_system(chn.system));
		allocator::apply_commands(&mut self.bus, ch, &cmd);
		Ok(())
	}

}

impl TrackingCore<SoftwareCorrelator> {

	/// Feeds samples through the software correlator one interrupt period at a time, so every
	/// dump is drained before the next one. Returns the number of intervals processed.
	pub fn process_samples(&mut self, samples:&[Complex<i8>]) -> usize {
		let n = self.bus.registers_mut().interval_samples().max(1);
		let mut intervals = 0;
		for block in samples.chunks(n) {
			self.bus.registers_mut().correlate(block);
			self.process_interval();
			intervals += 1;
		}
		intervals
	}

}

#[cfg(test)]
mod tests;
