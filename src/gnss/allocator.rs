
use tracing::{debug, warn};

use crate::DigSigProcErr;
use crate::config::{PrnKeyStyle, ReceiverConfig, SignalReferences, MAX_SATELLITES};
use crate::correlator::{CorrelatorBus, Registers};
use crate::gnss::GnssSystem;
use crate::gnss::channel::{Channel, NcoCommands};
use crate::gnss::gps_l1_ca::signal_modulation;

/// Hands idle channels the next satellite from a ring that advances by a fixed stride and
/// reclaims channels whose search space is exhausted
#[derive(Debug, Clone)]
pub struct Allocator {
	next: usize,
	stride: usize,
	key_style: PrnKeyStyle,
}

impl Allocator {

	pub fn new(config:&ReceiverConfig) -> Self {
		Self { next: 0, stride: config.prn_stride, key_style: config.prn_key_style }
	}

	/// Channel currently owning `prn`, if any
	pub fn owner(channels:&[Channel], prn:usize) -> Option<usize> {
		channels.iter().find(|c| !c.is_idle() && c.prn == prn).map(|c| c.index)
	}

	/// Binds `prn` to channel `ch` and starts the acquisition search. A PRN owned by another
	/// channel is refused rather than moved.
	pub fn assign<R: Registers>(&self, ch:usize, prn:usize, channels:&mut [Channel], bus:&mut CorrelatorBus<R>, refs:&SignalReferences) -> Result<(), DigSigProcErr> {
		self.assign_with_hint(ch, prn, 0, 0, channels, bus, refs)
	}

	/// `assign` with carrier and code offsets from the reference words, in control-word units
	pub fn assign_with_hint<R: Registers>(&self, ch:usize, prn:usize, carrier_corr:i64, code_corr:i64, channels:&mut [Channel], bus:&mut CorrelatorBus<R>, refs:&SignalReferences) -> Result<(), DigSigProcErr> {
		let key = signal_modulation::prn_key(prn, self.key_style)?;
		if ch >= channels.len() { return Err(DigSigProcErr::InvalidChannel(ch)); }
		if let Some(owner) = Self::owner(channels, prn) {
			return Err(DigSigProcErr::PrnInUse{ prn, channel: owner });
		}
		if !channels[ch].is_idle() { return Err(DigSigProcErr::ChannelBusy(ch)); }

		bus.set_prn_key(ch, key);
		let cmd = channels[ch].start_with_hint(prn, GnssSystem::Gps, &refs.gps, carrier_corr, code_corr);
		apply_commands(bus, ch, &cmd);
		debug!("Channel {}: searching for PRN {}", ch, prn);
		Ok(())
	}

	/// Returns exhausted channels to the idle pool; returns how many were reclaimed
	pub fn reclaim<R: Registers>(&mut self, channels:&mut [Channel], bus:&mut CorrelatorBus<R>) -> usize {
		let mut reclaimed = 0;
		for chn in channels.iter_mut().filter(|c| !c.is_idle() && c.is_exhausted()) {
			debug!("Channel {}: PRN {} not found, releasing", chn.index, chn.prn);
			bus.set_prn_key(chn.index, 0);
			chn.release();
			reclaimed += 1;
		}
		reclaimed
	}

	/// Reclaims exhausted channels and then fills every idle channel from the PRN ring;
	/// returns the number of new assignments
	pub fn allocate<R: Registers>(&mut self, channels:&mut [Channel], bus:&mut CorrelatorBus<R>, refs:&SignalReferences) -> usize {
		self.reclaim(channels, bus);

		let mut assigned = 0;
		for ch in 0..channels.len() {
			if !channels[ch].is_idle() { continue; }

			// At most one full turn of the ring per channel
			for _ in 0..MAX_SATELLITES {
				let prn = self.next_prn();
				match self.assign(ch, prn, channels, bus, refs) {
					Ok(()) => {
						assigned += 1;
						break;
					},
					Err(DigSigProcErr::PrnInUse{ .. }) => continue,
					Err(e) => {
						warn!("Channel {}: unable to assign PRN {}: {}", ch, prn, e);
						break;
					},
				}
			}
		}
		assigned
	}

	fn next_prn(&mut self) -> usize {
		let prn = self.next + 1;
		self.next = (self.next + self.stride) % MAX_SATELLITES;
		prn
	}

}

/// Writes the NCO part of a state machine step to the correlator
pub fn apply_commands<R: Registers>(bus:&mut CorrelatorBus<R>, ch:usize, cmd:&NcoCommands) {
	if let Some(word) = cmd.carrier { bus.set_carrier(ch, word); }
	if let Some(word) = cmd.code { bus.set_code(ch, word); }
	if let Some(half_chips) = cmd.slew { bus.slew(ch, half_chips); }
	if let Some((ms, bits)) = cmd.epoch_load { bus.epoch_load(ch, ms, bits); }
}
