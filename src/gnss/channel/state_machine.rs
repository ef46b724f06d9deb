
use tracing::debug;

use crate::config::{ReceiverConfig, SignalReference};
use crate::correlator::Accumulators;
use crate::filters::{CarrierErrors, LoopFilter};
use crate::gnss::tracking::discriminators;
use crate::utils::{sign, to_control_word};

use super::{Channel, ChannelState, ConfirmState, BitSyncState, LockStatus, NcoCommands, SearchState};

impl Channel {

	/// Runs one accumulation interval for this channel. The previous accumulators become the
	/// values of the last processed interval before the state handler runs.
	pub fn update(&mut self, accum:&Accumulators, config:&ReceiverConfig, signal:&SignalReference) -> NcoCommands {
		self.prev_accum = self.accum;
		self.accum = *accum;

		let (cmd, opt_next_state) = match self.state {
			ChannelState::Off         => (NcoCommands::default(), None),
			ChannelState::Acquisition => self.acquisition(config, signal),
			ChannelState::Confirm     => self.confirmation(config, signal),
			ChannelState::PullIn      => self.pull_in(config, signal),
			ChannelState::Tracking    => self.tracking(config, signal),
		};

		if let Some(next_state) = opt_next_state {
			debug!("Channel {} PRN {}: {:?} -> {:?}", self.index, self.prn, self.state, next_state);
			self.state = next_state;
		}

		cmd
	}

	/// Forces a channel back into acquisition, e.g. on an external loss of lock
	pub fn reacquire(&mut self, signal:&SignalReference) -> NcoCommands {
		debug!("Channel {} PRN {}: reacquiring from {:?}", self.index, self.prn, self.state);
		self.restart_search(signal)
	}

	// Clears all search, confirmation and loop state and puts the NCOs back on their reference words.
	// The sweep count is kept because it belongs to the current PRN assignment.
	pub(super) fn restart_search(&mut self, signal:&SignalReference) -> NcoCommands {
		let SearchState { sweeps, carrier_cold_corr, code_cold_corr, .. } = self.search;
		self.search = SearchState { sweeps, carrier_cold_corr, code_cold_corr, ..SearchState::default() };
		self.confirm = ConfirmState::default();
		self.bit_sync = BitSyncState::default();
		self.reset_loops();
		self.lock_status.clear();
		self.state = ChannelState::Acquisition;

		self.carr_freq = self.search_carrier(signal);
		self.code_freq = self.search_code(signal);
		NcoCommands { carrier: Some(self.carr_freq), code: Some(self.code_freq), ..NcoCommands::default() }
	}

	fn search_carrier(&self, signal:&SignalReference) -> u32 {
		let word = signal.carrier_ref as i64 + self.search.carrier_cold_corr + (signal.doppler_step as i64) * (self.search.n_freq as i64);
		to_control_word(word)
	}

	fn search_code(&self, signal:&SignalReference) -> u32 {
		to_control_word(signal.code_ref as i64 + self.search.code_cold_corr)
	}

	fn acquisition(&mut self, config:&ReceiverConfig, signal:&SignalReference) -> (NcoCommands, Option<ChannelState>) {
		let mut cmd = NcoCommands::default();

		// The spiral went past the edge of the Doppler range, so start over from bin 0
		if self.search.n_freq.abs() > config.search_max_f {
			self.search.n_freq = 0;
			self.search.del_freq = 1;
			self.search.codes = 0;
			self.search.sweeps += 1;
			if config.max_search_sweeps > 0 && self.search.sweeps >= config.max_search_sweeps {
				self.search.exhausted = true;
			}
			self.carr_freq = self.search_carrier(signal);
			cmd.carrier = Some(self.carr_freq);
			return (cmd, None);
		}

		let prompt_mag = discriminators::rss(self.accum.i_prompt as i64, self.accum.q_prompt as i64);
		if prompt_mag > config.acq_threshold {
			self.confirm = ConfirmState::default();
			return (cmd, Some(ChannelState::Confirm));
		}

		cmd.slew = Some(1);
		self.search.codes += 1;

		// Every delay has been tried in this bin
		if self.search.codes >= signal.search_max_delay {
			self.search.n_freq += self.search.del_freq;
			self.search.del_freq = -(self.search.del_freq + sign(self.search.del_freq as i64) as i32);
			self.search.codes = 0;
			self.carr_freq = self.search_carrier(signal);
			cmd.carrier = Some(self.carr_freq);
		}

		(cmd, None)
	}

	fn confirmation(&mut self, config:&ReceiverConfig, signal:&SignalReference) -> (NcoCommands, Option<ChannelState>) {
		let a = self.accum;
		let prompt_mag = discriminators::rss(a.i_prompt as i64, a.q_prompt as i64);
		self.confirm.early_mag  += discriminators::rss(a.i_early as i64, a.q_early as i64);
		self.confirm.prompt_mag += prompt_mag;
		self.confirm.late_mag   += discriminators::rss(a.i_late as i64, a.q_late as i64);

		if prompt_mag > config.acq_threshold {
			self.confirm.n_thresh += 1;
		}
		self.confirm.i_confirm += 1;

		if self.confirm.i_confirm < config.confirm_m {
			return (NcoCommands::default(), None);
		}

		if self.confirm.n_thresh >= config.n_of_m_thresh {
			self.begin_pull_in(config, signal);
			(NcoCommands::default(), Some(ChannelState::PullIn))
		} else {
			debug!("Channel {} PRN {}: confirmation failed with {} of {}", self.index, self.prn, self.confirm.n_thresh, config.confirm_m);
			(self.restart_search(signal), None)
		}
	}

	fn begin_pull_in(&mut self, config:&ReceiverConfig, signal:&SignalReference) {
		self.reset_loops();
		self.carr_freq_basis = self.carr_freq;
		self.code_freq_basis = self.search_code(signal);
		self.code_freq = self.code_freq_basis;
		self.bit_sync = BitSyncState::default();
		self.lock.initialize(config.carr_loss_power);
		self.lock_status.clear();
		self.lock_status.insert(LockStatus::CODE_LOCK);
	}

	// Discriminators and both loop filters; returns the new carrier and code words
	fn close_loops(&mut self, config:&ReceiverConfig) -> NcoCommands {
		self.freq_error = discriminators::freq_error(&self.accum, &self.prev_accum, config.freq_discriminator_shift);
		self.carr_error = discriminators::carrier_error(&self.accum, &self.prev_accum, self.carrier_loop.old_error(), config.carrier_error_divisor);
		let carr_nco = self.carrier_loop.apply(CarrierErrors{ phase: self.carr_error, freq: self.freq_error });
		self.carr_freq = to_control_word(self.carr_freq_basis as i64 + carr_nco);

		self.code_error = discriminators::code_error(&self.accum, self.code_loop.old_error());
		let code_nco = self.code_loop.apply(self.code_error);
		self.code_freq = to_control_word(self.code_freq_basis as i64 - code_nco);

		let ind = self.lock.update(&self.accum, config.carr_lock_power, config.carr_loss_power, config.phase_lock_intervals);
		self.lock_status.set(LockStatus::CARR_LOCK, ind.carrier);
		self.lock_status.set(LockStatus::PHASE_LOCK, ind.phase);

		NcoCommands { carrier: Some(self.carr_freq), code: Some(self.code_freq), ..NcoCommands::default() }
	}

	fn pull_in(&mut self, config:&ReceiverConfig, signal:&SignalReference) -> (NcoCommands, Option<ChannelState>) {
		let mut cmd = self.close_loops(config);

		let s = sign(self.accum.i_prompt as i64);
		let edge = s != 0 && s == -sign(self.prev_accum.i_prompt as i64);
		let bs = &mut self.bit_sync;

		// Data bit edges can only be a whole bit period apart
		if edge {
			bs.prev_sign_pos = bs.sign_pos;
			bs.sign_pos = bs.ch_time;
			if bs.sign_pos - bs.prev_sign_pos > config.min_bit_period {
				bs.sign_count += 1;
			} else {
				bs.sign_count = 0;
			}
		}

		// An edge after a full bit period of one sign starts the millisecond counter
		let mask:u32 = (1 << signal.ms_per_bit) - 1;
		bs.ms_count += 1;
		if edge && ((s < 0 && bs.ms_sign & mask == 0) || (s > 0 && bs.ms_sign & mask == mask)) {
			bs.ms_count = 0;
			bs.ms_set = true;
			cmd.epoch_load = Some((1, 0));
		}
		bs.ms_sign = (bs.ms_sign << 1) | if self.accum.i_prompt < 0 { 1 } else { 0 };
		bs.ms_count %= signal.ms_per_bit;

		bs.ch_time += 1;

		if bs.sign_count > config.bit_sync_edge_count && bs.ms_set {
			debug!("Channel {} PRN {}: bit sync after {} intervals", self.index, self.prn, bs.ch_time);
			self.lock_status.insert(LockStatus::BIT_SYNC);
			return (cmd, Some(ChannelState::Tracking));
		}

		if bs.ch_time >= config.pull_in_timeout {
			debug!("Channel {} PRN {}: pull-in timed out", self.index, self.prn);
			let restart = self.restart_search(signal);
			return (restart, None);
		}

		(cmd, None)
	}

	fn tracking(&mut self, config:&ReceiverConfig, signal:&SignalReference) -> (NcoCommands, Option<ChannelState>) {
		let mut cmd = self.close_loops(config);
		self.lock_status.insert(LockStatus::CODE_LOCK);

		let bs = &mut self.bit_sync;
		bs.ms_count = (bs.ms_count + 1) % signal.ms_per_bit;
		if bs.ms_count == signal.ms_per_bit - 1 {
			let bit = self.accum.i_prompt > 0;
			bs.bit = Some(bit);
			cmd.bit = Some(bit);
		}

		(cmd, None)
	}

}
