
use std::sync::{Arc, Mutex};

use super::*;

use crate::correlator::{Accumulators, TicMeasurement};
use crate::correlator::memory::MemoryRegisters;
use crate::correlator::register_map as reg;
use crate::gnss::channel::{ChannelState, LockStatus};
use crate::gnss::gps_l1_ca::test_vectors::{self, SyntheticSignal};

#[derive(Default)]
struct EventLog {
	transitions: Vec<(usize, ChannelState, ChannelState)>,
	bits: Vec<bool>,
	tics: Vec<TicMeasurement>,
}

struct SharedLog(Arc<Mutex<EventLog>>);

impl TrackingObserver for SharedLog {

	fn on_state_change(&mut self, from:ChannelState, report:&ChannelReport) {
		self.0.lock().unwrap().transitions.push((report.channel, from, report.state));
	}

	fn on_bit(&mut self, _report:&ChannelReport, bit:bool) {
		self.0.lock().unwrap().bits.push(bit);
	}

	fn on_tic(&mut self, _channel:usize, _prn:usize, meas:&TicMeasurement) {
		self.0.lock().unwrap().tics.push(*meas);
	}

}

fn software_core(prn:usize, acq_threshold:i64) -> (TrackingCore<SoftwareCorrelator>, Arc<Mutex<EventLog>>) {
	let config = ReceiverConfig{ acq_threshold, ..test_vectors::config(1) };
	let log = Arc::new(Mutex::new(EventLog::default()));
	let mut core = TrackingCore::new(SoftwareCorrelator::new(&config), config).unwrap()
		.with_observer(Box::new(SharedLog(log.clone())));
	core.assign(0, prn).unwrap();
	(core, log)
}

#[test]
fn aligned_signal_reaches_tracking() {
	let (mut core, log) = software_core(14, 100_000);
	let mut signal = SyntheticSignal::new(14, 40.0);

	let mut tracking_at = None;
	for ms in 1..=700 {
		core.process_samples(&signal.take_ms(1));
		if tracking_at.is_none() && core.channel(0).unwrap().state == ChannelState::Tracking {
			tracking_at = Some(ms);
		}
	}

	// One acquisition dump, three confirmation dumps, then 31 bit edges 20 ms apart
	let ms = tracking_at.unwrap();
	assert!(ms >= 630 && ms <= 650, "{}", ms);

	let chn = core.channel(0).unwrap();
	let refs = core.references().gps;
	assert!(chn.lock_status.contains(LockStatus::CODE_LOCK | LockStatus::CARR_LOCK | LockStatus::BIT_SYNC));
	assert!(!chn.lock_status.contains(LockStatus::PHASE_LOCK));
	assert_eq!(chn.carr_freq_basis, refs.carrier_ref);
	assert_eq!(chn.code_freq_basis, refs.code_ref);
	assert!((chn.carr_freq as i64 - refs.carrier_ref as i64).abs() <= 1);
	assert!((chn.code_freq as i64 - refs.code_ref as i64).abs() <= 1);

	let report = &core.reports()[0];
	assert_eq!(report.prn, 14);
	assert!(report.doppler_hz.abs() < 1.0);
	assert!((report.code_frequency_hz - 1.023e6).abs() < 1.0);

	let log = log.lock().unwrap();
	let states:Vec<ChannelState> = log.transitions.iter().map(|(_, _, to)| *to).collect();
	assert_eq!(states, vec![ChannelState::Confirm, ChannelState::PullIn, ChannelState::Tracking]);

	// Bits alternate every 20 ms and are latched on the last millisecond of each bit
	assert!(log.bits.len() >= 2);
	for pair in log.bits.windows(2) { assert_ne!(pair[0], pair[1]); }

	// One TIC every 0.1 s
	assert_eq!(log.tics.len(), 7);
}

#[test]
fn wrong_prn_keeps_searching() {
	let (mut core, log) = software_core(3, 100_000);
	let mut signal = SyntheticSignal::new(21, 40.0);

	for _ in 0..50 { core.process_samples(&signal.take_ms(1)); }

	let chn = core.channel(0).unwrap();
	assert_eq!(chn.state, ChannelState::Acquisition);
	assert!(chn.search.codes >= 45);
	assert!(log.lock().unwrap().transitions.is_empty());
}

#[test]
fn reacquire_restarts_a_tracked_channel() {
	let (mut core, _) = software_core(14, 100_000);
	let mut signal = SyntheticSignal::new(14, 40.0);
	core.process_samples(&signal.take_ms(10));
	assert_eq!(core.channel(0).unwrap().state, ChannelState::PullIn);

	core.reacquire(0).unwrap();
	let chn = core.channel(0).unwrap();
	assert_eq!(chn.state, ChannelState::Acquisition);
	assert_eq!(chn.lock_status, LockStatus::default());
	assert_eq!(chn.prn, 14);
	assert_eq!(core.reacquire(3), Err(DigSigProcErr::InvalidChannel(3)));
}

fn memory_core(n_channels:usize, alloc_intervals:u32) -> TrackingCore<MemoryRegisters> {
	let defaults = ReceiverConfig::default();
	let alloc_period_s = alloc_intervals as f64 * defaults.accum_interval_s;
	let config = ReceiverConfig{ n_channels, alloc_period_s, ..defaults };
	TrackingCore::new(MemoryRegisters::new(), config).unwrap()
}

#[test]
fn allocator_runs_on_its_cadence() {
	let mut core = memory_core(3, 4);
	for _ in 0..3 { assert_eq!(core.process_interval(), 0); }
	assert!(core.channels().iter().all(|c| c.is_idle()));

	core.process_interval();
	assert_eq!(core.interval_count(), 4);
	assert!(core.channels().iter().all(|c| c.state == ChannelState::Acquisition));
	let mut prns:Vec<usize> = core.channels().iter().map(|c| c.prn).collect();
	prns.dedup();
	assert_eq!(prns.len(), 3);
}

#[test]
fn only_flagged_channels_are_serviced() {
	let mut core = memory_core(2, 0);
	core.assign(0, 4).unwrap();
	core.assign(1, 9).unwrap();

	// Hardware latched a dump on channel 1 only
	let regs = core.bus_mut().registers_mut();
	regs.write32(reg::channel_register(1, reg::I_PROMPT), 300);
	regs.write32(reg::NEW_DATA, 0b10);

	assert_eq!(core.process_interval(), 1);
	assert_eq!(core.channel(0).unwrap().search.codes, 0);
	assert_eq!(core.channel(1).unwrap().search.codes, 1);
	assert_eq!(core.channel(1).unwrap().accum, Accumulators::prompt(300, 0));

	// The slew went out on channel 1
	assert_eq!(core.bus_mut().registers_mut().read16(reg::channel_register(1, reg::CODE_SLEW)), 1);
	assert_eq!(core.bus_mut().registers_mut().read16(reg::channel_register(0, reg::CODE_SLEW)), 0);
}

#[test]
fn hinted_assignment_reaches_the_correlator() {
	let mut core = memory_core(2, 0);
	let step = core.references().gps.doppler_step as i64;
	core.assign_with_hint(1, 7, 2 * step, -3).unwrap();

	let refs = core.references().gps;
	let regs = core.bus_mut().registers_mut();
	assert_eq!(regs.read32(reg::channel_register(1, reg::CARR_NCO)) as i64, refs.carrier_ref as i64 + 2 * step);
	assert_eq!(regs.read32(reg::channel_register(1, reg::CODE_NCO)), refs.code_ref - 3);

	let report = &core.reports()[1];
	assert_eq!(report.state, ChannelState::Acquisition);
	assert!((report.doppler_hz - 2000.0).abs() < 1.0, "{}", report.doppler_hz);
	assert_eq!(core.reports()[0].doppler_hz, 0.0);
}

#[derive(Clone)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
	fn write(&mut self, buf:&[u8]) -> std::io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

#[test]
fn interval_path_is_quiet_at_info() {
	let mut core = memory_core(4, 2);
	let out = CapturedLog(Arc::new(Mutex::new(vec![])));
	let writer = out.clone();
	let subscriber = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::INFO)
		.with_writer(move || writer.clone())
		.finish();

	tracing::subscriber::with_default(subscriber, || {
		for _ in 0..4 { core.process_interval(); }
		core.channels().iter().for_each(|c| assert_eq!(c.state, ChannelState::Acquisition));
	});

	// Assignments happened on the interval path without writing anything
	assert!(out.0.lock().unwrap().is_empty());
}

#[test]
fn invalid_configuration_is_rejected() {
	let config = ReceiverConfig{ n_channels: 0, ..ReceiverConfig::default() };
	assert!(TrackingCore::new(MemoryRegisters::new(), config).is_err());
}
