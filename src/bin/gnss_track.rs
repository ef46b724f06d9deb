
extern crate clap;
extern crate colored;
extern crate gnss_tracking;
extern crate serde_json;
extern crate tokio;

use clap::{Arg, App};
use colored::*;
use gnss_tracking::config::{ReceiverConfig, SampleMode};
use gnss_tracking::correlator::software::SoftwareCorrelator;
use gnss_tracking::gnss::channel::ChannelState;
use gnss_tracking::gnss::tracking::TrackingCore;
use gnss_tracking::io::{self, SampleFormat};
use gnss_tracking::telemetry::{TelemetryMessage, TelemetrySender};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TELEMETRY_QUEUE_LEN:usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {

	let matches = App::new("GNSS Tracking")
		.version("0.1.0")
		.author("John Stanford (johnwstanford@gmail.com)")
		.about("Runs recorded IF samples through a software correlator and the channel tracking loops")
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename")
			.required(true).takes_value(true))
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("Receiver configuration in JSON; defaults are used for missing fields")
			.takes_value(true))
		.arg(Arg::with_name("input_type")
			.short("t").long("type")
			.takes_value(true).default_value("iq8")
			.possible_values(&["i8", "iq8", "packed2", "packed2_iq"]))
		.arg(Arg::with_name("channels")
			.short("n").long("channels")
			.help("Overrides the number of channels in the configuration")
			.takes_value(true))
		.arg(Arg::with_name("max_intervals")
			.long("max_intervals")
			.help("Stop after this many accumulation intervals")
			.takes_value(true))
		.get_matches();

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let fname:String = matches.value_of("filename").unwrap().to_string();
	let format:SampleFormat = matches.value_of("input_type").unwrap().parse()?;

	let mut config = match matches.value_of("config") {
		Some(path) => ReceiverConfig::from_json_file(path)?,
		None => ReceiverConfig::default(),
	};
	if let Some(n) = matches.value_of("channels") { config.n_channels = n.parse()?; }
	let max_samples:Option<usize> = match matches.value_of("max_intervals") {
		Some(n) => Some(n.parse::<usize>()? * config.samples_per_interval()),
		None => None,
	};

	let mode_matches = match config.sample_mode {
		SampleMode::Iq    => format.is_complex(),
		SampleMode::IOnly => !format.is_complex(),
	};
	if !mode_matches { warn!("Sample format {:?} doesn't match configured sample mode {:?}", format, config.sample_mode); }

	eprintln!("Tracking {} as {:?} at {} [samples/sec] with {} channels", &fname, format, config.sample_rate_hz, config.n_channels);

	let (sender, mut rx) = TelemetrySender::channel(TELEMETRY_QUEUE_LEN);
	let mut source = io::file_source(&fname, format)?;
	let mut core = TrackingCore::new(SoftwareCorrelator::new(&config), config)?.with_observer(Box::new(sender));
	core.allocate();

	// Status display runs at a lower priority than the tracking loop and only sees what fits in the queue
	let display = tokio::spawn(async move {
		let mut bits:usize = 0;
		while let Some(msg) = rx.recv().await {
			match msg {
				TelemetryMessage::StateChange{ from, report } => {
					let line = format!("Channel {:2} PRN {:2}: {:?} -> {:?}, doppler {:.1} [Hz]", report.channel, report.prn, from, report.state, report.doppler_hz);
					match report.state {
						ChannelState::Tracking => eprintln!("{}", line.green()),
						ChannelState::PullIn   => eprintln!("{}", line.yellow()),
						_ if from == ChannelState::Tracking || from == ChannelState::PullIn => eprintln!("{}", line.red()),
						_ => eprintln!("{}", line),
					}
				},
				TelemetryMessage::Bit{ .. } => bits += 1,
				TelemetryMessage::Tic{ channel, prn, measurement } => {
					eprintln!("{}", format!("  TIC channel {:2} PRN {:2}: {:?}", channel, prn, measurement).blue());
				},
			}
		}
		bits
	});

	let core = tokio::task::spawn_blocking(move || {
		let block_len = core.config().samples_per_interval().max(1);
		loop {
			let n = match max_samples {
				Some(max) => block_len.min(max.saturating_sub(source.samples_read())),
				None => block_len,
			};
			if n == 0 { break; }

			let block = source.next_block(n);
			if block.is_empty() { break; }
			core.process_samples(&block);
		}
		info!("Processed {} samples over {} intervals", source.samples_read(), core.interval_count());

		// Dropping the sender closes the display task's queue
		drop(core.take_observer());
		core
	}).await?;

	let bits = display.await?;
	info!("{} navigation bits decoded", bits);

	// This is the only output to STDOUT so the channel reports can be piped to a JSON file
	println!("{}", serde_json::to_string_pretty(&core.reports())?);

	Ok(())
}
