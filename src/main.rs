// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use clap::builder::styling::Styles;
use clap::{Args, Parser, Subcommand, crate_description, crate_version};
use color_eyre::eyre::{Context, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use fx2la::device::{Fx2Device, Fx2Matcher};
use fx2la::dslogic::{DslogicMode, DslogicTestMode};
use fx2la::session::{Packet, PacketSink};
use fx2la::usb::DeviceLocation;

#[derive(Parser)]
#[command(
	version,
	about = format!("{} v{}", crate_description!(), crate_version!()),
	styles(style()),
	arg_required_else_help(true)
)]
struct CliArguments
{
	#[arg(global = true, short = 'c', long = "conn")]
	/// Use the device at the given location (<bus>.<address>)
	conn: Option<String>,
	#[arg(global = true, long = "firmware-dir")]
	/// Directory to load firmware images and FPGA bitstreams from
	firmware_dir: Option<PathBuf>,

	#[command(subcommand)]
	subcommand: ToplevelCommands,
}

#[derive(Subcommand)]
enum ToplevelCommands
{
	/// List supported logic analyzers found on the bus
	List,
	/// Capture samples into a file
	Acquire(AcquireArguments),
}

#[derive(Args)]
struct AcquireArguments
{
	#[arg(short = 'r', long = "samplerate", default_value_t = 1_000_000)]
	/// Samplerate in Hz
	samplerate: u64,
	#[arg(short = 'n', long = "samples", default_value_t = 1_000_000)]
	/// Number of samples to capture (0 captures until the device stops)
	samples: u64,
	#[arg(short = 't', long = "trigger", value_name = "CHANNEL=PATTERN")]
	/// Software trigger pattern for a channel, one 0/1 per stage (eg. 3=01)
	triggers: Vec<String>,
	#[arg(long = "mode", default_value = DslogicMode::NAMES[0])]
	/// DSLogic device mode
	mode: String,
	#[arg(long = "test-mode")]
	/// DSLogic test mode
	test_mode: Option<String>,
	#[arg(long = "external-clock")]
	/// DSLogic: sample on the external clock input
	external_clock: bool,
	#[arg(short = 'o', long = "output")]
	/// File the raw sample stream is written to
	output: PathBuf,
}

/// Clap v3 style (approximate)
fn style() -> Styles
{
	Styles::styled()
		.usage(
			anstyle::Style::new()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
				.bold(),
		)
		.header(
			anstyle::Style::new()
				.bold()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
		)
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

fn build_matcher(args: &CliArguments, device_mode: DslogicMode) -> Result<Fx2Matcher>
{
	let conn = args
		.conn
		.as_deref()
		.map(DeviceLocation::from_str)
		.transpose()
		.wrap_err("parsing the conn argument")?;

	let mut matcher = Fx2Matcher::new().conn(conn).device_mode(device_mode);
	if let Some(firmware_dir) = &args.firmware_dir {
		matcher = matcher.firmware_dir(firmware_dir.clone());
	}
	Ok(matcher)
}

fn list_command(args: &CliArguments) -> Result<()>
{
	let results = build_matcher(args, DslogicMode::Logic)?.scan();

	for error in &results.errors {
		warn!("Error while scanning: {}", error);
	}

	if results.found.is_empty() {
		println!("No supported devices found.");
		return Ok(());
	}

	for device in &results.found {
		println!("{} ({} channels)", device, device.channels().len());
	}
	Ok(())
}

/// Writes the sample stream to a file, keeping a byte count on screen.
struct FileSink
{
	output: File,
	progress: ProgressBar,
	bytes_written: u64,
	write_error: Option<std::io::Error>,
}

impl FileSink
{
	fn new(output: File) -> Self
	{
		let progress = ProgressBar::new_spinner().with_style(
			ProgressStyle::default_spinner()
				.template(" {spinner} {bytes} captured [{binary_bytes_per_sec} {elapsed}]")
				.expect("static progress template is valid"),
		);

		Self {
			output,
			progress,
			bytes_written: 0,
			write_error: None,
		}
	}
}

impl PacketSink for FileSink
{
	fn send(&mut self, packet: Packet<'_>)
	{
		match packet {
			Packet::Header => (),
			Packet::Trigger(_) => self.progress.println("Trigger matched"),
			Packet::Logic {
				data, ..
			} |
			Packet::Analog {
				data, ..
			} => {
				if self.write_error.is_none() {
					if let Err(error) = self.output.write_all(data) {
						self.write_error = Some(error);
					}
					self.bytes_written += data.len() as u64;
					self.progress.set_position(self.bytes_written);
				}
			},
			Packet::End => self.progress.finish(),
		}
	}
}

fn apply_triggers(device: &mut Fx2Device, triggers: &[String]) -> Result<()>
{
	for trigger in triggers {
		let (channel, pattern) = trigger
			.split_once('=')
			.ok_or_else(|| eyre!("trigger {:?} is not of the form CHANNEL=PATTERN", trigger))?;
		let channel = usize::from_str(channel).wrap_err("parsing trigger channel index")?;

		let channels = device.channels_mut();
		let slot = channels
			.get_mut(channel)
			.ok_or_else(|| eyre!("device has no channel {}", channel))?;
		slot.trigger = Some(pattern.to_string());
	}
	Ok(())
}

fn acquire_command(args: &CliArguments, acquire: &AcquireArguments) -> Result<()>
{
	let device_mode: DslogicMode = acquire.mode.parse()?;
	let mut results = build_matcher(args, device_mode)?.scan();
	let mut device = results.pop_single("acquire")?;

	println!("Found: {}", device);
	device.open()?;

	device.set_samplerate(acquire.samplerate)?;
	device.set_limit_samples(acquire.samples)?;
	if acquire.samples == 0 {
		warn!("No sample limit given; capturing until the device stops delivering.");
	}

	if device.is_dslogic() {
		device.set_external_clock(acquire.external_clock)?;
		if let Some(test_mode) = &acquire.test_mode {
			device.set_test_mode(test_mode.parse::<DslogicTestMode>()?)?;
		}
	} else if acquire.external_clock || acquire.test_mode.is_some() {
		return Err(eyre!("--external-clock and --test-mode only apply to DSLogic devices"));
	}

	apply_triggers(&mut device, &acquire.triggers)?;

	let output = File::create(&acquire.output)
		.wrap_err_with(|| format!("creating output file {}", acquire.output.display()))?;
	let mut sink = FileSink::new(output);

	let mut acquisition = device.start_acquisition(&mut sink)?;
	acquisition.run();
	let num_samples = acquisition.num_samples();
	drop(acquisition);

	if let Some(error) = sink.write_error {
		return Err(error).wrap_err("writing captured samples");
	}

	if num_samples < 0 {
		println!(
			"Capture aborted after {} bytes; see the log for the reason.",
			sink.bytes_written
		);
	} else {
		println!("Captured {} samples ({} bytes).", num_samples, sink.bytes_written);
	}

	device.close();
	Ok(())
}

fn main() -> Result<()>
{
	color_eyre::install()?;
	env_logger::Builder::new()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();

	let cli_args = CliArguments::parse();

	match &cli_args.subcommand {
		ToplevelCommands::List => list_command(&cli_args),
		ToplevelCommands::Acquire(acquire_args) => acquire_command(&cli_args, acquire_args),
	}?;

	info!("Done.");
	Ok(())
}
