// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! The acquisition scheduler.
//!
//! Sampling streams through a queue of concurrently in-flight bulk IN transfers; each
//! completion is scanned (software trigger, test-pattern check, sample accounting), framed
//! into packets for the sink, and its buffer resubmitted. Aborting marks the stream dead and
//! cancels the queue; the END packet is emitted by whichever pump step observes the in-flight
//! count drain to zero, so late completions only ever free their buffers.
//!
//! The pump is single-threaded and cooperative: [`Acquisition::pump`] performs one
//! event-dispatch step, [`Acquisition::run`] loops it to completion. nusb transfers carry no
//! individual timeout, so the computed transfer timeout bounds each pump step instead; a
//! deadline with nothing completed counts into the same empty-transfer ladder that dead
//! devices are detected with.

use std::time::Duration;

use log::{debug, error, info, warn};
use nusb::transfer::{Completion, Queue, RequestBuffer, TransferError};

use crate::dslogic::{DslogicMode, DslogicStatus, DslogicTestMode, FpgaSetting, TriggerPos};
use crate::error::{Error, ErrorKind};
use crate::protocol::{self, StartCommand};
use crate::session::{Packet, PacketSink};
use crate::trigger::{SoftTrigger, Trigger};
use crate::usb::{BULK_TIMEOUT, ENDPOINT_DIR_IN, UsbHandle, block_on_deadline};
use crate::S;

/// Upper bound on concurrently in-flight transfers.
pub const NUM_SIMUL_TRANSFERS: usize = 32;
/// Consecutive empty or errored transfers tolerated before giving up on the device.
pub const MAX_EMPTY_TRANSFERS: u32 = (NUM_SIMUL_TRANSFERS * 2) as u32;

const FX2_DATA_ENDPOINT: u8 = 2 | ENDPOINT_DIR_IN;
const DSLOGIC_DATA_ENDPOINT: u8 = 6 | ENDPOINT_DIR_IN;
const DSLOGIC_SETTING_ENDPOINT: u8 = 2;

const DSLOGIC_ANALOG_TRANSFER_SIZE: usize = 128;
const DSLOGIC_DSO_TRANSFER_SIZE: usize = 16 * 1024;

/// The hardware test-pattern counter wraps at this modulus.
const TEST_PATTERN_MODULUS: u32 = 65001;

fn to_bytes_per_ms(samplerate: u64, dslogic: bool, sample_wide: bool) -> u64
{
	samplerate / 1000 * if dslogic && sample_wide { 2 } else { 1 }
}

/// Transfer buffer size: 10 ms of data, rounded up to a multiple of 512.
pub(crate) fn get_buffer_size(samplerate: u64, dslogic: bool, sample_wide: bool) -> usize
{
	let size = 10 * to_bytes_per_ms(samplerate, dslogic, sample_wide) as usize;
	(size + 511) & !511
}

/// Total in-flight buffering should hold about 500 ms of data, or 100 ms for DSLogic.
pub(crate) fn get_number_of_transfers(samplerate: u64, dslogic: bool, sample_wide: bool) -> usize
{
	let window_ms: u64 = if dslogic { 100 } else { 500 };
	let n = window_ms * to_bytes_per_ms(samplerate, dslogic, sample_wide) /
		get_buffer_size(samplerate, dslogic, sample_wide) as u64;

	(n as usize).min(NUM_SIMUL_TRANSFERS).max(1)
}

/// Transfer timeout: time to fill every in-flight buffer, plus 25% headroom.
pub(crate) fn get_timeout(samplerate: u64, dslogic: bool, sample_wide: bool) -> Duration
{
	if dslogic {
		return Duration::from_millis(1000);
	}

	let total_size = get_buffer_size(samplerate, dslogic, sample_wide) as u64 *
		get_number_of_transfers(samplerate, dslogic, sample_wide) as u64;
	let micros = total_size * 1000 / to_bytes_per_ms(samplerate, dslogic, sample_wide);
	Duration::from_micros(micros + micros / 4)
}

/// What to do with a transfer buffer after its completion has been processed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Disposition
{
	Resubmit,
	Halt,
}

/// Per-acquisition stream state: the part of the scheduler that looks at sample data.
///
/// Kept free of any USB types so the scanning, framing and accounting logic is directly
/// testable with synthetic buffers.
struct SampleStream
{
	unit_size: usize,
	soft_trigger: SoftTrigger,
	limit_samples: u64,
	/// Total samples delivered; -1 is the sticky abort sentinel.
	num_samples: i64,
	empty_transfer_count: u32,
	dslogic: bool,
	dslogic_mode: DslogicMode,
	dslogic_test: DslogicTestMode,
	test_expected: Option<u32>,
}

impl SampleStream
{
	fn new(
		sample_wide: bool,
		soft_trigger: SoftTrigger,
		limit_samples: u64,
		dslogic: bool,
		dslogic_mode: DslogicMode,
		dslogic_test: DslogicTestMode,
	) -> Self
	{
		Self {
			unit_size: if sample_wide { 2 } else { 1 },
			soft_trigger,
			limit_samples,
			num_samples: 0,
			empty_transfer_count: 0,
			dslogic,
			dslogic_mode,
			dslogic_test,
			test_expected: None,
		}
	}

	fn aborted(&self) -> bool
	{
		self.num_samples == -1
	}

	fn abort(&mut self)
	{
		self.num_samples = -1;
	}

	fn num_samples(&self) -> i64
	{
		self.num_samples
	}

	/// Account one empty or errored transfer (or one barren pump deadline).
	fn empty_tick(&mut self) -> Disposition
	{
		self.empty_transfer_count += 1;
		if self.empty_transfer_count > MAX_EMPTY_TRANSFERS {
			// The FX2 gave up. End the acquisition, the frontend will work out
			// that the samplecount is short.
			self.abort();
			Disposition::Halt
		} else {
			Disposition::Resubmit
		}
	}

	/// Process one completed data transfer.
	fn receive(&mut self, data: &[u8], errored: bool, sink: &mut dyn PacketSink) -> Disposition
	{
		if self.aborted() {
			return Disposition::Halt;
		}

		if data.is_empty() || errored {
			return self.empty_tick();
		}
		self.empty_transfer_count = 0;

		let cur_sample_count = data.len() / self.unit_size;
		let mut trigger_offset = 0usize;

		if !self.soft_trigger.is_fired() {
			if let Some(matched) = self.soft_trigger.scan(data, self.unit_size) {
				trigger_offset = matched.offset;

				// Tell the frontend we hit the trigger here, then replay the samples
				// that satisfied the stages, since the stream skips past them.
				sink.send(Packet::Trigger(None));
				let prefix = self.soft_trigger.matched_bytes(self.unit_size);
				sink.send(Packet::Logic {
					unit_size: self.unit_size,
					data: &prefix,
				});
			}
		}

		if self.soft_trigger.is_fired() {
			let trigger_offset_bytes = trigger_offset * self.unit_size;
			let payload = &data[trigger_offset_bytes..];

			if !self.dslogic || self.dslogic_mode == DslogicMode::Logic {
				let payload = if self.dslogic {
					self.clamp_to_limit(payload)
				} else {
					payload
				};
				if !payload.is_empty() {
					if self.dslogic && self.dslogic_test.checks_pattern() {
						self.check_test_pattern(payload);
					}
					sink.send(Packet::Logic {
						unit_size: self.unit_size,
						data: payload,
					});
				}
			} else {
				sink.send(Packet::Analog {
					num_samples: cur_sample_count,
					data: payload,
				});
			}

			self.num_samples += cur_sample_count as i64;
			if self.limit_samples > 0 && self.num_samples as u64 > self.limit_samples {
				self.abort();
				return Disposition::Halt;
			}
		}

		Disposition::Resubmit
	}

	/// DSLogic keeps streaming past the configured sample count; trim the tail so the
	/// sink never sees more than it asked for.
	fn clamp_to_limit<'b>(&self, payload: &'b [u8]) -> &'b [u8]
	{
		if self.limit_samples == 0 {
			return payload;
		}

		let delivered = self.num_samples.max(0) as u64;
		let remaining = self.limit_samples.saturating_sub(delivered) as usize * self.unit_size;
		&payload[..payload.len().min(remaining)]
	}

	/// In test mode consecutive 16-bit samples must follow a counter that wraps at 65001.
	/// Mismatches are reported, not fatal; the counter reseeds from the offending sample.
	fn check_test_pattern(&mut self, data: &[u8])
	{
		let mut reported = false;
		for pair in data.chunks_exact(2) {
			let sample = u32::from(u16::from_le_bytes([pair[0], pair[1]]));
			if let Some(expected) = self.test_expected {
				if sample != expected && !reported {
					error!("Test pattern mismatch: expected {}, got {}.", expected, sample);
					reported = true;
				}
			}
			self.test_expected = Some((sample + 1) % TEST_PATTERN_MODULUS);
		}
	}
}

/// Everything acquisition start needs from the device lifecycle layer.
pub(crate) struct AcquisitionSetup<'d>
{
	pub samplerate: u64,
	pub limit_samples: u64,
	pub sample_wide: bool,
	pub soft_trigger: SoftTrigger,
	pub dslogic: Option<DslogicSetup<'d>>,
}

/// The DSLogic-only half of an acquisition setup.
pub(crate) struct DslogicSetup<'d>
{
	pub mode: DslogicMode,
	pub test: DslogicTestMode,
	pub ext_clock: bool,
	pub trigger: &'d Trigger,
}

/// Progress report from one pump step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcquisitionStatus
{
	Running,
	Finished,
}

/// A running acquisition: the transfer queue plus the stream state it feeds.
pub struct Acquisition<'s>
{
	sink: &'s mut dyn PacketSink,
	stream: SampleStream,
	/// Dropped (unsubscribing from the event pump) once the in-flight count drains to zero.
	queue: Option<Queue<RequestBuffer>>,
	transfer_size: usize,
	num_transfers: usize,
	timeout: Duration,
	dslogic_status: Option<DslogicStatus>,
	finished: bool,
}

impl<'s> Acquisition<'s>
{
	/// Configure the device and submit the initial transfers, emitting the HEADER packet.
	///
	/// For a plain FX2 this submits the data transfers and issues START. For a DSLogic it
	/// stops any previous run, loads the FPGA setting, and submits the single
	/// trigger-position read that precedes data streaming.
	pub(crate) fn start(
		handle: &UsbHandle,
		setup: AcquisitionSetup<'_>,
		sink: &'s mut dyn PacketSink,
	) -> Result<Self, Error>
	{
		let dslogic = setup.dslogic.is_some();
		let data_size = match setup.dslogic.as_ref().map(|d| d.mode) {
			Some(DslogicMode::Analog) => DSLOGIC_ANALOG_TRANSFER_SIZE,
			Some(DslogicMode::Dso) => DSLOGIC_DSO_TRANSFER_SIZE,
			_ => get_buffer_size(setup.samplerate, dslogic, setup.sample_wide),
		};

		let stream = SampleStream::new(
			setup.sample_wide,
			setup.soft_trigger,
			setup.limit_samples,
			dslogic,
			setup.dslogic.as_ref().map(|d| d.mode).unwrap_or_default(),
			setup.dslogic.as_ref().map(|d| d.test).unwrap_or_default(),
		);

		let mut acquisition = Self {
			sink,
			stream,
			queue: None,
			transfer_size: data_size,
			num_transfers: get_number_of_transfers(setup.samplerate, dslogic, setup.sample_wide),
			timeout: get_timeout(setup.samplerate, dslogic, setup.sample_wide),
			dslogic_status: dslogic.then_some(DslogicStatus::Init),
			finished: false,
		};

		match &setup.dslogic {
			None => {
				let mut queue = handle.bulk_in_queue(FX2_DATA_ENDPOINT)?;
				for _ in 0..acquisition.num_transfers {
					queue.submit(RequestBuffer::new(acquisition.transfer_size));
				}
				debug!(
					"Submitted {} transfers of {} bytes on endpoint {}.",
					acquisition.num_transfers, acquisition.transfer_size, FX2_DATA_ENDPOINT
				);
				acquisition.queue = Some(queue);

				acquisition.sink.send(Packet::Header);

				let command =
					match StartCommand::new(setup.samplerate, setup.sample_wide, false) {
						Ok(command) => command,
						Err(error) => return Err(acquisition.fail_after_header(error)),
					};
				if let Err(error) = protocol::start_acquisition(handle, command, false) {
					return Err(acquisition.fail_after_header(error));
				}
			},
			Some(dsl) => {
				// Stop any previous GPIF acquisition; the command is idempotent.
				protocol::dslogic_stop_acquisition(handle)?;
				info!("Stopped previous DSLogic acquisition.");

				protocol::dslogic_fpga_setting_count(handle, FpgaSetting::WORD_COUNT)?;
				let setting = FpgaSetting::new(
					dsl.trigger,
					dsl.mode,
					dsl.test,
					dsl.ext_clock,
					setup.samplerate,
					setup.limit_samples,
				);
				let image = setting.to_bytes();
				let sent = handle.bulk_out(DSLOGIC_SETTING_ENDPOINT, image, BULK_TIMEOUT)?;
				if sent != FpgaSetting::BYTE_SIZE {
					return Err(ErrorKind::DeviceSeemsInvalid(S!("short FPGA setting transfer"))
						.error());
				}
				info!("FPGA setting done.");

				// One transfer polls the trigger position; data transfers follow once it lands.
				let mut queue = handle.bulk_in_queue(DSLOGIC_DATA_ENDPOINT)?;
				queue.submit(RequestBuffer::new(TriggerPos::BYTE_SIZE));
				acquisition.queue = Some(queue);
				acquisition.dslogic_status = Some(DslogicStatus::Start);

				acquisition.sink.send(Packet::Header);
			},
		}

		Ok(acquisition)
	}

	/// Samples delivered so far; -1 once the acquisition has been aborted.
	pub fn num_samples(&self) -> i64
	{
		self.stream.num_samples()
	}

	pub fn is_finished(&self) -> bool
	{
		self.finished
	}

	/// Request the acquisition to stop. In-flight transfers are cancelled; keep pumping
	/// until [`AcquisitionStatus::Finished`] so the END packet is delivered.
	pub fn stop(&mut self)
	{
		self.abort();
	}

	/// Drive the acquisition to completion.
	pub fn run(&mut self) -> AcquisitionStatus
	{
		while self.pump() == AcquisitionStatus::Running {}
		AcquisitionStatus::Finished
	}

	/// One event-dispatch step: wait (bounded) for a transfer completion and process it.
	pub fn pump(&mut self) -> AcquisitionStatus
	{
		if self.finished {
			return AcquisitionStatus::Finished;
		}

		if self.queue.as_ref().is_none_or(|queue| queue.pending() == 0) {
			self.finish();
			return AcquisitionStatus::Finished;
		}

		let timeout = self.timeout;
		let completion = self
			.queue
			.as_mut()
			.and_then(|queue| block_on_deadline(queue.next_complete(), timeout));

		match completion {
			Some(completion) => self.handle_completion(completion),
			None => {
				// Nothing completed within the transfer timeout. While waiting for the
				// DSLogic trigger this is business as usual; during data streaming it
				// feeds the same give-up ladder as empty transfers.
				if !self.stream.aborted() && self.dslogic_status != Some(DslogicStatus::Start) {
					if self.stream.empty_tick() == Disposition::Halt {
						self.cancel_remaining();
					}
				}
			},
		}

		if self.queue.as_ref().is_none_or(|queue| queue.pending() == 0) {
			self.finish();
		}

		if self.finished {
			AcquisitionStatus::Finished
		} else {
			AcquisitionStatus::Running
		}
	}

	fn handle_completion(&mut self, completion: Completion<Vec<u8>>)
	{
		let errored = match completion.status {
			Ok(()) => false,
			// Cancelled transfers just drain; their buffers are dropped here.
			Err(TransferError::Cancelled) => return,
			Err(TransferError::Disconnected) => {
				error!("Device has been disconnected.");
				self.abort();
				return;
			},
			Err(error) => {
				warn!("Transfer completed with error: {}.", error);
				true
			},
		};

		// If acquisition has already ended, just free any queued up transfers coming in.
		if self.stream.aborted() {
			return;
		}

		if self.dslogic_status == Some(DslogicStatus::Start) {
			self.receive_trigger_pos(completion.data, errored);
			return;
		}

		match self.stream.receive(&completion.data, errored, self.sink) {
			Disposition::Resubmit => {
				let size = self.transfer_size;
				if let Some(queue) = self.queue.as_mut() {
					queue.submit(RequestBuffer::reuse(completion.data, size));
				}
			},
			Disposition::Halt => self.cancel_remaining(),
		}
	}

	/// Completion of the one-shot trigger-position read on the DSLogic path.
	fn receive_trigger_pos(&mut self, data: Vec<u8>, errored: bool)
	{
		if errored || data.len() != TriggerPos::BYTE_SIZE {
			error!("Failed to receive the trigger position report.");
			self.dslogic_status = Some(DslogicStatus::Error);
			self.abort();
			return;
		}

		let trigger_pos = match TriggerPos::from_bytes(&data) {
			Ok(trigger_pos) => trigger_pos,
			Err(error) => {
				error!("Bad trigger position report: {}.", error);
				self.dslogic_status = Some(DslogicStatus::Error);
				self.abort();
				return;
			},
		};

		info!(
			"Trigger position received: real_pos {}, ram_saddr {}.",
			trigger_pos.real_pos, trigger_pos.ram_saddr
		);
		self.sink.send(Packet::Trigger(Some(&trigger_pos)));
		self.dslogic_status = Some(DslogicStatus::Triggered);

		if let Some(queue) = self.queue.as_mut() {
			for _ in 0..self.num_transfers {
				queue.submit(RequestBuffer::new(self.transfer_size));
			}
			debug!(
				"Submitted {} data transfers of {} bytes on endpoint {}.",
				self.num_transfers, self.transfer_size, DSLOGIC_DATA_ENDPOINT
			);
		}
		self.dslogic_status = Some(DslogicStatus::Data);
	}

	fn abort(&mut self)
	{
		self.stream.abort();
		self.cancel_remaining();
	}

	fn cancel_remaining(&mut self)
	{
		if let Some(queue) = self.queue.as_mut() {
			queue.cancel_all();
		}
	}

	/// Terminal packet and event-pump release, exactly once.
	fn finish(&mut self)
	{
		if self.finished {
			return;
		}
		self.finished = true;
		self.sink.send(Packet::End);
		self.queue = None;
		debug!("Acquisition finished with {} samples.", self.stream.num_samples());
	}

	/// Failure after the HEADER packet went out: drain the queue so END is still emitted,
	/// then hand the error back.
	fn fail_after_header(&mut self, error: Error) -> Error
	{
		self.abort();
		while self.pump() == AcquisitionStatus::Running {}
		error
	}
}
