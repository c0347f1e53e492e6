// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! Vendor control commands understood by the fx2lafw and DSLogic firmwares.
//!
//! All commands are vendor control transfers with wValue = wIndex = 0. The DSLogic firmware
//! reuses the FX2 opcode space with shifted meanings: 0xB1 is START on a plain FX2 but
//! GET_REVID on a DSLogic, and 0xB2 the other way around.

use log::{error, info};

use crate::S;
use crate::error::{Error, ErrorKind};
use crate::usb::{CONTROL_TIMEOUT, DSLOGIC_CONTROL_TIMEOUT, UsbHandle};

pub const fn khz(freq: u64) -> u64
{
	freq * 1_000
}

pub const fn mhz(freq: u64) -> u64
{
	freq * 1_000_000
}

pub const CMD_GET_FW_VERSION: u8 = 0xb0;
pub const CMD_START: u8 = 0xb1;
pub const CMD_GET_REVID_VERSION: u8 = 0xb2;

pub const CMD_DSLOGIC_GET_REVID_VERSION: u8 = 0xb1;
pub const CMD_DSLOGIC_START: u8 = 0xb2;
pub const CMD_DSLOGIC_CONFIG: u8 = 0xb3;
pub const CMD_DSLOGIC_SETTING: u8 = 0xb4;

const CMD_START_FLAGS_WIDE_POS: u8 = 5;
const CMD_START_FLAGS_CLK_SRC_POS: u8 = 6;
const CMD_START_FLAGS_DSLOGIC_STOP_POS: u8 = 7;

pub const CMD_START_FLAGS_SAMPLE_8BIT: u8 = 0 << CMD_START_FLAGS_WIDE_POS;
pub const CMD_START_FLAGS_SAMPLE_16BIT: u8 = 1 << CMD_START_FLAGS_WIDE_POS;

pub const CMD_START_FLAGS_CLK_30MHZ: u8 = 0 << CMD_START_FLAGS_CLK_SRC_POS;
pub const CMD_START_FLAGS_CLK_48MHZ: u8 = 1 << CMD_START_FLAGS_CLK_SRC_POS;

pub const CMD_START_FLAGS_DSLOGIC_STOP: u8 = 1 << CMD_START_FLAGS_DSLOGIC_STOP_POS;

/// The firmware major version this driver speaks. Minor versions are compatible.
pub const REQUIRED_VERSION_MAJOR: u8 = 1;

pub const MAX_8BIT_SAMPLE_RATE: u64 = mhz(24);
pub const MAX_16BIT_SAMPLE_RATE: u64 = mhz(12);

/// 6 delay states of up to 256 clock ticks.
pub const MAX_SAMPLE_DELAY: u64 = 6 * 256;

/// Response to [`CMD_GET_FW_VERSION`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VersionInfo
{
	pub major: u8,
	pub minor: u8,
}

impl VersionInfo
{
	pub fn from_bytes(bytes: [u8; 2]) -> Self
	{
		Self {
			major: bytes[0],
			minor: bytes[1],
		}
	}
}

/// The 3-byte body of the START command: flags plus the GPIF sample delay.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StartCommand
{
	pub flags: u8,
	pub sample_delay: u16,
}

impl StartCommand
{
	/// Computes the clock source and sample delay for the requested samplerate.
	///
	/// The FX2 divides one of its two GPIF clocks: prefer 48 MHz when it divides evenly and
	/// the delay fits the 6x256 tick budget, fall back to 30 MHz, refuse anything else.
	/// DSLogic devices always run the GPIF at 30 MHz with no delay; the real rate is carried
	/// by the FPGA divider instead.
	pub fn new(samplerate: u64, sample_wide: bool, dslogic: bool) -> Result<Self, Error>
	{
		let mut flags = CMD_START_FLAGS_CLK_30MHZ;
		let mut delay = 0;

		if samplerate == 0 {
			return Err(ErrorKind::Argument(Some(S!("samplerate is unset"))).error());
		}

		if !dslogic {
			if sample_wide && samplerate > MAX_16BIT_SAMPLE_RATE {
				error!(
					"Unable to sample at {}Hz when collecting 16-bit samples.",
					samplerate
				);
				return Err(ErrorKind::Argument(Some(format!(
					"samplerate {}Hz too fast for 16-bit samples",
					samplerate
				)))
				.error());
			}

			if mhz(48) % samplerate == 0 {
				flags = CMD_START_FLAGS_CLK_48MHZ;
				delay = mhz(48) / samplerate - 1;
				if delay > MAX_SAMPLE_DELAY {
					delay = 0;
				}
			}

			if delay == 0 && mhz(30) % samplerate == 0 {
				flags = CMD_START_FLAGS_CLK_30MHZ;
				delay = mhz(30) / samplerate - 1;
			}

			if delay == 0 || delay > MAX_SAMPLE_DELAY {
				error!("Unable to sample at {}Hz.", samplerate);
				return Err(
					ErrorKind::Argument(Some(format!("unsupported samplerate {}Hz", samplerate)))
						.error(),
				);
			}
		}

		info!(
			"GPIF delay = {}, clocksource = {}MHz.",
			delay,
			if flags & CMD_START_FLAGS_CLK_48MHZ != 0 {
				"48"
			} else {
				"30"
			}
		);

		flags |= if sample_wide {
			CMD_START_FLAGS_SAMPLE_16BIT
		} else {
			CMD_START_FLAGS_SAMPLE_8BIT
		};

		Ok(Self {
			flags,
			sample_delay: delay as u16,
		})
	}

	/// The DSLogic "stop acquisition" command: the stop flag alone.
	pub fn stop() -> Self
	{
		Self {
			flags: CMD_START_FLAGS_DSLOGIC_STOP,
			sample_delay: 0,
		}
	}

	/// Wire form: flags, then the delay high byte, then the low byte.
	pub fn to_bytes(self) -> [u8; 3]
	{
		let [delay_l, delay_h] = self.sample_delay.to_le_bytes();
		[self.flags, delay_h, delay_l]
	}
}

/// Query the firmware version. Incompatibility is decided by the caller.
pub fn get_fw_version(handle: &UsbHandle) -> Result<VersionInfo, Error>
{
	let mut buf = [0u8; 2];
	let read = handle
		.vendor_read(CMD_GET_FW_VERSION, &mut buf, CONTROL_TIMEOUT)
		.map_err(|e| e.with_ctx("getting version info"))?;
	if read != buf.len() {
		return Err(ErrorKind::VersionQueryFailed.error());
	}

	Ok(VersionInfo::from_bytes(buf))
}

/// Query the FX2 silicon revision byte. Only used for logging.
pub fn get_revid(handle: &UsbHandle, dslogic: bool) -> Result<u8, Error>
{
	let request = if dslogic {
		CMD_DSLOGIC_GET_REVID_VERSION
	} else {
		CMD_GET_REVID_VERSION
	};

	let mut buf = [0u8; 1];
	let read = handle
		.vendor_read(request, &mut buf, CONTROL_TIMEOUT)
		.map_err(|e| e.with_ctx("getting REVID"))?;
	if read != buf.len() {
		return Err(ErrorKind::VersionQueryFailed.error());
	}

	Ok(buf[0])
}

/// Issue the START command, beginning GPIF sampling on the device.
pub fn start_acquisition(handle: &UsbHandle, command: StartCommand, dslogic: bool) -> Result<(), Error>
{
	let (request, timeout) = if dslogic {
		(CMD_DSLOGIC_START, DSLOGIC_CONTROL_TIMEOUT)
	} else {
		(CMD_START, CONTROL_TIMEOUT)
	};

	handle
		.vendor_write(request, &command.to_bytes(), timeout)
		.map_err(|e| e.with_ctx("sending start command"))
}

/// Stop any acquisition a DSLogic may still be running. Idempotent.
pub fn dslogic_stop_acquisition(handle: &UsbHandle) -> Result<(), Error>
{
	handle
		.vendor_write(
			CMD_DSLOGIC_START,
			&StartCommand::stop().to_bytes(),
			DSLOGIC_CONTROL_TIMEOUT,
		)
		.map_err(|e| e.with_ctx("sending stop command"))
}

/// Put the DSLogic's FX2 into FPGA configuration mode; the bitstream follows on bulk OUT.
pub fn dslogic_fpga_config(handle: &UsbHandle) -> Result<(), Error>
{
	handle
		.vendor_write(CMD_DSLOGIC_CONFIG, &[], DSLOGIC_CONTROL_TIMEOUT)
		.map_err(|e| e.with_ctx("sending FPGA configure command"))
}

/// Announce an FPGA setting stream of `setting_count` 16-bit words (little-endian 24-bit body).
pub fn dslogic_fpga_setting_count(handle: &UsbHandle, setting_count: u32) -> Result<(), Error>
{
	let body = [
		setting_count as u8,
		(setting_count >> 8) as u8,
		(setting_count >> 16) as u8,
	];

	handle
		.vendor_write(CMD_DSLOGIC_SETTING, &body, CONTROL_TIMEOUT)
		.map_err(|e| e.with_ctx("sending FPGA setting command"))
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn one_megahertz_selects_48mhz_clock()
	{
		let cmd = StartCommand::new(mhz(1), false, false).unwrap();
		assert_eq!(cmd.flags, CMD_START_FLAGS_CLK_48MHZ | CMD_START_FLAGS_SAMPLE_8BIT);
		assert_eq!(cmd.sample_delay, 47);
		assert_eq!(cmd.to_bytes(), [0x40, 0x00, 47]);
	}

	#[test]
	fn rates_only_dividing_30mhz_fall_back()
	{
		// 3 MHz divides 48 MHz evenly (delay 15) so stays on the fast clock...
		let cmd = StartCommand::new(mhz(3), false, false).unwrap();
		assert_eq!(cmd.flags & CMD_START_FLAGS_CLK_48MHZ, CMD_START_FLAGS_CLK_48MHZ);
		// ...while 20 kHz would need a delay of 2399 > 1536 on 48 MHz, so 30 MHz it is.
		let cmd = StartCommand::new(khz(20), false, false).unwrap();
		assert_eq!(cmd.flags & CMD_START_FLAGS_CLK_48MHZ, 0);
		assert_eq!(cmd.sample_delay, 1499);
	}

	#[test]
	fn chosen_delay_satisfies_clock_division()
	{
		for &rate in &[khz(20), khz(25), khz(50), khz(100), khz(200), khz(250), khz(500), mhz(1),
			mhz(2), mhz(3), mhz(4), mhz(6), mhz(8), mhz(12), mhz(16), mhz(24)]
		{
			let cmd = StartCommand::new(rate, false, false).unwrap();
			let clock = if cmd.flags & CMD_START_FLAGS_CLK_48MHZ != 0 {
				mhz(48)
			} else {
				mhz(30)
			};
			assert_eq!(clock % rate, 0, "rate {}", rate);
			assert_eq!(u64::from(cmd.sample_delay), clock / rate - 1, "rate {}", rate);
			assert!(u64::from(cmd.sample_delay) <= MAX_SAMPLE_DELAY);
			assert!(cmd.sample_delay > 0);
		}
	}

	#[test]
	fn wide_sampling_is_limited_to_12mhz()
	{
		assert!(StartCommand::new(mhz(12), true, false).is_ok());
		assert!(StartCommand::new(mhz(24), true, false).is_err());
	}

	#[test]
	fn indivisible_rates_are_refused()
	{
		assert!(StartCommand::new(7_000_000, false, false).is_err());
		// The clock rates themselves produce a zero delay, which the firmware cannot do.
		assert!(StartCommand::new(mhz(48), false, false).is_err());
		assert!(StartCommand::new(mhz(30), false, false).is_err());
	}

	#[test]
	fn dslogic_always_runs_the_gpif_at_30mhz()
	{
		let cmd = StartCommand::new(mhz(400), true, true).unwrap();
		assert_eq!(cmd.flags, CMD_START_FLAGS_CLK_30MHZ | CMD_START_FLAGS_SAMPLE_16BIT);
		assert_eq!(cmd.sample_delay, 0);
	}

	#[test]
	fn stop_command_sets_the_stop_flag_alone()
	{
		assert_eq!(StartCommand::stop().to_bytes(), [0x80, 0x00, 0x00]);
	}
}
