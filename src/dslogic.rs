// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! DSLogic specifics: device modes, the packed FPGA setting image and the trigger-position
//! response that precedes data streaming.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::S;
use crate::error::{Error, ErrorKind};
use crate::protocol::mhz;
use crate::trigger::{TRIGGER_STAGES, Trigger, TriggerMode};

/// DSLogic device modes, selected at scan time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DslogicMode
{
	/// Logic analyzer (16 logic channels).
	#[default]
	Logic,
	/// DSO (2 analog channels).
	Dso,
	/// Data acquisition (9 analog channels).
	Analog,
}

impl DslogicMode
{
	pub const NAMES: &[&str] = &["Logic Analyzer", "Oscilloscope", "Data Acquisition"];

	pub fn name(self) -> &'static str
	{
		match self {
			Self::Logic => Self::NAMES[0],
			Self::Dso => Self::NAMES[1],
			Self::Analog => Self::NAMES[2],
		}
	}
}

impl Display for DslogicMode
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		write!(f, "{}", self.name())
	}
}

impl FromStr for DslogicMode
{
	type Err = Error;

	fn from_str(name: &str) -> Result<Self, Error>
	{
		match name {
			"Logic Analyzer" => Ok(Self::Logic),
			"Oscilloscope" => Ok(Self::Dso),
			"Data Acquisition" => Ok(Self::Analog),
			_ => Err(ErrorKind::Argument(Some(format!("unknown device mode {:?}", name))).error()),
		}
	}
}

/// DSLogic hardware test modes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DslogicTestMode
{
	#[default]
	None,
	/// Internal pattern test mode.
	Internal,
	/// External pattern test mode.
	External,
	/// SDRAM loopback test mode.
	Loopback,
}

impl DslogicTestMode
{
	pub const NAMES: &[&str] = &["None", "Internal Test", "External Test", "DRAM Loopback Test"];

	pub fn name(self) -> &'static str
	{
		match self {
			Self::None => Self::NAMES[0],
			Self::Internal => Self::NAMES[1],
			Self::External => Self::NAMES[2],
			Self::Loopback => Self::NAMES[3],
		}
	}

	/// Whether captured samples carry the counter test pattern to verify.
	pub fn checks_pattern(self) -> bool
	{
		matches!(self, Self::Internal | Self::External)
	}
}

impl Display for DslogicTestMode
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		write!(f, "{}", self.name())
	}
}

impl FromStr for DslogicTestMode
{
	type Err = Error;

	fn from_str(name: &str) -> Result<Self, Error>
	{
		match name {
			"None" => Ok(Self::None),
			"Internal Test" => Ok(Self::Internal),
			"External Test" => Ok(Self::External),
			"DRAM Loopback Test" => Ok(Self::Loopback),
			_ => Err(ErrorKind::Argument(Some(format!("unknown test mode {:?}", name))).error()),
		}
	}
}

/// Acquisition state of a DSLogic device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DslogicStatus
{
	Error,
	Init,
	Start,
	Triggered,
	Data,
	Stop,
}

// Header marker words of the FPGA setting image. The FPGA parses the stream by tag, so
// these are fixed bit patterns rather than derived values.
const SYNC: u32 = 0xffff_ffff;
const MODE_HEADER: u16 = 0x0001;
const DIVIDER_HEADER: u32 = 0x0102_ffff;
const COUNT_HEADER: u32 = 0x0302_ffff;
const TRIG_POS_HEADER: u32 = 0x0502_ffff;
const TRIG_GLB_HEADER: u16 = 0x0701;
const TRIG_ADP_HEADER: u32 = 0x0a02_ffff;
const TRIG_SDA_HEADER: u32 = 0x0c02_ffff;
const TRIG_MASK0_HEADER: u32 = 0x1010_ffff;
const TRIG_MASK1_HEADER: u32 = 0x1110_ffff;
const TRIG_VALUE0_HEADER: u32 = 0x1410_ffff;
const TRIG_VALUE1_HEADER: u32 = 0x1510_ffff;
const TRIG_EDGE0_HEADER: u32 = 0x1810_ffff;
const TRIG_EDGE1_HEADER: u32 = 0x1910_ffff;
const TRIG_COUNT0_HEADER: u32 = 0x1c10_ffff;
const TRIG_COUNT1_HEADER: u32 = 0x1d10_ffff;
const TRIG_LOGIC0_HEADER: u32 = 0x2010_ffff;
const TRIG_LOGIC1_HEADER: u32 = 0x2110_ffff;

// Mode word bit positions. External test mode asserts both of its bits.
const MODE_EXT_TEST_HIGH_POS: u16 = 15;
const MODE_EXT_TEST_LOW_POS: u16 = 14;
const MODE_LOOPBACK_POS: u16 = 13;
const MODE_ANALOG_POS: u16 = 7;
const MODE_HALF_RATE_POS: u16 = 6;
const MODE_QUARTER_RATE_POS: u16 = 5;
const MODE_NOT_LOGIC_POS: u16 = 4;
const MODE_EXT_CLOCK_POS: u16 = 1;

/// Everything the FPGA needs to run one acquisition, sent as a single bulk OUT before start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpgaSetting
{
	pub mode: u16,
	pub divider: u32,
	pub count: u32,
	pub trig_pos: u32,
	pub trig_glb: u16,
	pub trig_adp: u32,
	pub trig_sda: u32,
	pub mask0: [u16; TRIGGER_STAGES],
	pub mask1: [u16; TRIGGER_STAGES],
	pub value0: [u16; TRIGGER_STAGES],
	pub value1: [u16; TRIGGER_STAGES],
	pub edge0: [u16; TRIGGER_STAGES],
	pub edge1: [u16; TRIGGER_STAGES],
	pub count0: [u16; TRIGGER_STAGES],
	pub count1: [u16; TRIGGER_STAGES],
	pub logic0: [u16; TRIGGER_STAGES],
	pub logic1: [u16; TRIGGER_STAGES],
}

impl FpgaSetting
{
	/// Size of the serialised image.
	pub const BYTE_SIZE: usize = 416;
	/// The setting stream length in 16-bit words, announced by the preface command.
	pub const WORD_COUNT: u32 = (Self::BYTE_SIZE / 2) as u32;

	pub fn new(
		trigger: &Trigger,
		mode: DslogicMode,
		test: DslogicTestMode,
		ext_clock: bool,
		samplerate: u64,
		limit_samples: u64,
	) -> Self
	{
		let ext_test = test == DslogicTestMode::External;
		let loopback = test == DslogicTestMode::Loopback;
		let analog = mode == DslogicMode::Analog;

		let mode_word = (u16::from(ext_test) << MODE_EXT_TEST_HIGH_POS) |
			(u16::from(ext_test) << MODE_EXT_TEST_LOW_POS) |
			(u16::from(loopback) << MODE_LOOPBACK_POS) |
			u16::from(trigger.enabled) |
			(u16::from(mode != DslogicMode::Logic) << MODE_NOT_LOGIC_POS) |
			(u16::from(ext_clock) << MODE_EXT_CLOCK_POS) |
			(u16::from(samplerate == mhz(200) || analog) << MODE_QUARTER_RATE_POS) |
			(u16::from(samplerate == mhz(400)) << MODE_HALF_RATE_POS) |
			(u16::from(analog) << MODE_ANALOG_POS);

		let count = limit_samples as u32;
		let trig_pos = (u64::from(trigger.position()) * limit_samples / 100) as u32;

		let mut setting = Self {
			mode: mode_word,
			divider: mhz(100).div_ceil(samplerate) as u32,
			count,
			trig_pos,
			trig_glb: trigger.stages(),
			trig_adp: count.wrapping_sub(trig_pos).wrapping_sub(1),
			trig_sda: 0,
			mask0: [0; TRIGGER_STAGES],
			mask1: [0; TRIGGER_STAGES],
			value0: [0; TRIGGER_STAGES],
			value1: [0; TRIGGER_STAGES],
			edge0: [0; TRIGGER_STAGES],
			edge1: [0; TRIGGER_STAGES],
			count0: [0; TRIGGER_STAGES],
			count1: [0; TRIGGER_STAGES],
			logic0: [0; TRIGGER_STAGES],
			logic1: [0; TRIGGER_STAGES],
		};

		match trigger.mode {
			TriggerMode::Simple => {
				// Stage 0 carries the aggregate row; the remaining stages are parked with a
				// never-matching mask and pass-through logic.
				setting.mask0[0] = trigger.mask0(TRIGGER_STAGES);
				setting.mask1[0] = trigger.mask1(TRIGGER_STAGES);
				setting.value0[0] = trigger.value0(TRIGGER_STAGES);
				setting.value1[0] = trigger.value1(TRIGGER_STAGES);
				setting.edge0[0] = trigger.edge0(TRIGGER_STAGES);
				setting.edge1[0] = trigger.edge1(TRIGGER_STAGES);
				setting.count0[0] = trigger.count0(TRIGGER_STAGES);
				setting.count1[0] = trigger.count1(TRIGGER_STAGES);
				setting.logic0[0] = trigger.logic0(TRIGGER_STAGES);
				setting.logic1[0] = trigger.logic1(TRIGGER_STAGES);

				for stage in 1..TRIGGER_STAGES {
					setting.mask0[stage] = 1;
					setting.mask1[stage] = 1;
					setting.logic0[stage] = 2;
					setting.logic1[stage] = 2;
				}
			},
			TriggerMode::Advanced => {
				for stage in 0..TRIGGER_STAGES {
					setting.mask0[stage] = trigger.mask0(stage);
					setting.mask1[stage] = trigger.mask1(stage);
					setting.value0[stage] = trigger.value0(stage);
					setting.value1[stage] = trigger.value1(stage);
					setting.edge0[stage] = trigger.edge0(stage);
					setting.edge1[stage] = trigger.edge1(stage);
					setting.count0[stage] = trigger.count0(stage);
					setting.count1[stage] = trigger.count1(stage);
					setting.logic0[stage] = trigger.logic0(stage);
					setting.logic1[stage] = trigger.logic1(stage);
				}
			},
		}

		setting
	}

	/// Serialise to the little-endian, byte-packed wire image.
	pub fn to_bytes(&self) -> Vec<u8>
	{
		let mut image = Vec::with_capacity(Self::BYTE_SIZE);

		image.extend_from_slice(&SYNC.to_le_bytes());
		image.extend_from_slice(&MODE_HEADER.to_le_bytes());
		image.extend_from_slice(&self.mode.to_le_bytes());
		image.extend_from_slice(&DIVIDER_HEADER.to_le_bytes());
		image.extend_from_slice(&self.divider.to_le_bytes());
		image.extend_from_slice(&COUNT_HEADER.to_le_bytes());
		image.extend_from_slice(&self.count.to_le_bytes());
		image.extend_from_slice(&TRIG_POS_HEADER.to_le_bytes());
		image.extend_from_slice(&self.trig_pos.to_le_bytes());
		image.extend_from_slice(&TRIG_GLB_HEADER.to_le_bytes());
		image.extend_from_slice(&self.trig_glb.to_le_bytes());
		image.extend_from_slice(&TRIG_ADP_HEADER.to_le_bytes());
		image.extend_from_slice(&self.trig_adp.to_le_bytes());
		image.extend_from_slice(&TRIG_SDA_HEADER.to_le_bytes());
		image.extend_from_slice(&self.trig_sda.to_le_bytes());

		let stage_words = [
			(TRIG_MASK0_HEADER, &self.mask0),
			(TRIG_MASK1_HEADER, &self.mask1),
			(TRIG_VALUE0_HEADER, &self.value0),
			(TRIG_VALUE1_HEADER, &self.value1),
			(TRIG_EDGE0_HEADER, &self.edge0),
			(TRIG_EDGE1_HEADER, &self.edge1),
			(TRIG_COUNT0_HEADER, &self.count0),
			(TRIG_COUNT1_HEADER, &self.count1),
			(TRIG_LOGIC0_HEADER, &self.logic0),
			(TRIG_LOGIC1_HEADER, &self.logic1),
		];
		for (header, words) in stage_words {
			image.extend_from_slice(&header.to_le_bytes());
			for word in words {
				image.extend_from_slice(&word.to_le_bytes());
			}
		}

		image.extend_from_slice(&0u32.to_le_bytes());

		debug_assert_eq!(image.len(), Self::BYTE_SIZE);
		image
	}
}

/// The trigger-position report the FPGA sends on endpoint 6 once the trigger condition has
/// been met, followed by the first block of captured data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPos
{
	pub real_pos: u32,
	pub ram_saddr: u32,
	pub first_block: [u8; 504],
}

impl TriggerPos
{
	pub const BYTE_SIZE: usize = 512;

	pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
	{
		if bytes.len() != Self::BYTE_SIZE {
			return Err(ErrorKind::DeviceSeemsInvalid(S!("short trigger position report")).error());
		}

		let mut first_block = [0u8; 504];
		first_block.copy_from_slice(&bytes[8..]);

		Ok(Self {
			real_pos: u32::from_le_bytes(bytes[0..4].try_into().expect("sliced to size")),
			ram_saddr: u32::from_le_bytes(bytes[4..8].try_into().expect("sliced to size")),
			first_block,
		})
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::protocol::khz;

	fn plain_setting(samplerate: u64, limit: u64) -> FpgaSetting
	{
		FpgaSetting::new(
			&Trigger::new(),
			DslogicMode::Logic,
			DslogicTestMode::None,
			false,
			samplerate,
			limit,
		)
	}

	#[test]
	fn image_is_416_bytes_with_headers_in_place()
	{
		let image = plain_setting(mhz(100), 1024).to_bytes();
		assert_eq!(image.len(), FpgaSetting::BYTE_SIZE);
		assert_eq!(FpgaSetting::WORD_COUNT, 208);

		// sync, then the tagged scalar fields.
		assert_eq!(&image[0..4], &[0xff, 0xff, 0xff, 0xff]);
		assert_eq!(&image[4..6], &[0x01, 0x00]);
		assert_eq!(&image[8..12], &[0xff, 0xff, 0x02, 0x01]);
		assert_eq!(&image[16..20], &[0xff, 0xff, 0x02, 0x03]);
		assert_eq!(&image[24..28], &[0xff, 0xff, 0x02, 0x05]);
		assert_eq!(&image[32..34], &[0x01, 0x07]);
		assert_eq!(&image[36..40], &[0xff, 0xff, 0x02, 0x0a]);
		assert_eq!(&image[44..48], &[0xff, 0xff, 0x02, 0x0c]);

		// Ten stage-word groups of one header plus sixteen u16s each.
		let group_headers: [u32; 10] = [
			0x1010_ffff, 0x1110_ffff, 0x1410_ffff, 0x1510_ffff, 0x1810_ffff, 0x1910_ffff,
			0x1c10_ffff, 0x1d10_ffff, 0x2010_ffff, 0x2110_ffff,
		];
		for (index, header) in group_headers.iter().enumerate() {
			let offset = 52 + index * 36;
			assert_eq!(&image[offset..offset + 4], &header.to_le_bytes());
		}

		// Terminating sync word.
		assert_eq!(&image[412..416], &[0x00, 0x00, 0x00, 0x00]);
	}

	#[test]
	fn divider_rounds_up()
	{
		assert_eq!(plain_setting(mhz(100), 0).divider, 1);
		assert_eq!(plain_setting(mhz(200), 0).divider, 1);
		assert_eq!(plain_setting(khz(10), 0).divider, 10_000);
		// 100 MHz / 30 kHz is not integral; the divider must round up.
		assert_eq!(plain_setting(30_000, 0).divider, 3_334);
	}

	#[test]
	fn trigger_position_arithmetic()
	{
		let mut trigger = Trigger::new();
		trigger.set_position(25).unwrap();
		let setting = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::None,
			false,
			mhz(100),
			1000,
		);
		assert_eq!(setting.count, 1000);
		assert_eq!(setting.trig_pos, 250);
		assert_eq!(setting.trig_adp, 1000 - 250 - 1);
		assert_eq!(setting.trig_sda, 0);
	}

	#[test]
	fn mode_word_flags()
	{
		let trigger = Trigger::new();

		let logic =
			FpgaSetting::new(&trigger, DslogicMode::Logic, DslogicTestMode::None, false, mhz(1), 0);
		assert_eq!(logic.mode, 0);

		let ext_clock =
			FpgaSetting::new(&trigger, DslogicMode::Logic, DslogicTestMode::None, true, mhz(1), 0);
		assert_eq!(ext_clock.mode, 1 << 1);

		let ext_test = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::External,
			false,
			mhz(1),
			0,
		);
		assert_eq!(ext_test.mode, (1 << 15) | (1 << 14));

		let loopback = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::Loopback,
			false,
			mhz(1),
			0,
		);
		assert_eq!(loopback.mode, 1 << 13);

		let fast = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::None,
			false,
			mhz(200),
			0,
		);
		assert_eq!(fast.mode, 1 << 5);

		let fastest = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::None,
			false,
			mhz(400),
			0,
		);
		assert_eq!(fastest.mode, 1 << 6);

		let analog = FpgaSetting::new(
			&trigger,
			DslogicMode::Analog,
			DslogicTestMode::None,
			false,
			mhz(1),
			0,
		);
		// Analog capture implies the not-logic and quarter-rate bits as well.
		assert_eq!(analog.mode, (1 << 7) | (1 << 5) | (1 << 4));

		let mut armed = Trigger::new();
		armed.enabled = true;
		let with_trigger =
			FpgaSetting::new(&armed, DslogicMode::Logic, DslogicTestMode::None, false, mhz(1), 0);
		assert_eq!(with_trigger.mode, 1);
	}

	#[test]
	fn simple_mode_parks_the_upper_stages()
	{
		let mut trigger = Trigger::new();
		trigger.set_probe(0, '1', 'X').unwrap();
		trigger.set_probe(1, 'R', 'X').unwrap();
		let setting = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::None,
			false,
			mhz(100),
			0,
		);

		// Stage 0 comes from the aggregate row.
		assert_eq!(setting.value0[0], 0b11);
		assert_eq!(setting.edge0[0], 0b10);
		assert_eq!(setting.mask0[0], 0xfffc);
		assert_eq!(setting.logic0[0], 2);

		for stage in 1..TRIGGER_STAGES {
			assert_eq!(setting.mask0[stage], 1);
			assert_eq!(setting.mask1[stage], 1);
			assert_eq!(setting.value0[stage], 0);
			assert_eq!(setting.edge0[stage], 0);
			assert_eq!(setting.count0[stage], 0);
			assert_eq!(setting.logic0[stage], 2);
			assert_eq!(setting.logic1[stage], 2);
		}
	}

	#[test]
	fn advanced_mode_populates_every_stage()
	{
		let mut trigger = Trigger::new();
		trigger.mode = TriggerMode::Advanced;
		trigger.set_stage_pattern(0, "1", "0").unwrap();
		trigger.set_stage_pattern(15, "R", "F").unwrap();
		trigger.set_stage_count(15, 7, 9).unwrap();
		trigger.set_stage_inv(3, 1, 0).unwrap();
		let setting = FpgaSetting::new(
			&trigger,
			DslogicMode::Logic,
			DslogicTestMode::None,
			false,
			mhz(100),
			0,
		);

		assert_eq!(setting.value0[0] & 1, 1);
		assert_eq!(setting.value1[0] & 1, 0);
		assert_eq!(setting.edge0[15] & 1, 1);
		assert_eq!(setting.edge1[15] & 1, 1);
		assert_eq!(setting.count0[15], 7);
		assert_eq!(setting.count1[15], 9);
		assert_eq!(setting.logic0[3], 3);
		assert_eq!(setting.logic1[3], 2);
	}

	#[test]
	fn trigger_pos_report_parses()
	{
		let mut bytes = vec![0u8; TriggerPos::BYTE_SIZE];
		bytes[0..4].copy_from_slice(&0x1234_5678u32.to_le_bytes());
		bytes[4..8].copy_from_slice(&0x0bad_cafeu32.to_le_bytes());
		bytes[8] = 0xaa;
		bytes[511] = 0x55;

		let pos = TriggerPos::from_bytes(&bytes).unwrap();
		assert_eq!(pos.real_pos, 0x1234_5678);
		assert_eq!(pos.ram_saddr, 0x0bad_cafe);
		assert_eq!(pos.first_block[0], 0xaa);
		assert_eq!(pos.first_block[503], 0x55);

		assert!(TriggerPos::from_bytes(&bytes[..100]).is_err());
	}
}
