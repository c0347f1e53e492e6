// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! Device lifecycle: scanning the bus, firmware bring-up, open/close and configuration.
//!
//! A scan enumerates the bus, matches profiles and uploads firmware to devices that need it;
//! those renumerate and are re-found by ordinal during the renumeration window, since their
//! address is not stable until they come back. Open then claims the interface, gates on the
//! firmware version, and (for a DSLogic) loads the FPGA bitstream.

use std::fmt::{self, Display, Formatter};
use std::mem;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use nusb::{DeviceInfo, list_devices};

use crate::acquisition::{Acquisition, AcquisitionSetup, DslogicSetup};
use crate::{S, log_and_return};
use crate::dslogic::{DslogicMode, DslogicTestMode};
use crate::error::{Error, ErrorKind};
use crate::firmware::{self, DEFAULT_FIRMWARE_DIR, DSLOGIC_FPGA_BITSTREAM};
use crate::profile::{self, DeviceProfile};
use crate::protocol::{self, REQUIRED_VERSION_MAJOR, khz, mhz};
use crate::session::PacketSink;
use crate::trigger::{SoftTrigger, Trigger};
use crate::usb::{DeviceLocation, Pid, USB_INTERFACE, UsbHandle, Vid};

/// Budget for the device to come back after a firmware upload, measured from the upload.
pub const MAX_RENUM_DELAY: Duration = Duration::from_millis(3000);
/// It takes at least this long for the FX2 to be gone from the USB bus after upload.
const RENUM_GONE_DELAY: Duration = Duration::from_millis(300);
/// Poll interval for open attempts during the renumeration window.
const RENUM_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// The FX2 needs a moment after the configure command before it accepts the bitstream.
const FPGA_CONFIG_DELAY: Duration = Duration::from_millis(10);

/// Samplerates a plain fx2lafw device can be asked for.
pub const SAMPLERATES: &[u64] = &[
	khz(20),
	khz(25),
	khz(50),
	khz(100),
	khz(200),
	khz(250),
	khz(500),
	mhz(1),
	mhz(2),
	mhz(3),
	mhz(4),
	mhz(6),
	mhz(8),
	mhz(12),
	mhz(16),
	mhz(24),
];

/// Samplerates of the DSLogic (the FPGA divider does the work, see the FPGA setting).
pub const DSLOGIC_SAMPLERATES: &[u64] = &[
	khz(10),
	khz(20),
	khz(50),
	khz(100),
	khz(200),
	khz(500),
	mhz(1),
	mhz(2),
	mhz(5),
	mhz(10),
	mhz(20),
	mhz(25),
	mhz(50),
	mhz(100),
	mhz(200),
	mhz(400),
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceStatus
{
	/// Seen on the bus but never opened; matched by scan ordinal.
	Initializing,
	/// Fully enumerated and closed; matched by bus and address.
	Inactive,
	/// Open and usable.
	Active,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelType
{
	Logic,
	Analog,
}

/// One probe of the analyzer.
#[derive(Debug, Clone)]
pub struct Channel
{
	pub index: usize,
	pub channel_type: ChannelType,
	pub enabled: bool,
	/// Software trigger pattern for the FX2 path: one `0`/`1` character per stage.
	pub trigger: Option<String>,
	pub name: String,
}

impl Channel
{
	fn new(index: usize, channel_type: ChannelType) -> Self
	{
		Self {
			index,
			channel_type,
			enabled: true,
			trigger: None,
			name: index.to_string(),
		}
	}
}

/// Scan criteria and environment for finding supported devices.
#[derive(Debug, Clone)]
pub struct Fx2Matcher
{
	conn: Option<DeviceLocation>,
	device_mode: DslogicMode,
	firmware_dir: PathBuf,
}

impl Default for Fx2Matcher
{
	fn default() -> Self
	{
		Self {
			conn: None,
			device_mode: DslogicMode::Logic,
			firmware_dir: PathBuf::from(DEFAULT_FIRMWARE_DIR),
		}
	}
}

impl Fx2Matcher
{
	pub fn new() -> Self
	{
		Default::default()
	}

	/// Restrict the scan to one bus location (the `CONN` option).
	#[must_use]
	pub fn conn(mut self, conn: Option<DeviceLocation>) -> Self
	{
		self.conn = conn;
		self
	}

	/// Select the capture mode DSLogic devices are set up for (the `DEVICE_MODE` option).
	#[must_use]
	pub fn device_mode(mut self, mode: DslogicMode) -> Self
	{
		self.device_mode = mode;
		self
	}

	/// Override where firmware images and bitstreams are loaded from.
	#[must_use]
	pub fn firmware_dir(mut self, dir: impl Into<PathBuf>) -> Self
	{
		self.firmware_dir = dir.into();
		self
	}

	/// Find all supported devices, uploading firmware to the ones that need it.
	///
	/// Devices that received firmware renumerate shortly after; their instances carry the
	/// address sentinel until [`Fx2Device::open`] re-finds them. Errors do not stop the
	/// scan, they are collected alongside the devices that were found.
	pub fn scan(&self) -> Fx2ScanResults
	{
		let mut results = Fx2ScanResults::default();

		let devices = match list_devices() {
			Ok(devices) => devices,
			Err(error) => {
				results.errors.push(error.into());
				return results;
			},
		};

		for device_info in devices {
			if let Some(conn) = &self.conn {
				if DeviceLocation::of(&device_info) != *conn {
					continue;
				}
			}

			let Some(profile) = profile::find_profile(&device_info) else {
				continue;
			};

			let ordinal = results.found.len();
			match Fx2Device::from_usb_device(device_info, profile, ordinal, self) {
				Ok(device) => results.found.push(device),
				Err(error) => results.errors.push(error),
			}
		}

		results
	}
}

/// Everything a scan turned up: found devices plus the errors hit along the way.
#[derive(Debug, Default)]
pub struct Fx2ScanResults
{
	pub found: Vec<Fx2Device>,
	pub errors: Vec<Error>,
}

impl Fx2ScanResults
{
	/// Pops all found devices, reporting any scan errors.
	pub fn pop_all(&mut self) -> Result<Vec<Fx2Device>, Error>
	{
		if self.found.is_empty() {
			if !self.errors.is_empty() {
				warn!("Device not found and errors occurred when scanning for devices.");
				warn!("One of these may be why no device was found: {:?}", self.errors.as_slice());
			}
			return Err(ErrorKind::DeviceNotFound.error());
		}

		if !self.errors.is_empty() {
			warn!("Matching devices found but errors occurred when scanning for devices.");
			warn!("Other device errors: {:?}", self.errors.as_slice());
		}

		Ok(mem::take(&mut self.found))
	}

	/// Pops a single found device, handling printing error and warning cases.
	pub fn pop_single(&mut self, operation: &str) -> Result<Fx2Device, Error>
	{
		match self.found.len() {
			0 => {
				if !self.errors.is_empty() {
					warn!("Device not found and errors occurred when scanning for devices.");
					warn!(
						"One of these may be why no device was found: {:?}",
						self.errors.as_slice()
					);
				}
				Err(ErrorKind::DeviceNotFound.error())
			},
			1 => {
				if !self.errors.is_empty() {
					warn!("Matching device found but errors occurred when scanning for devices.");
					warn!("It is unlikely but possible that the incorrect device was selected!");
					warn!("Other device errors: {:?}", self.errors.as_slice());
				}
				Ok(self.found.remove(0))
			},
			found_len => {
				error!(
					"{} operation only accepts one device, but {} were found!",
					operation, found_len
				);
				error!("Hint: restrict the scan with a conn filter (bus.address).");
				Err(ErrorKind::TooManyDevices.error())
			},
		}
	}
}

/// One FX2 based logic analyzer and its acquisition settings.
#[derive(Debug)]
pub struct Fx2Device
{
	profile: &'static DeviceProfile,
	/// Index among matched devices at scan time; identifies the device while its address
	/// is still the post-upload sentinel.
	ordinal: usize,
	status: DeviceStatus,
	location: DeviceLocation,
	handle: Option<UsbHandle>,
	channels: Vec<Channel>,

	/// When firmware was uploaded this session; drives the renumeration wait on open.
	fw_updated: Option<Instant>,
	firmware_dir: PathBuf,

	samplerates: &'static [u64],
	cur_samplerate: u64,
	limit_samples: u64,
	sample_wide: bool,

	dslogic: bool,
	dslogic_mode: DslogicMode,
	dslogic_test: DslogicTestMode,
	dslogic_ext_clock: bool,
	trigger: Trigger,
}

impl Fx2Device
{
	fn from_usb_device(
		device_info: DeviceInfo,
		profile: &'static DeviceProfile,
		ordinal: usize,
		matcher: &Fx2Matcher,
	) -> Result<Self, Error>
	{
		let dslogic = profile.is_dslogic();
		let channel_type = if dslogic && matcher.device_mode != DslogicMode::Logic {
			ChannelType::Analog
		} else {
			ChannelType::Logic
		};
		let channels = (0..profile.num_logic_channels())
			.map(|index| Channel::new(index, channel_type))
			.collect();

		let mut device = Self {
			profile,
			ordinal,
			status: DeviceStatus::Initializing,
			location: DeviceLocation::of(&device_info),
			handle: None,
			channels,
			fw_updated: None,
			firmware_dir: matcher.firmware_dir.clone(),
			samplerates: if dslogic { DSLOGIC_SAMPLERATES } else { SAMPLERATES },
			cur_samplerate: 0,
			limit_samples: 0,
			sample_wide: false,
			dslogic,
			dslogic_mode: matcher.device_mode,
			dslogic_test: DslogicTestMode::None,
			dslogic_ext_clock: false,
			trigger: Trigger::new(),
		};

		if profile::check_conf_profile(&device_info) {
			// Already has the firmware, so the address is good to keep.
			debug!("Found an fx2lafw device.");
			device.status = DeviceStatus::Inactive;
		} else {
			let firmware =
				firmware::firmware_path(&matcher.firmware_dir, profile.firmware);
			firmware::upload_firmware(&device_info, &firmware)
				.map_err(|e| e.with_ctx("uploading firmware during scan"))?;
			device.fw_updated = Some(Instant::now());
			device.location = DeviceLocation::awaiting_renumeration(&device_info);
		}

		Ok(device)
	}

	pub fn profile(&self) -> &'static DeviceProfile
	{
		self.profile
	}

	pub fn status(&self) -> DeviceStatus
	{
		self.status
	}

	pub fn location(&self) -> DeviceLocation
	{
		self.location
	}

	pub fn channels(&self) -> &[Channel]
	{
		&self.channels
	}

	pub fn channels_mut(&mut self) -> &mut [Channel]
	{
		&mut self.channels
	}

	pub fn is_dslogic(&self) -> bool
	{
		self.dslogic
	}

	/// The `CONN` string of this device. Fails while the device still awaits renumeration,
	/// since its future address cannot be known yet.
	pub fn conn(&self) -> Result<String, Error>
	{
		if !self.location.is_settled() {
			return Err(
				ErrorKind::Argument(Some(S!("device address not yet assigned"))).error(),
			);
		}
		Ok(self.location.to_string())
	}

	pub fn samplerates(&self) -> &'static [u64]
	{
		self.samplerates
	}

	pub fn samplerate(&self) -> u64
	{
		self.cur_samplerate
	}

	pub fn set_samplerate(&mut self, samplerate: u64) -> Result<(), Error>
	{
		self.check_active()?;
		self.cur_samplerate = samplerate;
		Ok(())
	}

	pub fn limit_samples(&self) -> u64
	{
		self.limit_samples
	}

	/// Bound the capture; zero means continuous.
	pub fn set_limit_samples(&mut self, limit_samples: u64) -> Result<(), Error>
	{
		self.check_active()?;
		self.limit_samples = limit_samples;
		Ok(())
	}

	pub fn device_mode(&self) -> DslogicMode
	{
		self.dslogic_mode
	}

	pub fn external_clock(&self) -> Result<bool, Error>
	{
		self.check_dslogic()?;
		Ok(self.dslogic_ext_clock)
	}

	pub fn set_external_clock(&mut self, external: bool) -> Result<(), Error>
	{
		self.check_dslogic()?;
		self.check_active()?;
		self.dslogic_ext_clock = external;
		Ok(())
	}

	pub fn test_mode(&self) -> Result<DslogicTestMode, Error>
	{
		self.check_dslogic()?;
		Ok(self.dslogic_test)
	}

	pub fn set_test_mode(&mut self, test_mode: DslogicTestMode) -> Result<(), Error>
	{
		self.check_dslogic()?;
		self.check_active()?;
		self.dslogic_test = test_mode;
		Ok(())
	}

	/// The DSLogic hardware trigger configuration.
	pub fn hardware_trigger(&self) -> Result<&Trigger, Error>
	{
		self.check_dslogic()?;
		Ok(&self.trigger)
	}

	pub fn hardware_trigger_mut(&mut self) -> Result<&mut Trigger, Error>
	{
		self.check_dslogic()?;
		Ok(&mut self.trigger)
	}

	fn check_dslogic(&self) -> Result<(), Error>
	{
		if self.dslogic {
			Ok(())
		} else {
			Err(ErrorKind::NotApplicable.error())
		}
	}

	fn check_active(&self) -> Result<(), Error>
	{
		if self.status == DeviceStatus::Active {
			Ok(())
		} else {
			Err(ErrorKind::Argument(Some(S!("device is not open"))).error())
		}
	}

	fn handle(&self) -> Result<&UsbHandle, Error>
	{
		self.handle
			.as_ref()
			.ok_or_else(|| ErrorKind::Argument(Some(S!("device is not open"))).error())
	}

	/// Open the device, waiting out the renumeration window if firmware was just uploaded.
	///
	/// After open the device is Active: interface claimed, firmware version verified, and
	/// (for a DSLogic) the FPGA configured. The default samplerate is the table's slowest.
	pub fn open(&mut self) -> Result<(), Error>
	{
		if self.status == DeviceStatus::Active {
			log_and_return!(ErrorKind::Argument(Some(S!("device is already in use"))).error());
		}

		if let Some(fw_updated) = self.fw_updated {
			info!("Waiting for device to reset.");
			// Takes >= 300ms for the FX2 to be gone from the USB bus.
			thread::sleep(RENUM_GONE_DELAY);

			loop {
				match self.open_attempt() {
					Ok(()) => break,
					Err(error) => {
						let elapsed = fw_updated.elapsed();
						if elapsed >= MAX_RENUM_DELAY {
							error!("Device failed to renumerate.");
							return Err(ErrorKind::RenumerateTimeout.error_from(error));
						}
						debug!("Waited {}ms.", elapsed.as_millis());
						thread::sleep(RENUM_POLL_INTERVAL);
					},
				}
			}
			info!("Device came back after {}ms.", fw_updated.elapsed().as_millis());
			// Renumeration is done with; further opens go by bus and address.
			self.fw_updated = None;
		} else {
			info!("Firmware upload was not needed.");
			self.open_attempt().map_err(|e| {
				error!("Unable to open device.");
				e
			})?;
		}

		let claimed = self
			.handle
			.as_mut()
			.expect("Unreachable: open_attempt stored the handle")
			.claim_interface();
		if let Err(error) = claimed {
			self.status = DeviceStatus::Inactive;
			self.handle = None;
			return Err(error);
		}

		if self.dslogic {
			if let Err(error) = self.configure_fpga() {
				self.status = DeviceStatus::Inactive;
				self.handle = None;
				return Err(error);
			}
		}

		if self.cur_samplerate == 0 {
			// Samplerate hasn't been set; default to the slowest one.
			self.cur_samplerate = self.samplerates[0];
		}

		Ok(())
	}

	/// One enumeration pass looking for this instance, opening and version-gating it.
	fn open_attempt(&mut self) -> Result<(), Error>
	{
		let devices = list_devices()?;

		let mut skip = 0;
		for device_info in devices {
			if Vid(device_info.vendor_id()) != self.profile.vid ||
				Pid(device_info.product_id()) != self.profile.pid
			{
				continue;
			}

			if self.status == DeviceStatus::Initializing {
				// Never opened (or freshly renumerated): take the nth device of this type.
				if skip != self.ordinal {
					skip += 1;
					continue;
				}
			} else if DeviceLocation::of(&device_info) != self.location {
				// Fully enumerated before, so find it by bus and address.
				continue;
			}

			let handle = UsbHandle::open(&device_info)?;
			if !self.location.is_settled() {
				// First time we touch this device after FW upload, so we didn't know
				// the address until now.
				self.location = DeviceLocation::of(&device_info);
			}

			let version = protocol::get_fw_version(&handle)
				.map_err(|e| ErrorKind::VersionQueryFailed.error_from(e))?;
			let revid = protocol::get_revid(&handle, self.dslogic)
				.map_err(|e| ErrorKind::VersionQueryFailed.error_from(e))?;

			// Changes in major version mean incompatible/API changes, so bail out if we
			// encounter an incompatible version. Different minor versions are OK.
			if version.major != REQUIRED_VERSION_MAJOR {
				return Err(ErrorKind::IncompatibleFirmware {
					expected: REQUIRED_VERSION_MAJOR,
					major: version.major,
					minor: version.minor,
				}
				.error());
			}

			self.handle = Some(handle);
			self.status = DeviceStatus::Active;
			info!(
				"Opened device {} on {}, interface {}, firmware {}.{}.",
				self.ordinal, self.location, USB_INTERFACE, version.major, version.minor
			);
			info!(
				"Detected REVID={}, it's a Cypress CY7C68013{}.",
				revid,
				if revid != 1 { " (FX2)" } else { "A (FX2LP)" }
			);

			return Ok(());
		}

		Err(ErrorKind::DeviceNotFound.error())
	}

	/// Put the DSLogic FPGA into configuration mode and stream it the bitstream.
	fn configure_fpga(&self) -> Result<(), Error>
	{
		let handle = self.handle()?;

		protocol::dslogic_fpga_config(handle).map_err(|e| {
			error!("Send FPGA configure command failed!");
			e
		})?;
		thread::sleep(FPGA_CONFIG_DELAY);

		let bitstream = firmware::firmware_path(&self.firmware_dir, DSLOGIC_FPGA_BITSTREAM);
		firmware::upload_fpga_bitstream(handle, &bitstream).map_err(|e| {
			error!("Configure FPGA failed!");
			e
		})
	}

	/// Release the interface and the handle. The instance can be opened again later.
	pub fn close(&mut self)
	{
		if self.handle.take().is_some() {
			info!(
				"Closing device {} on {}, interface {}.",
				self.ordinal, self.location, USB_INTERFACE
			);
		}
		self.status = DeviceStatus::Inactive;
	}

	/// Derive the sample width and software trigger from the channel configuration.
	fn configure_channels(&mut self) -> Result<SoftTrigger, Error>
	{
		self.sample_wide = false;
		let mut patterns: Vec<(u16, &str)> = Vec::new();

		for channel in &self.channels {
			if !channel.enabled {
				continue;
			}

			if self.dslogic {
				if (channel.index > 7 && channel.channel_type == ChannelType::Logic) ||
					(channel.index > 0 && channel.channel_type == ChannelType::Analog)
				{
					self.sample_wide = true;
				}
			} else if channel.index > 7 {
				self.sample_wide = true;
			}

			if let Some(pattern) = &channel.trigger {
				patterns.push((1u16 << channel.index, pattern.as_str()));
			}
		}

		SoftTrigger::compile(&patterns)
	}

	/// Start an acquisition, delivering packets to `sink`.
	///
	/// Returns the running [`Acquisition`]; drive it with
	/// [`Acquisition::pump`]/[`Acquisition::run`] until it reports finished.
	pub fn start_acquisition<'s>(
		&mut self,
		sink: &'s mut dyn PacketSink,
	) -> Result<Acquisition<'s>, Error>
	{
		self.check_active()?;

		let soft_trigger = self.configure_channels().map_err(|e| {
			error!("Failed to configure channels.");
			e
		})?;

		let setup = AcquisitionSetup {
			samplerate: self.cur_samplerate,
			limit_samples: self.limit_samples,
			sample_wide: self.sample_wide,
			soft_trigger,
			dslogic: self.dslogic.then(|| DslogicSetup {
				mode: self.dslogic_mode,
				test: self.dslogic_test,
				ext_clock: self.dslogic_ext_clock,
				trigger: &self.trigger,
			}),
		};

		Acquisition::start(self.handle()?, setup, sink)
	}
}

impl Display for Fx2Device
{
	fn fmt(&self, f: &mut Formatter) -> fmt::Result
	{
		write!(f, "{} {}", self.profile.vendor, self.profile.model)?;
		if let Some(version) = self.profile.model_version {
			write!(f, " {}", version)?;
		}
		if self.location.is_settled() {
			write!(f, " on {}", self.location)?;
		} else {
			write!(f, " (renumerating)")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::error::ErrorKind;
	use crate::profile::PROFILES;

	fn test_device(dslogic: bool, mode: DslogicMode) -> Fx2Device
	{
		let profile = if dslogic {
			PROFILES.iter().find(|p| p.is_dslogic()).unwrap()
		} else {
			PROFILES.iter().find(|p| p.vendor == "Cypress").unwrap()
		};
		let channel_type = if dslogic && mode != DslogicMode::Logic {
			ChannelType::Analog
		} else {
			ChannelType::Logic
		};

		Fx2Device {
			profile,
			ordinal: 0,
			status: DeviceStatus::Active,
			location: DeviceLocation {
				bus: 1,
				address: 9,
			},
			handle: None,
			channels: (0..profile.num_logic_channels())
				.map(|index| Channel::new(index, channel_type))
				.collect(),
			fw_updated: None,
			firmware_dir: PathBuf::from(DEFAULT_FIRMWARE_DIR),
			samplerates: if dslogic { DSLOGIC_SAMPLERATES } else { SAMPLERATES },
			cur_samplerate: 0,
			limit_samples: 0,
			sample_wide: false,
			dslogic,
			dslogic_mode: mode,
			dslogic_test: DslogicTestMode::None,
			dslogic_ext_clock: false,
			trigger: Trigger::new(),
		}
	}

	#[test]
	fn high_channels_force_wide_samples()
	{
		let mut device = test_device(false, DslogicMode::Logic);
		device.configure_channels().unwrap();
		assert!(device.sample_wide);

		// With only the low eight enabled the stream stays narrow.
		for channel in device.channels_mut() {
			channel.enabled = channel.index <= 7;
		}
		device.configure_channels().unwrap();
		assert!(!device.sample_wide);
	}

	#[test]
	fn dslogic_analog_channels_force_wide_samples()
	{
		let mut device = test_device(true, DslogicMode::Dso);
		for channel in device.channels_mut() {
			channel.enabled = channel.index <= 1;
		}
		device.configure_channels().unwrap();
		assert!(device.sample_wide);

		// Channel 0 alone stays narrow even in an analog mode.
		for channel in device.channels_mut() {
			channel.enabled = channel.index == 0;
		}
		device.configure_channels().unwrap();
		assert!(!device.sample_wide);
	}

	#[test]
	fn channel_triggers_compile_into_the_soft_trigger()
	{
		let mut device = test_device(false, DslogicMode::Logic);
		for channel in device.channels_mut() {
			channel.enabled = channel.index <= 7;
		}
		device.channels_mut()[3].trigger = Some(S!("01"));
		let trigger = device.configure_channels().unwrap();
		assert!(!trigger.is_fired());

		device.channels_mut()[3].trigger = Some(S!("0Z"));
		assert!(device.configure_channels().is_err());
	}

	#[test]
	fn options_require_an_open_device()
	{
		let mut device = test_device(false, DslogicMode::Logic);
		device.status = DeviceStatus::Inactive;
		assert!(device.set_samplerate(mhz(1)).is_err());
		assert!(device.set_limit_samples(1024).is_err());
	}

	#[test]
	fn dslogic_options_do_not_apply_to_plain_fx2()
	{
		let mut device = test_device(false, DslogicMode::Logic);
		for result in [
			device.set_external_clock(true).map(|_| ()),
			device.set_test_mode(DslogicTestMode::Internal),
			device.hardware_trigger_mut().map(|_| ()),
		] {
			match result {
				Err(Error {
					kind: ErrorKind::NotApplicable,
					..
				}) => (),
				other => panic!("expected NotApplicable, got {:?}", other.map(|_| ())),
			}
		}
	}

	#[test]
	fn conn_string_is_unavailable_while_renumerating()
	{
		let mut device = test_device(false, DslogicMode::Logic);
		assert_eq!(device.conn().unwrap(), "1.9");
		device.location = DeviceLocation {
			bus: 1,
			address: DeviceLocation::ADDRESS_UNKNOWN,
		};
		assert!(device.conn().is_err());
	}
}
