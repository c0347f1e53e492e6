// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! The static catalogue of supported FX2 based logic analyzers.

use bitmask_enum::bitmask;
use nusb::DeviceInfo;

use crate::usb::{Pid, Vid};

/// Capability flags carried by a [`DeviceProfile`].
#[bitmask(u32)]
pub enum DeviceCaps
{
	/// The device samples 16 probes rather than 8.
	Wide16Bit,
}

/// A supported device type: USB identity, display strings, firmware image and capabilities.
///
/// Profiles whose `usb_manufacturer`/`usb_product` strings are set only match devices that
/// report those exact strings; this disambiguates devices that share a (vid, pid) after
/// firmware upload (the DSLogic renumerates onto the same ids as a Saleae Logic).
#[derive(Debug)]
pub struct DeviceProfile
{
	pub vid: Vid,
	pub pid: Pid,

	pub vendor: &'static str,
	pub model: &'static str,
	pub model_version: Option<&'static str>,

	/// Firmware image file name, resolved against the configured firmware directory.
	pub firmware: &'static str,

	pub caps: DeviceCaps,

	pub usb_manufacturer: Option<&'static str>,
	pub usb_product: Option<&'static str>,
}

impl DeviceProfile
{
	pub fn num_logic_channels(&self) -> usize
	{
		if self.caps.contains(DeviceCaps::Wide16Bit) {
			16
		} else {
			8
		}
	}

	/// Whether this profile describes a DSLogic (FX2 + FPGA) rather than a plain fx2lafw device.
	pub fn is_dslogic(&self) -> bool
	{
		self.model == "DSLogic"
	}

	/// Checks this profile against an enumerated device's ids and descriptor strings.
	///
	/// When the profile carries no expected manufacturer string, the product string is not
	/// checked either, so that pre-firmware devices (which often report nothing useful)
	/// still match.
	pub fn matches(&self, device: &DeviceInfo) -> bool
	{
		self.matches_identity(
			Vid(device.vendor_id()),
			Pid(device.product_id()),
			device.manufacturer_string(),
			device.product_string(),
		)
	}

	pub(crate) fn matches_identity(
		&self,
		vid: Vid,
		pid: Pid,
		manufacturer: Option<&str>,
		product: Option<&str>,
	) -> bool
	{
		if self.vid != vid || self.pid != pid {
			return false;
		}

		match self.usb_manufacturer {
			None => true,
			Some(expected) => {
				manufacturer == Some(expected) &&
					self.usb_product.is_none_or(|expected| product == Some(expected))
			},
		}
	}
}

/// All supported devices. First match wins, so more specific entries (with descriptor
/// strings) come before entries that share their (vid, pid).
pub const PROFILES: &[DeviceProfile] = &[
	// CWAV USBee AX, EE Electronics ESLA201A, ARMFLY AX-Pro
	DeviceProfile {
		vid: Vid(0x08a9),
		pid: Pid(0x0014),
		vendor: "CWAV",
		model: "USBee AX",
		model_version: None,
		firmware: "fx2lafw-cwav-usbeeax.fw",
		caps: DeviceCaps::none(),
		usb_manufacturer: None,
		usb_product: None,
	},
	// CWAV USBee DX, XZL-Studio DX
	DeviceProfile {
		vid: Vid(0x08a9),
		pid: Pid(0x0015),
		vendor: "CWAV",
		model: "USBee DX",
		model_version: None,
		firmware: "fx2lafw-cwav-usbeedx.fw",
		caps: DeviceCaps::Wide16Bit,
		usb_manufacturer: None,
		usb_product: None,
	},
	// CWAV USBee SX
	DeviceProfile {
		vid: Vid(0x08a9),
		pid: Pid(0x0009),
		vendor: "CWAV",
		model: "USBee SX",
		model_version: None,
		firmware: "fx2lafw-cwav-usbeesx.fw",
		caps: DeviceCaps::none(),
		usb_manufacturer: None,
		usb_product: None,
	},
	// DreamSourceLab DSLogic before FW upload
	DeviceProfile {
		vid: Vid(0x2a0e),
		pid: Pid(0x0001),
		vendor: "DreamSourceLab",
		model: "DSLogic",
		model_version: None,
		firmware: "dreamsourcelab-dslogic-fx2.fw",
		caps: DeviceCaps::Wide16Bit,
		usb_manufacturer: None,
		usb_product: None,
	},
	// DreamSourceLab DSLogic after FW upload
	DeviceProfile {
		vid: Vid(0x0925),
		pid: Pid(0x3881),
		vendor: "DreamSourceLab",
		model: "DSLogic",
		model_version: None,
		firmware: "dreamsourcelab-dslogic-fx2.fw",
		caps: DeviceCaps::Wide16Bit,
		usb_manufacturer: Some("DreamSourceLab"),
		usb_product: Some("DSLogic"),
	},
	// Saleae Logic, EE Electronics ESLA100, Robomotic MiniLogic, Robomotic BugLogic 3
	DeviceProfile {
		vid: Vid(0x0925),
		pid: Pid(0x3881),
		vendor: "Saleae",
		model: "Logic",
		model_version: None,
		firmware: "fx2lafw-saleae-logic.fw",
		caps: DeviceCaps::none(),
		usb_manufacturer: None,
		usb_product: None,
	},
	// Default Cypress FX2 without EEPROM, e.g. Lcsoft Mini Board,
	// Braintechnology USB Interface V2.x
	DeviceProfile {
		vid: Vid(0x04b4),
		pid: Pid(0x8613),
		vendor: "Cypress",
		model: "FX2",
		model_version: None,
		firmware: "fx2lafw-cypress-fx2.fw",
		caps: DeviceCaps::Wide16Bit,
		usb_manufacturer: None,
		usb_product: None,
	},
	// Braintechnology USB-LPS
	DeviceProfile {
		vid: Vid(0x16d0),
		pid: Pid(0x0498),
		vendor: "Braintechnology",
		model: "USB-LPS",
		model_version: None,
		firmware: "fx2lafw-braintechnology-usb-lps.fw",
		caps: DeviceCaps::Wide16Bit,
		usb_manufacturer: None,
		usb_product: None,
	},
];

/// Match an enumerated device against the profile table. First matching entry wins.
pub fn find_profile(device: &DeviceInfo) -> Option<&'static DeviceProfile>
{
	PROFILES.iter().find(|profile| profile.matches(device))
}

/// Check the descriptor strings to determine whether the acquisition firmware is already
/// running on the device (ie. it does not need an upload before use).
pub fn check_conf_profile(device: &DeviceInfo) -> bool
{
	let manufacturer = device.manufacturer_string().unwrap_or_default();
	let product = device.product_string().unwrap_or_default();
	is_firmware_loaded(manufacturer, product)
}

fn is_firmware_loaded(manufacturer: &str, product: &str) -> bool
{
	(manufacturer.starts_with("sigrok") || manufacturer.starts_with("DreamSourceLab")) &&
		(product.starts_with("fx2lafw") || product.starts_with("DSLogic"))
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn firmware_loaded_recognised_by_string_prefixes()
	{
		assert!(is_firmware_loaded("sigrok", "fx2lafw"));
		assert!(is_firmware_loaded("sigrok project", "fx2lafw 1.2"));
		assert!(is_firmware_loaded("DreamSourceLab", "DSLogic"));
		assert!(!is_firmware_loaded("Cypress", "FX2"));
		assert!(!is_firmware_loaded("sigrok", "EZ-USB"));
		assert!(!is_firmware_loaded("", ""));
	}

	#[test]
	fn profile_table_is_ordered_most_specific_first()
	{
		// The post-upload DSLogic shares (vid, pid) with the Saleae Logic; the entry that
		// checks descriptor strings has to come first for first-match-wins lookup to work.
		let dslogic = PROFILES
			.iter()
			.position(|p| p.usb_manufacturer == Some("DreamSourceLab"))
			.unwrap();
		let saleae = PROFILES.iter().position(|p| p.vendor == "Saleae").unwrap();
		assert!(dslogic < saleae);
		assert_eq!(PROFILES[dslogic].vid, PROFILES[saleae].vid);
		assert_eq!(PROFILES[dslogic].pid, PROFILES[saleae].pid);
	}

	#[test]
	fn descriptor_strings_gate_shared_ids()
	{
		let dslogic = PROFILES
			.iter()
			.find(|p| p.usb_manufacturer == Some("DreamSourceLab"))
			.unwrap();

		assert!(dslogic.matches_identity(
			Vid(0x0925),
			Pid(0x3881),
			Some("DreamSourceLab"),
			Some("DSLogic"),
		));
		// Same ids but the wrong strings: no match.
		assert!(!dslogic.matches_identity(Vid(0x0925), Pid(0x3881), Some("Saleae"), Some("Logic")));
		assert!(!dslogic.matches_identity(Vid(0x0925), Pid(0x3881), None, None));

		// A profile without expected strings matches regardless of what the device reports,
		// so pre-firmware devices are accepted.
		let cypress = PROFILES.iter().find(|p| p.vendor == "Cypress").unwrap();
		assert!(cypress.matches_identity(Vid(0x04b4), Pid(0x8613), None, None));
		assert!(cypress.matches_identity(Vid(0x04b4), Pid(0x8613), Some("whoever"), None));
		assert!(!cypress.matches_identity(Vid(0x04b4), Pid(0x8614), None, None));
	}

	#[test]
	fn wide_profiles_expose_sixteen_channels()
	{
		for profile in PROFILES {
			let expected = if profile.caps.contains(DeviceCaps::Wide16Bit) {
				16
			} else {
				8
			};
			assert_eq!(profile.num_logic_channels(), expected);
		}
	}
}
