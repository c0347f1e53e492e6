// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! USB transport for the acquisition driver.
//!
//! Wraps an opened [`nusb::Device`] (and its claimed interface) behind synchronous vendor
//! control transfers and deadline-bounded bulk transfers. nusb transfers carry no individual
//! timeout, so bounded waits are implemented by racing the transfer future against a timer;
//! dropping the losing future cancels the transfer.

use std::fmt::{self, Display};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_io::Timer;
use futures_lite::future;
use log::warn;
use nusb::transfer::{Control, ControlType, Queue, Recipient, RequestBuffer};
use nusb::{Device, DeviceInfo, Interface};

use crate::S;
use crate::error::{Error, ErrorKind};

/// Simple newtype struct for some clarity in function arguments and whatnot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Vid(pub u16);

/// Simple newtype struct for some clarity in function arguments and whatnot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pid(pub u16);

/// The interface number every fx2lafw firmware exposes its endpoints on.
pub const USB_INTERFACE: u8 = 0;
/// The configuration the firmware uploader selects before staging an image.
pub const USB_CONFIGURATION: u8 = 1;

/// Direction bit of an endpoint address; endpoint numbers are OR'd with this for IN endpoints.
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// Where a device currently sits on the bus.
///
/// Immediately after a firmware upload the device is about to renumerate, so its future
/// address cannot be known yet; [`DeviceLocation::ADDRESS_UNKNOWN`] marks that window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceLocation
{
	pub bus: u8,
	pub address: u8,
}

impl DeviceLocation
{
	/// Sentinel address used between firmware upload and renumeration.
	pub const ADDRESS_UNKNOWN: u8 = 0xff;

	pub fn of(device: &DeviceInfo) -> Self
	{
		Self {
			bus: device.bus_number(),
			address: device.device_address(),
		}
	}

	/// Location for a device that has just received firmware and is about to drop off the bus.
	pub fn awaiting_renumeration(device: &DeviceInfo) -> Self
	{
		Self {
			bus: device.bus_number(),
			address: Self::ADDRESS_UNKNOWN,
		}
	}

	/// Whether the device address is known (ie. the device is not mid-renumeration).
	pub fn is_settled(&self) -> bool
	{
		self.address != Self::ADDRESS_UNKNOWN
	}
}

impl Display for DeviceLocation
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		write!(f, "{}.{}", self.bus, self.address)
	}
}

impl FromStr for DeviceLocation
{
	type Err = Error;

	/// Parses the `CONN` option form `<bus>.<address>`.
	fn from_str(conn: &str) -> Result<Self, Error>
	{
		let (bus, address) = conn
			.split_once('.')
			.ok_or_else(|| ErrorKind::Argument(Some(format!("connection string {:?}", conn))).error())?;

		let bus = bus
			.parse::<u8>()
			.map_err(|e| ErrorKind::Argument(Some(S!("connection string bus number"))).error_from(e))?;
		let address = address
			.parse::<u8>()
			.map_err(|e| ErrorKind::Argument(Some(S!("connection string device address"))).error_from(e))?;

		Ok(Self {
			bus,
			address,
		})
	}
}

/// Default timeout for plain FX2 vendor control requests.
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(100);
/// DSLogic commands take considerably longer while the FPGA is involved.
pub const DSLOGIC_CONTROL_TIMEOUT: Duration = Duration::from_millis(3000);
/// Per-chunk timeout for synchronous bulk OUT transfers (FPGA setting and bitstream).
pub const BULK_TIMEOUT: Duration = Duration::from_millis(1000);

/// An opened FX2 device: the nusb device handle plus, once claimed, interface 0.
///
/// Control requests go to the device; bulk endpoints require the interface to have been
/// claimed first.
pub struct UsbHandle
{
	device: Device,
	interface: Option<Interface>,
}

impl UsbHandle
{
	pub fn open(device_info: &DeviceInfo) -> Result<Self, Error>
	{
		let device = device_info
			.open()
			.map_err(|e| Error::from(e).with_ctx("opening USB device"))?;

		Ok(Self {
			device,
			interface: None,
		})
	}

	/// Select a device configuration. Needed before staging firmware on a blank FX2.
	pub fn set_configuration(&self, configuration: u8) -> Result<(), Error>
	{
		Ok(self.device.set_configuration(configuration)?)
	}

	/// Claim the (single) fx2lafw interface for bulk streaming.
	pub fn claim_interface(&mut self) -> Result<(), Error>
	{
		let interface = self
			.device
			.claim_interface(USB_INTERFACE)
			.map_err(|e| Error::from(e).with_ctx("claiming USB interface"))?;
		self.interface = Some(interface);
		Ok(())
	}

	fn interface(&self) -> Result<&Interface, Error>
	{
		self.interface
			.as_ref()
			.ok_or_else(|| ErrorKind::Argument(Some(S!("USB interface not claimed"))).error())
	}

	/// Vendor control read with wValue = wIndex = 0.
	pub fn vendor_read(&self, request: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, Error>
	{
		let control = Control {
			control_type: ControlType::Vendor,
			recipient: Recipient::Device,
			request,
			value: 0x0000,
			index: 0x0000,
		};

		Ok(self.device.control_in_blocking(control, buf, timeout)?)
	}

	/// Vendor control write with wValue = wIndex = 0.
	pub fn vendor_write(&self, request: u8, data: &[u8], timeout: Duration) -> Result<(), Error>
	{
		self.vendor_write_addressed(request, 0x0000, data, timeout)
	}

	/// Vendor control write carrying an address in wValue, as used by the EZ-USB firmware loader.
	pub fn vendor_write_addressed(
		&self,
		request: u8,
		value: u16,
		data: &[u8],
		timeout: Duration,
	) -> Result<(), Error>
	{
		let control = Control {
			control_type: ControlType::Vendor,
			recipient: Recipient::Device,
			request,
			value,
			index: 0x0000,
		};

		let written = self.device.control_out_blocking(control, data, timeout)?;
		if written != data.len() {
			return Err(ErrorKind::DeviceSeemsInvalid(S!("short control write")).error());
		}

		Ok(())
	}

	/// Synchronous bulk OUT with a bounded deadline. Returns the number of bytes transferred.
	pub fn bulk_out(&self, endpoint: u8, data: Vec<u8>, timeout: Duration) -> Result<usize, Error>
	{
		let interface = self.interface()?;
		let completion = block_on_deadline(interface.bulk_out(endpoint, data), timeout)
			.ok_or_else(|| {
				warn!("Bulk OUT transfer on endpoint {} timed out", endpoint);
				ErrorKind::DeviceSeemsInvalid(S!("bulk OUT transfer timed out")).error()
			})?;

		completion.status?;
		Ok(completion.data.actual_length())
	}

	/// Create a bulk IN transfer queue on the given endpoint for the acquisition scheduler.
	pub fn bulk_in_queue(&self, endpoint: u8) -> Result<Queue<RequestBuffer>, Error>
	{
		Ok(self.interface()?.bulk_in_queue(endpoint))
	}
}

impl fmt::Debug for UsbHandle
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		f.debug_struct("UsbHandle")
			.field("claimed", &self.interface.is_some())
			.finish()
	}
}

/// Drive a transfer future to completion, giving up after `timeout`.
///
/// Returns `None` on deadline; dropping the future cancels the underlying transfer.
pub(crate) fn block_on_deadline<F, T>(transfer: F, timeout: Duration) -> Option<T>
where
	F: Future<Output = T>,
{
	future::block_on(future::or(async { Some(transfer.await) }, async {
		Timer::after(timeout).await;
		None
	}))
}

#[cfg(test)]
mod tests
{
	use super::DeviceLocation;

	#[test]
	fn conn_string_parses()
	{
		let location: DeviceLocation = "3.12".parse().unwrap();
		assert_eq!(location.bus, 3);
		assert_eq!(location.address, 12);
		assert!(location.is_settled());
		assert_eq!(location.to_string(), "3.12");
	}

	#[test]
	fn conn_string_rejects_garbage()
	{
		assert!("3".parse::<DeviceLocation>().is_err());
		assert!("bus.addr".parse::<DeviceLocation>().is_err());
		assert!("3.300".parse::<DeviceLocation>().is_err());
	}

	#[test]
	fn sentinel_address_is_not_settled()
	{
		let location = DeviceLocation {
			bus: 1,
			address: DeviceLocation::ADDRESS_UNKNOWN,
		};
		assert!(!location.is_settled());
	}
}
