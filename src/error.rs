// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! Module for error handling code.

use std::fmt::{Display, Formatter};
#[cfg(feature = "backtrace")]
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use thiserror::Error;

use crate::S;

/// More convenient alias for `Box<dyn StdError + Send + Sync>`,
/// which shows up in a few signatures and structs.
type BoxedError = Box<dyn StdError + Send + Sync>;

/// Kinds of errors for [Error]. Use [ErrorKind::error] and [ErrorKind::error_from] to generate the
/// [Error] value for this ErrorKind.
#[derive(Debug)]
pub enum ErrorKind
{
	/// Missing or malformed caller input.
	Argument(/** what **/ Option<String>),

	/// The requested option does not apply to this device.
	NotApplicable,

	/// Failed to read a firmware or FPGA bitstream file.
	FirmwareFileIo(/** filename **/ Option<String>),

	/// Specified firmware seems invalid.
	InvalidFirmware(/** why **/ Option<String>),

	/// An enumerated USB device matched no entry of the profile table.
	ProfileMismatch,

	/// No matching FX2 logic analyzer device was found.
	DeviceNotFound,

	/// Current operation only supports one device but more than one was matched.
	TooManyDevices,

	/// Device found disconnected during an ongoing operation.
	DeviceDisconnectDuringOperation,

	/// Device did not come back online after firmware upload.
	RenumerateTimeout,

	/// The firmware version or REVID query failed during open.
	VersionQueryFailed,

	/// The device is running a firmware with an incompatible major version.
	IncompatibleFirmware
	{
		expected: u8,
		major: u8,
		minor: u8,
	},

	/// Device returned bad data during configuration.
	///
	/// This generally shouldn't be possible, but could happen if the cable is bad, the OS is
	/// messing with things, or the firmware on the device is corrupted.
	DeviceSeemsInvalid(/** invalid thing **/ String),

	/// Unhandled external error.
	External(ErrorSource),
}

impl ErrorKind
{
	/// Creates a new [Error] from this error kind.
	///
	/// Enables convenient code like:
	/// ```
	/// # use fx2la::error::ErrorKind;
	/// # fn example() -> Result<(), fx2la::error::Error> {
	/// return Err(ErrorKind::DeviceNotFound.error());
	/// # }
	/// ```
	#[inline(always)]
	pub fn error(self) -> Error
	{
		Error::new(self, None)
	}

	/// Creates a new [Error] from this error kind, with the passed error as the source.
	#[inline(always)]
	pub fn error_from<E: StdError + Send + Sync + 'static>(self, source: E) -> Error
	{
		Error::new(self, Some(Box::new(source)))
	}
}

/// Constructs an [Error] for this [ErrorKind].
impl From<ErrorKind> for Error
{
	fn from(other: ErrorKind) -> Self
	{
		other.error()
	}
}

impl Display for ErrorKind
{
	fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
	{
		use ErrorKind::*;
		match self {
			Argument(None) => write!(f, "invalid argument")?,
			Argument(Some(what)) => write!(f, "invalid argument: {}", what)?,
			NotApplicable => write!(f, "option is not applicable to this device")?,
			FirmwareFileIo(None) => write!(f, "failed to read firmware file")?,
			FirmwareFileIo(Some(filename)) => write!(f, "failed to read firmware file {}", filename)?,
			InvalidFirmware(None) => write!(f, "specified firmware does not seem valid")?,
			InvalidFirmware(Some(why)) => write!(f, "specified firmware does not seem valid: {}", why)?,
			ProfileMismatch => write!(f, "USB device does not match any supported device profile")?,
			DeviceNotFound => write!(f, "FX2 logic analyzer device not found (check connection?)")?,
			TooManyDevices => {
				write!(f, "current operation only supports one device but more than one device was found")?
			},
			DeviceDisconnectDuringOperation => write!(f, "device found disconnected")?,
			RenumerateTimeout => {
				write!(f, "device did not renumerate after firmware upload (invalid firmware?)")?
			},
			VersionQueryFailed => write!(f, "unable to read the firmware version from the device")?,
			IncompatibleFirmware {
				expected,
				major,
				minor,
			} => {
				write!(
					f,
					"expected firmware version {}.x, got {}.{}",
					expected, major, minor,
				)?;
			},
			DeviceSeemsInvalid(thing) => {
				write!(
					f,
					"device returned bad data ({}) during configuration. \
					This generally shouldn't be possible. Maybe cable is bad, or OS is messing with things?",
					thing,
				)?;
			},
			External(source) => {
				use ErrorSource::*;
				match source {
					StdIo(e) => {
						write!(f, "unhandled std::io::Error: {}", e)?;
					},
					Usb(e) => {
						write!(f, "unhandled USB transfer error: {}", e)?;
					},
				};
			},
		};

		Ok(())
	}
}

#[derive(Debug)]
/// Error type for FX2 logic analyzer operations. Easily constructed from [ErrorKind].
pub struct Error
{
	pub kind: ErrorKind,
	pub source: Option<BoxedError>,

	/// Stores the backtrace for this error.
	///
	/// Backtraces are apparently pretty large. This struct was 136 bytes without the box, which was annoying clippy.
	#[cfg(feature = "backtrace")]
	pub backtrace: Box<Backtrace>,

	/// A string for additional context about what was being attempted when this error occurred.
	///
	/// Example: "reading current firmware version".
	pub context: Option<String>,
}

impl Error
{
	#[inline(always)]
	pub fn new(kind: ErrorKind, source: Option<BoxedError>) -> Self
	{
		Self {
			kind,
			source,
			context: None,
			#[cfg(feature = "backtrace")]
			backtrace: Box::new(Backtrace::capture()),
		}
	}

	/// Add additional context about what was being attempted when this error occurred.
	///
	/// Example: "reading current firmware version".
	pub fn with_ctx(mut self, ctx: &str) -> Self
	{
		self.context = Some(ctx.to_string());
		self
	}

	/// Removes previously added context.
	#[allow(dead_code)]
	pub fn without_ctx(mut self) -> Self
	{
		self.context = None;
		self
	}

	#[cfg(feature = "backtrace")]
	#[allow(dead_code)]
	fn backtrace(&self) -> Option<&Backtrace>
	{
		Some(&self.backtrace)
	}
}

impl Display for Error
{
	fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
	{
		if let Some(ctx) = &self.context {
			write!(f, "(while {}): {}", ctx, self.kind)?;
		} else {
			write!(f, "{}", self.kind)?;
		}

		#[cfg(feature = "backtrace")]
		{
			if self.backtrace.status() == BacktraceStatus::Captured {
				write!(f, "\nBacktrace:\n{}", self.backtrace)?;
			}
		}

		if let Some(source) = &self.source {
			writeln!(f, "\nCaused by: {}", source)?;
		}

		Ok(())
	}
}

impl StdError for Error
{
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)>
	{
		self.source.as_deref().map(|e| e as &dyn StdError)
	}
}

impl From<std::io::Error> for Error
{
	fn from(other: std::io::Error) -> Self
	{
		use ErrorKind::*;
		External(ErrorSource::StdIo(other)).error()
	}
}

impl From<nusb::transfer::TransferError> for Error
{
	fn from(other: nusb::transfer::TransferError) -> Self
	{
		use ErrorKind::*;
		use nusb::transfer::TransferError as Source;
		match other {
			Source::Disconnected => DeviceDisconnectDuringOperation.error_from(other),
			Source::Stall => {
				DeviceSeemsInvalid(S!("endpoint stalled during transfer")).error_from(other)
			},
			other => External(ErrorSource::Usb(other)).error(),
		}
	}
}

/// Sources of external error in this library.
#[derive(Debug, Error)]
pub enum ErrorSource
{
	#[error(transparent)]
	StdIo(#[from] std::io::Error),

	#[error(transparent)]
	Usb(#[from] nusb::transfer::TransferError),
}

#[macro_export]
macro_rules! log_and_return
{
	($err:expr) => {
		let err = $err;
		log::error!("{}", err);
		return Err(err);
	}
}
