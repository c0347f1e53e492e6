// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! Firmware and FPGA bitstream upload.
//!
//! Plain FX2 devices boot from RAM: the 8051 core is held in reset via its CPUCS register,
//! the image is written into code memory with vendor control transfers, and releasing reset
//! makes the device renumerate with the new firmware. DSLogic devices additionally stream an
//! FPGA bitstream over bulk OUT after the FX2 side is up.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{info, warn};
use nusb::DeviceInfo;

use crate::S;
use crate::error::{Error, ErrorKind};
use crate::usb::{BULK_TIMEOUT, CONTROL_TIMEOUT, USB_CONFIGURATION, UsbHandle};

/// Default location of firmware images and FPGA bitstreams.
pub const DEFAULT_FIRMWARE_DIR: &str = "/usr/share/fx2la-firmware";

/// The FPGA bitstream the DSLogic loads on open.
pub const DSLOGIC_FPGA_BITSTREAM: &str = "dreamsourcelab-dslogic-fpga.bitstream";

/// EZ-USB vendor request for reading/writing device RAM.
const CMD_EZUSB_FIRMWARE: u8 = 0xa0;
/// Address of the CPUCS register controlling the 8051 reset line.
const CPUCS_ADDRESS: u16 = 0xe600;
/// Firmware images are staged in chunks of at most this many bytes per control transfer.
const FIRMWARE_CHUNK: usize = 4096;

/// The DSLogic FPGA bitstream is streamed in chunks of the full XC6SLX9 image size.
pub const FPGA_BITSTREAM_CHUNK: usize = 340_604;

/// Resolve a firmware file name from the profile table against the firmware directory.
pub fn firmware_path(firmware_dir: &Path, name: &str) -> PathBuf
{
	firmware_dir.join(name)
}

/// Upload an fx2lafw firmware image to a freshly enumerated FX2.
///
/// The device renumerates afterwards; the caller is responsible for the renumeration wait
/// before opening it again.
pub fn upload_firmware(device_info: &DeviceInfo, firmware_file: &Path) -> Result<(), Error>
{
	let display_name = firmware_file.display().to_string();
	let image = std::fs::read(firmware_file)
		.map_err(|source| ErrorKind::FirmwareFileIo(Some(display_name.clone())).error_from(source))?;
	if image.is_empty() {
		return Err(ErrorKind::InvalidFirmware(Some(S!("firmware file is empty"))).error());
	}
	if image.len() > usize::from(u16::MAX) {
		return Err(
			ErrorKind::InvalidFirmware(Some(S!("firmware image exceeds FX2 code memory"))).error(),
		);
	}

	info!("Uploading firmware {}.", display_name);

	let handle = UsbHandle::open(device_info).map_err(|e| e.with_ctx("opening device for upload"))?;
	handle
		.set_configuration(USB_CONFIGURATION)
		.map_err(|e| e.with_ctx("selecting configuration for upload"))?;

	// Hold the 8051 in reset while its code memory is replaced.
	cpu_reset(&handle, true)?;

	for (index, chunk) in image.chunks(FIRMWARE_CHUNK).enumerate() {
		let address = (index * FIRMWARE_CHUNK) as u16;
		handle
			.vendor_write_addressed(CMD_EZUSB_FIRMWARE, address, chunk, CONTROL_TIMEOUT)
			.map_err(|e| e.with_ctx("writing firmware chunk"))?;
	}

	cpu_reset(&handle, false)?;

	info!("Firmware upload done.");
	Ok(())
}

fn cpu_reset(handle: &UsbHandle, hold: bool) -> Result<(), Error>
{
	handle
		.vendor_write_addressed(CMD_EZUSB_FIRMWARE, CPUCS_ADDRESS, &[u8::from(hold)], CONTROL_TIMEOUT)
		.map_err(|e| e.with_ctx("toggling 8051 reset"))
}

/// Stream the FPGA bitstream to a DSLogic over bulk OUT endpoint 2.
///
/// The device must already be in FPGA configuration mode (see
/// [`crate::protocol::dslogic_fpga_config`]). Any partial transfer is an error.
pub fn upload_fpga_bitstream(handle: &UsbHandle, bitstream_file: &Path) -> Result<(), Error>
{
	let display_name = bitstream_file.display().to_string();
	info!("Configure FPGA using {}", display_name);

	let mut file = File::open(bitstream_file)
		.map_err(|source| ErrorKind::FirmwareFileIo(Some(display_name.clone())).error_from(source))?;

	let mut chunk = vec![0u8; FPGA_BITSTREAM_CHUNK];
	loop {
		let read = read_chunk(&mut file, &mut chunk)
			.map_err(|source| ErrorKind::FirmwareFileIo(Some(display_name.clone())).error_from(source))?;
		if read == 0 {
			break;
		}

		let transferred = handle
			.bulk_out(2, chunk[..read].to_vec(), BULK_TIMEOUT)
			.map_err(|e| e.with_ctx("streaming FPGA bitstream"))?;
		if transferred != read {
			warn!(
				"FPGA configure error: expected transfer size {}, actually {}",
				read, transferred
			);
			return Err(ErrorKind::DeviceSeemsInvalid(S!("short FPGA bitstream transfer")).error());
		}

		info!("Configure {} bytes", read);
	}

	info!("FPGA configure done");
	Ok(())
}

/// Fill as much of `buf` as the file still holds, tolerating short reads.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize>
{
	let mut filled = 0;
	while filled < buf.len() {
		let read = file.read(&mut buf[filled..])?;
		if read == 0 {
			break;
		}
		filled += read;
	}
	Ok(filled)
}
