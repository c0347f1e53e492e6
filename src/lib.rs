// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors

pub mod acquisition;
pub mod device;
pub mod dslogic;
pub mod error;
pub mod firmware;
pub mod profile;
pub mod protocol;
pub mod session;
pub mod trigger;
pub mod usb;

#[macro_export]
#[doc(hidden)]
macro_rules! S
{
	($expr:expr) => {
		String::from($expr)
	};
}
