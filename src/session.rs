// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2026 The fx2la contributors
//! The seam between the driver and its consumer: framed data packets and the sink they are
//! delivered to.
//!
//! For a single acquisition the sink observes exactly one [`Packet::Header`] first, then zero
//! or more trigger and sample packets in the submission order of their originating transfers,
//! then exactly one [`Packet::End`]. Logic packets preserve intra-buffer sample order.

use crate::dslogic::TriggerPos;

/// One framed packet of the acquisition data feed.
#[derive(Debug, PartialEq, Eq)]
pub enum Packet<'a>
{
	/// Start of the feed; always the first packet of an acquisition.
	Header,

	/// The trigger condition was met. DSLogic hardware triggers carry the FPGA's position
	/// report; the FX2 software trigger carries no payload.
	Trigger(Option<&'a TriggerPos>),

	/// A run of logic samples, `unit_size` bytes each.
	Logic
	{
		unit_size: usize,
		data: &'a [u8],
	},

	/// A run of raw analog samples (DSLogic DSO and data-acquisition modes).
	Analog
	{
		num_samples: usize,
		data: &'a [u8],
	},

	/// End of the feed; always the last packet, even after an abort.
	End,
}

/// Consumer of the acquisition data feed.
///
/// Payloads borrow the driver's transfer buffers; a sink that needs to keep them must copy.
pub trait PacketSink
{
	fn send(&mut self, packet: Packet<'_>);
}

/// Closures make fine sinks, which keeps tests and simple consumers light.
impl<F> PacketSink for F
where
	F: FnMut(Packet<'_>),
{
	fn send(&mut self, packet: Packet<'_>)
	{
		self(packet)
	}
}
