// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time media transport for active calls.
//!
//! - [`ListenerManager`] binds one UDP socket per call and keeps the
//!   port and call-id indices consistent.
//! - [`packet`] parses the fixed 12-byte transport header.
//! - [`MediaRelay`] drains the bounded media queue into the transcription sink.

pub mod listener;
pub mod packet;
pub mod registry;
pub mod relay;

pub use listener::{HealthReport, ListenerAge, ListenerHandle, ListenerManager, ListenerSnapshot};
pub use packet::{MalformedPacket, RtpHeader, RtpPacket};
pub use relay::{MediaEvent, MediaRelay, media_channel};
