// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host command messages handled by the sequencer.
//!
//! Requests and responses are serialized with `hubpack`; the transport (LPC,
//! eSPI, SPI) is someone else's problem and only ever sees byte buffers.

use hubpack::SerializedSize;
use serde::{Deserialize, Serialize};

use crate::{HostSleepEvent, SeqError, BOOT_MILESTONES};

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SerializedSize,
)]
pub enum HostRequest {
    /// GET_BOOT_TIME
    GetBootTime,
    /// REBOOT_AP_ON_G3, version 0: power the AP back on as soon as it
    /// reaches G3.
    RebootApOnG3,
    /// REBOOT_AP_ON_G3, version 1: as above, waiting at least `delay_s`
    /// seconds in G3 first.
    RebootApOnG3Delayed { delay_s: u32 },
    /// HIBERNATION_DELAY. `seconds == 0` only reads the current setting.
    HibernationDelay { seconds: u32 },
    /// HOST_SLEEP_EVENT, version 1. `sleep_timeout_ms` is only meaningful
    /// for suspend events.
    HostSleepEvent {
        event: HostSleepEvent,
        sleep_timeout_ms: u16,
    },
    GetHostSleepState,
    /// GSV_PAUSE_IN_S5. `set: false` only reads.
    PauseInS5 { set: bool, enable: bool },
    GetPowerInfo,
}

/// Host command ids, as they appear in the host command header.
pub mod cmd {
    pub const GET_SET_VALUE: u16 = 0x000c;
    pub const HIBERNATION_DELAY: u16 = 0x00a8;
    pub const HOST_SLEEP_EVENT: u16 = 0x00a9;
    pub const REBOOT_AP_ON_G3: u16 = 0x0127;
    pub const GET_BOOT_TIME: u16 = 0x0604;
}

impl HostRequest {
    /// The host command this request arrived as, if it has one. Requests
    /// without one come from other firmware.
    pub fn command(&self) -> Option<u16> {
        match self {
            Self::GetBootTime => Some(cmd::GET_BOOT_TIME),
            Self::RebootApOnG3 | Self::RebootApOnG3Delayed { .. } => {
                Some(cmd::REBOOT_AP_ON_G3)
            }
            Self::HibernationDelay { .. } => Some(cmd::HIBERNATION_DELAY),
            Self::HostSleepEvent { .. } => Some(cmd::HOST_SLEEP_EVENT),
            Self::PauseInS5 { .. } => Some(cmd::GET_SET_VALUE),
            Self::GetHostSleepState | Self::GetPowerInfo => None,
        }
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SerializedSize,
)]
pub struct BootTimes {
    /// Microsecond timestamps, indexed by `BootMilestone`. Zero means the
    /// milestone has not happened during this boot.
    pub timestamps: [u64; BOOT_MILESTONES],
    /// Number of platform resets seen during this boot.
    pub cnt: u16,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SerializedSize,
)]
pub enum HostResponse {
    Ack,
    BootTime(BootTimes),
    HibernationDelay {
        /// Seconds spent in G3 without external power; zero otherwise.
        time_g3: u32,
        /// Seconds until hibernation is due, counting from `time_g3`.
        time_remaining: u32,
        hibernate_delay: u32,
    },
    /// Response to a resume event: sleep-signal transitions seen since the
    /// matching suspend, with `SLEEP_TRANSITIONS_TIMEOUT` set if the suspend
    /// timed out.
    HostSleepEvent { sleep_transitions: u32 },
    HostSleepState(HostSleepEvent),
    PauseInS5(bool),
    PowerInfo {
        state: u8,
        signals: u32,
    },
    Error(ResultCode),
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SerializedSize,
)]
pub enum ResultCode {
    InvalidCommand,
    Error,
    InvalidParam,
    AccessDenied,
    InvalidResponse,
    Busy,
    Timeout,
    Unavailable,
}

impl From<SeqError> for ResultCode {
    fn from(e: SeqError) -> Self {
        match e {
            SeqError::IllegalTransition | SeqError::DebugMode => {
                Self::AccessDenied
            }
            SeqError::TransitionInProgress => Self::Busy,
            SeqError::Timeout => Self::Timeout,
            SeqError::InvalidParam
            | SeqError::UnknownSignal
            | SeqError::NotWritable => Self::InvalidParam,
            SeqError::SignalAbsent => Self::Unavailable,
            SeqError::PowerFail | SeqError::PowerUpInhibited => Self::Error,
        }
    }
}

/// Largest encoded response, for sizing transport buffers.
pub const MAX_RESPONSE_SIZE: usize = HostResponse::MAX_SIZE;
pub const MAX_REQUEST_SIZE: usize = HostRequest::MAX_SIZE;
