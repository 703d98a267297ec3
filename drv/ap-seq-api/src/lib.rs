// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API crate for the AP power sequencer.
//!
//! Types in here are shared between the sequencer, the host command and
//! console front ends, and any other firmware that wants to ask the
//! sequencer for something.

#![cfg_attr(target_os = "none", no_std)]

use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};
use zerocopy::{Immutable, IntoBytes, KnownLayout};

// Re-export PowerState for client convenience.
pub use drv_ap_power_state::{
    in_or_transitioning_to, in_state, ChipsetStateMask, PowerState,
};

pub mod host;

#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
pub enum SeqError {
    /// The requested edge is not in the chipset's legal-edge table.
    IllegalTransition = 1,
    /// A transition was already requested and has not been taken yet.
    TransitionInProgress,
    /// A bounded signal wait expired.
    Timeout,
    /// A rail that must stay up went away.
    PowerFail,
    /// A signal the condition depends on could not be read.
    SignalAbsent,
    /// The board refused to let the AP power up.
    PowerUpInhibited,
    /// Write to an input-only signal.
    NotWritable,
    /// The signal id is not configured on this board.
    UnknownSignal,
    /// The sequencer has been told to stay where it is.
    DebugMode,
    InvalidParam,
}

/// Why the AP is being reset.
#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    Eq,
    PartialEq,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
    hubpack::SerializedSize,
)]
#[repr(u16)]
pub enum ResetReason {
    Unknown = 0,
    BoardCustom,
    HangReboot,
    ConsoleCmd,
    HostCmd,
    KbSysReset,
    KbWarmReboot,
    DbgWarmReboot,
    ApRequest,
    Init,
    ApWatchdog,
}

/// Why the AP's rails are being torn down.
#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    Eq,
    PartialEq,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
    hubpack::SerializedSize,
)]
#[repr(u16)]
pub enum ShutdownReason {
    /// A required power-good went away.
    PowerFail = 0x8000,
    /// Part of EC initialization.
    Init,
    BoardCustom,
    /// Not a shutdown as such: the board would not allow power-up.
    BatteryInhibit,
    /// A bounded signal wait timed out.
    Wait,
    BatteryCritical,
    ConsoleCmd,
    /// Entry to G3 was requested.
    G3,
    Thermal,
    Button,
}

/// Host-reported sleep transitions, as sent with HOST_SLEEP_EVENT.
#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    Eq,
    PartialEq,
    IntoBytes,
    Immutable,
    KnownLayout,
    Serialize,
    Deserialize,
    hubpack::SerializedSize,
)]
#[repr(u8)]
pub enum HostSleepEvent {
    DefaultReset = 0,
    S3Suspend = 1,
    S3Resume = 2,
    S0ixSuspend = 3,
    S0ixResume = 4,
    S3WakeableSuspend = 5,
}

impl HostSleepEvent {
    pub fn from_u8(v: u8) -> Option<Self> {
        <Self as num_traits::FromPrimitive>::from_u8(v)
    }

    pub fn is_suspend(self) -> bool {
        matches!(
            self,
            Self::S3Suspend | Self::S0ixSuspend | Self::S3WakeableSuspend
        )
    }
}

/// A suspend/resume hook the sequencer owes the rest of the firmware, set
/// when the host announces a low-power idle transition and cleared when the
/// sequencer delivers it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SleepNotify {
    #[default]
    None,
    Suspend,
    Resume,
}

/// `sleep_timeout_ms` value meaning "use the configured default".
pub const SLEEP_TIMEOUT_DEFAULT: u16 = 0;
/// `sleep_timeout_ms` value meaning "never time out".
pub const SLEEP_TIMEOUT_INFINITE: u16 = 0xffff;
/// Set in a resume response's transition count if the suspend timed out.
pub const SLEEP_TRANSITIONS_TIMEOUT: u32 = 1 << 31;
pub const SLEEP_TRANSITIONS_MASK: u32 = !SLEEP_TRANSITIONS_TIMEOUT;

/// AP boot milestones reported by GET_BOOT_TIME.
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u8)]
pub enum BootMilestone {
    /// Primary AP rails enabled.
    Arail = 0,
    Rsmrst,
    Espirst,
    PltrstLow,
    PltrstHigh,
    /// Not a milestone: the time the report was made.
    EcCurTime,
}

pub const BOOT_MILESTONES: usize = 6;
