// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AP power sequencer.
//!
//! The [`Sequencer`] walks the AP through the ACPI-style power states on
//! behalf of a [`Chipset`], using the board's [`board::Board`] overrides for
//! anything electrical. It is owned by one task and driven from
//! [`Sequencer::run`]; everybody else talks to it through [`Shared`].
//!
//! Two chipset families are provided: [`chipset::x86::X86`], a flat state
//! handler for Intel-style SLP_Sx platforms, and [`chipset::arm::ArmSoc`], a
//! PMIC-driven SoC built from [`hsm`] levels.

#![cfg_attr(target_os = "none", no_std)]

use ap_hooks::{HookBus, HookEvent};
use drv_ap_seq_api::{HostSleepEvent, PowerState, ResetReason, ShutdownReason};
use drv_power_signals::{PowerSignals, SharedRail, SignalError, SignalMask};
use seq_time::Clock;

pub mod board;
pub mod chipset;
pub mod config;
pub mod console;
pub mod host;
pub mod hsm;
pub mod platform;
pub mod shared;
pub mod sysjump;

mod common;
mod cx;
mod sequencer;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod sim;

pub use board::Board;
pub use chipset::Chipset;
pub use config::Config;
pub use cx::Cx;
pub use platform::Platform;
pub use sequencer::Sequencer;
pub use shared::Shared;

pub const MAX_HOOKS: usize = 16;
pub type Hooks<'a> = HookBus<'a, MAX_HOOKS>;

pub const TRACE_ENTRIES: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Trace {
    None,
    Init {
        state: PowerState,
        sysjump: bool,
    },
    /// The state or the signals changed since the last one of these.
    State {
        state: PowerState,
        signals: SignalMask,
    },
    Transition {
        from: PowerState,
        to: PowerState,
    },
    Illegal {
        from: PowerState,
        to: PowerState,
    },
    Timeout {
        state: PowerState,
        missing: SignalMask,
    },
    PowerFail {
        state: PowerState,
        missing: SignalMask,
    },
    ForceShutdown(ShutdownReason),
    ForceShutdownIgnored(ShutdownReason),
    ShutdownSuppressed(ShutdownReason),
    PowerUpInhibited,
    Rsmrst(bool),
    /// PLTRST changed; `true` is going into reset.
    Pltrst(bool),
    ApReset(ResetReason),
    ResetSkipped(ResetReason),
    SignalError(SignalError),
    Hook(HookEvent),
    SleepEvent(HostSleepEvent),
    SleepTimeout,
    S5Timeout,
    Hibernate,
    Cutoff,
    RebootScheduled {
        delay_s: u32,
    },
    ExitHardOff,
    Hsm(hsm::HsmError),
}

/// Everything the sequencer borrows from the task that owns it.
pub struct Env<'a> {
    pub clock: &'a dyn Clock,
    pub platform: &'a dyn Platform,
    pub signals: &'a PowerSignals<'a>,
    pub shared: &'a Shared,
    pub board: &'a dyn Board,
    pub hooks: &'a Hooks<'a>,
    /// A rail shared with other firmware whose requests survive a sysjump.
    pub rail: Option<&'a SharedRail<'a>>,
    pub config: Config,
}
