// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board overrides.
//!
//! Everything here has a default that does the generic thing with the
//! board's rail and PWROK tables. Boards override only what they need; an
//! override that still wants the generic behavior calls the free function
//! the default uses.

use drv_ap_seq_api::{HostSleepEvent, PowerState, ShutdownReason};
use drv_power_signals::{PowerSignals, SignalError, SignalId, SignalMask};
use seq_time::{msleep_at_least, Clock, Instant};

/// One primary rail enable, and how long it must settle before the next.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RailStep {
    pub enable: SignalId,
    pub delay_ms: u32,
}

/// A PWROK-class output. `delay_ms` is waited before driving it on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PwrOkSignal {
    pub signal: SignalId,
    pub active_low: bool,
    pub delay_ms: u32,
}

impl PwrOkSignal {
    pub const fn on_level(&self) -> bool {
        !self.active_low
    }
}

/// What to do about a system sitting in G3 on battery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdleAction {
    Ignore,
    Hibernate,
    Cutoff,
}

pub fn rail_mask(rails: &[RailStep]) -> SignalMask {
    rails
        .iter()
        .fold(SignalMask::EMPTY, |m, r| m | r.enable.mask())
}

pub fn pwrok_mask(list: &[PwrOkSignal]) -> SignalMask {
    list.iter()
        .fold(SignalMask::EMPTY, |m, p| m | p.signal.mask())
}

/// Enables `rails` in order, holding each one's settle time before the next.
pub fn assert_rails(
    signals: &PowerSignals<'_>,
    clock: &dyn Clock,
    rails: &[RailStep],
) -> Result<(), SignalError> {
    for r in rails {
        signals.assert(r.enable, true)?;
        msleep_at_least(clock, r.delay_ms);
    }
    Ok(())
}

/// Disables `rails` in reverse order. Rails already off are left alone.
pub fn deassert_rails(
    signals: &PowerSignals<'_>,
    rails: &[RailStep],
) -> Result<(), SignalError> {
    for r in rails.iter().rev() {
        if signals.is_asserted(r.enable) {
            signals.assert(r.enable, false)?;
        }
    }
    Ok(())
}

pub fn assert_pwrok(
    signals: &PowerSignals<'_>,
    clock: &dyn Clock,
    list: &[PwrOkSignal],
) -> Result<(), SignalError> {
    for p in list {
        msleep_at_least(clock, p.delay_ms);
        signals.set_level(p.signal, p.on_level())?;
    }
    Ok(())
}

/// Drops `list` in reverse order, without delays.
pub fn deassert_pwrok(
    signals: &PowerSignals<'_>,
    list: &[PwrOkSignal],
) -> Result<(), SignalError> {
    for p in list.iter().rev() {
        if signals.get_level(p.signal)? == p.on_level() {
            signals.set_level(p.signal, !p.on_level())?;
        }
    }
    Ok(())
}

/// The generic emergency teardown: PWROK off, then the primary rails too
/// if the board's shutdown target is G3.
pub fn generic_force_shutdown<B: Board + ?Sized>(
    board: &B,
    signals: &PowerSignals<'_>,
) -> Result<(), SignalError> {
    deassert_pwrok(signals, board.pwrok_signals())?;
    if board.shutdown_target() == PowerState::G3 {
        deassert_rails(signals, board.primary_rails())?;
    }
    Ok(())
}

pub trait Board {
    /// Primary (always-on) AP rails, in enable order.
    fn primary_rails(&self) -> &[RailStep];

    /// PWROK-class outputs, in assert order.
    fn pwrok_signals(&self) -> &[PwrOkSignal] {
        &[]
    }

    fn assert_primary_rails(
        &self,
        signals: &PowerSignals<'_>,
        clock: &dyn Clock,
    ) -> Result<(), SignalError> {
        assert_rails(signals, clock, self.primary_rails())
    }

    fn deassert_primary_rails(
        &self,
        signals: &PowerSignals<'_>,
    ) -> Result<(), SignalError> {
        deassert_rails(signals, self.primary_rails())
    }

    fn assert_pwrok(
        &self,
        signals: &PowerSignals<'_>,
        clock: &dyn Clock,
    ) -> Result<(), SignalError> {
        assert_pwrok(signals, clock, self.pwrok_signals())
    }

    fn deassert_pwrok(
        &self,
        signals: &PowerSignals<'_>,
    ) -> Result<(), SignalError> {
        deassert_pwrok(signals, self.pwrok_signals())
    }

    /// Tears the AP down right now. Called once per forced shutdown.
    fn force_shutdown(
        &self,
        signals: &PowerSignals<'_>,
        _clock: &dyn Clock,
        _reason: ShutdownReason,
    ) -> Result<(), SignalError> {
        generic_force_shutdown(self, signals)
    }

    /// Where a forced shutdown ends up.
    fn shutdown_target(&self) -> PowerState {
        PowerState::G3
    }

    fn check_power_rails_enabled(&self, signals: &PowerSignals<'_>) -> bool {
        signals.snapshot().has(rail_mask(self.primary_rails()))
    }

    fn before_rsmrst(&self, _level: bool) {}

    fn after_rsmrst(&self, _level: bool) {}

    /// Whether there is enough power (battery, charger) to boot the AP.
    fn can_boot_ap(&self) -> bool {
        true
    }

    fn extpower_present(&self) -> bool {
        true
    }

    /// Keep the primary rails up in S5, e.g. for a wake source.
    fn keep_ap_rails_in_s5(&self) -> bool {
        false
    }

    /// Decides what to do about a system idle in G3 since `last_shutdown`.
    /// `target` arrives as the hibernate deadline and may be moved.
    fn system_is_idle(
        &self,
        _last_shutdown: Instant,
        target: &mut Instant,
        now: Instant,
    ) -> IdleAction {
        if now >= *target {
            IdleAction::Hibernate
        } else {
            IdleAction::Ignore
        }
    }

    fn hibernate(&self) {}

    fn cut_off_battery(&self) {}

    fn state_entry(&self, _state: PowerState) {}

    fn state_exit(&self, _state: PowerState) {}

    /// Lets the board move a steady state somewhere else.
    fn state_run(&self, _state: PowerState) -> Option<PowerState> {
        None
    }

    fn handle_host_sleep_event(&self, _event: HostSleepEvent) {}
}
