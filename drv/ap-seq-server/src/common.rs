// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Behavior shared by every chipset: forced shutdown, and the steady-state
//! policy for G3 and S5 that runs when the chipset has nothing to do.

use drv_ap_seq_api::{PowerState, ShutdownReason};
use seq_time::SECOND;

use crate::board::IdleAction;
use crate::cx::{Cx, SeqTimer};
use crate::Trace;

pub(crate) fn force_shutdown(cx: &mut Cx<'_, '_>, reason: ShutdownReason) {
    if cx.shared().settings().debug_mode {
        cx.trace(Trace::ShutdownSuppressed(reason));
        return;
    }
    // G3 is at or below every shutdown target.
    let state = cx.state();
    if cx.forcing()
        || state == PowerState::G3
        || state == cx.board().shutdown_target()
    {
        cx.trace(Trace::ForceShutdownIgnored(reason));
        return;
    }
    cx.teardown(reason);
    cx.core.forcing = Some(reason);
}

/// Runs the common policy for a steady state. Returns where to go next.
pub(crate) fn steady_state(cx: &mut Cx<'_, '_>) -> Option<PowerState> {
    match cx.state() {
        PowerState::G3 => g3(cx),
        PowerState::S5 => s5(cx),
        _ => None,
    }
}

fn g3(cx: &mut Cx<'_, '_>) -> Option<PowerState> {
    let now = cx.now();

    let exit = cx.take_exit_hard_off();
    let reboot = cx.shared().lock().reboot_ap_at_g3.take();
    if let Some(delay_s) = reboot {
        cx.trace(Trace::RebootScheduled { delay_s });
        if delay_s == 0 {
            return Some(PowerState::G3S5);
        }
        let at = now.saturating_add(u64::from(delay_s) * SECOND);
        cx.set_timer(SeqTimer::G3Boot, at);
        cx.core.g3_boot = true;
    }
    // An exit-hard-off during a delayed reboot waits the delay out too.
    if cx.core.g3_boot {
        if cx.core.timers.take_fired(SeqTimer::G3Boot) {
            cx.core.g3_boot = false;
            return Some(PowerState::G3S5);
        }
        return None;
    }
    if exit {
        return Some(PowerState::G3S5);
    }

    let extpower = cx.board().extpower_present();
    if cx.core.extpower && !extpower {
        // Pulling AC restarts the count toward hibernation.
        cx.shared().lock().last_shutdown_time = now;
        cx.core.idle_acted = false;
        cx.clear_timer(SeqTimer::Hibernate);
    }
    cx.core.extpower = extpower;

    cx.core.timers.take_fired(SeqTimer::Hibernate);
    if extpower || cx.core.idle_acted {
        return None;
    }

    let last = cx.shared().last_shutdown_time();
    let delay_s = cx.shared().settings().hibernate_delay_s;
    let mut target = last.saturating_add(u64::from(delay_s) * SECOND);
    match cx.board().system_is_idle(last, &mut target, now) {
        IdleAction::Hibernate => {
            cx.core.idle_acted = true;
            cx.trace(Trace::Hibernate);
            cx.board().hibernate();
        }
        IdleAction::Cutoff => {
            cx.core.idle_acted = true;
            cx.trace(Trace::Cutoff);
            cx.board().cut_off_battery();
        }
        IdleAction::Ignore => {
            if target > now {
                cx.set_timer(SeqTimer::Hibernate, target);
            }
        }
    }
    None
}

fn s5(cx: &mut Cx<'_, '_>) -> Option<PowerState> {
    if cx.take_exit_hard_off() {
        cx.clear_timer(SeqTimer::S5Inactivity);
    }
    if cx.forcing() {
        return Some(PowerState::S5G3);
    }

    let settings = cx.shared().settings();
    if cx.board().keep_ap_rails_in_s5() || settings.pause_in_s5 {
        cx.clear_timer(SeqTimer::S5Inactivity);
        return None;
    }

    match settings.s5_inactivity_timeout_s {
        t if t < 0 => {
            cx.clear_timer(SeqTimer::S5Inactivity);
            None
        }
        0 => {
            cx.trace(Trace::S5Timeout);
            Some(PowerState::S5G3)
        }
        t => {
            if cx.core.timers.take_fired(SeqTimer::S5Inactivity) {
                cx.trace(Trace::S5Timeout);
                return Some(PowerState::S5G3);
            }
            if !cx.core.timers.is_armed(SeqTimer::S5Inactivity) {
                let secs = u64::from(t.unsigned_abs());
                let at = cx.now().saturating_add(secs * SECOND);
                cx.set_timer(SeqTimer::S5Inactivity, at);
            }
            None
        }
    }
}
