// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ap_hooks::HookEvent;
use drv_ap_seq_api::{
    BootMilestone, HostSleepEvent, PowerState, ResetReason, SeqError,
    ShutdownReason,
};
use drv_power_signals::{
    EventFlags, PowerSignals, SignalId, SignalMask, SignalSnapshot,
};
use enum_map::Enum;
use seq_time::{msleep_at_least, Clock, Deadline, Instant, Multitimer, MSEC};
use seqlog::{seqlog_entry, Seqlog};

use crate::board::Board;
use crate::config::Config;
use crate::shared::{Shared, SleepTracker};
use crate::{Env, Trace, TRACE_ENTRIES};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub(crate) enum SeqTimer {
    S5Inactivity,
    G3Boot,
    Hibernate,
    SleepTimeout,
    Poll,
}

/// The task-owned half of the sequencer.
pub(crate) struct Core {
    pub state: PowerState,
    /// Set from the moment a forced shutdown tears the rails down until we
    /// reach the board's shutdown target, or G3.
    pub forcing: Option<ShutdownReason>,
    pub timers: Multitimer<SeqTimer>,
    pub log: Seqlog<Trace, TRACE_ENTRIES>,
    pub snap: SignalSnapshot,
    /// Wake bits that arrived while a handler was waiting for something
    /// else.
    pub pending: u32,
    pub last_logged: Option<(PowerState, SignalMask)>,
    /// A delayed reboot is counting down in G3.
    pub g3_boot: bool,
    /// The idle policy already acted for this stay in G3.
    pub idle_acted: bool,
    pub extpower: bool,
}

impl Core {
    pub fn new() -> Self {
        Self {
            state: PowerState::G3,
            forcing: None,
            timers: Multitimer::new(),
            log: Seqlog::new(Trace::None),
            snap: SignalSnapshot::default(),
            pending: 0,
            last_logged: None,
            g3_boot: false,
            idle_acted: false,
            extpower: false,
        }
    }
}

/// What a chipset handler gets to work with: the environment, plus the
/// sequencer's own bookkeeping.
pub struct Cx<'s, 'a> {
    pub(crate) env: &'s Env<'a>,
    pub(crate) core: &'s mut Core,
}

impl<'s, 'a> Cx<'s, 'a> {
    pub fn state(&self) -> PowerState {
        self.core.state
    }

    pub fn signals(&self) -> &'a PowerSignals<'a> {
        self.env.signals
    }

    pub fn board(&self) -> &'a dyn Board {
        self.env.board
    }

    pub fn clock(&self) -> &'a dyn Clock {
        self.env.clock
    }

    pub fn shared(&self) -> &'a Shared {
        self.env.shared
    }

    pub fn config(&self) -> &Config {
        &self.env.config
    }

    pub fn now(&self) -> Instant {
        self.env.clock.now()
    }

    /// The snapshot this pass is working from.
    pub fn snapshot(&self) -> SignalSnapshot {
        self.core.snap
    }

    /// Re-samples the signals and makes that the working snapshot.
    pub fn refresh(&mut self) -> SignalSnapshot {
        self.core.snap = self.env.signals.update();
        self.core.snap
    }

    pub fn delay_ms(&self, ms: u32) {
        msleep_at_least(self.env.clock, ms);
    }

    pub fn trace(&mut self, t: Trace) {
        seqlog_entry!(self.core.log, self.env.clock.now(), t);
    }

    /// Waits until every signal in `want` is asserted.
    pub fn wait_for(
        &mut self,
        want: SignalMask,
        timeout_ms: u32,
    ) -> Result<(), SeqError> {
        self.wait_for_level(want, want, timeout_ms)
    }

    /// Waits until the signals in `mask` are asserted exactly where `want`
    /// says. Unreadable signals never satisfy the wait.
    pub fn wait_for_level(
        &mut self,
        want: SignalMask,
        mask: SignalMask,
        timeout_ms: u32,
    ) -> Result<(), SeqError> {
        let deadline =
            Deadline::after(self.env.clock, u64::from(timeout_ms) * MSEC);
        loop {
            let snap = self.refresh();
            if snap.matches(want, mask) {
                return Ok(());
            }
            if deadline.expired(self.now()) {
                let wrong = (snap.asserted ^ want) & mask;
                let missing = wrong | (mask & !snap.valid);
                let state = self.core.state;
                self.trace(Trace::Timeout { state, missing });
                return Err(SeqError::Timeout);
            }
            let bits = self.env.platform.wait_event(
                &self.env.shared.events,
                Some(deadline.instant()),
            );
            self.core.pending |= bits & !EventFlags::SIGNAL;
        }
    }

    /// Tells the rest of the firmware. Must not be called with the request
    /// block locked; hooks are free to make requests.
    pub fn notify(&mut self, event: HookEvent) {
        self.trace(Trace::Hook(event));
        self.env.hooks.notify(event);
    }

    pub fn forcing(&self) -> bool {
        self.core.forcing.is_some()
    }

    /// Reports that `missing` required rails went away. Starts a forced
    /// shutdown unless one is already under way.
    pub fn power_fail(&mut self, missing: SignalMask) {
        let state = self.core.state;
        self.trace(Trace::PowerFail { state, missing });
        if !self.forcing() {
            self.force_shutdown(ShutdownReason::PowerFail);
        }
    }

    pub fn force_shutdown(&mut self, reason: ShutdownReason) {
        crate::common::force_shutdown(self, reason);
    }

    /// Board teardown without the forced-shutdown bookkeeping, for use
    /// before there is a state to leave.
    pub fn teardown(&mut self, reason: ShutdownReason) {
        self.trace(Trace::ForceShutdown(reason));
        let r = self.env.board.force_shutdown(
            self.env.signals,
            self.env.clock,
            reason,
        );
        if let Err(e) = r {
            self.trace(Trace::SignalError(e));
        }
    }

    /// Acts on a shutdown request that arrived while we were busy.
    pub fn take_pending_shutdown(&mut self) {
        let pending = self.env.shared.lock().force_shutdown.take();
        if let Some(reason) = pending {
            self.force_shutdown(reason);
        }
    }

    pub fn take_exit_hard_off(&mut self) -> bool {
        let taken =
            core::mem::take(&mut self.env.shared.lock().exit_hard_off);
        if taken {
            self.trace(Trace::ExitHardOff);
        }
        taken
    }

    pub fn boot_milestone(&self, m: BootMilestone) {
        self.env.shared.record_milestone(m, self.now());
    }

    pub(crate) fn set_timer(&mut self, which: SeqTimer, deadline: Instant) {
        self.core.timers.set_timer(which, deadline, None);
    }

    pub(crate) fn clear_timer(&mut self, which: SeqTimer) {
        self.core.timers.clear_timer(which);
    }

    pub fn with_sleep<R>(
        &self,
        f: impl FnOnce(&mut SleepTracker) -> R,
    ) -> R {
        f(&mut self.env.shared.lock().sleep)
    }

    /// Forgets what the host told us about sleeping.
    pub fn reset_host_sleep_tracking(&mut self) {
        self.with_sleep(|t| {
            t.host_state = HostSleepEvent::DefaultReset;
            t.reset();
        });
        self.clear_timer(SeqTimer::SleepTimeout);
    }

    /// Counts one sleep signal transition toward the host's resume report.
    pub fn count_sleep_transition(&self) {
        self.with_sleep(|t| t.transitions = t.transitions.wrapping_add(1));
    }

    /// Restarts the suspend timeout, if a suspend is still outstanding.
    pub fn rearm_sleep_timeout(&mut self) {
        let timeout =
            self.with_sleep(|t| t.timeout_ms.filter(|_| t.suspending));
        if let Some(ms) = timeout {
            let at = self.now().saturating_add(u64::from(ms) * MSEC);
            self.set_timer(SeqTimer::SleepTimeout, at);
        }
    }

    pub fn cancel_sleep_timeout(&mut self) {
        self.clear_timer(SeqTimer::SleepTimeout);
    }

    /// Pulses an active-asserted reset line for `pulse_ms`, unless the AP is
    /// already being held in reset.
    pub fn pulse_reset(
        &mut self,
        line: Option<SignalId>,
        pulse_ms: u32,
        reason: ResetReason,
    ) {
        let Some(line) = line else {
            self.trace(Trace::ResetSkipped(reason));
            return;
        };
        let signals = self.env.signals;
        let snap = self.refresh();
        if snap.valid_and_on(line.mask()) {
            self.trace(Trace::ResetSkipped(reason));
            return;
        }
        self.trace(Trace::ApReset(reason));
        if let Err(e) = signals.assert(line, true) {
            self.trace(Trace::SignalError(e));
            return;
        }
        self.delay_ms(pulse_ms);
        if let Err(e) = signals.assert(line, false) {
            self.trace(Trace::SignalError(e));
        }
        self.notify(HookEvent::Reset);
        if self.core.state == PowerState::S0ix {
            self.reset_host_sleep_tracking();
        }
    }
}
