// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ap_hooks::HookEvent;
use drv_ap_seq_api::{HostSleepEvent, PowerState, SleepNotify};
use drv_power_signals::{SignalMask, SignalSnapshot};
use seq_time::{Repeat, MSEC};
use seqlog::Seqlog;

use crate::chipset::Chipset;
use crate::common;
use crate::cx::{Core, Cx, SeqTimer};
use crate::sysjump::{PersistedState, FLAG_PAUSE_IN_S5};
use crate::{Env, Trace, TRACE_ENTRIES};

/// Upper bound on back-to-back passes before we go back to waiting.
const MAX_PASSES: usize = 32;

pub struct Sequencer<'a> {
    env: Env<'a>,
    core: Core,
    chipset: &'a mut dyn Chipset,
}

impl<'a> Sequencer<'a> {
    pub fn new(env: Env<'a>, chipset: &'a mut dyn Chipset) -> Self {
        Self {
            env,
            core: Core::new(),
            chipset,
        }
    }

    fn parts(&mut self) -> (Cx<'_, 'a>, &mut (dyn Chipset + 'a)) {
        let cx = Cx {
            env: &self.env,
            core: &mut self.core,
        };
        (cx, &mut *self.chipset)
    }

    pub fn state(&self) -> PowerState {
        self.core.state
    }

    pub fn trace(&self) -> &Seqlog<Trace, TRACE_ENTRIES> {
        &self.core.log
    }

    /// The outputs that should be on in the current state, if it is a
    /// steady one.
    pub fn expected_rails(&self) -> Option<SignalMask> {
        self.chipset.expected_rails(self.env.board, self.core.state)
    }

    /// Picks the initial state, either from scratch or from what a previous
    /// image left behind.
    pub fn init(&mut self, restored: Option<&PersistedState>) -> PowerState {
        let sysjump = restored.is_some();
        if let Some(saved) = restored {
            self.env.signals.seed(SignalSnapshot {
                asserted: SignalMask::from_bits_retain(saved.asserted),
                valid: SignalMask::from_bits_retain(saved.valid),
            });
            let mut r = self.env.shared.lock();
            r.last_shutdown_time = saved.last_shutdown_time;
            if let Some(ev) = HostSleepEvent::from_u8(saved.host_sleep) {
                r.sleep.host_state = ev;
            }
            r.settings.pause_in_s5 = saved.flags & FLAG_PAUSE_IN_S5 != 0;
        }

        let (mut cx, chipset) = self.parts();
        if let (Some(saved), Some(rail)) = (restored, cx.env.rail) {
            if let Err(e) = rail.restore(saved.rail_requests) {
                cx.trace(Trace::SignalError(e));
            }
        }

        cx.core.snap = cx.signals().init();
        let state = chipset.init_state(&mut cx, sysjump);
        cx.core.state = state;
        cx.shared().publish(state);
        cx.trace(Trace::Init { state, sysjump });

        let now = cx.now();
        cx.core.extpower = cx.board().extpower_present();
        if !sysjump {
            cx.shared().lock().last_shutdown_time = now;
        }

        let period = u64::from(cx.config().poll_interval_ms) * MSEC;
        if period > 0 {
            cx.core.timers.set_timer(
                SeqTimer::Poll,
                now + period,
                Some(Repeat::AfterDeadline(period)),
            );
        }

        cx.notify(HookEvent::Initialized);

        if cx.config().auto_power_on && !sysjump && state == PowerState::G3 {
            cx.shared().request_exit_hard_off();
        }
        state
    }

    /// One evaluation pass. Returns whether the state changed.
    pub fn run_once(&mut self) -> bool {
        let start = self.core.state;
        self.core.pending = 0;
        self.env.shared.events.take();

        self.drain_requests();

        let (mut cx, chipset) = self.parts();
        let now = cx.now();
        cx.core.timers.poll(now);
        if cx.core.timers.take_fired(SeqTimer::SleepTimeout) {
            cx.with_sleep(|t| {
                t.timed_out = true;
                t.notify = SleepNotify::None;
            });
            cx.trace(Trace::SleepTimeout);
        }
        if cx.core.timers.take_fired(SeqTimer::Poll) {
            cx.signals().reset_storm_counters();
        }

        let snap = cx.refresh();
        let state = cx.state();
        if cx.core.last_logged != Some((state, snap.asserted)) {
            cx.core.last_logged = Some((state, snap.asserted));
            cx.trace(Trace::State {
                state,
                signals: snap.asserted,
            });
        }

        let mut next = chipset.handle_state(&mut cx, state);
        if next == state {
            if let Some(to) = common::steady_state(&mut cx) {
                next = to;
            }
        }
        if next != state {
            transition(&mut cx, chipset, next);
        }
        cx.state() != start
    }

    /// Acts on everything other tasks asked for since the last pass.
    fn drain_requests(&mut self) {
        let (mut cx, chipset) = self.parts();

        let mut r = cx.shared().lock();
        let sleep_event = r.sleep_event.take();
        let settings_changed = core::mem::take(&mut r.settings_changed);
        let shutdown = r.force_shutdown.take();
        let reset = r.reset.take();
        let forced = r.forced_state.take();
        let sleep = r.sleep;
        drop(r);

        if let Some(event) = sleep_event {
            cx.trace(Trace::SleepEvent(event));
            match event {
                HostSleepEvent::S0ixSuspend => {
                    match sleep.timeout_ms.filter(|_| sleep.suspending) {
                        Some(ms) => {
                            let at = cx.now() + u64::from(ms) * MSEC;
                            cx.set_timer(SeqTimer::SleepTimeout, at);
                        }
                        None => cx.cancel_sleep_timeout(),
                    }
                }
                HostSleepEvent::S0ixResume | HostSleepEvent::DefaultReset => {
                    cx.cancel_sleep_timeout()
                }
                _ => (),
            }
            chipset.handle_host_sleep_event(&mut cx, event);
            cx.board().handle_host_sleep_event(event);
        }
        if settings_changed {
            // Both timers are re-derived from the settings on the next
            // steady-state pass.
            cx.clear_timer(SeqTimer::S5Inactivity);
            cx.clear_timer(SeqTimer::Hibernate);
        }
        if let Some(reason) = shutdown {
            cx.force_shutdown(reason);
        }
        if let Some(reason) = reset {
            chipset.reset(&mut cx, reason);
        }
        if let Some(to) = forced {
            transition(&mut cx, chipset, to);
        }
    }

    /// Runs passes until nothing changes and nothing is waiting, or `limit`
    /// passes have gone by. Returns the number of passes.
    pub fn run_until_idle(&mut self, limit: usize) -> usize {
        let mut passes = 0;
        while passes < limit {
            let changed = self.run_once();
            passes += 1;
            if !changed
                && self.core.pending == 0
                && self.env.shared.events.peek() == 0
            {
                break;
            }
        }
        passes
    }

    /// Blocks until there is a reason to run another pass.
    pub fn wait_for_work(&mut self) {
        let deadline = self.core.timers.next_deadline();
        self.core.pending |= self
            .env
            .platform
            .wait_event(&self.env.shared.events, deadline);
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.run_until_idle(MAX_PASSES);
            self.wait_for_work();
        }
    }

    /// Captures what the next image needs to pick up where we left off.
    pub fn prepare_sysjump(&self) -> PersistedState {
        let rail_requests = self.env.rail.map_or(0, |r| r.requests());
        let snap = self.env.signals.persisted();
        let r = self.env.shared.lock();
        PersistedState {
            last_shutdown_time: r.last_shutdown_time,
            rail_requests,
            asserted: snap.asserted.bits(),
            valid: snap.valid.bits(),
            host_sleep: r.sleep.host_state as u8,
            flags: if r.settings.pause_in_s5 {
                FLAG_PAUSE_IN_S5
            } else {
                0
            },
            _reserved: [0; 2],
        }
    }
}

/// Moves to `to` if the chipset allows the edge. Returns whether it did.
fn transition(
    cx: &mut Cx<'_, '_>,
    chipset: &mut dyn Chipset,
    to: PowerState,
) -> bool {
    let from = cx.state();
    if !chipset.is_legal(from, to) {
        cx.trace(Trace::Illegal { from, to });
        return false;
    }

    chipset.on_transition(cx, from, to);
    match from {
        PowerState::S5 => cx.clear_timer(SeqTimer::S5Inactivity),
        PowerState::G3 => {
            cx.clear_timer(SeqTimer::G3Boot);
            cx.clear_timer(SeqTimer::Hibernate);
            cx.core.g3_boot = false;
        }
        _ => (),
    }

    cx.core.state = to;
    cx.shared().publish(to);
    cx.trace(Trace::Transition { from, to });

    match to {
        PowerState::S5S4 | PowerState::S5S3 => {
            cx.shared().lock().exit_hard_off = false;
        }
        PowerState::G3 => {
            cx.shared().lock().last_shutdown_time = cx.now();
            cx.core.idle_acted = false;
            cx.core.extpower = cx.board().extpower_present();
            cx.notify(HookEvent::HardOff);
        }
        _ => (),
    }
    if to == PowerState::G3 || to == cx.board().shutdown_target() {
        cx.core.forcing = None;
    }
    true
}
