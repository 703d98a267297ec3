// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The part of the sequencer other contexts can touch.
//!
//! Host commands, the console, and other firmware never call into the state
//! machine. They leave a request here and post [`EventFlags::REQUEST`]; the
//! task picks the request up on its next pass. The current state is
//! published the other way, through an atomic.

use core::sync::atomic::{AtomicU8, Ordering};

use drv_ap_seq_api::{
    host::BootTimes, BootMilestone, ChipsetStateMask, HostSleepEvent,
    PowerState, ResetReason, SeqError, ShutdownReason, SleepNotify,
    BOOT_MILESTONES, SLEEP_TIMEOUT_DEFAULT, SLEEP_TIMEOUT_INFINITE,
    SLEEP_TRANSITIONS_MASK, SLEEP_TRANSITIONS_TIMEOUT,
};
use drv_power_signals::EventFlags;
use seq_time::Instant;

use crate::config::Config;

/// Values that can be changed at runtime from the console or host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub hibernate_delay_s: u32,
    pub s5_inactivity_timeout_s: i32,
    pub pause_in_s5: bool,
    /// Bring-up aid: forced shutdowns are logged and otherwise ignored.
    pub debug_mode: bool,
}

/// What the host has told us about its own sleep state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SleepTracker {
    pub host_state: HostSleepEvent,
    /// A suspend or resume hook we still owe the rest of the firmware.
    pub notify: SleepNotify,
    /// Sleep signal transitions since the last suspend request.
    pub transitions: u32,
    /// `Suspend` went out for the current S0ix cycle.
    pub suspend_notified: bool,
    /// Between a suspend request and the matching resume.
    pub suspending: bool,
    /// `None` if the current suspend never times out.
    pub timeout_ms: Option<u32>,
    pub timed_out: bool,
}

impl SleepTracker {
    pub const fn new() -> Self {
        Self {
            host_state: HostSleepEvent::DefaultReset,
            notify: SleepNotify::None,
            transitions: 0,
            suspend_notified: false,
            suspending: false,
            timeout_ms: None,
            timed_out: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self {
            host_state: self.host_state,
            ..Self::new()
        };
    }

    fn start_suspend(&mut self, timeout_ms: Option<u32>) {
        self.transitions = 0;
        self.suspending = true;
        self.timed_out = false;
        self.timeout_ms = timeout_ms;
    }

    /// Ends the suspend cycle and returns the count reported to the host.
    fn complete_resume(&mut self) -> u32 {
        let mut count = self.transitions & SLEEP_TRANSITIONS_MASK;
        if self.timed_out {
            count |= SLEEP_TRANSITIONS_TIMEOUT;
        }
        self.suspending = false;
        self.timeout_ms = None;
        count
    }
}

impl Default for SleepTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Boot milestone timestamps for the current AP boot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BootRecord {
    pub timestamps: [u64; BOOT_MILESTONES],
    pub cnt: u16,
}

impl BootRecord {
    pub const fn new() -> Self {
        Self {
            timestamps: [0; BOOT_MILESTONES],
            cnt: 0,
        }
    }

    /// Records `m` at `now`. Turning the AP rails on starts a new record.
    pub fn record(&mut self, m: BootMilestone, now: Instant) {
        match m {
            BootMilestone::EcCurTime => return,
            BootMilestone::Arail => *self = Self::new(),
            BootMilestone::PltrstLow => self.cnt = self.cnt.saturating_add(1),
            _ => (),
        }
        self.timestamps[m as usize] = now;
    }

    pub fn report(&self, now: Instant) -> BootTimes {
        let mut timestamps = self.timestamps;
        timestamps[BootMilestone::EcCurTime as usize] = now;
        BootTimes {
            timestamps,
            cnt: self.cnt,
        }
    }
}

impl Default for BootRecord {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Requests {
    pub exit_hard_off: bool,
    /// Reboot the AP once it is in G3, after waiting this many seconds.
    pub reboot_ap_at_g3: Option<u32>,
    pub force_shutdown: Option<ShutdownReason>,
    pub reset: Option<ResetReason>,
    pub forced_state: Option<PowerState>,
    pub sleep_event: Option<HostSleepEvent>,
    pub settings_changed: bool,

    pub settings: Settings,
    pub default_sleep_timeout_ms: u32,
    pub sleep: SleepTracker,
    pub boot: BootRecord,
    pub last_shutdown_time: Instant,
}

pub struct Shared {
    pub events: EventFlags,
    state: AtomicU8,
    requests: spin::Mutex<Requests>,
}

impl Shared {
    pub const fn new(config: &Config) -> Self {
        Self {
            events: EventFlags::new(),
            state: AtomicU8::new(PowerState::G3 as u8),
            requests: spin::Mutex::new(Requests {
                exit_hard_off: false,
                reboot_ap_at_g3: None,
                force_shutdown: None,
                reset: None,
                forced_state: None,
                sleep_event: None,
                settings_changed: false,
                settings: Settings {
                    hibernate_delay_s: config.hibernate_delay_s,
                    s5_inactivity_timeout_s: config.s5_inactivity_timeout_s,
                    pause_in_s5: false,
                    debug_mode: false,
                },
                default_sleep_timeout_ms: config.sleep_timeout_ms,
                sleep: SleepTracker::new(),
                boot: BootRecord::new(),
                last_shutdown_time: 0,
            }),
        }
    }

    pub(crate) fn lock(&self) -> spin::MutexGuard<'_, Requests> {
        self.requests.lock()
    }

    fn wake(&self) {
        self.events.post(EventFlags::REQUEST);
    }

    pub fn state(&self) -> PowerState {
        PowerState::from_u8(self.state.load(Ordering::SeqCst))
            .unwrap_or(PowerState::G3)
    }

    pub(crate) fn publish(&self, state: PowerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn in_state(&self, mask: ChipsetStateMask) -> bool {
        drv_ap_seq_api::in_state(self.state(), mask)
    }

    pub fn in_or_transitioning_to(&self, mask: ChipsetStateMask) -> bool {
        drv_ap_seq_api::in_or_transitioning_to(self.state(), mask)
    }

    /// Asks for the AP to be powered on. Only meaningful while off or
    /// headed there; in S5 it also restarts the inactivity timer.
    pub fn request_exit_hard_off(&self) {
        match self.state() {
            PowerState::G3 | PowerState::S5G3 | PowerState::S5 => (),
            _ => return,
        }
        self.lock().exit_hard_off = true;
        self.wake();
    }

    /// Powers the AP back on the next time it reaches G3, no sooner than
    /// `delay_s` seconds after that.
    pub fn request_reboot_ap_on_g3(&self, delay_s: u32) {
        self.lock().reboot_ap_at_g3 = Some(delay_s);
        self.wake();
    }

    pub fn request_force_shutdown(&self, reason: ShutdownReason) {
        self.lock().force_shutdown.get_or_insert(reason);
        self.wake();
    }

    pub fn request_reset(&self, reason: ResetReason) {
        self.lock().reset.get_or_insert(reason);
        self.wake();
    }

    /// Requests a direct move to `target`, which must be an edge in `legal`
    /// from the current state.
    pub fn request_state(
        &self,
        target: PowerState,
        legal: &[(PowerState, PowerState)],
    ) -> Result<(), SeqError> {
        let from = self.state();
        let mut r = self.lock();
        if r.forced_state.is_some() {
            return Err(SeqError::TransitionInProgress);
        }
        if !legal.contains(&(from, target)) {
            return Err(SeqError::IllegalTransition);
        }
        r.forced_state = Some(target);
        drop(r);
        self.wake();
        Ok(())
    }

    /// Records a host sleep event. For a resume, returns the transition
    /// count (and timeout flag) owed to the host.
    pub fn host_sleep_event(
        &self,
        event: HostSleepEvent,
        sleep_timeout_ms: u16,
    ) -> u32 {
        let mut r = self.lock();
        let mut count = 0;
        r.sleep.host_state = event;
        match event {
            HostSleepEvent::S0ixSuspend => {
                let timeout = match sleep_timeout_ms {
                    SLEEP_TIMEOUT_DEFAULT => Some(r.default_sleep_timeout_ms),
                    SLEEP_TIMEOUT_INFINITE => None,
                    ms => Some(u32::from(ms)),
                };
                r.sleep.notify = SleepNotify::Suspend;
                r.sleep.start_suspend(timeout);
            }
            HostSleepEvent::S0ixResume => {
                r.sleep.notify = SleepNotify::Resume;
                count = r.sleep.complete_resume();
            }
            HostSleepEvent::DefaultReset => r.sleep.reset(),
            _ => (),
        }
        r.sleep_event = Some(event);
        drop(r);
        self.wake();
        count
    }

    pub fn host_sleep_state(&self) -> HostSleepEvent {
        self.lock().sleep.host_state
    }

    pub fn sleep_tracker(&self) -> SleepTracker {
        self.lock().sleep
    }

    /// For the eSPI driver, which sees ESPIRST before we do. PLTRST is
    /// recorded here too when the chipset has the line.
    pub fn record_milestone(&self, m: BootMilestone, now: Instant) {
        self.lock().boot.record(m, now);
    }

    pub fn boot_times(&self, now: Instant) -> BootTimes {
        self.lock().boot.report(now)
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> Settings {
        let mut r = self.lock();
        f(&mut r.settings);
        r.settings_changed = true;
        let s = r.settings;
        drop(r);
        self.wake();
        s
    }

    pub fn last_shutdown_time(&self) -> Instant {
        self.lock().last_shutdown_time
    }
}
