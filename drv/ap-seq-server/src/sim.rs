// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated board for tests: pins, a clock that only moves when someone
//! waits, and a script of things that happen at given times.

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;

use ap_hooks::{Hook, HookEvent, HookMask};
use drv_ap_seq_api::{HostSleepEvent, PowerState, ShutdownReason};
use drv_power_signals::{
    EventFlags, HalError, Line, PowerSignals, SharedRail, SignalDef,
    SignalError, SignalFlags, SignalHal, SignalId, SignalMask,
};
use seq_time::{Clock, Instant, SECOND};

use crate::board::{
    assert_rails, deassert_rails, generic_force_shutdown, rail_mask, Board,
    PwrOkSignal, RailStep,
};
use crate::chipset::arm::{ArmPolicy, ArmSignals, ArmSoc};
use crate::chipset::x86::{X86Policy, X86Signals, X86};
use crate::config::Config;
use crate::console::Console;
use crate::host::HostCommands;
use crate::platform::Platform;
use crate::shared::Shared;
use crate::{Env, Hooks, Sequencer, Trace};

pub(crate) const PINS: usize = 32;

fn pin(line: Line) -> usize {
    match line {
        Line::Gpio(p) => usize::from(p),
        Line::VirtualWire(w) => 16 + usize::from(w),
        Line::Adc { channel, .. } => 24 + usize::from(channel),
    }
}

pub(crate) struct SimHal {
    pins: RefCell<[Option<bool>; PINS]>,
    irq: RefCell<[bool; PINS]>,
    /// `(from, to)`: whenever `from` changes, `to` follows.
    links: RefCell<Vec<(usize, usize)>>,
    /// Every write, in order.
    pub writes: RefCell<Vec<(usize, bool)>>,
}

impl SimHal {
    pub fn new(initial: &[(usize, bool)]) -> Self {
        let mut pins = [Some(false); PINS];
        for &(p, level) in initial {
            pins[p] = Some(level);
        }
        Self {
            pins: RefCell::new(pins),
            irq: RefCell::new([false; PINS]),
            links: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
        }
    }

    pub fn link(&self, from: usize, to: usize) {
        self.links.borrow_mut().push((from, to));
    }

    pub fn unlink(&self, from: usize, to: usize) {
        self.links.borrow_mut().retain(|&l| l != (from, to));
    }

    pub fn set(&self, p: usize, level: Option<bool>) {
        let mut work = vec![(p, level)];
        while let Some((p, level)) = work.pop() {
            self.pins.borrow_mut()[p] = level;
            for &(from, to) in self.links.borrow().iter() {
                if from == p {
                    work.push((to, level));
                }
            }
        }
    }

    pub fn level(&self, p: usize) -> Option<bool> {
        self.pins.borrow()[p]
    }

    pub fn irq_enabled(&self, p: usize) -> bool {
        self.irq.borrow()[p]
    }

    pub fn writes_to(&self, p: usize) -> Vec<bool> {
        self.writes
            .borrow()
            .iter()
            .filter(|(w, _)| *w == p)
            .map(|&(_, level)| level)
            .collect()
    }
}

impl SignalHal for SimHal {
    fn read(&self, line: Line) -> Result<bool, HalError> {
        self.level(pin(line)).ok_or(HalError::Unavailable)
    }

    fn read_adc_mv(&self, channel: u8) -> Result<u16, HalError> {
        let on = self.level(24 + usize::from(channel));
        on.map(|on| if on { 3300 } else { 0 })
            .ok_or(HalError::Unavailable)
    }

    fn write(&self, line: Line, level: bool) -> Result<(), HalError> {
        let p = pin(line);
        self.writes.borrow_mut().push((p, level));
        self.set(p, Some(level));
        Ok(())
    }

    fn set_interrupt(
        &self,
        line: Line,
        enabled: bool,
    ) -> Result<(), HalError> {
        self.irq.borrow_mut()[pin(line)] = enabled;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Inject {
    Pin(usize, Option<bool>),
    Shutdown(ShutdownReason),
    ExitHardOff,
    SleepEvent(HostSleepEvent, u16),
}

pub(crate) struct SimPlatform<'a> {
    now: Cell<Instant>,
    script: RefCell<VecDeque<(Instant, Inject)>>,
    /// The last `wait_event` found nothing posted, scheduled or armed.
    stalled: Cell<bool>,
    hal: &'a SimHal,
    shared: &'a Shared,
}

impl<'a> SimPlatform<'a> {
    pub fn new(hal: &'a SimHal, shared: &'a Shared) -> Self {
        Self {
            now: Cell::new(SECOND),
            script: RefCell::new(VecDeque::new()),
            stalled: Cell::new(false),
            hal,
            shared,
        }
    }

    /// Schedules `what` to happen `us` from now.
    pub fn after(&self, us: u64, what: Inject) {
        let at = self.now.get() + us;
        let mut script = self.script.borrow_mut();
        let i = script.iter().position(|(t, _)| *t > at);
        match i {
            Some(i) => script.insert(i, (at, what)),
            None => script.push_back((at, what)),
        }
    }

    pub fn idle(&self) -> bool {
        self.script.borrow().is_empty()
    }

    fn apply(&self, what: Inject) {
        match what {
            Inject::Pin(p, level) => {
                self.hal.set(p, level);
                self.shared.events.post(EventFlags::SIGNAL);
            }
            Inject::Shutdown(r) => self.shared.request_force_shutdown(r),
            Inject::ExitHardOff => self.shared.request_exit_hard_off(),
            Inject::SleepEvent(e, ms) => {
                self.shared.host_sleep_event(e, ms);
            }
        }
    }

    /// Moves time forward to `t`, applying whatever is due on the way.
    pub fn advance_to(&self, t: Instant) {
        loop {
            let due = {
                let mut script = self.script.borrow_mut();
                match script.front() {
                    Some(&(at, _)) if at <= t => script.pop_front(),
                    _ => None,
                }
            };
            let Some((at, what)) = due else {
                break;
            };
            self.now.set(self.now.get().max(at));
            self.apply(what);
        }
        self.now.set(self.now.get().max(t));
    }
}

impl Clock for SimPlatform<'_> {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn delay_us(&self, us: u64) {
        self.advance_to(self.now.get() + us);
    }
}

impl Platform for SimPlatform<'_> {
    fn wait_event(
        &self,
        events: &EventFlags,
        deadline: Option<Instant>,
    ) -> u32 {
        self.stalled.set(false);
        let bits = events.take();
        if bits != 0 {
            return bits;
        }
        let next = self.script.borrow().front().map(|&(at, _)| at);
        let target = match (next, deadline) {
            (Some(a), Some(d)) => a.min(d),
            (a, d) => match a.or(d) {
                Some(t) => t,
                None => {
                    self.stalled.set(true);
                    return 0;
                }
            },
        };
        self.advance_to(target);
        events.take()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BoardCall {
    AssertRails,
    DeassertRails,
    ForceShutdown(ShutdownReason),
    Hibernate,
    Cutoff,
    Entry(PowerState),
    Exit(PowerState),
    SleepEvent(HostSleepEvent),
}

pub(crate) struct SimBoard {
    rails: &'static [RailStep],
    pwrok: &'static [PwrOkSignal],
    pub calls: RefCell<Vec<BoardCall>>,
    pub can_boot: Cell<bool>,
    pub extpower: Cell<bool>,
    pub keep_rails: Cell<bool>,
    /// Extra condition on top of the generic rail check.
    pub rails_ok: Cell<bool>,
    pub target: Cell<PowerState>,
}

impl SimBoard {
    pub fn new(
        rails: &'static [RailStep],
        pwrok: &'static [PwrOkSignal],
    ) -> Self {
        Self {
            rails,
            pwrok,
            calls: RefCell::new(Vec::new()),
            can_boot: Cell::new(true),
            extpower: Cell::new(true),
            keep_rails: Cell::new(false),
            rails_ok: Cell::new(true),
            target: Cell::new(PowerState::G3),
        }
    }

    fn record(&self, c: BoardCall) {
        self.calls.borrow_mut().push(c);
    }

    pub fn count(&self, c: BoardCall) -> usize {
        self.calls.borrow().iter().filter(|&&x| x == c).count()
    }
}

impl Board for SimBoard {
    fn primary_rails(&self) -> &[RailStep] {
        self.rails
    }

    fn pwrok_signals(&self) -> &[PwrOkSignal] {
        self.pwrok
    }

    fn assert_primary_rails(
        &self,
        signals: &PowerSignals<'_>,
        clock: &dyn Clock,
    ) -> Result<(), SignalError> {
        self.record(BoardCall::AssertRails);
        assert_rails(signals, clock, self.rails)
    }

    fn deassert_primary_rails(
        &self,
        signals: &PowerSignals<'_>,
    ) -> Result<(), SignalError> {
        self.record(BoardCall::DeassertRails);
        deassert_rails(signals, self.rails)
    }

    fn force_shutdown(
        &self,
        signals: &PowerSignals<'_>,
        _clock: &dyn Clock,
        reason: ShutdownReason,
    ) -> Result<(), SignalError> {
        self.record(BoardCall::ForceShutdown(reason));
        generic_force_shutdown(self, signals)
    }

    fn shutdown_target(&self) -> PowerState {
        self.target.get()
    }

    fn check_power_rails_enabled(&self, signals: &PowerSignals<'_>) -> bool {
        self.rails_ok.get() && signals.snapshot().has(rail_mask(self.rails))
    }

    fn can_boot_ap(&self) -> bool {
        self.can_boot.get()
    }

    fn extpower_present(&self) -> bool {
        self.extpower.get()
    }

    fn keep_ap_rails_in_s5(&self) -> bool {
        self.keep_rails.get()
    }

    fn hibernate(&self) {
        self.record(BoardCall::Hibernate);
    }

    fn cut_off_battery(&self) {
        self.record(BoardCall::Cutoff);
    }

    fn state_entry(&self, state: PowerState) {
        self.record(BoardCall::Entry(state));
    }

    fn state_exit(&self, state: PowerState) {
        self.record(BoardCall::Exit(state));
    }

    fn handle_host_sleep_event(&self, event: HostSleepEvent) {
        self.record(BoardCall::SleepEvent(event));
    }
}

#[derive(Default)]
pub(crate) struct HookLog(pub RefCell<Vec<HookEvent>>);

impl Hook for HookLog {
    fn on_event(&self, event: HookEvent) {
        self.0.borrow_mut().push(event);
    }
}

impl HookLog {
    pub fn count(&self, e: HookEvent) -> usize {
        self.0.borrow().iter().filter(|&&x| x == e).count()
    }

    pub fn take(&self) -> Vec<HookEvent> {
        core::mem::take(&mut *self.0.borrow_mut())
    }
}

/// An Intel-style board.
pub(crate) mod x86 {
    use super::*;

    pub const EN_PP3300_A: SignalId = SignalId(0);
    pub const EN_PP1800_A: SignalId = SignalId(1);
    pub const PG_PP3300_A: SignalId = SignalId(2);
    pub const PG_PP1800_A: SignalId = SignalId(3);
    pub const SLP_S3_L: SignalId = SignalId(4);
    pub const SLP_S4_L: SignalId = SignalId(5);
    pub const SLP_S0_L: SignalId = SignalId(6);
    pub const RSMRST_PWRGD: SignalId = SignalId(7);
    pub const PCH_RSMRST_L: SignalId = SignalId(8);
    pub const ALL_SYS_PWRGD: SignalId = SignalId(9);
    pub const PCH_PWROK: SignalId = SignalId(10);
    pub const SYS_PWROK: SignalId = SignalId(11);
    pub const SYS_RESET_L: SignalId = SignalId(12);
    pub const AC_PRESENT: SignalId = SignalId(13);
    pub const EN_PP5000: SignalId = SignalId(14);
    pub const PLTRST_L: SignalId = SignalId(15);

    const HIGH: SignalFlags = SignalFlags::ACTIVE_HIGH;

    pub static DEFS: [SignalDef; 16] = [
        SignalDef::output("EN_PP3300_A", Line::Gpio(0)).with(HIGH),
        SignalDef::output("EN_PP1800_A", Line::Gpio(1)).with(HIGH),
        SignalDef::input("PG_PP3300_A", Line::Gpio(2)).with(HIGH),
        SignalDef::input("PG_PP1800_A", Line::Gpio(3)).with(HIGH),
        SignalDef::input("SLP_S3_L", Line::Gpio(4)),
        SignalDef::input("SLP_S4_L", Line::Gpio(5)),
        SignalDef::input("SLP_S0_L", Line::Gpio(6))
            .with(SignalFlags::DISABLE_AT_BOOT),
        SignalDef::input("RSMRST_PWRGD", Line::Gpio(7)).with(HIGH),
        SignalDef::output("PCH_RSMRST_L", Line::Gpio(8)),
        SignalDef::input("ALL_SYS_PWRGD", Line::Gpio(9)).with(HIGH),
        SignalDef::output("PCH_PWROK", Line::Gpio(10)).with(HIGH),
        SignalDef::output("SYS_PWROK", Line::Gpio(11)).with(HIGH),
        SignalDef::output("SYS_RESET_L", Line::Gpio(12)),
        SignalDef::input("AC_PRESENT", Line::Gpio(13))
            .with(HIGH.union(SignalFlags::PERSIST)),
        SignalDef::output("EN_PP5000", Line::Gpio(14)).with(HIGH),
        SignalDef::input("PLTRST_L", Line::VirtualWire(0)),
    ];

    pub const INITIAL: &[(usize, bool)] = &[(6, true), (12, true)];

    pub static RAILS: [RailStep; 2] = [
        RailStep {
            enable: EN_PP3300_A,
            delay_ms: 5,
        },
        RailStep {
            enable: EN_PP1800_A,
            delay_ms: 5,
        },
    ];

    pub static PWROK: [PwrOkSignal; 2] = [
        PwrOkSignal {
            signal: PCH_PWROK,
            active_low: false,
            delay_ms: 10,
        },
        PwrOkSignal {
            signal: SYS_PWROK,
            active_low: false,
            delay_ms: 2,
        },
    ];

    const PGOOD: SignalMask =
        SignalMask::of(&[PG_PP3300_A, PG_PP1800_A, RSMRST_PWRGD]);

    pub const SIGNALS: X86Signals = X86Signals {
        slp_s0: Some(SLP_S0_L),
        slp_s3: SLP_S3_L,
        slp_s4: SLP_S4_L,
        slp_s5: None,
        rsmrst_in: Some(RSMRST_PWRGD),
        rsmrst_out: Some(PCH_RSMRST_L),
        all_sys_pwrgd: Some(ALL_SYS_PWRGD),
        sys_reset: Some(SYS_RESET_L),
        pltrst: Some(PLTRST_L),
        pgood_all_core: PGOOD,
        g3s5_powerup: PGOOD,
        all_s0: PGOOD.union(ALL_SYS_PWRGD.mask()),
    };

    /// Things the PCH and the rails do on their own.
    pub fn wire(hal: &SimHal) {
        hal.link(0, 2);
        hal.link(1, 3);
        hal.link(1, 7);
        hal.link(4, 9);
    }
}

/// A PMIC-driven ARM board.
pub(crate) mod arm {
    use super::*;

    pub const EN_PP1800_S5: SignalId = SignalId(0);
    pub const EN_PP0900: SignalId = SignalId(1);
    pub const PMIC_PGOOD: SignalId = SignalId(2);
    pub const AP_SUSPEND: SignalId = SignalId(3);
    pub const AP_RST_L: SignalId = SignalId(4);
    pub const AP_PWROK: SignalId = SignalId(5);

    const HIGH: SignalFlags = SignalFlags::ACTIVE_HIGH;

    pub static DEFS: [SignalDef; 6] = [
        SignalDef::output("EN_PP1800_S5", Line::Gpio(0)).with(HIGH),
        SignalDef::output("EN_PP0900", Line::Gpio(1)).with(HIGH),
        SignalDef::input("PMIC_PGOOD", Line::Gpio(2)).with(HIGH),
        SignalDef::input("AP_SUSPEND", Line::Gpio(3)).with(HIGH),
        SignalDef::output("AP_RST_L", Line::Gpio(4)),
        SignalDef::output("AP_PWROK", Line::Gpio(5)).with(HIGH),
    ];

    pub static RAILS: [RailStep; 2] = [
        RailStep {
            enable: EN_PP1800_S5,
            delay_ms: 2,
        },
        RailStep {
            enable: EN_PP0900,
            delay_ms: 2,
        },
    ];

    pub static PWROK: [PwrOkSignal; 1] = [PwrOkSignal {
        signal: AP_PWROK,
        active_low: false,
        delay_ms: 1,
    }];

    pub const SIGNALS: ArmSignals = ArmSignals {
        pmic_pgood: PMIC_PGOOD.mask(),
        ap_suspend: Some(AP_SUSPEND),
        ap_reset: Some(AP_RST_L),
    };

    pub fn wire(hal: &SimHal) {
        hal.link(1, 2);
    }
}

/// Everything a test needs, borrowed from [`x86_rig`] or [`arm_rig`].
pub(crate) struct Rig<'a> {
    pub seq: Sequencer<'a>,
    pub hal: &'a SimHal,
    pub sim: &'a SimPlatform<'a>,
    pub shared: &'a Shared,
    pub board: &'a SimBoard,
    pub log: &'a HookLog,
    pub signals: &'a PowerSignals<'a>,
    pub rail: &'a SharedRail<'a>,
}

impl<'a> Rig<'a> {
    pub fn init(&mut self) -> PowerState {
        self.seq.init(None)
    }

    pub fn state(&self) -> PowerState {
        self.seq.state()
    }

    pub fn host(&self) -> HostCommands<'a> {
        HostCommands {
            shared: self.shared,
            signals: self.signals,
            clock: self.sim,
            board: self.board,
        }
    }

    pub fn console(
        &self,
        legal: &'static [(PowerState, PowerState)],
    ) -> Console<'a> {
        Console {
            shared: self.shared,
            signals: self.signals,
            clock: self.sim,
            board: self.board,
            legal,
        }
    }

    /// Runs the sequencer the way its task does until `done` holds, giving
    /// up once `limit_us` of simulated time has gone by or there is nothing
    /// left that could ever wake it.
    pub fn run_until(
        &mut self,
        limit_us: u64,
        mut done: impl FnMut(&Self) -> bool,
    ) -> bool {
        let end = self.sim.now() + limit_us;
        loop {
            self.seq.run_until_idle(64);
            if done(self) {
                return true;
            }
            if self.sim.now() >= end {
                return false;
            }
            self.seq.wait_for_work();
            if self.sim.stalled.get() {
                return done(self);
            }
        }
    }

    pub fn run_until_state(&mut self, limit_us: u64, s: PowerState) -> bool {
        self.run_until(limit_us, |r| r.state() == s)
    }

    /// Lets `us` of simulated time go by with the sequencer running.
    pub fn run_for(&mut self, us: u64) {
        let end = self.sim.now() + us;
        self.run_until(us, |r| r.sim.now() >= end);
    }

    /// The simulated PCH bringing the AP all the way up.
    pub fn x86_to_s0(&mut self) {
        self.shared.request_exit_hard_off();
        assert!(self.run_until_state(SECOND, PowerState::S5));
        self.hal.set(usize::from(x86::SLP_S4_L.0), Some(true));
        self.hal.set(usize::from(x86::SLP_S3_L.0), Some(true));
        self.shared.events.post(EventFlags::SIGNAL);
        assert!(self.run_until_state(SECOND, PowerState::S0));
    }

    /// When the oldest retained trace entry matching `pred` was logged.
    pub fn traced_at(&self, pred: impl Fn(&Trace) -> bool) -> Option<Instant> {
        self.seq
            .trace()
            .iter()
            .find(|e| pred(&e.payload))
            .map(|e| e.timestamp)
    }

    pub fn traced(&self, t: Trace) -> u32 {
        self.seq.trace().count_matching(|x| *x == t)
    }

    /// Steady-state outputs that are currently on.
    pub fn rails_on(&self) -> SignalMask {
        let snap = self.signals.update();
        let mut rails = SignalMask::EMPTY;
        for r in self.board.rails {
            rails |= r.enable.mask();
        }
        for p in self.board.pwrok {
            rails |= p.signal.mask();
        }
        snap.asserted & rails
    }
}

pub(crate) fn x86_rig<R>(
    config: Config,
    policy: X86Policy,
    f: impl FnOnce(&mut Rig<'_>) -> R,
) -> R {
    let hal = SimHal::new(x86::INITIAL);
    x86::wire(&hal);
    let shared = Shared::new(&config);
    let sim = SimPlatform::new(&hal, &shared);
    let signals = PowerSignals::new(&x86::DEFS, &hal, &sim, &shared.events);
    let rail = SharedRail::new(&signals, x86::EN_PP5000);
    let board = SimBoard::new(&x86::RAILS, &x86::PWROK);
    let log = HookLog::default();
    let mut hooks = Hooks::new();
    hooks.subscribe(HookMask::all(), &log).unwrap();
    let mut chipset = X86::new(x86::SIGNALS, policy);

    let env = Env {
        clock: &sim,
        platform: &sim,
        signals: &signals,
        shared: &shared,
        board: &board,
        hooks: &hooks,
        rail: Some(&rail),
        config,
    };
    let mut rig = Rig {
        seq: Sequencer::new(env, &mut chipset),
        hal: &hal,
        sim: &sim,
        shared: &shared,
        board: &board,
        log: &log,
        signals: &signals,
        rail: &rail,
    };
    f(&mut rig)
}

pub(crate) fn arm_rig<R>(
    config: Config,
    policy: ArmPolicy,
    f: impl FnOnce(&mut Rig<'_>) -> R,
) -> R {
    // AP held in reset until we let it go.
    let hal = SimHal::new(&[]);
    arm::wire(&hal);
    let shared = Shared::new(&config);
    let sim = SimPlatform::new(&hal, &shared);
    let signals = PowerSignals::new(&arm::DEFS, &hal, &sim, &shared.events);
    let rail = SharedRail::new(&signals, arm::EN_PP1800_S5);
    let board = SimBoard::new(&arm::RAILS, &arm::PWROK);
    let log = HookLog::default();
    let mut hooks = Hooks::new();
    hooks.subscribe(HookMask::all(), &log).unwrap();
    let mut chipset = ArmSoc::new(arm::SIGNALS, policy);

    let env = Env {
        clock: &sim,
        platform: &sim,
        signals: &signals,
        shared: &shared,
        board: &board,
        hooks: &hooks,
        rail: None,
        config,
    };
    let mut rig = Rig {
        seq: Sequencer::new(env, &mut chipset),
        hal: &hal,
        sim: &sim,
        shared: &shared,
        board: &board,
        log: &log,
        signals: &signals,
        rail: &rail,
    };
    f(&mut rig)
}
