// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power signal abstraction.
//!
//! Boards describe every sequencing-relevant line (power-goods, sleep
//! requests from the AP, rail enables, reset lines) as a table of
//! [`SignalDef`]s. The table is indexed by [`SignalId`], and can mix GPIOs,
//! eSPI virtual wires and ADC channels compared against a threshold; the
//! hardware itself sits behind the [`SignalHal`] trait.
//!
//! [`PowerSignals`] keeps a cached, polarity-adjusted view of every signal.
//! The sequencer makes decisions from [`PowerSignals::snapshot`] so that one
//! evaluation pass sees one consistent set of levels. The cache is refreshed
//! by [`PowerSignals::update`] from the task, and by
//! [`PowerSignals::interrupt`] from edge interrupts; the latter only touches
//! atomics and posts a wake bit, and never calls into the state machine.

#![cfg_attr(target_os = "none", no_std)]

use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use drv_ap_seq_api::SeqError;
use seq_time::Clock;
use seqlog::{seqlog_entry, Seqlog};

mod events;
mod mask;
mod rail;

pub use events::EventFlags;
pub use mask::{SignalId, SignalMask, SignalSnapshot};
pub use rail::SharedRail;

/// Signal ids are bits in a `u32`.
pub const MAX_SIGNALS: usize = 32;

/// Interrupts on one signal within one storm window before we complain.
pub const STORM_THRESHOLD: u16 = 100;

const SIGLOG_ENTRIES: usize = 32;

/// Where a signal lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Gpio(u16),
    /// An eSPI virtual wire; may be unreadable until the link is up.
    VirtualWire(u8),
    /// An ADC channel; high when the reading is at least `threshold_mv`.
    Adc { channel: u8, threshold_mv: u16 },
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SignalFlags: u8 {
        /// Asserted when electrically high. Without this, asserted is low.
        const ACTIVE_HIGH = 1 << 0;
        /// Do not arm the edge interrupt at init.
        const DISABLE_AT_BOOT = 1 << 1;
        /// The EC drives this line.
        const OUTPUT = 1 << 2;
        /// If the read fails, report deasserted instead of absent.
        const OPTIONAL = 1 << 3;
        /// Keep out of the signal log.
        const NO_LOG = 1 << 4;
        /// Carried across a sysjump; after restore it is not re-read until
        /// the next edge interrupt on it.
        const PERSIST = 1 << 5;
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SignalDef {
    pub name: &'static str,
    pub line: Line,
    pub flags: SignalFlags,
    /// While this signal's monitoring is disabled, report the level of this
    /// (output) signal instead.
    pub fallback: Option<SignalId>,
}

impl SignalDef {
    pub const fn input(name: &'static str, line: Line) -> Self {
        Self {
            name,
            line,
            flags: SignalFlags::empty(),
            fallback: None,
        }
    }

    pub const fn output(name: &'static str, line: Line) -> Self {
        Self {
            name,
            line,
            flags: SignalFlags::OUTPUT,
            fallback: None,
        }
    }

    pub const fn with(mut self, flags: SignalFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    pub const fn with_fallback(mut self, id: SignalId) -> Self {
        self.fallback = Some(id);
        self
    }

    pub const fn active_high(self) -> bool {
        self.flags.contains(SignalFlags::ACTIVE_HIGH)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HalError {
    /// The line exists but cannot be read right now (e.g. eSPI link down).
    Unavailable,
    /// The backend cannot do this (e.g. interrupts on an ADC channel).
    Unsupported,
    Bus,
}

/// The electrical side of the signal layer.
pub trait SignalHal {
    /// Electrical level of a GPIO or virtual wire.
    fn read(&self, line: Line) -> Result<bool, HalError>;
    fn read_adc_mv(&self, channel: u8) -> Result<u16, HalError>;
    fn write(&self, line: Line, level: bool) -> Result<(), HalError>;
    fn set_interrupt(
        &self,
        line: Line,
        enabled: bool,
    ) -> Result<(), HalError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalError {
    UnknownSignal,
    NotWritable,
    /// Shared rail requester ids are bits in a `u32`.
    BadRequester,
    Hal(HalError),
}

impl From<HalError> for SignalError {
    fn from(e: HalError) -> Self {
        Self::Hal(e)
    }
}

impl From<SignalError> for SeqError {
    fn from(e: SignalError) -> Self {
        match e {
            SignalError::UnknownSignal => SeqError::UnknownSignal,
            SignalError::NotWritable => SeqError::NotWritable,
            SignalError::BadRequester => SeqError::InvalidParam,
            SignalError::Hal(_) => SeqError::SignalAbsent,
        }
    }
}

/// Signal log entries.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SigEvent {
    None,
    Edge { signal: SignalId, asserted: bool },
    ReadFailed(SignalId),
    WriteFailed(SignalId),
    Storm(SignalId),
    /// A signal in the debug mask changed; all asserted bits at that time.
    Debug { asserted: u32 },
}

struct Diag {
    log: Seqlog<SigEvent, SIGLOG_ENTRIES>,
    storm: [u16; MAX_SIGNALS],
    debug_mask: SignalMask,
    last_debug: SignalMask,
}

pub struct PowerSignals<'a> {
    defs: &'a [SignalDef],
    hal: &'a dyn SignalHal,
    clock: &'a dyn Clock,
    events: &'a EventFlags,

    asserted: AtomicU32,
    valid: AtomicU32,
    monitored: AtomicU32,
    seeded: AtomicU32,

    diag: spin::Mutex<Diag>,
}

impl<'a> PowerSignals<'a> {
    pub fn new(
        defs: &'a [SignalDef],
        hal: &'a dyn SignalHal,
        clock: &'a dyn Clock,
        events: &'a EventFlags,
    ) -> Self {
        debug_assert!(defs.len() <= MAX_SIGNALS);
        Self {
            defs: &defs[..defs.len().min(MAX_SIGNALS)],
            hal,
            clock,
            events,
            asserted: AtomicU32::new(0),
            valid: AtomicU32::new(0),
            monitored: AtomicU32::new(0),
            seeded: AtomicU32::new(0),
            diag: spin::Mutex::new(Diag {
                log: Seqlog::new(SigEvent::None),
                storm: [0; MAX_SIGNALS],
                debug_mask: SignalMask::EMPTY,
                last_debug: SignalMask::EMPTY,
            }),
        }
    }

    /// Arms interrupts on every input not marked `DISABLE_AT_BOOT` and takes
    /// the first sample.
    pub fn init(&self) -> SignalSnapshot {
        for (id, def) in self.iter() {
            if def.flags.contains(SignalFlags::OUTPUT) {
                continue;
            }
            if !def.flags.contains(SignalFlags::DISABLE_AT_BOOT) {
                // Failure leaves the signal polled-only.
                let _ = self.enable_interrupt(id);
            }
        }
        self.update()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &'a SignalDef)> {
        let defs: &'a [SignalDef] = self.defs;
        defs.iter()
            .enumerate()
            .map(|(i, d)| (SignalId(i as u8), d))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<SignalId> {
        self.iter()
            .find(|(_, d)| d.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    pub fn def(&self, id: SignalId) -> Result<&'a SignalDef, SignalError> {
        match self.defs.get(usize::from(id.0)) {
            Some(d) => Ok(d),
            None => {
                debug_assert!(false, "unconfigured power signal {}", id.0);
                Err(SignalError::UnknownSignal)
            }
        }
    }

    fn read_line(&self, line: Line) -> Result<bool, HalError> {
        match line {
            Line::Adc {
                channel,
                threshold_mv,
            } => self.hal.read_adc_mv(channel).map(|mv| mv >= threshold_mv),
            _ => self.hal.read(line),
        }
    }

    fn store(word: &AtomicU32, id: SignalId, on: bool) {
        if on {
            word.fetch_or(id.mask().bits(), Ordering::SeqCst);
        } else {
            word.fetch_and(!id.mask().bits(), Ordering::SeqCst);
        }
    }

    fn bit(word: &AtomicU32, id: SignalId) -> bool {
        word.load(Ordering::SeqCst) & id.mask().bits() != 0
    }

    /// Re-reads one signal into the cache.
    fn sample(&self, id: SignalId) -> Result<(), SignalError> {
        let def = self.def(id)?;

        if let Some(fb) = def.fallback {
            if !Self::bit(&self.monitored, id) {
                let on = Self::bit(&self.asserted, fb);
                let valid = Self::bit(&self.valid, fb);
                Self::store(&self.asserted, id, on);
                Self::store(&self.valid, id, valid);
                return Ok(());
            }
        }

        if def.flags.contains(SignalFlags::PERSIST)
            && Self::bit(&self.seeded, id)
        {
            return Ok(());
        }

        match self.read_line(def.line) {
            Ok(level) => {
                Self::store(&self.asserted, id, level == def.active_high());
                Self::store(&self.valid, id, true);
                Ok(())
            }
            Err(_) if def.flags.contains(SignalFlags::OPTIONAL) => {
                Self::store(&self.asserted, id, false);
                Self::store(&self.valid, id, true);
                Ok(())
            }
            Err(e) => {
                Self::store(&self.valid, id, false);
                if let Some(mut diag) = self.diag.try_lock() {
                    seqlog_entry!(
                        diag.log,
                        self.clock.now(),
                        SigEvent::ReadFailed(id)
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Live electrical level of a signal. Also refreshes its cached value.
    pub fn get_level(&self, id: SignalId) -> Result<bool, SignalError> {
        let def = self.def(id)?;
        match self.read_line(def.line) {
            Ok(level) => {
                Self::store(&self.asserted, id, level == def.active_high());
                Self::store(&self.valid, id, true);
                Ok(level)
            }
            Err(_) if def.flags.contains(SignalFlags::OPTIONAL) => {
                Self::store(&self.asserted, id, false);
                Self::store(&self.valid, id, true);
                Ok(!def.active_high())
            }
            Err(e) => {
                Self::store(&self.valid, id, false);
                Err(e.into())
            }
        }
    }

    /// Cached, polarity-adjusted state. Unreadable signals read as
    /// deasserted here; use the snapshot to tell the difference.
    pub fn is_asserted(&self, id: SignalId) -> bool {
        Self::bit(&self.asserted, id) && Self::bit(&self.valid, id)
    }

    /// Drives an output to an electrical level.
    pub fn set_level(
        &self,
        id: SignalId,
        level: bool,
    ) -> Result<(), SignalError> {
        let def = self.def(id)?;
        let r = if def.flags.contains(SignalFlags::OUTPUT) {
            self.hal.write(def.line, level).map_err(SignalError::from)
        } else {
            Err(SignalError::NotWritable)
        };
        if let Err(e) = r {
            if let Some(mut diag) = self.diag.try_lock() {
                seqlog_entry!(
                    diag.log,
                    self.clock.now(),
                    SigEvent::WriteFailed(id)
                );
            }
            return Err(e);
        }
        Self::store(&self.asserted, id, level == def.active_high());
        Self::store(&self.valid, id, true);
        Ok(())
    }

    /// Drives an output to its active (`true`) or inactive level.
    pub fn assert(&self, id: SignalId, on: bool) -> Result<(), SignalError> {
        let def = self.def(id)?;
        self.set_level(id, on == def.active_high())
    }

    pub fn enable_interrupt(&self, id: SignalId) -> Result<(), SignalError> {
        self.set_monitoring(id, true)
    }

    pub fn disable_interrupt(&self, id: SignalId) -> Result<(), SignalError> {
        self.set_monitoring(id, false)
    }

    fn set_monitoring(
        &self,
        id: SignalId,
        on: bool,
    ) -> Result<(), SignalError> {
        let def = self.def(id)?;
        match self.hal.set_interrupt(def.line, on) {
            // ADC channels are polled; monitoring is ours to track.
            Ok(()) | Err(HalError::Unsupported) => (),
            Err(e) => return Err(e.into()),
        }
        Self::store(&self.monitored, id, on);
        Ok(())
    }

    pub fn is_monitored(&self, id: SignalId) -> bool {
        Self::bit(&self.monitored, id)
    }

    /// Re-samples every signal. Outputs are re-read too, so the snapshot
    /// reflects what is actually on the pins.
    pub fn update(&self) -> SignalSnapshot {
        // Fallback signals follow outputs, so take those first.
        for (id, def) in self.iter() {
            if def.fallback.is_none() {
                let _ = self.sample(id);
            }
        }
        for (id, def) in self.iter() {
            if def.fallback.is_some() {
                let _ = self.sample(id);
            }
        }

        let snap = self.snapshot();
        if let Some(mut diag) = self.diag.try_lock() {
            let masked = snap.asserted & diag.debug_mask;
            if masked != diag.last_debug {
                diag.last_debug = masked;
                seqlog_entry!(
                    diag.log,
                    self.clock.now(),
                    SigEvent::Debug {
                        asserted: snap.asserted.bits()
                    }
                );
            }
        }
        snap
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        let load = |a: &AtomicU32| {
            SignalMask::from_bits_retain(a.load(Ordering::SeqCst))
        };
        SignalSnapshot {
            asserted: load(&self.asserted),
            valid: load(&self.valid),
        }
    }

    /// Edge interrupt entry point for `id`.
    pub fn interrupt(&self, id: SignalId) {
        Self::store(&self.seeded, id, false);
        let _ = self.sample(id);

        if let Some(mut diag) = self.diag.try_lock() {
            let now = self.clock.now();
            let i = usize::from(id.0) % MAX_SIGNALS;
            diag.storm[i] = diag.storm[i].saturating_add(1);
            if diag.storm[i] == STORM_THRESHOLD {
                seqlog_entry!(diag.log, now, SigEvent::Storm(id));
            }
            let quiet = self
                .defs
                .get(usize::from(id.0))
                .is_some_and(|d| d.flags.contains(SignalFlags::NO_LOG));
            if cfg!(feature = "siglog") && !quiet {
                seqlog_entry!(
                    diag.log,
                    now,
                    SigEvent::Edge {
                        signal: id,
                        asserted: self.is_asserted(id),
                    }
                );
            }
        }

        self.events.post(EventFlags::SIGNAL);
    }

    /// Starts a new storm-detection window.
    pub fn reset_storm_counters(&self) {
        self.diag.lock().storm = [0; MAX_SIGNALS];
    }

    pub fn set_debug_mask(&self, mask: SignalMask) {
        self.diag.lock().debug_mask = mask;
    }

    pub fn debug_mask(&self) -> SignalMask {
        self.diag.lock().debug_mask
    }

    /// Copies the signal log out, oldest first.
    pub fn siglog(&self, out: &mut [(u64, SigEvent)]) -> usize {
        let diag = self.diag.lock();
        let mut n = 0;
        for (slot, e) in out.iter_mut().zip(diag.log.iter()) {
            *slot = (e.timestamp, e.payload);
            n += 1;
        }
        n
    }

    /// Restores `PERSIST` signals from a snapshot taken before a sysjump.
    pub fn seed(&self, snap: SignalSnapshot) {
        for (id, def) in self.iter() {
            if def.flags.contains(SignalFlags::PERSIST) {
                Self::store(&self.asserted, id, snap.asserted.has(id));
                Self::store(&self.valid, id, snap.valid.has(id));
                Self::store(&self.seeded, id, true);
            }
        }
    }

    /// The subset of the current snapshot worth carrying over a sysjump.
    pub fn persisted(&self) -> SignalSnapshot {
        let mut keep = SignalMask::EMPTY;
        for (id, def) in self.iter() {
            if def.flags.contains(SignalFlags::PERSIST) {
                keep |= id.mask();
            }
        }
        let snap = self.snapshot();
        SignalSnapshot {
            asserted: snap.asserted & keep,
            valid: snap.valid & keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};

    pub(crate) struct FakeHal {
        pub gpio: RefCell<[Option<bool>; 8]>,
        pub adc: Cell<u16>,
        pub irq: RefCell<[bool; 8]>,
    }

    impl FakeHal {
        pub(crate) fn new() -> Self {
            Self {
                gpio: RefCell::new([Some(false); 8]),
                adc: Cell::new(0),
                irq: RefCell::new([false; 8]),
            }
        }

        pub(crate) fn set(&self, pin: u16, level: Option<bool>) {
            self.gpio.borrow_mut()[usize::from(pin)] = level;
        }

        pub(crate) fn level(&self, pin: u16) -> Option<bool> {
            self.gpio.borrow()[usize::from(pin)]
        }
    }

    fn pin(line: Line) -> usize {
        match line {
            Line::Gpio(p) => usize::from(p),
            Line::VirtualWire(w) => 4 + usize::from(w),
            Line::Adc { .. } => 7,
        }
    }

    impl SignalHal for FakeHal {
        fn read(&self, line: Line) -> Result<bool, HalError> {
            self.gpio.borrow()[pin(line)].ok_or(HalError::Unavailable)
        }

        fn read_adc_mv(&self, _channel: u8) -> Result<u16, HalError> {
            Ok(self.adc.get())
        }

        fn write(&self, line: Line, level: bool) -> Result<(), HalError> {
            self.gpio.borrow_mut()[pin(line)] = Some(level);
            Ok(())
        }

        fn set_interrupt(
            &self,
            line: Line,
            enabled: bool,
        ) -> Result<(), HalError> {
            if let Line::Adc { .. } = line {
                return Err(HalError::Unsupported);
            }
            self.irq.borrow_mut()[pin(line)] = enabled;
            Ok(())
        }
    }

    pub(crate) struct FakeClock(pub Cell<u64>);

    impl Clock for FakeClock {
        fn now(&self) -> u64 {
            self.0.get()
        }
        fn delay_us(&self, us: u64) {
            self.0.set(self.0.get() + us);
        }
    }

    pub(crate) const PGOOD: SignalId = SignalId(0);
    pub(crate) const SLP_S3: SignalId = SignalId(1);
    pub(crate) const EN_PP5000: SignalId = SignalId(2);
    pub(crate) const VW_SLP_S0: SignalId = SignalId(3);
    pub(crate) const ADC_PGOOD: SignalId = SignalId(4);
    pub(crate) const AC_PRESENT: SignalId = SignalId(5);

    pub(crate) static DEFS: [SignalDef; 6] = [
        SignalDef::input("PGOOD", Line::Gpio(0))
            .with(SignalFlags::ACTIVE_HIGH),
        SignalDef::input("SLP_S3_L", Line::Gpio(1)),
        SignalDef::output("EN_PP5000", Line::Gpio(2))
            .with(SignalFlags::ACTIVE_HIGH),
        SignalDef::input("SLP_S0_L", Line::VirtualWire(0))
            .with(SignalFlags::DISABLE_AT_BOOT),
        SignalDef::input(
            "PP5000_PGOOD",
            Line::Adc {
                channel: 0,
                threshold_mv: 4500,
            },
        )
        .with(SignalFlags::ACTIVE_HIGH)
        .with_fallback(EN_PP5000),
        SignalDef::input("AC_PRESENT", Line::Gpio(3))
            .with(SignalFlags::ACTIVE_HIGH.union(SignalFlags::PERSIST)),
    ];

    #[test]
    fn polarity_and_snapshot() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);

        // SLP_S3_L low means asserted.
        hal.set(1, Some(false));
        hal.set(0, Some(true));
        let snap = sigs.init();
        assert!(snap.has(PGOOD.mask() | SLP_S3.mask()));
        assert!(sigs.is_asserted(SLP_S3));

        hal.set(1, Some(true));
        sigs.update();
        assert!(!sigs.is_asserted(SLP_S3));
        assert_eq!(sigs.get_level(SLP_S3), Ok(true));
    }

    #[test]
    fn init_arms_interrupts_per_flags() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        sigs.init();

        assert!(sigs.is_monitored(PGOOD));
        assert!(!sigs.is_monitored(VW_SLP_S0));
        assert!(!sigs.is_monitored(EN_PP5000));
        // ADC channels are tracked even though the HAL can't interrupt.
        assert!(sigs.is_monitored(ADC_PGOOD));
        assert!(hal.irq.borrow()[0]);
        assert!(!hal.irq.borrow()[4]);
    }

    #[test]
    fn absent_virtual_wire_is_invalid() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);

        hal.set(4, None);
        let snap = sigs.init();
        assert!(!snap.valid.has(VW_SLP_S0));
        assert!(!snap.valid_and_off(VW_SLP_S0.mask()));
        assert!(!snap.valid_and_on(VW_SLP_S0.mask()));
        assert_eq!(
            sigs.get_level(VW_SLP_S0),
            Err(SignalError::Hal(HalError::Unavailable))
        );

        hal.set(4, Some(true));
        assert!(sigs.update().valid_and_off(VW_SLP_S0.mask()));
    }

    #[test]
    fn inputs_are_not_writable() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);

        assert_eq!(
            sigs.set_level(PGOOD, true),
            Err(SignalError::NotWritable)
        );
        assert_eq!(hal.level(0), Some(false));

        sigs.assert(EN_PP5000, true).unwrap();
        assert_eq!(hal.level(2), Some(true));
        assert!(sigs.is_asserted(EN_PP5000));
    }

    #[test]
    fn adc_threshold_and_fallback() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        sigs.init();

        hal.adc.set(4400);
        sigs.update();
        assert!(!sigs.is_asserted(ADC_PGOOD));
        hal.adc.set(4900);
        sigs.update();
        assert!(sigs.is_asserted(ADC_PGOOD));

        // Stop monitoring: the value now follows the enable line, not the
        // (now ignored) ADC.
        sigs.disable_interrupt(ADC_PGOOD).unwrap();
        sigs.assert(EN_PP5000, false).unwrap();
        sigs.update();
        assert!(!sigs.is_asserted(ADC_PGOOD));
        sigs.assert(EN_PP5000, true).unwrap();
        hal.adc.set(0);
        sigs.update();
        assert!(sigs.is_asserted(ADC_PGOOD));
    }

    #[test]
    fn optional_signal_falls_back_to_deasserted() {
        const WAKE: SignalId = SignalId(0);
        static WAKE_DEFS: [SignalDef; 1] = [SignalDef::input(
            "PCH_WAKE_L",
            Line::VirtualWire(1),
        )
        .with(SignalFlags::OPTIONAL)];

        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&WAKE_DEFS, &hal, &clock, &ev);

        hal.set(5, None);
        let snap = sigs.init();
        assert!(snap.valid_and_off(WAKE.mask()));
        // Active low, so deasserted reads electrically high.
        assert_eq!(sigs.get_level(WAKE), Ok(true));

        hal.set(5, Some(false));
        assert!(sigs.update().valid_and_on(WAKE.mask()));
        assert!(sigs.is_asserted(WAKE));

        hal.set(5, None);
        assert_eq!(sigs.get_level(WAKE), Ok(true));
        assert!(!sigs.is_asserted(WAKE));

        let mut out = [(0, SigEvent::None); 8];
        let n = sigs.siglog(&mut out);
        assert!(!out[..n]
            .iter()
            .any(|(_, e)| *e == SigEvent::ReadFailed(WAKE)));
    }

    #[test]
    fn failed_writes_are_logged() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(77));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);

        assert_eq!(
            sigs.set_level(PGOOD, true),
            Err(SignalError::NotWritable)
        );
        let mut out = [(0, SigEvent::None); 8];
        let n = sigs.siglog(&mut out);
        assert!(out[..n].contains(&(77, SigEvent::WriteFailed(PGOOD))));
    }

    #[test]
    fn interrupt_posts_and_logs() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(1234));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        sigs.init();
        assert_eq!(ev.take(), 0);

        hal.set(0, Some(true));
        sigs.interrupt(PGOOD);
        assert_eq!(ev.take(), EventFlags::SIGNAL);
        assert!(sigs.is_asserted(PGOOD));

        let mut out = [(0, SigEvent::None); 4];
        let n = sigs.siglog(&mut out);
        assert_eq!(n, 1);
        assert_eq!(
            out[0],
            (
                1234,
                SigEvent::Edge {
                    signal: PGOOD,
                    asserted: true
                }
            )
        );
    }

    #[test]
    fn storm_is_reported_once_per_window() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        sigs.init();

        // A level that never settles from the task's point of view; the
        // edge entries fold together so the log keeps the storm entry.
        hal.set(1, Some(false));
        for _ in 0..(STORM_THRESHOLD * 2) {
            sigs.interrupt(SLP_S3);
        }
        let mut out = [(0, SigEvent::None); 32];
        let n = sigs.siglog(&mut out);
        let storms = out[..n]
            .iter()
            .filter(|(_, e)| *e == SigEvent::Storm(SLP_S3))
            .count();
        assert_eq!(storms, 1);

        sigs.reset_storm_counters();
        for _ in 0..STORM_THRESHOLD {
            sigs.interrupt(SLP_S3);
        }
        let n = sigs.siglog(&mut out);
        assert!(out[..n]
            .iter()
            .any(|(_, e)| *e == SigEvent::Storm(SLP_S3)));
    }

    #[test]
    fn persisted_signals_survive_seed() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);

        hal.set(3, Some(true));
        sigs.init();
        let saved = sigs.persisted();
        assert_eq!(saved.asserted, AC_PRESENT.mask());

        // New image: the pin reads low (say, the detector is slow to come
        // up) but the last observed value wins until an edge arrives.
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        hal.set(3, Some(false));
        sigs.seed(saved);
        sigs.init();
        assert!(sigs.is_asserted(AC_PRESENT));

        sigs.interrupt(AC_PRESENT);
        assert!(!sigs.is_asserted(AC_PRESENT));
    }

    #[test]
    fn debug_mask_changes_are_logged() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        sigs.init();
        sigs.set_debug_mask(PGOOD.mask());

        hal.set(0, Some(true));
        sigs.update();
        sigs.update();
        let mut out = [(0, SigEvent::None); 8];
        let n = sigs.siglog(&mut out);
        let debugs = out[..n]
            .iter()
            .filter(|(_, e)| matches!(e, SigEvent::Debug { .. }))
            .count();
        assert_eq!(debugs, 1);
    }

    #[test]
    fn lookup_by_name() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        assert_eq!(sigs.by_name("slp_s3_l"), Some(SLP_S3));
        assert_eq!(sigs.by_name("nope"), None);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unconfigured power signal")]
    fn unconfigured_signal_asserts() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        let _ = sigs.get_level(SignalId(17));
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn unconfigured_signal_errors() {
        let hal = FakeHal::new();
        let clock = FakeClock(Cell::new(0));
        let ev = EventFlags::new();
        let sigs = PowerSignals::new(&DEFS, &hal, &clock, &ev);
        assert_eq!(
            sigs.get_level(SignalId(17)),
            Err(SignalError::UnknownSignal)
        );
    }
}
