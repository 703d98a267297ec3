// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power transition notifications.
//!
//! Other firmware (keyboard, charger, USB-PD, sensors, wireless) needs to hear
//! about AP power transitions: "the AP is starting up", "the AP is
//! suspending", and so on. A [`HookBus`] holds a fixed number of subscribers,
//! each with a [`HookMask`] of the events it cares about, and the sequencer
//! calls [`HookBus::notify`] at each transition point.
//!
//! Dispatch is synchronous and in the sequencer's context: each interested
//! subscriber runs to completion before the next is called and before the
//! sequencer moves on. Subscribers run in reverse registration order, so the
//! most recently registered hears about an event first. Subscribers have no
//! way to report failure back to the sequencer.
//!
//! Registration needs `&mut HookBus` and notification needs only `&`, so all
//! subscribers are in place before the bus is handed to the sequencer.

#![cfg_attr(target_os = "none", no_std)]

use bitflags::bitflags;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HookEvent {
    /// The sequencer has finished choosing its initial state.
    Initialized,
    /// Primary rails are up; about to leave G3 for S5.
    PreInit,
    /// The AP is coming out of S5/S4 into S3.
    Startup,
    /// Early resume, before `Resume`, for subscribers that care about order.
    ResumeInit,
    Resume,
    Suspend,
    /// Late suspend, after `Suspend`.
    SuspendComplete,
    Shutdown,
    ShutdownComplete,
    /// The AP has reached G3.
    HardOff,
    /// The AP was reset without a power transition.
    Reset,
    S0ixSuspend,
    S0ixResume,
}

impl HookEvent {
    pub const ALL: [HookEvent; 13] = [
        Self::Initialized,
        Self::PreInit,
        Self::Startup,
        Self::ResumeInit,
        Self::Resume,
        Self::Suspend,
        Self::SuspendComplete,
        Self::Shutdown,
        Self::ShutdownComplete,
        Self::HardOff,
        Self::Reset,
        Self::S0ixSuspend,
        Self::S0ixResume,
    ];

    pub const fn mask(self) -> HookMask {
        HookMask::from_bits_retain(1 << self as u8)
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct HookMask: u16 {
        const INITIALIZED = 1 << HookEvent::Initialized as u8;
        const PRE_INIT = 1 << HookEvent::PreInit as u8;
        const STARTUP = 1 << HookEvent::Startup as u8;
        const RESUME_INIT = 1 << HookEvent::ResumeInit as u8;
        const RESUME = 1 << HookEvent::Resume as u8;
        const SUSPEND = 1 << HookEvent::Suspend as u8;
        const SUSPEND_COMPLETE = 1 << HookEvent::SuspendComplete as u8;
        const SHUTDOWN = 1 << HookEvent::Shutdown as u8;
        const SHUTDOWN_COMPLETE = 1 << HookEvent::ShutdownComplete as u8;
        const HARD_OFF = 1 << HookEvent::HardOff as u8;
        const RESET = 1 << HookEvent::Reset as u8;
        const S0IX_SUSPEND = 1 << HookEvent::S0ixSuspend as u8;
        const S0IX_RESUME = 1 << HookEvent::S0ixResume as u8;
    }
}

/// Something that wants to hear about power transitions.
pub trait Hook {
    fn on_event(&self, event: HookEvent);
}

impl<F: Fn(HookEvent)> Hook for F {
    fn on_event(&self, event: HookEvent) {
        self(event)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HookError {
    /// No room for another subscriber.
    Full,
}

struct Subscription<'a> {
    mask: HookMask,
    hook: &'a dyn Hook,
}

pub struct HookBus<'a, const N: usize> {
    subs: heapless::Vec<Subscription<'a>, N>,
}

impl<const N: usize> Default for HookBus<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> HookBus<'a, N> {
    pub const fn new() -> Self {
        Self {
            subs: heapless::Vec::new(),
        }
    }

    /// Registers `hook` for the events in `mask`. Registering a hook that is
    /// already present (the same object, by address) replaces its mask and
    /// keeps its place in the dispatch order.
    pub fn subscribe(
        &mut self,
        mask: HookMask,
        hook: &'a dyn Hook,
    ) -> Result<(), HookError> {
        if let Some(sub) = self.subs.iter_mut().find(|s| same(s.hook, hook)) {
            sub.mask = mask;
            return Ok(());
        }
        self.subs
            .push(Subscription { mask, hook })
            .map_err(|_| HookError::Full)
    }

    /// Removes `hook`; returns whether it was registered.
    pub fn unsubscribe(&mut self, hook: &'a dyn Hook) -> bool {
        match self.subs.iter().position(|s| same(s.hook, hook)) {
            Some(i) => {
                self.subs.remove(i);
                true
            }
            None => false,
        }
    }

    /// Delivers `event` to every interested subscriber, most recently
    /// registered first. Returns how many were called.
    pub fn notify(&self, event: HookEvent) -> usize {
        let bit = event.mask();
        let mut called = 0;
        for sub in self.subs.iter().rev() {
            if sub.mask.contains(bit) {
                sub.hook.on_event(event);
                called += 1;
            }
        }
        called
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

fn same(a: &dyn Hook, b: &dyn Hook) -> bool {
    core::ptr::addr_eq(a as *const dyn Hook, b as *const dyn Hook)
}
