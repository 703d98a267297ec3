// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layered state handlers.
//!
//! A hierarchical chipset is a stack of [`Level`]s, outermost (the CPU
//! architecture) first and innermost (the board) last. All levels see the
//! same state. On a transition every level exits the old state, innermost
//! first, and then enters the new one, outermost first. While a state is
//! current, levels run innermost first, and the first level to ask for a
//! transition ends the pass.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HsmError {
    /// A level asked for a second transition in the same pass.
    AlreadyRequested,
}

/// The transition asked for during one run pass, if any.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Request<S> {
    next: Option<S>,
}

impl<S: Copy> Request<S> {
    pub const fn new() -> Self {
        Self { next: None }
    }

    pub fn request(&mut self, to: S) -> Result<(), HsmError> {
        if self.next.is_some() {
            return Err(HsmError::AlreadyRequested);
        }
        self.next = Some(to);
        Ok(())
    }

    pub fn pending(&self) -> Option<S> {
        self.next
    }
}

impl<S: Copy> Default for Request<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// One layer of state handling. `C` is whatever context the layers share.
pub trait Level<S, C: ?Sized> {
    fn entry(&mut self, _cx: &mut C, _state: S) {}

    fn run(
        &mut self,
        _cx: &mut C,
        _state: S,
        _req: &mut Request<S>,
    ) -> Result<(), HsmError> {
        Ok(())
    }

    fn exit(&mut self, _cx: &mut C, _state: S) {}
}

pub fn enter<S: Copy, C: ?Sized>(
    levels: &mut [&mut dyn Level<S, C>],
    cx: &mut C,
    state: S,
) {
    for level in levels.iter_mut() {
        level.entry(cx, state);
    }
}

pub fn exit<S: Copy, C: ?Sized>(
    levels: &mut [&mut dyn Level<S, C>],
    cx: &mut C,
    state: S,
) {
    for level in levels.iter_mut().rev() {
        level.exit(cx, state);
    }
}

/// Runs `state` through the levels and returns the transition asked for.
pub fn run<S: Copy, C: ?Sized>(
    levels: &mut [&mut dyn Level<S, C>],
    cx: &mut C,
    state: S,
) -> Result<Option<S>, HsmError> {
    let mut req = Request::new();
    for level in levels.iter_mut().rev() {
        level.run(cx, state, &mut req)?;
        if req.pending().is_some() {
            break;
        }
    }
    Ok(req.pending())
}
