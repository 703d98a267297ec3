// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State carried across a jump to another EC image.
//!
//! The record is a small tagged blob: a [`JumpTag`] header followed by a
//! [`PersistedState`]. The new image hands whatever it found to
//! [`restore`], and starts cold if that fails.

use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const JUMP_TAG: u16 = 0x5350;
pub const JUMP_VERSION: u8 = 1;

pub const FLAG_PAUSE_IN_S5: u8 = 1 << 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpError {
    TooShort,
    BadTag,
    BadVersion,
    BadSize,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable,
    KnownLayout,
)]
#[repr(C)]
pub struct JumpTag {
    pub tag: u16,
    pub version: u8,
    pub size: u8,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(C)]
pub struct PersistedState {
    pub last_shutdown_time: u64,
    /// Shared rail requester mask.
    pub rail_requests: u32,
    /// `PERSIST` signals only.
    pub asserted: u32,
    pub valid: u32,
    pub host_sleep: u8,
    pub flags: u8,
    pub _reserved: [u8; 2],
}

const_assert_eq!(core::mem::size_of::<JumpTag>(), 4);
const_assert_eq!(core::mem::size_of::<PersistedState>(), 24);

pub const SAVED_SIZE: usize =
    core::mem::size_of::<JumpTag>() + core::mem::size_of::<PersistedState>();

/// Writes the tagged record to the front of `out`.
pub fn save(
    state: &PersistedState,
    out: &mut [u8],
) -> Result<usize, JumpError> {
    if out.len() < SAVED_SIZE {
        return Err(JumpError::TooShort);
    }
    let tag = JumpTag {
        tag: JUMP_TAG,
        version: JUMP_VERSION,
        size: core::mem::size_of::<PersistedState>() as u8,
    };
    let (head, body) = out.split_at_mut(core::mem::size_of::<JumpTag>());
    tag.write_to_prefix(head).map_err(|_| JumpError::TooShort)?;
    state.write_to_prefix(body).map_err(|_| JumpError::TooShort)?;
    Ok(SAVED_SIZE)
}

pub fn restore(bytes: &[u8]) -> Result<PersistedState, JumpError> {
    if bytes.len() < SAVED_SIZE {
        return Err(JumpError::TooShort);
    }
    let (tag, rest) =
        JumpTag::read_from_prefix(bytes).map_err(|_| JumpError::TooShort)?;
    if tag.tag != JUMP_TAG {
        return Err(JumpError::BadTag);
    }
    if tag.version != JUMP_VERSION {
        return Err(JumpError::BadVersion);
    }
    if usize::from(tag.size) != core::mem::size_of::<PersistedState>() {
        return Err(JumpError::BadSize);
    }
    let (state, _) = PersistedState::read_from_prefix(rest)
        .map_err(|_| JumpError::TooShort)?;
    Ok(state)
}
