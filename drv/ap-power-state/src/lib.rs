// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common definitions of AP power states, shared by the sequencer, its
//! clients, and the host command and console handlers.

#![cfg_attr(target_os = "none", no_std)]

use bitflags::bitflags;
use enum_map::Enum;
use num_derive::FromPrimitive;
use zerocopy::{Immutable, IntoBytes, KnownLayout};

/// ACPI-style AP power states. Steady states come first, then the
/// transitions between them, each named `FromTo`.
#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    PartialEq,
    Eq,
    IntoBytes,
    Immutable,
    KnownLayout,
    Enum,
)]
#[repr(u8)]
pub enum PowerState {
    /// AP is completely off; only the EC's own rails are up.
    G3,
    /// Soft off. Primary (always-on) AP rails are up.
    S5,
    /// Suspend to disk.
    S4,
    /// Suspend to RAM.
    S3,
    /// AP running.
    S0,
    /// Low-power idle, entered from S0 when the AP asserts SLP_S0.
    S0ix,

    G3S5,
    S5S3,
    S3S0,
    S0S3,
    S3S5,
    S5G3,
    S3S4,
    S4S3,
    S4S5,
    S5S4,
    S0ixS0,
    S0S0ix,
}

impl PowerState {
    pub const ALL: [PowerState; 18] = [
        Self::G3,
        Self::S5,
        Self::S4,
        Self::S3,
        Self::S0,
        Self::S0ix,
        Self::G3S5,
        Self::S5S3,
        Self::S3S0,
        Self::S0S3,
        Self::S3S5,
        Self::S5G3,
        Self::S3S4,
        Self::S4S3,
        Self::S4S5,
        Self::S5S4,
        Self::S0ixS0,
        Self::S0S0ix,
    ];

    /// Console name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::G3 => "G3",
            Self::S5 => "S5",
            Self::S4 => "S4",
            Self::S3 => "S3",
            Self::S0 => "S0",
            Self::S0ix => "S0ix",
            Self::G3S5 => "G3->S5",
            Self::S5S3 => "S5->S3",
            Self::S3S0 => "S3->S0",
            Self::S0S3 => "S0->S3",
            Self::S3S5 => "S3->S5",
            Self::S5G3 => "S5->G3",
            Self::S3S4 => "S3->S4",
            Self::S4S3 => "S4->S3",
            Self::S4S5 => "S4->S5",
            Self::S5S4 => "S5->S4",
            Self::S0ixS0 => "S0ix->S0",
            Self::S0S0ix => "S0->S0ix",
        }
    }

    /// Inverse of [`PowerState::name`], case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        <Self as num_traits::FromPrimitive>::from_u8(v)
    }

    pub const fn is_steady(self) -> bool {
        matches!(
            self,
            Self::G3 | Self::S5 | Self::S4 | Self::S3 | Self::S0 | Self::S0ix
        )
    }

    /// For a transition state, the steady states on either side.
    pub const fn endpoints(self) -> Option<(PowerState, PowerState)> {
        use PowerState::*;
        Some(match self {
            G3S5 => (G3, S5),
            S5S3 => (S5, S3),
            S3S0 => (S3, S0),
            S0S3 => (S0, S3),
            S3S5 => (S3, S5),
            S5G3 => (S5, G3),
            S3S4 => (S3, S4),
            S4S3 => (S4, S3),
            S4S5 => (S4, S5),
            S5S4 => (S5, S4),
            S0ixS0 => (S0ix, S0),
            S0S0ix => (S0, S0ix),
            G3 | S5 | S4 | S3 | S0 | S0ix => return None,
        })
    }

    /// The chipset-state bits this state (or transition) occupies.
    pub const fn occupied(self) -> ChipsetStateMask {
        use PowerState::*;
        match self {
            G3 => ChipsetStateMask::HARD_OFF,
            G3S5 | S5G3 => {
                ChipsetStateMask::HARD_OFF.union(ChipsetStateMask::SOFT_OFF)
            }
            S5 | S5S4 | S4S5 | S4 => ChipsetStateMask::SOFT_OFF,
            S5S3 | S3S5 | S4S3 | S3S4 => {
                ChipsetStateMask::SOFT_OFF.union(ChipsetStateMask::SUSPEND)
            }
            S3 => ChipsetStateMask::SUSPEND,
            S3S0 | S0S3 => {
                ChipsetStateMask::SUSPEND.union(ChipsetStateMask::ON)
            }
            S0 => ChipsetStateMask::ON,
            S0ixS0 | S0S0ix => {
                ChipsetStateMask::ON.union(ChipsetStateMask::STANDBY)
            }
            S0ix => ChipsetStateMask::STANDBY,
        }
    }

    /// The chipset-state bit a state is heading toward.
    pub const fn heading_to(self) -> ChipsetStateMask {
        use PowerState::*;
        match self {
            G3 | S5G3 => ChipsetStateMask::HARD_OFF,
            S5 | G3S5 | S3S5 | S4S5 => ChipsetStateMask::SOFT_OFF,
            S4 | S5S4 | S3S4 => ChipsetStateMask::SOFT_OFF,
            S3 | S5S3 | S0S3 | S4S3 => ChipsetStateMask::SUSPEND,
            S0 | S3S0 | S0ixS0 => ChipsetStateMask::ON,
            S0ix | S0S0ix => ChipsetStateMask::STANDBY,
        }
    }
}

impl TryFrom<u8> for PowerState {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::from_u8(v).ok_or(v)
    }
}

bitflags! {
    /// Coarse power states other firmware asks about
    /// ("is the AP on?", "is it in any off state?").
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ChipsetStateMask: u8 {
        const HARD_OFF = 1 << 0;
        const SOFT_OFF = 1 << 1;
        const SUSPEND = 1 << 2;
        const ON = 1 << 3;
        const STANDBY = 1 << 4;

        const ANY_OFF = Self::HARD_OFF.bits() | Self::SOFT_OFF.bits();
        const ANY_SUSPEND = Self::SUSPEND.bits() | Self::STANDBY.bits();
    }
}

/// True if `state` is in one of the states in `mask`. A transition state
/// only counts if both of its neighbours are in the mask; a caller asking
/// about `ANY_OFF` is then in-state during S5->G3, but one asking only about
/// `HARD_OFF` is not.
pub fn in_state(state: PowerState, mask: ChipsetStateMask) -> bool {
    let need = state.occupied();
    mask.contains(need)
}

/// Like [`in_state`], but also true while heading into one of the states in
/// `mask`.
pub fn in_or_transitioning_to(
    state: PowerState,
    mask: ChipsetStateMask,
) -> bool {
    in_state(state, mask) || mask.intersects(state.heading_to())
}
