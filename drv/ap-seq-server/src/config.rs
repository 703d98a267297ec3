// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sequencer tuning.
//!
//! Boards carry these in their `[config.ap-seq]` table; build tooling
//! deserializes the table and hands the result to the task. Anything left
//! out takes the value in [`Config::DEFAULT`].

use serde::Deserialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Seconds to linger in S5 with nothing happening before dropping to
    /// G3. Zero drops immediately, negative never drops.
    pub s5_inactivity_timeout_s: i32,
    /// Seconds in G3 without external power before the board's idle
    /// policy gets a say.
    pub hibernate_delay_s: u32,
    /// Host sleep suspend timeout used when the host asks for the default.
    pub sleep_timeout_ms: u32,
    /// Period of the slow re-evaluation tick. Zero disables it.
    pub poll_interval_ms: u32,
    /// Send `ResumeInit` before `Resume`, and `SuspendComplete` after
    /// `Suspend`.
    pub resume_init_hooks: bool,
    /// Leave G3 on our own after a cold boot.
    pub auto_power_on: bool,
}

impl Config {
    pub const DEFAULT: Self = Self {
        s5_inactivity_timeout_s: 10,
        hibernate_delay_s: 3600,
        sleep_timeout_ms: 10_000,
        poll_interval_ms: 1000,
        resume_init_hooks: false,
        auto_power_on: false,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
