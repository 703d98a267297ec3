// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Console commands.

use core::fmt::{self, Write};

use drv_ap_seq_api::{PowerState, ResetReason, SeqError, ShutdownReason};
use drv_power_signals::{PowerSignals, SignalMask};
use seq_time::Clock;

use crate::board::Board;
use crate::host::hibernation_status;
use crate::shared::Shared;

const MAX_ARGS: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    UnknownCommand,
    /// The first parameter is not valid for the command.
    Param1,
    ParamCount,
    Seq(SeqError),
    Output,
}

impl From<fmt::Error> for ConsoleError {
    fn from(_: fmt::Error) -> Self {
        Self::Output
    }
}

impl From<SeqError> for ConsoleError {
    fn from(e: SeqError) -> Self {
        Self::Seq(e)
    }
}

pub struct Console<'a> {
    pub shared: &'a Shared,
    pub signals: &'a PowerSignals<'a>,
    pub clock: &'a dyn Clock,
    pub board: &'a dyn Board,
    /// Edges `powerstate` may force.
    pub legal: &'static [(PowerState, PowerState)],
}

/// Parses like C's `strtol` with base 0, minus the octal.
fn parse_int(s: &str) -> Result<i64, ConsoleError> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let v = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| ConsoleError::Param1)?;
    Ok(if neg { -v } else { v })
}

fn parse_on_off(s: &str) -> Result<bool, ConsoleError> {
    match s {
        "on" | "enable" | "1" | "true" => Ok(true),
        "off" | "disable" | "0" | "false" => Ok(false),
        _ => Err(ConsoleError::Param1),
    }
}

fn on_off(b: bool) -> &'static str {
    if b {
        "on"
    } else {
        "off"
    }
}

impl Console<'_> {
    pub fn execute(
        &self,
        line: &str,
        out: &mut dyn Write,
    ) -> Result<(), ConsoleError> {
        let mut args: heapless::Vec<&str, MAX_ARGS> = heapless::Vec::new();
        for arg in line.split_ascii_whitespace() {
            args.push(arg).map_err(|_| ConsoleError::ParamCount)?;
        }
        let Some((&cmd, rest)) = args.split_first() else {
            return Ok(());
        };
        let arg = rest.first().copied();

        match cmd {
            "powerinfo" => {
                let state = self.shared.state();
                writeln!(
                    out,
                    "power state {} = {}, in 0x{:04x}",
                    state as u8,
                    state.name(),
                    self.signals.snapshot().asserted.bits()
                )?;
            }
            "powerindebug" => self.powerindebug(arg, out)?,
            "s5_timeout" => {
                if let Some(a) = arg {
                    let secs = i32::try_from(parse_int(a)?)
                        .map_err(|_| ConsoleError::Param1)?;
                    self.shared
                        .update_settings(|s| s.s5_inactivity_timeout_s = secs);
                }
                let secs = self.shared.settings().s5_inactivity_timeout_s;
                writeln!(out, "S5 inactivity timeout: {secs} s")?;
            }
            "hibdelay" => {
                if let Some(a) = arg {
                    let secs = u32::try_from(parse_int(a)?)
                        .map_err(|_| ConsoleError::Param1)?;
                    self.shared.update_settings(|s| s.hibernate_delay_s = secs);
                }
                let (time_g3, left, delay) = hibernation_status(
                    self.shared,
                    self.board,
                    self.clock.now(),
                );
                writeln!(out, "Hibernation delay: {delay} s")?;
                if self.shared.state() == PowerState::G3
                    && !self.board.extpower_present()
                {
                    writeln!(out, "Time G3: {time_g3} s")?;
                    writeln!(out, "Time left: {left} s")?;
                }
            }
            "pause_in_s5" => {
                if let Some(a) = arg {
                    let on = parse_on_off(a)?;
                    self.shared.update_settings(|s| s.pause_in_s5 = on);
                }
                let on = self.shared.settings().pause_in_s5;
                writeln!(out, "pause_in_s5 = {}", on_off(on))?;
            }
            "debug_mode" => {
                if let Some(a) = arg {
                    let on = parse_on_off(a)?;
                    self.shared.update_settings(|s| s.debug_mode = on);
                }
                let on = self.shared.settings().debug_mode;
                writeln!(out, "debug_mode = {}", on_off(on))?;
            }
            "apshutdown" => self
                .shared
                .request_force_shutdown(ShutdownReason::ConsoleCmd),
            "apreset" => self.shared.request_reset(ResetReason::ConsoleCmd),
            "apon" => self.shared.request_exit_hard_off(),
            "powerstate" => {
                let name = arg.ok_or(ConsoleError::ParamCount)?;
                let target =
                    PowerState::from_name(name).ok_or(ConsoleError::Param1)?;
                self.shared.request_state(target, self.legal)?;
                writeln!(out, "requested {}", target.name())?;
            }
            _ => return Err(ConsoleError::UnknownCommand),
        }
        Ok(())
    }

    fn powerindebug(
        &self,
        arg: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), ConsoleError> {
        if let Some(a) = arg {
            let mask = u32::try_from(parse_int(a)?)
                .map_err(|_| ConsoleError::Param1)?;
            self.signals.set_debug_mask(SignalMask::from_bits_retain(mask));
        }
        let snap = self.signals.snapshot();
        writeln!(out, "power in:   0x{:04x}", snap.asserted.bits())?;
        let debug = self.signals.debug_mask().bits();
        writeln!(out, "debug mask: 0x{debug:04x}")?;
        writeln!(out, "bit meanings:")?;
        for (id, def) in self.signals.iter() {
            let on = u8::from(snap.asserted.has(id));
            writeln!(out, "  0x{:04x} {} {}", id.mask().bits(), on, def.name)?;
        }
        Ok(())
    }
}
