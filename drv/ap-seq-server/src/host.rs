// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host command handlers.
//!
//! These run in whatever task owns the host interface. They only ever go
//! through [`Shared`], so a command never waits on the sequencer.

use drv_ap_seq_api::host::{HostRequest, HostResponse, ResultCode};
use drv_ap_seq_api::{HostSleepEvent, PowerState};
use drv_power_signals::PowerSignals;
use seq_time::{Clock, Instant, SECOND};

use crate::board::Board;
use crate::shared::Shared;

pub struct HostCommands<'a> {
    pub shared: &'a Shared,
    pub signals: &'a PowerSignals<'a>,
    pub clock: &'a dyn Clock,
    pub board: &'a dyn Board,
}

impl HostCommands<'_> {
    pub fn handle(&self, req: HostRequest) -> HostResponse {
        match req {
            HostRequest::GetBootTime => {
                let now = self.clock.now();
                HostResponse::BootTime(self.shared.boot_times(now))
            }
            HostRequest::RebootApOnG3 => {
                self.shared.request_reboot_ap_on_g3(0);
                HostResponse::Ack
            }
            HostRequest::RebootApOnG3Delayed { delay_s } => {
                self.shared.request_reboot_ap_on_g3(delay_s);
                HostResponse::Ack
            }
            HostRequest::HibernationDelay { seconds } => {
                if seconds != 0 {
                    self.shared
                        .update_settings(|s| s.hibernate_delay_s = seconds);
                }
                let now = self.clock.now();
                let (time_g3, time_remaining, hibernate_delay) =
                    hibernation_status(self.shared, self.board, now);
                HostResponse::HibernationDelay {
                    time_g3,
                    time_remaining,
                    hibernate_delay,
                }
            }
            HostRequest::HostSleepEvent {
                event,
                sleep_timeout_ms,
            } => {
                let count =
                    self.shared.host_sleep_event(event, sleep_timeout_ms);
                if event.is_suspend() || event == HostSleepEvent::DefaultReset
                {
                    HostResponse::Ack
                } else {
                    HostResponse::HostSleepEvent {
                        sleep_transitions: count,
                    }
                }
            }
            HostRequest::GetHostSleepState => {
                HostResponse::HostSleepState(self.shared.host_sleep_state())
            }
            HostRequest::PauseInS5 { set, enable } => {
                if set {
                    self.shared.update_settings(|s| s.pause_in_s5 = enable);
                }
                HostResponse::PauseInS5(self.shared.settings().pause_in_s5)
            }
            HostRequest::GetPowerInfo => HostResponse::PowerInfo {
                state: self.shared.state() as u8,
                signals: self.signals.snapshot().asserted.bits(),
            },
        }
    }

    /// Decodes one request from `input`, handles it, and encodes the
    /// response into `out`.
    pub fn dispatch(
        &self,
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize, hubpack::Error> {
        let resp = match hubpack::deserialize::<HostRequest>(input) {
            Ok((req, _)) => self.handle(req),
            Err(_) => HostResponse::Error(ResultCode::InvalidCommand),
        };
        hubpack::serialize(out, &resp)
    }
}

/// Seconds spent in G3 on battery, seconds left before hibernation, and
/// the configured delay.
pub(crate) fn hibernation_status(
    shared: &Shared,
    board: &dyn Board,
    now: Instant,
) -> (u32, u32, u32) {
    let delay = shared.settings().hibernate_delay_s;
    let time_g3 = if shared.state() == PowerState::G3
        && !board.extpower_present()
    {
        let secs = now.saturating_sub(shared.last_shutdown_time()) / SECOND;
        u32::try_from(secs).unwrap_or(u32::MAX)
    } else {
        0
    };
    (time_g3, delay.saturating_sub(time_g3), delay)
}
