// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Random event scripts played against the simulated boards.

use drv_ap_seq_api::{PowerState, ShutdownReason};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::select;
use seq_time::{Clock, Instant, MSEC, SECOND};

use crate::chipset::arm::{ArmPolicy, ArmSoc};
use crate::chipset::x86::{X86Policy, X86};
use crate::config::Config;
use crate::sim::{self, Inject, Rig};
use crate::Trace;

/// SLP_S3, SLP_S4 and SLP_S0.
static X86_PINS: &[usize] = &[4, 5, 6];
/// AP_SUSPEND.
static ARM_PINS: &[usize] = &[3];

fn action(pins: &'static [usize]) -> impl Strategy<Value = Inject> {
    prop_oneof![
        4 => (select(pins), any::<bool>())
            .prop_map(|(p, level)| Inject::Pin(p, Some(level))),
        1 => Just(Inject::ExitHardOff),
        1 => Just(Inject::Shutdown(ShutdownReason::ConsoleCmd)),
    ]
}

fn script(
    pins: &'static [usize],
) -> impl Strategy<Value = Vec<(u64, Inject)>> {
    vec((1..300u64, action(pins)), 1..24)
}

#[derive(Debug, PartialEq)]
struct Outcome {
    trace: Vec<(Instant, Trace)>,
    writes: Vec<(usize, bool)>,
    state: PowerState,
}

/// Plays `script` out, checking the rails every time the sequencer settles.
fn play(
    rig: &mut Rig<'_>,
    script: &[(u64, Inject)],
    legal: &[(PowerState, PowerState)],
) -> Result<Outcome, TestCaseError> {
    rig.init();
    let mut at = 0;
    for &(ms, what) in script {
        at += ms * MSEC;
        rig.sim.after(at, what);
    }

    let end = rig.sim.now() + at + 2 * SECOND;
    loop {
        rig.seq.run_until_idle(64);
        if let Some(want) = rig.seq.expected_rails() {
            prop_assert_eq!(
                rig.rails_on(),
                want,
                "rails wrong in {:?}",
                rig.state()
            );
        }
        if rig.sim.now() >= end {
            break;
        }
        rig.seq.wait_for_work();
    }

    let trace: Vec<_> = rig
        .seq
        .trace()
        .iter()
        .map(|e| (e.timestamp, e.payload))
        .collect();
    for (_, t) in &trace {
        if let Trace::Transition { from, to } = *t {
            prop_assert!(legal.contains(&(from, to)), "{from:?} -> {to:?}");
        }
        let illegal = matches!(t, Trace::Illegal { .. });
        prop_assert!(!illegal, "refused transition: {:?}", t);
    }

    Ok(Outcome {
        trace,
        writes: rig.hal.writes.borrow().clone(),
        state: rig.state(),
    })
}

fn x86(script: &[(u64, Inject)]) -> Result<Outcome, TestCaseError> {
    sim::x86_rig(Config::DEFAULT, X86Policy::DEFAULT, |rig| {
        play(rig, script, X86::LEGAL_EDGES)
    })
}

fn arm(script: &[(u64, Inject)]) -> Result<Outcome, TestCaseError> {
    sim::arm_rig(Config::DEFAULT, ArmPolicy::DEFAULT, |rig| {
        play(rig, script, ArmSoc::LEGAL_EDGES)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn x86_scripts_are_deterministic(s in script(X86_PINS)) {
        let first = x86(&s)?;
        let second = x86(&s)?;
        prop_assert_eq!(first, second);
    }

    #[test]
    fn arm_scripts_are_deterministic(s in script(ARM_PINS)) {
        let first = arm(&s)?;
        let second = arm(&s)?;
        prop_assert_eq!(first, second);
    }
}
