//! End-to-end runs of the fiducial core against a synthetic vehicle

use fiducial_core::common::{
    normalize_degrees, CycleInput, CycleOutput, Detection, TelemetrySink, WheelPowers,
    INCHES_PER_METER,
};
use fiducial_core::config::CoreConfig;
use fiducial_core::control::WheelActuator;
use fiducial_core::error::{ActuatorError, CoreError};
use fiducial_core::lifecycle::State;
use fiducial_core::mission::Phase;
use fiducial_core::{BehaviorMode, FiducialCore};
use std::collections::HashMap;

const DT: f64 = 0.02;

#[derive(Default)]
struct RecordingActuator {
    history: Vec<WheelPowers>,
    fail_after: Option<usize>,
}

impl WheelActuator for RecordingActuator {
    fn set_powers(&mut self, powers: WheelPowers) -> Result<(), ActuatorError> {
        if self.fail_after.map_or(false, |n| self.history.len() >= n) {
            return Err(ActuatorError("motor controller disconnected".to_string()));
        }
        self.history.push(powers);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTelemetry {
    latest: HashMap<String, String>,
    updates: usize,
}

impl TelemetrySink for RecordingTelemetry {
    fn add_data(&mut self, key: &str, value: String) {
        self.latest.insert(key.to_string(), value);
    }

    fn update(&mut self) {
        self.updates += 1;
    }
}

/// Vehicle in front of one tag; the tag is visible whenever the test says so
struct Plant {
    tag_id: i32,
    heading_deg: f64,
    range_m: f64,
    bearing_offset_deg: f64,
}

impl Plant {
    fn new(tag_id: i32) -> Self {
        Plant {
            tag_id,
            heading_deg: 0.0,
            range_m: 2.0,
            bearing_offset_deg: 6.0,
        }
    }

    fn detection(&self) -> Detection {
        Detection::new(
            self.tag_id,
            normalize_degrees(self.bearing_offset_deg + self.heading_deg),
            self.range_m,
        )
    }

    fn advance(&mut self, p: WheelPowers) {
        let drive = (p.front_left + p.front_right + p.back_left + p.back_right) / 4.0;
        let turn = (p.front_right + p.back_right - p.front_left - p.back_left) / 4.0;
        self.range_m -= drive * 2.0 * DT;
        self.heading_deg += turn * 200.0 * DT;
    }
}

struct Harness {
    core: FiducialCore,
    plant: Plant,
    actuator: RecordingActuator,
    telemetry: RecordingTelemetry,
    cycle: u64,
    imu: bool,
}

impl Harness {
    fn new(tag_id: i32, imu: bool) -> Self {
        Self::with_config(CoreConfig::default(), tag_id, imu)
    }

    fn with_config(config: CoreConfig, tag_id: i32, imu: bool) -> Self {
        let mut core = FiducialCore::new(config, BehaviorMode::Mission, imu).unwrap();
        core.init().unwrap();
        Harness {
            core,
            plant: Plant::new(tag_id),
            actuator: RecordingActuator::default(),
            telemetry: RecordingTelemetry::default(),
            cycle: 0,
            imu,
        }
    }

    fn now(&self) -> f64 {
        self.cycle as f64 * DT
    }

    fn input(&self, detection: Option<Detection>) -> CycleInput {
        let input = CycleInput::at(self.now()).with_detection(detection);
        if self.imu {
            input.with_heading(normalize_degrees(self.plant.heading_deg))
        } else {
            input
        }
    }

    fn step_with(&mut self, detection: Option<Detection>) -> CycleOutput {
        let input = self.input(detection);
        let output = self
            .core
            .step(&input, &mut self.actuator, &mut self.telemetry)
            .unwrap();
        self.plant.advance(output.powers);
        self.cycle += 1;
        output
    }

    fn step(&mut self, visible: bool) -> CycleOutput {
        let detection = visible.then(|| self.plant.detection());
        self.step_with(detection)
    }

    fn phase(&self) -> Phase {
        self.core.mission().unwrap().current_phase()
    }

    fn transitions(&self) -> usize {
        self.core.mission().unwrap().transition_count()
    }

    /// Step with the tag in view until `phase` is reached; panics after `max_secs`
    fn run_until(&mut self, phase: Phase, max_secs: f64) {
        let limit = self.now() + max_secs;
        while self.phase() != phase {
            assert!(
                self.now() < limit,
                "did not reach {} within {} s, stuck in {}",
                phase,
                max_secs,
                self.phase()
            );
            self.step(true);
        }
    }
}

#[test]
fn never_detected_stays_awaiting_with_zero_output() {
    let mut harness = Harness::new(21, true);
    for _ in 0..3000 {
        let output = harness.step(false);
        assert!(output.powers.is_zero());
        assert_eq!(output.status.phase, "AwaitingTarget");
        assert_eq!(output.status.active_tag_id, -1);
        assert_eq!(output.status.observed_tag_id, -1);
    }
    assert_eq!(harness.phase(), Phase::AwaitingTarget);
    assert_eq!(harness.transitions(), 0);
    assert_eq!(harness.telemetry.updates, 3000);
    assert_eq!(harness.telemetry.latest["TagSeen"], "-1");
}

#[test]
fn lost_after_timeout_then_recovers() {
    let mut harness = Harness::new(21, true);
    harness.step(true);
    assert_eq!(harness.phase(), Phase::Centering);

    // gone until 25 s
    while harness.now() < 25.0 {
        let now = harness.now();
        let output = harness.step(false);
        if now < 19.9 {
            assert_ne!(harness.phase(), Phase::Lost, "lost too early at {}", now);
        }
        if now > 20.1 {
            assert_eq!(harness.phase(), Phase::Lost);
            assert!(output.powers.is_zero());
        }
    }
    assert_eq!(harness.telemetry.latest["State"], "Lost");

    harness.step(true);
    assert_eq!(harness.phase(), Phase::AwaitingTarget);
    harness.step(true);
    assert_eq!(harness.phase(), Phase::Centering);
    assert_eq!(harness.core.mission().unwrap().state().active_tag_id, Some(21));
}

#[test]
fn centering_terminates_when_both_tolerances_hold() {
    let mut harness = Harness::new(22, true);
    let target = 36.0 / INCHES_PER_METER;
    let tolerance = 1.5 / INCHES_PER_METER;

    harness.step_with(Some(Detection::new(22, 10.0, 1.5)));
    assert_eq!(harness.phase(), Phase::Centering);

    // bearing converges first, range later
    for k in 1..200 {
        let bearing = (10.0 - 0.5 * k as f64).max(0.0);
        let range = 1.5 - 0.01 * k as f64;
        let both = (range - target).abs() < tolerance && bearing.abs() < 2.0;

        harness.step_with(Some(Detection::new(22, bearing, range)));
        if both {
            assert_eq!(harness.phase(), Phase::Pause(0));
            return;
        }
        assert_eq!(harness.phase(), Phase::Centering, "left centering early at k={}", k);
    }
    panic!("centering never completed");
}

#[test]
fn full_choreography_reaches_complete() {
    for tag in [21, 22, 23] {
        let mut harness = Harness::new(tag, true);
        harness.run_until(Phase::Complete, 90.0);
        let steps = CoreConfig::default().steps(tag).len();
        assert_eq!(steps, 4);
        assert_eq!(harness.transitions(), 2 * steps + 2, "tag {}", tag);
        assert!(harness.actuator.history.iter().any(|p| !p.is_zero()));
        assert!(harness.step(true).powers.is_zero());
    }
}

#[test]
fn spin_completes_a_full_turn() {
    let mut harness = Harness::new(21, true);
    harness.run_until(Phase::Action(0), 30.0);
    let start = harness.plant.heading_deg;
    harness.run_until(Phase::Pause(1), 30.0);
    let turned = harness.plant.heading_deg - start;
    assert!((turned - 360.0).abs() < 6.0, "turned {}", turned);
}

#[test]
fn dead_reckoned_heading_completes_rotations() {
    let mut harness = Harness::new(23, false);
    harness.run_until(Phase::Complete, 120.0);
    assert_eq!(harness.transitions(), 10);
    assert_eq!(harness.telemetry.latest["Heading"], "DeadReckoned");
}

#[test]
fn completed_tag_does_not_restart() {
    let mut harness = Harness::new(22, true);
    harness.run_until(Phase::Complete, 90.0);
    let transitions = harness.transitions();

    for _ in 0..500 {
        let output = harness.step(true);
        assert!(output.powers.is_zero());
        assert_eq!(output.status.observed_tag_id, 22);
    }
    assert_eq!(harness.phase(), Phase::Complete);
    assert_eq!(harness.transitions(), transitions);

    harness.step_with(Some(Detection::new(21, 0.0, 1.0)));
    assert_eq!(harness.phase(), Phase::AwaitingTarget);
    harness.step_with(Some(Detection::new(21, 0.0, 1.0)));
    assert_eq!(harness.phase(), Phase::Centering);
    assert_eq!(harness.core.mission().unwrap().state().active_tag_id, Some(21));
}

#[test]
fn actuator_loss_is_terminal() {
    let mut harness = Harness::new(21, true);
    harness.actuator.fail_after = Some(5);
    for _ in 0..5 {
        harness.step(true);
    }

    let input = harness.input(Some(harness.plant.detection()));
    let err = harness
        .core
        .step(&input, &mut harness.actuator, &mut harness.telemetry)
        .unwrap_err();
    assert!(matches!(err, CoreError::ActuatorLost(_)));
    assert_eq!(harness.core.state(), State::Finalized);

    harness.actuator.fail_after = None;
    let err = harness
        .core
        .step(&input, &mut harness.actuator, &mut harness.telemetry)
        .unwrap_err();
    assert!(matches!(err, CoreError::Lifecycle { .. }));
}

#[test]
fn outputs_respect_limits() {
    let mut config = CoreConfig::default();
    config.timing.pause_secs = 0.5;
    let mut harness = Harness::with_config(config, 21, true);
    harness.run_until(Phase::Complete, 90.0);

    let history = &harness.actuator.history;
    for powers in history {
        for wheel in [
            powers.front_left,
            powers.front_right,
            powers.back_left,
            powers.back_right,
        ] {
            assert!(wheel.abs() <= 1.0);
        }
    }
    assert!(history.iter().any(|p| p.front_left < 0.0 && p.back_left > 0.0));
}

#[test]
fn invalid_readings_never_reach_the_wheels() {
    let mut harness = Harness::new(21, true);
    harness.step(true);
    harness.step_with(Some(Detection::new(21, f64::NAN, 2.0)));

    let input = harness.input(Some(harness.plant.detection()));
    let mut bad_heading = input.clone();
    bad_heading.heading_deg = Some(f64::NAN);
    let output = harness
        .core
        .step(&bad_heading, &mut harness.actuator, &mut harness.telemetry)
        .unwrap();
    harness.plant.advance(output.powers);
    harness.cycle += 1;

    for _ in 0..50 {
        harness.step(true);
    }
    for powers in &harness.actuator.history {
        for wheel in [
            powers.front_left,
            powers.front_right,
            powers.back_left,
            powers.back_right,
        ] {
            assert!(wheel.is_finite() && wheel.abs() <= 1.0, "wheel power {}", wheel);
        }
    }
    assert!(!harness.actuator.history.last().unwrap().is_zero());
    harness.run_until(Phase::Pause(1), 60.0);
}
