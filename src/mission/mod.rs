//! Mission sequencing
//!
//! The sequencer chains motion primitives into the per-tag choreography:
//!
//! ```text
//! AwaitingTarget -> Centering -> Pause1 -> Action1 -> Pause2 -> ... -> ActionN -> Complete
//! ```
//!
//! `Lost` preempts every phase once the tracker goes stale. At most one transition
//! happens per cycle and the transition cycle itself always emits a hard stop, so
//! no half-entered phase is ever visible on the wheels.

pub mod choreography;

use self::choreography::{ChoreographyTable, Step};
use crate::behaviors::primitives::{
    CenterGains, CenterOnTarget, Maneuver, ManeuverContext, MoveAxis, RotateByDelta, RotateGains,
    TimedMove,
};
use crate::behaviors::{Behavior, MotionCommand};
use crate::common::types::{Point2D, Seconds};
use crate::config::CoreConfig;
use crate::perception::Observation;
use std::any::Any;
use std::fmt;
use tracing::{debug, info, warn};

/// Mission phase; step indices are zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingTarget,
    Centering,
    Pause(usize),
    Action(usize),
    Complete,
    Lost,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingTarget => f.write_str("AwaitingTarget"),
            Phase::Centering => f.write_str("Centering"),
            Phase::Pause(step) => write!(f, "Pause{}", step + 1),
            Phase::Action(step) => write!(f, "Action{}", step + 1),
            Phase::Complete => f.write_str("Complete"),
            Phase::Lost => f.write_str("Lost"),
        }
    }
}

/// Sequencing state; only [`MissionSequencer`] transitions write it
#[derive(Debug, Clone, PartialEq)]
pub struct MissionState {
    pub phase: Phase,
    pub active_tag_id: Option<i32>,
    pub phase_start_time: Seconds,
    /// Heading snapshotted when the current action started
    pub captured_heading: f64,
    /// Active tag position (x, z) in meters when the current action started, if in view
    pub captured_position: Option<Point2D>,
    /// Tag finished before the last re-arm; tried last until another tag is picked up
    pub completed_tag_id: Option<i32>,
}

impl MissionState {
    pub fn new(now: Seconds) -> Self {
        MissionState {
            phase: Phase::AwaitingTarget,
            active_tag_id: None,
            phase_start_time: now,
            captured_heading: 0.0,
            captured_position: None,
            completed_tag_id: None,
        }
    }
}

/// Finite-state machine running the choreography table
#[derive(Debug)]
pub struct MissionSequencer {
    table: ChoreographyTable,
    center_gains: CenterGains,
    rotate_gains: RotateGains,
    pause_secs: Seconds,
    ms_per_inch: f64,
    drive_power: f64,
    strafe_power: f64,
    state: MissionState,
    maneuver: Option<Box<dyn Maneuver>>,
    transitions: usize,
}

impl MissionSequencer {
    /// Create a new sequencer from a validated configuration
    pub fn new(config: &CoreConfig) -> Self {
        MissionSequencer {
            table: config.mission.clone(),
            center_gains: CenterGains::from(&config.control),
            rotate_gains: RotateGains::from(&config.control),
            pause_secs: config.timing.pause_secs,
            ms_per_inch: config.timing.ms_per_inch,
            drive_power: config.control.drive.max_power,
            strafe_power: config.control.strafe.max_power,
            state: MissionState::new(0.0),
            maneuver: None,
            transitions: 0,
        }
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn current_phase(&self) -> Phase {
        self.state.phase
    }

    /// Number of phase transitions since the last reset
    pub fn transition_count(&self) -> usize {
        self.transitions
    }

    fn steps(&self) -> &[Step] {
        self.state
            .active_tag_id
            .and_then(|tag| self.table.get(tag))
            .map(|program| program.steps.as_slice())
            .unwrap_or(&[])
    }

    fn transition(&mut self, to: Phase, now: Seconds) {
        info!(
            from = %self.state.phase,
            to = %to,
            tag = ?self.state.active_tag_id,
            now,
            "mission phase transition"
        );
        self.state.phase = to;
        self.state.phase_start_time = now;
        self.transitions += 1;
    }

    fn build_maneuver(&self, step: Step, observation: &Observation) -> Box<dyn Maneuver> {
        match step {
            Step::Rotate { delta_deg } => Box::new(RotateByDelta::new(
                observation.heading_deg,
                delta_deg,
                self.rotate_gains,
            )),
            Step::Translate { inches } => Box::new(TimedMove::new(
                MoveAxis::Longitudinal,
                inches,
                self.drive_power,
                self.ms_per_inch,
                observation.now,
            )),
            Step::Strafe { inches } => Box::new(TimedMove::new(
                MoveAxis::Lateral,
                inches,
                self.strafe_power,
                self.ms_per_inch,
                observation.now,
            )),
            Step::Center { distance_in } => {
                Box::new(CenterOnTarget::new(distance_in, self.center_gains))
            }
        }
    }

    /// Run the current maneuver; `None` once it reports done
    fn run_maneuver(&mut self, observation: &Observation) -> Option<MotionCommand> {
        let context = ManeuverContext {
            target: observation.target_for(self.state.active_tag_id),
            heading_deg: observation.heading_deg,
            now: observation.now,
        };
        let maneuver = self.maneuver.as_mut()?;
        let status = maneuver.update(&context);
        if status.done {
            debug!(maneuver = maneuver.name(), "maneuver done");
            self.maneuver = None;
            None
        } else {
            Some(status.command)
        }
    }
}

impl Behavior for MissionSequencer {
    fn name(&self) -> &str {
        "MissionSequencer"
    }

    fn accepted_tags(&self) -> Vec<i32> {
        self.table.tag_ids()
    }

    /// Awaiting and Lost use table order. While working a tag it comes first; once
    /// complete it goes last so that any other tag in view wins, and it stays last
    /// while awaiting after the re-arm.
    fn preference(&self) -> Vec<i32> {
        let ids = self.table.tag_ids();
        let active = match (self.state.active_tag_id, self.state.completed_tag_id) {
            (Some(active), _) => active,
            (None, Some(completed)) => {
                let others = ids.iter().copied().filter(|id| *id != completed);
                return others.chain(std::iter::once(completed)).collect();
            }
            (None, None) => return ids,
        };
        let others = ids.into_iter().filter(|id| *id != active);
        match self.state.phase {
            Phase::Centering | Phase::Pause(_) | Phase::Action(_) => {
                std::iter::once(active).chain(others).collect()
            }
            Phase::Complete => others.chain(std::iter::once(active)).collect(),
            Phase::AwaitingTarget | Phase::Lost => self.table.tag_ids(),
        }
    }

    fn step(&mut self, observation: &Observation) -> MotionCommand {
        let now = observation.now;

        if observation.tracker.is_stale && self.state.phase != Phase::Lost {
            warn!(
                tag = ?self.state.active_tag_id,
                last_seen = ?observation.tracker.last_seen_time,
                "target lost"
            );
            self.maneuver = None;
            self.transition(Phase::Lost, now);
            return MotionCommand::Stop;
        }

        match self.state.phase {
            Phase::Lost => {
                if observation.target.is_some() {
                    self.state.active_tag_id = None;
                    self.state.completed_tag_id = None;
                    self.transition(Phase::AwaitingTarget, now);
                }
                MotionCommand::Stop
            }
            Phase::AwaitingTarget => {
                if let Some(detection) = observation.target {
                    if let Some(program) = self.table.get(detection.tag_id) {
                        self.maneuver = Some(Box::new(CenterOnTarget::new(
                            program.approach_distance_in,
                            self.center_gains,
                        )));
                        self.state.active_tag_id = Some(detection.tag_id);
                        self.state.completed_tag_id = None;
                        self.transition(Phase::Centering, now);
                    }
                }
                MotionCommand::Stop
            }
            Phase::Centering => match self.run_maneuver(observation) {
                Some(command) => command,
                None => {
                    self.transition(Phase::Pause(0), now);
                    MotionCommand::Stop
                }
            },
            Phase::Pause(index) => {
                if now - self.state.phase_start_time > self.pause_secs {
                    match self.steps().get(index).copied() {
                        Some(step) => {
                            self.state.captured_heading = observation.heading_deg;
                            self.state.captured_position = observation
                                .target_for(self.state.active_tag_id)
                                .map(|d| (d.position.x, d.position.z));
                            debug!(%step, heading = observation.heading_deg, "starting step");
                            self.maneuver = Some(self.build_maneuver(step, observation));
                            self.transition(Phase::Action(index), now);
                        }
                        None => self.transition(Phase::Complete, now),
                    }
                }
                MotionCommand::Stop
            }
            Phase::Action(index) => match self.run_maneuver(observation) {
                Some(command) => command,
                None => {
                    if index + 1 < self.steps().len() {
                        self.transition(Phase::Pause(index + 1), now);
                    } else {
                        self.transition(Phase::Complete, now);
                    }
                    MotionCommand::Stop
                }
            },
            Phase::Complete => {
                let rearm = observation
                    .observed_tag()
                    .map_or(false, |tag| Some(tag) != self.state.active_tag_id);
                if rearm {
                    self.state.completed_tag_id = self.state.active_tag_id.take();
                    self.transition(Phase::AwaitingTarget, now);
                }
                MotionCommand::Stop
            }
        }
    }

    fn phase(&self) -> String {
        self.state.phase.to_string()
    }

    fn active_tag(&self) -> Option<i32> {
        self.state.active_tag_id
    }

    fn reset(&mut self, now: Seconds) {
        self.state = MissionState::new(now);
        self.maneuver = None;
        self.transitions = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::choreography::TagProgram;
    use super::*;
    use crate::common::{Detection, INCHES_PER_METER};
    use crate::perception::heading::HeadingMode;
    use crate::perception::tracker::{TargetTracker, TrackerState};

    fn observe(now: Seconds, target: Option<Detection>) -> Observation {
        Observation {
            now,
            target,
            tracker: TrackerState {
                last_seen_tag: target.map(|d| d.tag_id),
                last_seen_time: target.map(|_| now),
                is_stale: false,
            },
            heading_deg: 0.0,
            heading_mode: HeadingMode::Inertial,
        }
    }

    fn stale(now: Seconds) -> Observation {
        Observation {
            tracker: TrackerState {
                last_seen_tag: Some(21),
                last_seen_time: Some(0.0),
                is_stale: true,
            },
            ..observe(now, None)
        }
    }

    fn centered(tag_id: i32, distance_in: f64) -> Option<Detection> {
        Some(Detection::new(tag_id, 0.0, distance_in / INCHES_PER_METER))
    }

    /// Single one-inch translate for tag 7
    fn short_mission() -> MissionSequencer {
        let mut config = CoreConfig::default();
        config.mission.tags = vec![
            TagProgram::new(7, 36.0, vec![Step::Translate { inches: 1.0 }]),
            TagProgram::new(8, 36.0, vec![Step::Translate { inches: 1.0 }]),
        ];
        MissionSequencer::new(&config)
    }

    fn run_to_complete(mission: &mut MissionSequencer, tag: i32) -> Seconds {
        let target = centered(tag, 36.0);
        mission.step(&observe(0.0, target));
        mission.step(&observe(0.02, target));
        assert_eq!(mission.current_phase(), Phase::Pause(0));
        mission.step(&observe(2.1, target));
        assert_eq!(mission.current_phase(), Phase::Action(0));
        mission.step(&observe(2.2, target));
        assert_eq!(mission.current_phase(), Phase::Complete);
        2.2
    }

    #[test]
    fn test_awaits_without_detection() {
        let mut mission = MissionSequencer::new(&CoreConfig::default());
        for i in 0..10 {
            assert_eq!(mission.step(&observe(i as f64, None)), MotionCommand::Stop);
        }
        assert_eq!(mission.current_phase(), Phase::AwaitingTarget);
        assert_eq!(mission.transition_count(), 0);
    }

    #[test]
    fn test_detection_starts_centering() {
        let mut mission = MissionSequencer::new(&CoreConfig::default());
        let command = mission.step(&observe(0.0, Some(Detection::new(22, 5.0, 2.0))));
        assert_eq!(command, MotionCommand::Stop);
        assert_eq!(mission.current_phase(), Phase::Centering);
        assert_eq!(mission.active_tag(), Some(22));

        match mission.step(&observe(0.02, Some(Detection::new(22, 5.0, 2.0)))) {
            MotionCommand::Tank { drive, turn } => {
                assert!(drive > 0.0);
                assert!(turn < 0.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_centering_coasts_without_active_tag() {
        let mut mission = MissionSequencer::new(&CoreConfig::default());
        mission.step(&observe(0.0, Some(Detection::new(21, 5.0, 2.0))));
        assert_eq!(mission.step(&observe(0.02, None)), MotionCommand::Coast);
        assert_eq!(
            mission.step(&observe(0.04, Some(Detection::new(23, 0.0, 1.0)))),
            MotionCommand::Coast
        );
        assert_eq!(mission.current_phase(), Phase::Centering);
    }

    #[test]
    fn test_pause_dwell_then_action() {
        let mut mission = MissionSequencer::new(&CoreConfig::default());
        let target = centered(21, 36.0);
        mission.step(&observe(0.0, target));
        mission.step(&observe(0.02, target));
        assert_eq!(mission.phase(), "Pause1");

        assert_eq!(mission.step(&observe(1.5, target)), MotionCommand::Stop);
        assert_eq!(mission.current_phase(), Phase::Pause(0));

        let mut entry = observe(2.03, target);
        entry.heading_deg = 12.0;
        mission.step(&entry);
        assert_eq!(mission.phase(), "Action1");
        assert_eq!(mission.state().captured_heading, 12.0);
        assert!(mission.state().captured_position.is_some());

        // spin 360 from the captured heading
        let mut spin = observe(2.05, target);
        spin.heading_deg = 12.0;
        assert_eq!(
            mission.step(&spin),
            MotionCommand::Tank {
                drive: 0.0,
                turn: 0.35
            }
        );
    }

    #[test]
    fn test_stale_preempts_every_phase() {
        let mut mission = MissionSequencer::new(&CoreConfig::default());
        mission.step(&observe(0.0, centered(21, 36.0)));
        mission.step(&observe(0.02, centered(21, 36.0)));
        assert_eq!(mission.current_phase(), Phase::Pause(0));

        assert_eq!(mission.step(&stale(25.0)), MotionCommand::Stop);
        assert_eq!(mission.current_phase(), Phase::Lost);
        mission.step(&stale(26.0));
        assert_eq!(mission.current_phase(), Phase::Lost);

        mission.step(&observe(27.0, centered(22, 36.0)));
        assert_eq!(mission.current_phase(), Phase::AwaitingTarget);
        assert_eq!(mission.active_tag(), None);
        mission.step(&observe(27.02, centered(22, 36.0)));
        assert_eq!(mission.active_tag(), Some(22));
    }

    #[test]
    fn test_complete_is_idempotent_for_same_tag() {
        let mut mission = short_mission();
        let end = run_to_complete(&mut mission, 7);
        for i in 1..50 {
            let command = mission.step(&observe(end + i as f64, centered(7, 20.0)));
            assert_eq!(command, MotionCommand::Stop);
        }
        assert_eq!(mission.current_phase(), Phase::Complete);
        assert_eq!(mission.transition_count(), 4);
    }

    #[test]
    fn test_complete_rearms_on_other_tag() {
        let mut mission = short_mission();
        let end = run_to_complete(&mut mission, 7);
        assert_eq!(mission.preference(), vec![8, 7]);
        mission.step(&observe(end + 1.0, centered(8, 36.0)));
        assert_eq!(mission.current_phase(), Phase::AwaitingTarget);
        assert_eq!(mission.active_tag(), None);
        assert_eq!(mission.preference(), vec![8, 7]);
        mission.step(&observe(end + 1.02, centered(8, 36.0)));
        assert_eq!(mission.active_tag(), Some(8));
        assert_eq!(mission.preference(), vec![8, 7]);
    }

    #[test]
    fn test_rearm_keeps_completed_tag_last() {
        let mut mission = short_mission();
        let end = run_to_complete(&mut mission, 7);
        for (i, phase) in [Phase::AwaitingTarget, Phase::Centering]
            .into_iter()
            .enumerate()
        {
            // both tags in view; the one that triggered the re-arm wins
            let preference = mission.preference();
            assert_eq!(preference.last(), Some(&7));
            let both = [centered(7, 36.0).unwrap(), centered(8, 20.0).unwrap()];
            let target = TargetTracker::select(&both, &preference).copied();
            mission.step(&observe(end + 1.0 + i as f64 * 0.02, target));
            assert_eq!(mission.current_phase(), phase);
        }
        assert_eq!(mission.active_tag(), Some(8));
    }

    #[test]
    fn test_preference_puts_active_tag_first() {
        let mut mission = MissionSequencer::new(&CoreConfig::default());
        assert_eq!(mission.preference(), vec![21, 22, 23]);
        mission.step(&observe(0.0, centered(23, 48.0)));
        assert_eq!(mission.preference(), vec![23, 21, 22]);
    }

    #[test]
    fn test_reset() {
        let mut mission = short_mission();
        run_to_complete(&mut mission, 7);
        mission.reset(5.0);
        assert_eq!(mission.state(), &MissionState::new(5.0));
        assert_eq!(mission.transition_count(), 0);
    }
}
