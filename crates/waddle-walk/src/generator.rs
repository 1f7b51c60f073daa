//! Walk pattern generator: supports in, trajectories out.

use nalgebra::{Vector2, Vector3};
use tracing::debug;
use waddle_core::{Side, SupportSide, WalkParameters};
use waddle_ik::QpSettings;

use crate::com::{ComState, plan_com};
use crate::error::WalkError;
use crate::footsteps::{Footstep, RepetitiveFootstepsPlanner, make_supports};
use crate::support::{Support, schedule};
use crate::trajectory::WalkTrajectory;

#[derive(Debug, Clone)]
pub struct WalkPatternGenerator {
    params: WalkParameters,
    settings: QpSettings,
}

/// CoM problems grow with the horizon; give them more room than IK steps.
const COM_MAX_ITER: u32 = 200;

impl WalkPatternGenerator {
    pub fn new(params: WalkParameters) -> Self {
        Self {
            params,
            settings: QpSettings {
                max_iter: COM_MAX_ITER,
                ..QpSettings::default()
            },
        }
    }

    pub const fn params(&self) -> &WalkParameters {
        &self.params
    }

    /// Schedule `supports` from `t_start` and plan a trajectory starting at
    /// rest from `initial_com`.
    pub fn plan(
        &self,
        mut supports: Vec<Support>,
        initial_com: &Vector3<f64>,
        initial_yaw: f64,
        t_start: f64,
    ) -> Result<WalkTrajectory, WalkError> {
        if supports.is_empty() {
            return Err(WalkError::EmptySupports);
        }
        schedule(&mut supports, 0, t_start, &self.params);
        let initial = ComState::at_rest(Vector2::new(initial_com.x, initial_com.y));
        let com = plan_com(&self.params, &supports, t_start, &initial, &self.settings)?;
        debug!(
            supports = supports.len(),
            horizon = com.horizon(),
            t_start,
            "planned walk trajectory"
        );
        Ok(WalkTrajectory::new(supports, com, initial_yaw, &self.params))
    }

    /// Whether supports can be replanned at `t`.
    ///
    /// Not when `t` is outside the trajectory, nor during the ending
    /// support or the last support. A trajectory whose CoM plan stops short
    /// of its last support always ends on a support that can be replanned.
    pub fn can_replan_supports(&self, trajectory: &WalkTrajectory, t: f64) -> bool {
        if !trajectory.contains(t) {
            return false;
        }
        let i = trajectory.support_index(t);
        let supports = trajectory.supports();
        !supports[i].end && i + 1 < supports.len()
    }

    /// New supports for a replan at `t`.
    ///
    /// The support before the current one and the current one are kept with
    /// their timing, as is the landing footstep of a foot in the air. The
    /// planner then restarts from the feet as they will be once the current
    /// support ends, stepping with the foot that would have stepped next.
    pub fn replan_supports(
        &self,
        planner: &RepetitiveFootstepsPlanner,
        trajectory: &WalkTrajectory,
        t: f64,
    ) -> Vec<Support> {
        let old = trajectory.supports();
        let i = trajectory.support_index(t);
        let current = &old[i];
        let mut supports: Vec<Support> = old[i.saturating_sub(1)..=i].to_vec();

        let landing = |side: Side| -> Footstep {
            current
                .footstep(side)
                .or_else(|| old[i + 1..].iter().find_map(|s| s.footstep(side)))
                .or_else(|| old[..i].iter().rev().find_map(|s| s.footstep(side)))
                .cloned()
                .unwrap_or_else(|| Footstep::new(side, current.frame(), &self.params))
        };
        let left = landing(Side::Left);
        let right = landing(Side::Right);

        let next_flier = match current.side() {
            SupportSide::Left => Side::Left,
            SupportSide::Right => Side::Right,
            SupportSide::Both => old
                .get(i + 1)
                .and_then(|s| s.side().swing())
                .unwrap_or(Side::Left),
        };
        let kept = supports.len();
        let middle = self.params.has_double_support();
        if !current.is_double() && middle {
            supports.push(Support::double([left.clone(), right.clone()]));
        }

        let footsteps = planner.plan(next_flier.other(), &left.frame, &right.frame);
        supports.extend(make_supports(left, right, &footsteps, false, middle, true));
        let t_next = supports[kept - 1].t_end();
        schedule(&mut supports, kept, t_next, &self.params);
        supports
    }

    /// Replacement trajectory over `supports`, starting at `t` from the
    /// CoM state of `trajectory` at `t`.
    pub fn replan(
        &self,
        supports: Vec<Support>,
        trajectory: &WalkTrajectory,
        t: f64,
    ) -> Result<WalkTrajectory, WalkError> {
        let first = supports.first().ok_or(WalkError::EmptySupports)?;
        let initial_yaw = trajectory.trunk_yaw(first.t_start);
        let initial = trajectory.com_state(t);
        let com = plan_com(&self.params, &supports, t, &initial, &self.settings)?;
        debug!(
            t,
            supports = supports.len(),
            horizon = com.horizon(),
            "replanned walk trajectory"
        );
        Ok(WalkTrajectory::new(supports, com, initial_yaw, &self.params))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::footsteps::planar_pose;

    struct Fixture {
        planner: RepetitiveFootstepsPlanner,
        generator: WalkPatternGenerator,
        trajectory: WalkTrajectory,
    }

    fn fixture(dx: f64) -> Fixture {
        fixture_with_steps(dx, 5)
    }

    fn fixture_with_steps(dx: f64, steps: usize) -> Fixture {
        let params = WalkParameters::default();
        let mut planner = RepetitiveFootstepsPlanner::new(params.clone());
        planner.configure(dx, 0.0, 0.0, steps);
        let generator = WalkPatternGenerator::new(params.clone());
        let left = Footstep::new(Side::Left, planar_pose(0.0, 0.06, 0.0), &params);
        let right = Footstep::new(Side::Right, planar_pose(0.0, -0.06, 0.0), &params);
        let footsteps = planner.plan(Side::Left, &left.frame, &right.frame);
        let supports = make_supports(left, right, &footsteps, true, true, true);
        let trajectory = generator
            .plan(supports, &Vector3::new(0.0, 0.0, 0.15), 0.0, 0.0)
            .unwrap();
        Fixture {
            planner,
            generator,
            trajectory,
        }
    }

    #[test]
    fn plan_rejects_empty_supports() {
        let f = fixture(0.0);
        let err = f
            .generator
            .plan(Vec::new(), &Vector3::zeros(), 0.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, WalkError::EmptySupports));
    }

    #[test]
    fn plan_schedules_supports_back_to_back() {
        let f = fixture(0.05);
        let supports = f.trajectory.supports();
        assert_relative_eq!(supports[0].t_start, 0.0);
        for pair in supports.windows(2) {
            assert_relative_eq!(pair[0].t_end(), pair[1].t_start, epsilon = 1e-12);
        }
        assert_relative_eq!(f.trajectory.t_start(), 0.0);
    }

    #[test]
    fn replan_is_deferred_outside_and_at_the_end() {
        // one step: the CoM plan covers every support
        let f = fixture_with_steps(0.05, 1);
        let traj = &f.trajectory;
        assert_relative_eq!(traj.t_end(), traj.supports_end(), epsilon = 1e-9);
        assert!(!f.generator.can_replan_supports(traj, -0.5));
        assert!(!f.generator.can_replan_supports(traj, traj.t_end() + 0.1));
        assert!(!f.generator.can_replan_supports(traj, traj.t_end() - 0.01));
        assert!(f.generator.can_replan_supports(traj, 0.1));
        assert!(f.generator.can_replan_supports(traj, 0.4));
    }

    #[test]
    fn truncated_plan_can_be_replanned_up_to_its_end() {
        let f = fixture(0.05);
        let traj = &f.trajectory;
        assert!(traj.t_end() < traj.supports_end());
        assert!(f.generator.can_replan_supports(traj, traj.t_end()));
        assert!(!f.generator.can_replan_supports(traj, traj.t_end() + 0.01));
    }

    #[test]
    fn replan_succeeds_at_every_allowed_instant() {
        let f = fixture(0.05);
        let traj = &f.trajectory;
        let mut replans = 0;
        for k in 0..=200 {
            let t = f64::from(k) * 0.005;
            if !f.generator.can_replan_supports(traj, t) {
                continue;
            }
            let supports = f.generator.replan_supports(&f.planner, traj, t);
            let new = f
                .generator
                .replan(supports, traj, t)
                .unwrap_or_else(|err| panic!("replan at t={t} failed: {err}"));
            let (a, b) = (traj.com_state(t), new.com_state(t));
            assert_relative_eq!(a.position, b.position, epsilon = 1e-9);
            assert_relative_eq!(a.velocity, b.velocity, epsilon = 1e-9);
            assert_relative_eq!(a.acceleration, b.acceleration, epsilon = 1e-9);
            assert!(new.t_end() > t + f.generator.params().dt());
            assert!(f.generator.can_replan_supports(&new, t));
            replans += 1;
        }
        // every instant up to the end of the CoM plan
        assert!(replans >= 190, "only {replans} replans");
    }

    #[test]
    fn replanned_supports_keep_the_committed_ones() {
        let f = fixture(0.05);
        let t = 0.4;
        let i = f.trajectory.support_index(t);
        let supports = f.generator.replan_supports(&f.planner, &f.trajectory, t);
        assert_eq!(&supports[..2], &f.trajectory.supports()[i - 1..=i]);
        assert!(supports.last().unwrap().end);
        for pair in supports.windows(2) {
            assert_relative_eq!(pair[0].t_end(), pair[1].t_start, epsilon = 1e-12);
        }
        // the swinging right foot still lands where it was going
        assert_eq!(supports[2].side(), SupportSide::Both);
        assert_eq!(
            supports[2].footstep(Side::Right),
            f.trajectory.supports()[i + 1].footstep(Side::Right)
        );
        // and the left foot steps next
        assert_eq!(supports[3].side(), SupportSide::Right);
    }

    #[test]
    fn replan_splices_without_discontinuity() {
        let f = fixture(0.05);
        for t in [0.11, 0.4, 0.52, 0.77] {
            let supports = f.generator.replan_supports(&f.planner, &f.trajectory, t);
            let new = f.generator.replan(supports, &f.trajectory, t).unwrap();
            let (a, b) = (f.trajectory.com_state(t), new.com_state(t));
            assert_relative_eq!(a.position, b.position, epsilon = 1e-9);
            assert_relative_eq!(a.velocity, b.velocity, epsilon = 1e-9);
            assert_relative_eq!(a.acceleration, b.acceleration, epsilon = 1e-9);
            assert_eq!(new.support_side(t), f.trajectory.support_side(t));
            let end = f.trajectory.support(t).t_end();
            for k in 0..10 {
                let s = t + (end - t) * f64::from(k) / 10.0;
                for side in Side::BOTH {
                    assert_relative_eq!(new.foot(side, s), f.trajectory.foot(side, s), epsilon = 1e-12);
                }
                assert_relative_eq!(new.trunk_yaw(s), f.trajectory.trunk_yaw(s), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn replan_applies_the_new_command() {
        let mut f = fixture(0.0);
        f.planner.configure(0.06, 0.0, 0.0, 5);
        let supports = f.generator.replan_supports(&f.planner, &f.trajectory, 0.4);
        let new = f.generator.replan(supports, &f.trajectory, 0.4).unwrap();
        let last = new.supports().last().unwrap();
        assert!(last.centre().x > 0.25);
    }
}
