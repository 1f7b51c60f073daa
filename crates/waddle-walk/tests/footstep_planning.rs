//! Integration test: footstep planner scenarios.
//!
//! Checks the documented walking scenario (feet at y = ±0.06, 0.1 m steps,
//! left starting side) and that every plan alternates sides starting with
//! the foot opposite the starting side, for any number of steps.

use approx::assert_relative_eq;
use waddle_core::{Side, SupportSide, WalkParameters};
use waddle_walk::footsteps::planar_pose;
use waddle_walk::{CLOSING_STEPS, Footstep, RepetitiveFootstepsPlanner, make_supports};
use waddle_test_utils::{random_command, seeded_rng};

fn feet(params: &WalkParameters) -> (Footstep, Footstep) {
    (
        Footstep::new(Side::Left, planar_pose(0.0, 0.06, 0.0), params),
        Footstep::new(Side::Right, planar_pose(0.0, -0.06, 0.0), params),
    )
}

#[test]
fn forward_walk_scenario() {
    let params = WalkParameters::default();
    let mut planner = RepetitiveFootstepsPlanner::new(params.clone());
    planner.configure(0.1, 0.0, 0.0, 5);
    let (left, right) = feet(&params);
    let footsteps = planner.plan(Side::Left, &left.frame, &right.frame);

    assert_eq!(footsteps.len(), 5 + CLOSING_STEPS);
    for (i, footstep) in footsteps.iter().take(5).enumerate() {
        let expected_side = if i % 2 == 0 { Side::Right } else { Side::Left };
        assert_eq!(footstep.side, expected_side);
        #[allow(clippy::cast_precision_loss)]
        let x = 0.1 * (i + 1) as f64;
        assert_relative_eq!(footstep.xy().x, x, epsilon = 1e-12);
        assert_relative_eq!(footstep.xy().y, expected_side.sign() * 0.06, epsilon = 1e-12);
    }
    // the closing step brings the last foot beside the other one
    let closing = &footsteps[5];
    assert_eq!(closing.side, Side::Left);
    assert_relative_eq!(closing.xy().x, 0.5, epsilon = 1e-12);
}

#[test]
fn sides_alternate_for_any_step_count() {
    let params = WalkParameters::default();
    let mut rng = seeded_rng(11);
    let (left, right) = feet(&params);
    for _ in 0..50 {
        let command = random_command(&mut rng, &params);
        for steps in 0..8 {
            let mut planner = RepetitiveFootstepsPlanner::new(params.clone());
            planner.configure(command.dx, command.dy, command.dtheta, steps);
            for starting_side in Side::BOTH {
                let footsteps = planner.plan(starting_side, &left.frame, &right.frame);
                assert_eq!(footsteps.len(), steps + CLOSING_STEPS);
                let mut expected = starting_side.other();
                for footstep in &footsteps {
                    assert_eq!(footstep.side, expected);
                    expected = expected.other();
                }
            }
        }
    }
}

#[test]
fn feet_never_come_closer_than_the_spacing() {
    let params = WalkParameters::default();
    let mut planner = RepetitiveFootstepsPlanner::new(params.clone());
    let (left, right) = feet(&params);
    for dy in [-0.1, -0.04, 0.04, 0.1] {
        planner.configure(0.0, dy, 0.0, 6);
        let footsteps = planner.plan(Side::Left, &left.frame, &right.frame);
        let mut positions = [left.xy(), right.xy()];
        for footstep in &footsteps {
            positions[footstep.side.index()] = footstep.xy();
            let gap = positions[Side::Left.index()].y - positions[Side::Right.index()].y;
            assert!(gap >= params.feet_spacing - 1e-12, "dy={dy} gap={gap}");
        }
    }
}

#[test]
fn degenerate_commands_march_in_place() {
    let params = WalkParameters::default();
    let mut planner = RepetitiveFootstepsPlanner::new(params.clone());
    planner.configure(f64::NAN, f64::INFINITY, 0.0, 3);
    let (left, right) = feet(&params);
    let footsteps = planner.plan(Side::Right, &left.frame, &right.frame);
    assert_eq!(footsteps.len(), 3 + CLOSING_STEPS);
    for footstep in &footsteps {
        assert_relative_eq!(footstep.xy().x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(footstep.xy().y, footstep.side.sign() * 0.06, epsilon = 1e-12);
    }
}

#[test]
fn supports_alternate_single_and_double() {
    let params = WalkParameters::default();
    let mut planner = RepetitiveFootstepsPlanner::new(params.clone());
    planner.configure(0.05, 0.0, 0.0, 3);
    let (left, right) = feet(&params);
    let footsteps = planner.plan(Side::Left, &left.frame, &right.frame);
    let supports = make_supports(left, right, &footsteps, true, true, true);

    let sides: Vec<SupportSide> = supports.iter().map(waddle_walk::Support::side).collect();
    assert_eq!(
        sides,
        [
            SupportSide::Both,
            SupportSide::Left,
            SupportSide::Both,
            SupportSide::Right,
            SupportSide::Both,
            SupportSide::Left,
            SupportSide::Both,
            SupportSide::Right,
            SupportSide::Both,
        ]
    );
    assert!(supports[0].start);
    assert!(supports.last().unwrap().end);
    assert!(supports[1..supports.len() - 1].iter().all(|s| !s.start && !s.end));
}
