//! Centre of mass planning with the linear inverted pendulum.
//!
//! # QP formulation
//!
//! Per floor axis the state is `x = [c, c', c'']` driven by a piecewise
//! constant jerk `u` on the planning grid of step `T`:
//!
//! ```text
//! x_{k+1} = A x_k + B u_k      zmp_k = c_k - (h / g) c''_k
//! ```
//!
//! States are condensed out so the decision vector is `U = [u_x; u_y; s]`,
//! with one ZMP slack `s_k >= 0` per node.
//!
//! Cost: `w_zmp * sum_k |zmp_k - zmp_ref_k|^2 + w_jerk * |U|^2 + w_slack * sum_k s_k`
//!
//! Subject to:
//! - ZMP within `s_k` of every support polygon met on either side of node `k`
//!   (inequality)
//! - horizon reaching the last support: CoM at rest above its centre (equality)
//! - otherwise: capture point equal to the reference ZMP at the last node (equality)
//!
//! The linear slack price exceeds any multiplier of a feasible problem, so
//! the slacks stay at zero unless the splice state cannot be kept on its
//! feet. A horizon that would stop inside the last support is stretched to
//! the end of it, so every truncated plan ends on a support that can still
//! be replanned.

use nalgebra::{DMatrix, DVector, Matrix3, RowVector3, Vector2, Vector3};
use waddle_core::{GRAVITY, WalkParameters};
use waddle_ik::{QpSettings, QuadraticProgram};

use crate::error::WalkError;
use crate::polygon::half_planes;
use crate::support::{Support, support_index};

/// Tolerance on time comparisons against the planning grid [s].
const TIME_EPSILON: f64 = 1e-9;

/// Cost per metre of ZMP outside its support polygon.
const ZMP_SLACK_WEIGHT: f64 = 1e6;

/// Horizontal CoM state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComState {
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub acceleration: Vector2<f64>,
}

impl ComState {
    pub fn at_rest(position: Vector2<f64>) -> Self {
        Self {
            position,
            velocity: Vector2::zeros(),
            acceleration: Vector2::zeros(),
        }
    }

    fn axis(&self, axis: usize) -> Vector3<f64> {
        Vector3::new(self.position[axis], self.velocity[axis], self.acceleration[axis])
    }

    fn from_axes(x: &Vector3<f64>, y: &Vector3<f64>) -> Self {
        Self {
            position: Vector2::new(x[0], y[0]),
            velocity: Vector2::new(x[1], y[1]),
            acceleration: Vector2::new(x[2], y[2]),
        }
    }
}

/// Jerk-driven CoM motion on a uniform grid.
///
/// Past the last node the CoM holds its final position.
#[derive(Debug, Clone, PartialEq)]
pub struct ComTrajectory {
    t_start: f64,
    dt: f64,
    height: f64,
    nodes: Vec<ComState>,
    jerks: Vec<Vector2<f64>>,
}

impl ComTrajectory {
    pub const fn t_start(&self) -> f64 {
        self.t_start
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn t_end(&self) -> f64 {
        (self.jerks.len() as f64).mul_add(self.dt, self.t_start)
    }

    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Number of planning steps.
    pub fn horizon(&self) -> usize {
        self.jerks.len()
    }

    pub fn nodes(&self) -> &[ComState] {
        &self.nodes
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn state(&self, t: f64) -> ComState {
        let elapsed = t - self.t_start;
        if elapsed <= 0.0 {
            return self.nodes[0];
        }
        if t > self.t_end() {
            let last = self.nodes[self.nodes.len() - 1];
            return ComState::at_rest(last.position);
        }
        let k = ((elapsed / self.dt).floor() as usize).min(self.jerks.len() - 1);
        let tau = (k as f64).mul_add(-self.dt, elapsed).clamp(0.0, self.dt);
        let node = &self.nodes[k];
        let u = self.jerks[k];
        ComState {
            position: node.position
                + node.velocity * tau
                + node.acceleration * (tau * tau / 2.0)
                + u * (tau * tau * tau / 6.0),
            velocity: node.velocity + node.acceleration * tau + u * (tau * tau / 2.0),
            acceleration: node.acceleration + u * tau,
        }
    }

    /// Zero moment point of the pendulum at `t`.
    pub fn zmp(&self, t: f64) -> Vector2<f64> {
        let state = self.state(t);
        state.position - state.acceleration * (self.height / GRAVITY)
    }
}

/// Reference ZMP: on the stance foot in single support, moving linearly
/// between the neighbouring anchors in double support.
pub fn zmp_reference(supports: &[Support], t: f64) -> Vector2<f64> {
    let i = support_index(supports, t);
    let support = &supports[i];
    if !support.is_double() {
        return support.centre();
    }
    let from = if support.start || i == 0 {
        support.centre()
    } else {
        supports[i - 1].centre()
    };
    let to = if support.end || i + 1 == supports.len() {
        support.centre()
    } else {
        supports[i + 1].centre()
    };
    let alpha = if support.duration > 0.0 {
        ((t - support.t_start) / support.duration).clamp(0.0, 1.0)
    } else {
        1.0
    };
    from + (to - from) * alpha
}

/// Discrete pendulum dynamics for one grid step.
fn discrete_dynamics(dt: f64) -> (Matrix3<f64>, Vector3<f64>) {
    let a = Matrix3::new(
        1.0, dt, dt * dt / 2.0, //
        0.0, 1.0, dt, //
        0.0, 0.0, 1.0,
    );
    let b = Vector3::new(dt * dt * dt / 6.0, dt * dt / 2.0, dt);
    (a, b)
}

/// Plan the CoM from `initial` at `t0` over scheduled `supports`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]
pub fn plan_com(
    params: &WalkParameters,
    supports: &[Support],
    t0: f64,
    initial: &ComState,
    settings: &QpSettings,
) -> Result<ComTrajectory, WalkError> {
    let last = supports.last().ok_or(WalkError::EmptySupports)?;
    let dt = params.dt();
    let height = params.walk_com_height;
    let omega = (GRAVITY / height).sqrt();

    let remaining = ((last.t_end() - t0) / dt - TIME_EPSILON).ceil().max(1.0) as usize;
    let truncated = (params.planned_timesteps as f64).mul_add(dt, t0) < last.t_start - TIME_EPSILON;
    let n = if truncated {
        params.planned_timesteps.clamp(1, remaining)
    } else {
        remaining
    };
    // three terminal rows per axis need three jerks to be met
    let at_rest = !truncated && n >= 3;
    let nv = 3 * n;
    let slack = |k: usize| 2 * n + k - 1;

    let (a, b) = discrete_dynamics(dt);
    // a_pow[k] = A^k, ab[k] = A^k B
    let mut a_pow = Vec::with_capacity(n + 1);
    let mut ab = Vec::with_capacity(n);
    a_pow.push(Matrix3::identity());
    for k in 0..n {
        ab.push(a_pow[k] * b);
        a_pow.push(a * a_pow[k]);
    }

    let zmp_row = RowVector3::new(1.0, 0.0, -height / GRAVITY);
    let x0 = [initial.axis(0), initial.axis(1)];

    // zmp_k = free[axis][k-1] + pu.row(k-1) * u_axis
    let mut pu = DMatrix::zeros(n, n);
    let mut free = [DVector::zeros(n), DVector::zeros(n)];
    for k in 1..=n {
        for j in 0..k {
            pu[(k - 1, j)] = (zmp_row * ab[k - 1 - j])[0];
        }
        for axis in 0..2 {
            free[axis][k - 1] = (zmp_row * a_pow[k] * x0[axis])[0];
        }
    }

    // times[k] is node k, times[0] the splice point
    let times: Vec<f64> = (0..=n).map(|k| (k as f64).mul_add(dt, t0)).collect();
    let references: Vec<Vector2<f64>> = times[1..]
        .iter()
        .map(|&t| zmp_reference(supports, t))
        .collect();

    let mut qp = QuadraticProgram::new(nv);
    for axis in 0..2 {
        let mut jacobian = DMatrix::zeros(n, nv);
        jacobian.view_mut((0, axis * n), (n, n)).copy_from(&pu);
        let target = DVector::from_iterator(n, (0..n).map(|k| references[k][axis] - free[axis][k]));
        qp.add_least_squares(&jacobian, &target, params.zmp_reference_weight);
    }
    qp.add_regularization(params.jerk_weight);
    qp.add_linear(2 * n..nv, ZMP_SLACK_WEIGHT);

    // The ZMP moves continuously, so node k must sit in every support met
    // between nodes k - 1 and k + 1.
    let mut rows: Vec<f64> = Vec::new();
    let mut bounds: Vec<f64> = Vec::new();
    for k in 1..=n {
        let from = support_index(supports, times[k - 1] + TIME_EPSILON);
        let to = if k < n {
            support_index(supports, times[k + 1] - TIME_EPSILON)
        } else {
            support_index(supports, times[k])
        };
        for support in &supports[from..=to] {
            for plane in half_planes(&support.polygon(params.zmp_margin)) {
                let mut row = vec![0.0; nv];
                for j in 0..k {
                    row[j] = plane.normal.x * pu[(k - 1, j)];
                    row[n + j] = plane.normal.y * pu[(k - 1, j)];
                }
                row[slack(k)] = -1.0;
                rows.extend(row);
                bounds.push(
                    plane.offset - plane.normal.x * free[0][k - 1] - plane.normal.y * free[1][k - 1],
                );
            }
        }
        let mut row = vec![0.0; nv];
        row[slack(k)] = -1.0;
        rows.extend(row);
        bounds.push(0.0);
    }
    qp.add_inequalities(
        DMatrix::from_row_slice(bounds.len(), nv, &rows),
        DVector::from_vec(bounds),
    );

    // Terminal state: row `selector * x_N` as a function of u_axis.
    let terminal = |selector: RowVector3<f64>, axis: usize| -> (Vec<f64>, f64) {
        let mut row = vec![0.0; nv];
        for j in 0..n {
            row[axis * n + j] = (selector * ab[n - 1 - j])[0];
        }
        (row, (selector * a_pow[n] * x0[axis])[0])
    };
    let mut eq_rows: Vec<f64> = Vec::new();
    let mut eq_values: Vec<f64> = Vec::new();
    for axis in 0..2 {
        let targets: Vec<(RowVector3<f64>, f64)> = if at_rest {
            let centre = last.centre();
            vec![
                (RowVector3::new(1.0, 0.0, 0.0), centre[axis]),
                (RowVector3::new(0.0, 1.0, 0.0), 0.0),
                (RowVector3::new(0.0, 0.0, 1.0), 0.0),
            ]
        } else {
            vec![(RowVector3::new(1.0, 1.0 / omega, 0.0), references[n - 1][axis])]
        };
        for (selector, value) in targets {
            let (row, offset) = terminal(selector, axis);
            eq_rows.extend(row);
            eq_values.push(value - offset);
        }
    }
    qp.add_equalities(
        DMatrix::from_row_slice(eq_values.len(), nv, &eq_rows),
        DVector::from_vec(eq_values),
    );

    let solution = qp.solve(settings)?;

    let mut nodes = Vec::with_capacity(n + 1);
    let mut jerks = Vec::with_capacity(n);
    let mut state = x0;
    nodes.push(ComState::from_axes(&state[0], &state[1]));
    for k in 0..n {
        let u = Vector2::new(solution[k], solution[n + k]);
        for axis in 0..2 {
            state[axis] = a * state[axis] + b * u[axis];
        }
        jerks.push(u);
        nodes.push(ComState::from_axes(&state[0], &state[1]));
    }

    Ok(ComTrajectory {
        t_start: t0,
        dt,
        height,
        nodes,
        jerks,
    })
}
