//! Dense quadratic programs solved with Clarabel.
//!
//! ```text
//! minimize    1/2 x' P x + q' x
//! subject to  A_eq x  = b_eq
//!             A_in x <= b_in
//! ```
//!
//! Blocks are assembled as `nalgebra` dense matrices and converted to
//! compressed sparse columns right before solving.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};

/// QP failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QpError {
    /// The problem could not be handed to the solver.
    #[error("QP setup failed: {0}")]
    Setup(String),

    /// The solver terminated without a usable solution.
    #[error("QP not solved: {status}")]
    NotSolved { status: String },

    /// The solver reported success but returned NaN or infinite values.
    #[error("QP solution is not finite")]
    NonFinite,
}

/// Solver knobs shared by the IK and CoM problems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QpSettings {
    pub max_iter: u32,
    pub tolerance: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-8,
        }
    }
}

/// A dense QP under construction.
#[derive(Debug, Clone)]
pub struct QuadraticProgram {
    hessian: DMatrix<f64>,
    gradient: DVector<f64>,
    equalities: Vec<(DMatrix<f64>, DVector<f64>)>,
    inequalities: Vec<(DMatrix<f64>, DVector<f64>)>,
}

impl QuadraticProgram {
    /// An empty problem over `n` variables.
    pub fn new(n: usize) -> Self {
        Self {
            hessian: DMatrix::zeros(n, n),
            gradient: DVector::zeros(n),
            equalities: Vec::new(),
            inequalities: Vec::new(),
        }
    }

    /// Number of decision variables.
    pub fn dim(&self) -> usize {
        self.gradient.len()
    }

    /// Add `weight * ||J x - e||^2` to the cost.
    pub fn add_least_squares(&mut self, jacobian: &DMatrix<f64>, target: &DVector<f64>, weight: f64) {
        debug_assert_eq!(jacobian.ncols(), self.dim());
        let jt = jacobian.transpose();
        self.hessian += (&jt * jacobian) * weight;
        self.gradient -= (&jt * target) * weight;
    }

    /// Add `weight * ||x||^2` to the cost.
    pub fn add_regularization(&mut self, weight: f64) {
        for i in 0..self.dim() {
            self.hessian[(i, i)] += weight;
        }
    }

    /// Add `weight * x_i` to the cost for every index in `indices`.
    pub fn add_linear(&mut self, indices: std::ops::Range<usize>, weight: f64) {
        debug_assert!(indices.end <= self.dim());
        for i in indices {
            self.gradient[i] += weight;
        }
    }

    /// Require `A x = b`.
    pub fn add_equalities(&mut self, a: DMatrix<f64>, b: DVector<f64>) {
        debug_assert_eq!(a.nrows(), b.len());
        if a.nrows() > 0 {
            self.equalities.push((a, b));
        }
    }

    /// Require `A x <= b`.
    pub fn add_inequalities(&mut self, a: DMatrix<f64>, b: DVector<f64>) {
        debug_assert_eq!(a.nrows(), b.len());
        if a.nrows() > 0 {
            self.inequalities.push((a, b));
        }
    }

    pub fn num_equalities(&self) -> usize {
        self.equalities.iter().map(|(a, _)| a.nrows()).sum()
    }

    pub fn num_inequalities(&self) -> usize {
        self.inequalities.iter().map(|(a, _)| a.nrows()).sum()
    }

    /// Solve the problem.
    pub fn solve(&self, settings: &QpSettings) -> Result<DVector<f64>, QpError> {
        let n = self.dim();
        let n_eq = self.num_equalities();
        let n_ineq = self.num_inequalities();

        if n_eq + n_ineq == 0 {
            return self.solve_unconstrained();
        }

        let mut a_all = DMatrix::zeros(n_eq + n_ineq, n);
        let mut b_all = DVector::zeros(n_eq + n_ineq);
        let mut row = 0;
        for (a, b) in self.equalities.iter().chain(&self.inequalities) {
            a_all.view_mut((row, 0), (a.nrows(), n)).copy_from(a);
            b_all.rows_mut(row, b.len()).copy_from(b);
            row += a.nrows();
        }

        let p_csc = dmatrix_to_csc_upper_tri(&self.hessian);
        let a_csc = dmatrix_to_csc(&a_all);

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if n_eq > 0 {
            cones.push(ZeroConeT(n_eq));
        }
        if n_ineq > 0 {
            cones.push(NonnegativeConeT(n_ineq));
        }

        let settings = DefaultSettingsBuilder::default()
            .max_iter(settings.max_iter)
            .verbose(false)
            .tol_gap_abs(settings.tolerance)
            .tol_gap_rel(settings.tolerance)
            .tol_feas(settings.tolerance)
            .build()
            .map_err(|e| QpError::Setup(e.to_string()))?;

        let q_slice: Vec<f64> = self.gradient.iter().copied().collect();
        let b_slice: Vec<f64> = b_all.iter().copied().collect();

        let mut solver = DefaultSolver::new(&p_csc, &q_slice, &a_csc, &b_slice, &cones, settings)
            .map_err(|e| QpError::Setup(format!("{e:?}")))?;
        solver.solve();
        let sol = &solver.solution;

        if !matches!(sol.status, SolverStatus::Solved | SolverStatus::AlmostSolved) {
            return Err(QpError::NotSolved {
                status: format!("{:?}", sol.status),
            });
        }
        let x = DVector::from_column_slice(&sol.x);
        if x.iter().all(|v| v.is_finite()) {
            Ok(x)
        } else {
            Err(QpError::NonFinite)
        }
    }

    fn solve_unconstrained(&self) -> Result<DVector<f64>, QpError> {
        let cholesky = self.hessian.clone().cholesky().ok_or_else(|| QpError::NotSolved {
            status: "hessian is not positive definite".into(),
        })?;
        let x = -cholesky.solve(&self.gradient);
        if x.iter().all(|v| v.is_finite()) {
            Ok(x)
        } else {
            Err(QpError::NonFinite)
        }
    }
}

/// Convert a nalgebra `DMatrix<f64>` to a Clarabel `CscMatrix<f64>` (full matrix).
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Upper triangle of a symmetric matrix, as Clarabel expects for `P`.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            // Symmetrise: accumulated least-squares terms may drift apart in the last bits.
            let v = 0.5 * (m[(i, j)] + m[(j, i)]);
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn unconstrained_least_squares() {
        let mut qp = QuadraticProgram::new(2);
        qp.add_least_squares(&DMatrix::identity(2, 2), &DVector::from_vec(vec![1.0, -2.0]), 1.0);
        let x = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[1], -2.0, epsilon = 1e-9);
    }

    #[test]
    fn inequality_clips_solution() {
        let mut qp = QuadraticProgram::new(1);
        qp.add_least_squares(&DMatrix::identity(1, 1), &DVector::from_element(1, 3.0), 1.0);
        qp.add_inequalities(DMatrix::identity(1, 1), DVector::from_element(1, 1.0));
        let x = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn equality_is_enforced_over_cost() {
        let mut qp = QuadraticProgram::new(2);
        qp.add_regularization(1.0);
        qp.add_equalities(
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            DVector::from_element(1, 2.0),
        );
        let x = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn contradictory_constraints_are_infeasible() {
        let mut qp = QuadraticProgram::new(1);
        qp.add_regularization(1.0);
        qp.add_equalities(DMatrix::identity(1, 1), DVector::from_element(1, 2.0));
        qp.add_inequalities(DMatrix::identity(1, 1), DVector::from_element(1, 1.0));
        assert!(matches!(
            qp.solve(&QpSettings::default()),
            Err(QpError::NotSolved { .. })
        ));
    }

    #[test]
    fn linear_penalty_keeps_slack_at_zero_when_not_needed() {
        // x tracks 3 under x - s <= 1, s >= 0; the slack is priced out
        let mut qp = QuadraticProgram::new(2);
        qp.add_least_squares(&DMatrix::from_row_slice(1, 2, &[1.0, 0.0]), &DVector::from_element(1, 3.0), 1.0);
        qp.add_regularization(1e-9);
        qp.add_linear(1..2, 1e3);
        qp.add_inequalities(
            DMatrix::from_row_slice(2, 2, &[1.0, -1.0, 0.0, -1.0]),
            DVector::from_vec(vec![1.0, 0.0]),
        );
        let x = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_blocks_are_ignored() {
        let mut qp = QuadraticProgram::new(1);
        qp.add_inequalities(DMatrix::zeros(0, 1), DVector::zeros(0));
        assert_eq!(qp.num_inequalities(), 0);
    }

    #[test]
    fn csc_upper_tri_drops_lower_half() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let csc = dmatrix_to_csc_upper_tri(&m);
        assert_eq!(csc.nzval.len(), 3);
    }
}
