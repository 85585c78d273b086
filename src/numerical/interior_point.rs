//! Primal-dual interior point method for
//! ```text
//!     min f(x)   subject to   h(x) >= 0
//! ```
//! with slacks w (h(x) = w, w > 0) and multipliers y. The barrier Lagrangian is
//! ```text
//!     L(x, y, w) = f(x) - mu Σ ln w_k - yᵀ (h(x) - w)
//! ```
//! Every iteration takes a Newton step on the KKT conditions of L:
//! ```text
//!     | -H̃   Aᵀ     | |dx|   | ∇f - Aᵀy       |
//!     |  A   W Y⁻¹  | |dy| = | -h + mu Y⁻¹ e  |
//!     dw = mu Y⁻¹ e - W e - Y⁻¹ W dy
//! ```
//! where A = ∇h, H = ∇²f - Σ y_k ∇²h_k and H̃ is H shifted along the identity until it is
//! positive definite. Gradients and hessians are symbolic, built once in `new`.
//!
//! The problem may be non-convex, so the point found is a KKT point that depends on the
//! initial guess.
//! Example#
//! ```
//! use SymDiffGraph::numerical::interior_point::InteriorPoint;
//! use SymDiffGraph::symbolic::derivative_wrapper::Derivative;
//! use nalgebra::DVector;
//!     // min x + y  subject to  xx + yy >= 1, x >= 0, y >= 0
//!     let x = Derivative::Variable(0);
//!     let y = Derivative::Variable(1);
//!     let objective = &x + &y;
//!     let constraints = vec![&x * &x + &y * &y - 1.0, x.clone(), y.clone()];
//!     let mut IPM_instance =
//!         InteriorPoint::new(objective, constraints, DVector::from_vec(vec![2.0, 1.0])).unwrap();
//!     IPM_instance.set_solver_params(Some(1e-3), None, None, Some("off".to_string())).unwrap();
//!     let solution = IPM_instance.solve().unwrap();
//!     assert!((solution[0] - 1.0).abs() < 1e-3 && solution[1].abs() < 1e-3);
//! ```
use crate::numerical::gauss_newton::check_arguments;
use crate::numerical::solver_config::SolverParams;
use crate::numerical::solver_error::SolverError;
use crate::numerical::solver_utils::{check_finite, run_with_logging, statistics_table};
use crate::symbolic::derivative_functions::{
    Jacobian, evaluate_matrix, evaluate_vector, gradient, hessian,
};
use crate::symbolic::derivative_wrapper::Derivative;
use log::{debug, error, info, warn};
use nalgebra::{Cholesky, DMatrix, DVector};
use std::collections::BTreeMap;
use std::time::Instant;

/// width of the bisection bracket for the positive definite shift
const SHIFT_TOLERANCE: f64 = 1e-4;

pub struct InteriorPoint {
    pub objective: Derivative,
    pub constraints: Jacobian, // h(x) >= 0 and its jacobian A = ∇h
    objective_gradient: Vec<Derivative>,
    objective_hessian: Vec<Vec<Derivative>>,
    constraint_hessians: Vec<Vec<Vec<Derivative>>>,
    pub initial_guess: DVector<f64>,
    pub params: SolverParams,
    pub i: usize,                     // iteration counter
    pub error: f64,                   // norm of the last dx
    pub multipliers: DVector<f64>,    // y
    pub slacks: DVector<f64>,         // w
    pub result: Option<DVector<f64>>,
}

impl InteriorPoint {
    pub fn new(
        objective: Derivative,
        constraints: Vec<Derivative>,
        initial_guess: DVector<f64>,
    ) -> Result<Self, SolverError> {
        let n = initial_guess.len();
        check_arguments(std::slice::from_ref(&objective), n)?;
        check_arguments(&constraints, n)?;
        let constraint_hessians = constraints.iter().map(|h| hessian(h, n)).collect();
        let m = constraints.len();
        let constraints = Jacobian::from_vectors(constraints, n)?;
        Ok(InteriorPoint {
            objective_gradient: gradient(&objective, n),
            objective_hessian: hessian(&objective, n),
            objective,
            constraints,
            constraint_hessians,
            initial_guess,
            params: SolverParams::default(),
            i: 0,
            error: f64::INFINITY,
            multipliers: DVector::zeros(m),
            slacks: DVector::zeros(m),
            result: None,
        })
    }

    pub fn with_params(mut self, params: SolverParams) -> Result<Self, SolverError> {
        params.validate()?;
        self.params = params;
        Ok(self)
    }

    /// `None` keeps the current value of a parameter
    pub fn set_solver_params(
        &mut self,
        tolerance: Option<f64>,
        max_iterations: Option<usize>,
        barrier: Option<f64>,
        loglevel: Option<String>,
    ) -> Result<(), SolverError> {
        let mut params = self.params.clone();
        if let Some(mu) = barrier {
            params.barrier = mu;
        }
        params.set_solver_params(tolerance, max_iterations, None, loglevel)?;
        self.params = params;
        Ok(())
    }

    /// f(x) - mu Σ ln w - yᵀ(h(x) - w); NaN while some slack is not positive
    pub fn lagrangian(
        &self,
        x: &DVector<f64>,
        y: &DVector<f64>,
        w: &DVector<f64>,
    ) -> Result<f64, SolverError> {
        let f = self.objective.call(x)?;
        let h = evaluate_vector(&self.constraints.vector_of_functions, x)?;
        let barrier: f64 = w.iter().map(|wk| wk.ln()).sum();
        Ok(f - self.params.barrier * barrier - y.dot(&(h - w)))
    }

    /// least squares multipliers: y = (Aᵀ)⁺ ∇f
    fn initial_multipliers(&mut self, x: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        self.constraints.evaluate_func_jacobian_DMatrix(x)?;
        let grad_f = evaluate_vector(&self.objective_gradient, x)?;
        let at = self.constraints.evaluated_jacobian_DMatrix.transpose();
        check_finite(&at, &grad_f)?;
        let pinv = at
            .pseudo_inverse(self.params.pinv_eps)
            .map_err(|e| SolverError::LinearSolve(e.to_string()))?;
        Ok(pinv * grad_f)
    }

    /// ∇²f - Σ y_k ∇²h_k at x
    fn hessian_of_lagrangian(
        &self,
        x: &DVector<f64>,
        y: &DVector<f64>,
    ) -> Result<DMatrix<f64>, SolverError> {
        let mut hess = evaluate_matrix(&self.objective_hessian, x)?;
        for (yk, hk) in y.iter().zip(self.constraint_hessians.iter()) {
            hess -= evaluate_matrix(hk, x)? * *yk;
        }
        Ok(hess)
    }

    /// Newton step (dx, dy, dw) on the KKT system at (x, y, w).
    pub fn step(
        &mut self,
        x: &DVector<f64>,
        y: &DVector<f64>,
        w: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>), SolverError> {
        let n = self.constraints.number_of_variables;
        let m = self.constraints.vector_of_functions.len();
        let mu = self.params.barrier;

        self.constraints.evaluate_func_jacobian_DMatrix(x)?;
        self.constraints.evaluate_funvector_DVector(x)?;
        let grad_f = evaluate_vector(&self.objective_gradient, x)?;
        let hess = make_positive_semidefinite(self.hessian_of_lagrangian(x, y)?);
        let a = &self.constraints.evaluated_jacobian_DMatrix;
        let h = &self.constraints.evaluated_functions_DVector;
        let inv_y = y.map(|yk| 1.0 / yk);

        let mut kkt = DMatrix::<f64>::zeros(n + m, n + m);
        kkt.view_mut((0, 0), (n, n)).copy_from(&(-hess));
        kkt.view_mut((0, n), (n, m)).copy_from(&a.transpose());
        kkt.view_mut((n, 0), (m, n)).copy_from(a);
        for k in 0..m {
            kkt[(n + k, n + k)] = w[k] * inv_y[k];
        }
        let top = grad_f - a.transpose() * y;
        let bottom = inv_y.map(|iy| mu * iy) - h;
        let rhs = DVector::from_iterator(n + m, top.iter().chain(bottom.iter()).copied());
        check_finite(&kkt, &rhs)?;

        let dxy = kkt
            .lu()
            .solve(&rhs)
            .ok_or_else(|| SolverError::LinearSolve("KKT matrix is singular".to_string()))?;
        let dx = dxy.rows(0, n).into_owned();
        let dy = dxy.rows(n, m).into_owned();
        let dw = DVector::from_fn(m, |k, _| {
            mu * inv_y[k] - w[k] - inv_y[k] * w[k] * dy[k]
        });
        Ok((dx, dy, dw))
    }

    /// iterates until the norm of dx drops below tolerance
    pub fn main_loop(&mut self) -> Result<DVector<f64>, SolverError> {
        self.i = 0;
        self.error = f64::INFINITY;
        let mut x = self.initial_guess.clone();
        self.result = Some(x.clone());
        if self.constraints.symbolic_jacobian.is_empty() {
            self.constraints.calc_jacobian();
        }
        let mut w = evaluate_vector(&self.constraints.vector_of_functions, &x)?;
        if w.iter().any(|wk| *wk < 0.0) {
            warn!("initial guess violates the constraints, h(x) = {}", w.transpose());
        }
        let mut y = self.initial_multipliers(&x)?;
        debug!("initial multipliers {}", y.transpose());
        while self.i < self.params.max_iterations {
            let (dx, dy, dw) = self.step(&x, &y, &w)?;
            x += &dx;
            y += &dy;
            w += &dw;
            self.error = dx.norm();
            self.i += 1;
            self.result = Some(x.clone());
            self.multipliers = y.clone();
            self.slacks = w.clone();
            info!(
                "iteration = {}, error = {}, lagrangian = {}",
                self.i,
                self.error,
                self.lagrangian(&x, &y, &w)?
            );
            if self.error <= self.params.tolerance {
                return Ok(x);
            }
        }
        error!("Maximum number of iterations reached. No solution found.");
        Err(SolverError::MaxIterationsReached(self.params.max_iterations))
    }

    pub fn solve(&mut self) -> Result<DVector<f64>, SolverError> {
        let params = self.params.clone();
        run_with_logging(&params, || {
            let begin = Instant::now();
            let res = self.main_loop();
            self.calc_statistics(begin.elapsed().as_millis());
            res
        })
    }

    pub fn get_result(&self) -> Option<DVector<f64>> {
        self.result.clone()
    }

    fn calc_statistics(&self, elapsed_ms: u128) {
        let mut stats = BTreeMap::new();
        stats.insert("time elapsed, ms".to_string(), elapsed_ms.to_string());
        stats.insert("number of iterations".to_string(), self.i.to_string());
        stats.insert(
            "number of constraints".to_string(),
            self.constraints.vector_of_functions.len().to_string(),
        );
        stats.insert(
            "number of variables".to_string(),
            self.constraints.number_of_variables.to_string(),
        );
        stats.insert("last step norm".to_string(), format!("{:e}", self.error));
        info!("\n \n CALC STATISTICS \n \n {}", statistics_table(&stats));
    }
}

/// Returns mat + λI with the smallest λ >= 0 (up to SHIFT_TOLERANCE, found by bisection) for
/// which the Cholesky factorization succeeds. The upper end of the bracket is the Gershgorin
/// bound plus one, which is always positive definite.
pub fn make_positive_semidefinite(mat: DMatrix<f64>) -> DMatrix<f64> {
    let dim = mat.nrows();
    let gershgorin = (0..dim)
        .map(|i| {
            let off_diagonal: f64 = (0..dim)
                .filter(|j| *j != i)
                .map(|j| mat[(i, j)].abs())
                .sum();
            off_diagonal - mat[(i, i)]
        })
        .fold(0.0_f64, f64::max);
    let identity = DMatrix::<f64>::identity(dim, dim);
    let (mut left, mut right) = (0.0, gershgorin + 1.0);
    while right - left >= SHIFT_TOLERANCE {
        let mid = (left + right) / 2.0;
        if Cholesky::new(&mat + &identity * mid).is_none() {
            left = mid;
        } else {
            right = mid;
        }
    }
    mat + identity * right
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::derivative_error::DerivativeError;
    use approx::assert_relative_eq;

    // min x + y subject to xx + yy >= 1, x >= 0, y >= 0
    fn quarter_disc_problem(start: [f64; 2]) -> InteriorPoint {
        let x = Derivative::Variable(0);
        let y = Derivative::Variable(1);
        let objective = &x + &y;
        let constraints = vec![&x * &x + &y * &y - 1.0, x.clone(), y.clone()];
        let mut ipm =
            InteriorPoint::new(objective, constraints, DVector::from_vec(start.to_vec())).unwrap();
        ipm.set_solver_params(Some(1e-3), Some(100), None, Some("off".to_string()))
            .unwrap();
        ipm
    }

    #[test]
    fn test_converges_to_axis_point() {
        let mut ipm = quarter_disc_problem([2.0, 1.0]);
        let solution = ipm.solve().unwrap();
        assert_relative_eq!(solution[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(solution[1], 0.0, epsilon = 1e-3);
        // the circle and y >= 0 are active, their multipliers carry the objective
        assert_relative_eq!(ipm.multipliers[0], 0.5, epsilon = 1e-2);
        assert_relative_eq!(ipm.multipliers[2], 1.0, epsilon = 1e-2);
        assert!(ipm.i > 1);

        let mut mirrored = quarter_disc_problem([1.0, 2.0]);
        let solution = mirrored.solve().unwrap();
        assert_relative_eq!(solution[0], 0.0, epsilon = 1e-3);
        assert_relative_eq!(solution[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_symmetric_start_reaches_a_kkt_point() {
        let kkt_points = [
            [0.5_f64.sqrt(), 0.5_f64.sqrt()],
            [1.0, 0.0],
            [0.0, 1.0],
        ];
        for start in [[1.0, 1.0], [0.5, 0.5], [0.2, 0.7], [4.0, -1.0]] {
            let mut ipm = quarter_disc_problem(start);
            let solution = ipm.main_loop().unwrap();
            let distance = kkt_points
                .iter()
                .map(|p| ((solution[0] - p[0]).powi(2) + (solution[1] - p[1]).powi(2)).sqrt())
                .fold(f64::INFINITY, f64::min);
            assert!(distance < 2e-3, "start {:?} ended at {}", start, solution);
            let radius = solution[0] * solution[0] + solution[1] * solution[1];
            assert!(radius > 1.0 - 1e-3);
        }
    }

    #[test]
    fn test_lagrangian() {
        let ipm = quarter_disc_problem([1.0, 1.0]);
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 1.0, 1.0]);
        // h(x) = w = (1, 1, 1): no barrier and no constraint term
        assert_relative_eq!(ipm.lagrangian(&x, &y, &y).unwrap(), 2.0, epsilon = 1e-14);
        let w = DVector::from_vec(vec![0.5, 1.0, 1.0]);
        let expected = 2.0 - 1e-4 * 0.5_f64.ln() - 0.5;
        assert_relative_eq!(ipm.lagrangian(&x, &y, &w).unwrap(), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_make_positive_semidefinite() {
        let indefinite = DMatrix::from_row_slice(2, 2, &[-2.0, 0.0, 0.0, 1.0]);
        let shifted = make_positive_semidefinite(indefinite.clone());
        let shift = shifted[(0, 0)] - indefinite[(0, 0)];
        assert!(shift > 2.0 && shift <= 2.0 + SHIFT_TOLERANCE, "shift {}", shift);
        assert_eq!(shifted[(0, 1)], 0.0);
        assert!(Cholesky::new(shifted).is_some());

        let definite = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let shifted = make_positive_semidefinite(definite.clone());
        assert!((shifted - definite).abs().max() <= SHIFT_TOLERANCE);

        // large off-diagonal entries with a positive minimum coefficient
        let coupled = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        assert!(Cholesky::new(make_positive_semidefinite(coupled)).is_some());
    }

    #[test]
    fn test_rejects_bad_problems() {
        let x = Derivative::Variable(0);
        assert!(matches!(
            InteriorPoint::new(x.clone(), Vec::new(), DVector::from_vec(vec![1.0])),
            Err(SolverError::Derivative(DerivativeError::EmptySystem(_)))
        ));
        assert!(matches!(
            InteriorPoint::new(Derivative::Variable(3), vec![x], DVector::from_vec(vec![1.0])),
            Err(SolverError::Derivative(DerivativeError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_zero_multiplier_is_reported() {
        // the objective does not depend on x, so the initial multiplier is 0
        let x = Derivative::Variable(0);
        let mut ipm = InteriorPoint::new(Derivative::Constant(1.0), vec![x], DVector::from_vec(vec![1.0]))
            .unwrap();
        ipm.set_solver_params(None, None, None, Some("off".to_string()))
            .unwrap();
        assert!(matches!(ipm.solve(), Err(SolverError::LinearSolve(_))));
    }
}
