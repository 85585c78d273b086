//! Gauss-Newton method for (possibly non-square) systems of equations F(x) = 0.
//!
//! The symbolic jacobian is built once, every iteration evaluates it together with the
//! residual and takes the step `x -= J⁺ F(x)`, where J⁺ is the Moore-Penrose pseudo-inverse.
//! Example#
//! ```
//! use SymDiffGraph::numerical::gauss_newton::GaussNewton;
//! use SymDiffGraph::symbolic::derivative_wrapper::Derivative;
//! use nalgebra::DVector;
//!     // xx + yy + zz = 2
//!     // x + y + 100z = 1
//!     let v = Derivative::Variables(3);
//!     let (x, y, z) = (&v[0], &v[1], &v[2]);
//!     let f1 = x * x + y * y + z * z - 2.0;
//!     let f2 = x + y + 100.0 * z - 1.0;
//!     let initial_guess = DVector::from_vec(vec![1.0, 1.0, 1.0]);
//!     let mut GN_instance = GaussNewton::new(vec![f1.clone(), f2.clone()], initial_guess).unwrap();
//!     GN_instance.set_solver_params(Some(1e-10), None, None, Some("off".to_string())).unwrap();
//!     let solution = GN_instance.solve().unwrap();
//!     assert!(f1.call(&solution).unwrap().abs() < 1e-8);
//!     assert!(f2.call(&solution).unwrap().abs() < 1e-8);
//! ```
use crate::numerical::solver_config::SolverParams;
use crate::numerical::solver_error::SolverError;
use crate::numerical::solver_utils::{check_finite, run_with_logging, statistics_table};
use crate::symbolic::derivative_error::DerivativeError;
use crate::symbolic::derivative_functions::Jacobian;
use crate::symbolic::derivative_wrapper::Derivative;
use log::{error, info, warn};
use nalgebra::DVector;
use std::collections::BTreeMap;
use std::time::Instant;

pub struct GaussNewton {
    pub jacobian: Jacobian,            // symbolic jacobian and its evaluations
    pub initial_guess: DVector<f64>,   // starting point
    pub params: SolverParams,          // tolerance, iteration budget, logging
    pub i: usize,                      // iteration counter
    pub error: f64,                    // norm of the last step
    pub result: Option<DVector<f64>>,  // last accepted point
}

impl GaussNewton {
    /// The number of unknowns is the length of `initial_guess`.
    pub fn new(
        functions: Vec<Derivative>,
        initial_guess: DVector<f64>,
    ) -> Result<Self, SolverError> {
        let number_of_variables = initial_guess.len();
        check_arguments(&functions, number_of_variables)?;
        let jacobian = Jacobian::from_vectors(functions, number_of_variables)?;
        Ok(GaussNewton {
            jacobian,
            initial_guess,
            params: SolverParams::default(),
            i: 0,
            error: f64::INFINITY,
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
        pinv_eps: Option<f64>,
        loglevel: Option<String>,
    ) -> Result<(), SolverError> {
        let mut params = self.params.clone();
        if let Some(eps) = pinv_eps {
            params.pinv_eps = eps;
        }
        params.set_solver_params(tolerance, max_iterations, None, loglevel)?;
        self.params = params;
        Ok(())
    }

    /// one step x -> x - J⁺(x) F(x)
    pub fn iteration(&mut self, x: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        self.jacobian.evaluate_func_jacobian_DMatrix(x)?;
        self.jacobian.evaluate_funvector_DVector(x)?;
        let jac = &self.jacobian.evaluated_jacobian_DMatrix;
        let residual = &self.jacobian.evaluated_functions_DVector;
        check_finite(jac, residual)?;
        let pinv = jac
            .clone()
            .pseudo_inverse(self.params.pinv_eps)
            .map_err(|e| SolverError::LinearSolve(e.to_string()))?;
        let delta = pinv * residual;
        Ok(x - delta)
    }

    /// iterates until the step norm drops below tolerance
    pub fn main_loop(&mut self) -> Result<DVector<f64>, SolverError> {
        self.i = 0;
        self.error = f64::INFINITY;
        let mut x = self.initial_guess.clone();
        self.result = Some(x.clone());
        if self.jacobian.symbolic_jacobian.is_empty() {
            self.jacobian.calc_jacobian();
        }
        while self.i < self.params.max_iterations {
            let new_x = self.iteration(&x)?;
            let error = (&new_x - &x).norm();
            if error > self.error && self.i > 0 {
                warn!("Error is increasing");
            }
            self.error = error;
            self.i += 1;
            self.result = Some(new_x.clone());
            info!("iteration = {}, error = {}", self.i, error);
            if error < self.params.tolerance {
                return Ok(new_x);
            }
            x = new_x;
        }
        error!("Maximum number of iterations reached. No solution found.");
        Err(SolverError::MaxIterationsReached(self.params.max_iterations))
    }

    /// main_loop wrapped in logging, followed by the statistics table
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
            "number of equations".to_string(),
            self.jacobian.vector_of_functions.len().to_string(),
        );
        stats.insert(
            "number of variables".to_string(),
            self.jacobian.number_of_variables.to_string(),
        );
        stats.insert("last step norm".to_string(), format!("{:e}", self.error));
        info!("\n \n CALC STATISTICS \n \n {}", statistics_table(&stats));
    }
}

/// every function must be evaluable on a point with `number_of_variables` coordinates
pub(crate) fn check_arguments(
    functions: &[Derivative],
    number_of_variables: usize,
) -> Result<(), DerivativeError> {
    for f in functions {
        let required = f.required_len();
        if required > number_of_variables {
            return Err(DerivativeError::DimensionMismatch {
                expected: number_of_variables,
                found: required,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::derivative_functions::evaluate_vector;
    use approx::assert_relative_eq;

    fn quiet() -> SolverParams {
        let mut params = SolverParams::default();
        params
            .set_solver_params(Some(1e-10), Some(100), None, Some("off".to_string()))
            .unwrap();
        params
    }

    #[test]
    fn test_underdetermined_system() {
        let v = Derivative::Variables(3);
        let (x, y, z) = (&v[0], &v[1], &v[2]);
        let f1 = x * x + y * y + z * z - 2.0;
        let f2 = x + y + 100.0 * z - 1.0;
        let functions = vec![f1, f2];
        let mut gn = GaussNewton::new(functions.clone(), DVector::from_vec(vec![1.0, 1.0, 1.0]))
            .unwrap()
            .with_params(quiet())
            .unwrap();
        let solution = gn.solve().unwrap();
        let residual = evaluate_vector(&functions, &solution).unwrap();
        assert!(residual.norm() < 1e-8, "residual {}", residual);
        assert!(gn.i > 1);
        assert_eq!(gn.get_result(), Some(solution));
    }

    #[test]
    fn test_square_system() {
        // x^2 + y^2 = 10, x - y = 4
        let v = Derivative::Variables(2);
        let (x, y) = (&v[0], &v[1]);
        let functions = vec![x * x + y * y - 10.0, x - y - 4.0];
        let mut gn = GaussNewton::new(functions, DVector::from_vec(vec![1.0, 1.0]))
            .unwrap()
            .with_params(quiet())
            .unwrap();
        // the first step lands on the line x - y = 4 right of both roots, so the
        // iteration runs into (3, -1) rather than (-1, 3)
        let solution = gn.main_loop().unwrap();
        assert_relative_eq!(solution[0], 3.0, epsilon = 1e-8);
        assert_relative_eq!(solution[1], -1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_iteration_budget() {
        let v = Derivative::Variables(2);
        let (x, y) = (&v[0], &v[1]);
        let functions = vec![x * x + y * y - 10.0, x - y - 4.0];
        let mut gn = GaussNewton::new(functions, DVector::from_vec(vec![1.0, 1.0])).unwrap();
        gn.set_solver_params(Some(0.0), Some(2), None, Some("off".to_string()))
            .unwrap();
        assert!(matches!(
            gn.solve(),
            Err(SolverError::MaxIterationsReached(2))
        ));
        assert_eq!(gn.i, 2);
        assert!(gn.get_result().is_some());
    }

    #[test]
    fn test_rejects_bad_systems() {
        let x = Derivative::Variable(0);
        assert!(matches!(
            GaussNewton::new(Vec::new(), DVector::from_vec(vec![1.0])),
            Err(SolverError::Derivative(DerivativeError::EmptySystem(_)))
        ));
        let far = Derivative::Variable(4);
        assert!(matches!(
            GaussNewton::new(vec![&x + &far], DVector::from_vec(vec![1.0, 2.0])),
            Err(SolverError::Derivative(DerivativeError::DimensionMismatch {
                expected: 2,
                found: 5
            }))
        ));
    }

    #[test]
    fn test_non_finite_point_stops_the_solver() {
        // log(x) at x = -1 is NaN
        let x = Derivative::Variable(0);
        let mut gn = GaussNewton::new(vec![x.log()], DVector::from_vec(vec![-1.0]))
            .unwrap()
            .with_params(quiet())
            .unwrap();
        assert!(matches!(gn.solve(), Err(SolverError::LinearSolve(_))));
    }

    #[test]
    fn test_second_run_starts_clean() {
        // log(x) = 0 converges to x = 1 from x = 2
        let x = Derivative::Variable(0);
        let mut gn = GaussNewton::new(vec![x.log()], DVector::from_vec(vec![2.0]))
            .unwrap()
            .with_params(quiet())
            .unwrap();
        let solution = gn.solve().unwrap();
        assert_relative_eq!(solution[0], 1.0, epsilon = 1e-8);
        assert!(gn.error < 1e-10);
        // the second run fails on its first evaluation and must not report the old step
        gn.initial_guess = DVector::from_vec(vec![-1.0]);
        assert!(matches!(gn.solve(), Err(SolverError::LinearSolve(_))));
        assert_eq!(gn.i, 0);
        assert!(gn.error.is_infinite());
        assert_eq!(gn.get_result(), Some(DVector::from_vec(vec![-1.0])));
    }
}
