//! Levenberg-Marquardt method for systems of equations F(x) = 0.
//!
//! Each iteration solves (μI + JᵀJ) δ = Jᵀ F(x) and moves x -= δ. The damping μ starts at
//! `SolverParams::damping`, doubles when the residual norm grows and halves when it shrinks.
//! The iteration stops as soon as either the residual norm or the step norm is below
//! tolerance.
use crate::numerical::gauss_newton::check_arguments;
use crate::numerical::solver_config::SolverParams;
use crate::numerical::solver_error::SolverError;
use crate::numerical::solver_utils::{check_finite, run_with_logging, statistics_table};
use crate::symbolic::derivative_functions::Jacobian;
use crate::symbolic::derivative_wrapper::Derivative;
use log::{error, info, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use std::time::Instant;

pub struct LevenbergMarquardt {
    pub jacobian: Jacobian,
    pub initial_guess: DVector<f64>,
    pub params: SolverParams,
    pub mu: f64,                       // current damping factor
    pub i: usize,                      // iteration counter
    pub residual_norm: f64,            // ‖F(x)‖ at the last evaluated point
    pub step_norm: f64,                // ‖δ‖ of the last step
    pub result: Option<DVector<f64>>,
}

impl LevenbergMarquardt {
    pub fn new(
        functions: Vec<Derivative>,
        initial_guess: DVector<f64>,
    ) -> Result<Self, SolverError> {
        let number_of_variables = initial_guess.len();
        check_arguments(&functions, number_of_variables)?;
        let jacobian = Jacobian::from_vectors(functions, number_of_variables)?;
        let params = SolverParams::default();
        Ok(LevenbergMarquardt {
            jacobian,
            initial_guess,
            mu: params.damping,
            params,
            i: 0,
            residual_norm: f64::INFINITY,
            step_norm: f64::INFINITY,
            result: None,
        })
    }

    pub fn with_params(mut self, params: SolverParams) -> Result<Self, SolverError> {
        params.validate()?;
        self.mu = params.damping;
        self.params = params;
        Ok(self)
    }

    pub fn set_solver_params(
        &mut self,
        tolerance: Option<f64>,
        max_iterations: Option<usize>,
        damping: Option<f64>,
        loglevel: Option<String>,
    ) -> Result<(), SolverError> {
        self.params
            .set_solver_params(tolerance, max_iterations, damping, loglevel)?;
        self.mu = self.params.damping;
        Ok(())
    }

    /// Returns the step δ and the residual norm at `x`.
    pub fn step(&mut self, x: &DVector<f64>) -> Result<(DVector<f64>, f64), SolverError> {
        self.jacobian.evaluate_func_jacobian_DMatrix(x)?;
        self.jacobian.evaluate_funvector_DVector(x)?;
        let jac = &self.jacobian.evaluated_jacobian_DMatrix;
        let residual = &self.jacobian.evaluated_functions_DVector;
        check_finite(jac, residual)?;
        let n = self.jacobian.number_of_variables;
        let jt = jac.transpose();
        let lhs = DMatrix::<f64>::identity(n, n) * self.mu + &jt * jac;
        let rhs = &jt * residual;
        let delta = lhs.lu().solve(&rhs).ok_or_else(|| {
            SolverError::LinearSolve(format!("damped normal matrix is singular, mu = {}", self.mu))
        })?;
        Ok((delta, residual.norm()))
    }

    pub fn main_loop(&mut self) -> Result<DVector<f64>, SolverError> {
        self.i = 0;
        self.mu = self.params.damping;
        self.residual_norm = f64::INFINITY;
        self.step_norm = f64::INFINITY;
        let mut x = self.initial_guess.clone();
        self.result = Some(x.clone());
        if self.jacobian.symbolic_jacobian.is_empty() {
            self.jacobian.calc_jacobian();
        }
        let mut previous_norm = f64::INFINITY;
        while self.i < self.params.max_iterations {
            let (delta, residual_norm) = self.step(&x)?;
            x -= &delta;
            self.i += 1;
            self.result = Some(x.clone());
            self.residual_norm = residual_norm;
            self.step_norm = delta.norm();
            if residual_norm > previous_norm {
                warn!("Error is increasing");
                self.mu *= 2.0;
            } else if residual_norm < previous_norm {
                self.mu /= 2.0;
            }
            info!(
                "iteration = {}, residual = {}, step = {}, mu = {}",
                self.i, residual_norm, self.step_norm, self.mu
            );
            if residual_norm < self.params.tolerance || self.step_norm < self.params.tolerance {
                return Ok(x);
            }
            previous_norm = residual_norm;
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
            "number of variables".to_string(),
            self.jacobian.number_of_variables.to_string(),
        );
        stats.insert("final damping".to_string(), format!("{:e}", self.mu));
        stats.insert(
            "last residual norm".to_string(),
            format!("{:e}", self.residual_norm),
        );
        info!("\n \n CALC STATISTICS \n \n {}", statistics_table(&stats));
    }
}
