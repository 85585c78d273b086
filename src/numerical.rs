//! Nonlinear solvers and constrained minimization built on symbolic derivatives
/// solver parameters, defaults and TOML loading
pub mod solver_config;
pub mod solver_error;
/// logging wrapper, statistics table
pub mod solver_utils;
/// Gauss-Newton method with the pseudo-inverse of the jacobian
pub mod gauss_newton;
/// damped least squares
pub mod levenberg_marquardt;
/// primal-dual interior point method for min f(x) subject to h(x) >= 0
pub mod interior_point;
