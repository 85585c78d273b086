#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
//! # Symbolic partial derivatives
//! Expressions in the variables x[0], x[1], ... are stored as a shared graph of nodes.
//! Every node differentiates itself symbolically and remembers the result per variable
//! index, so repeated and higher order derivatives reuse what was already built.
//!# Example#
//! ```
//! use SymDiffGraph::symbolic::derivative_wrapper::{Derivative, exp};
//! let x = Derivative::Variable(0);
//! let y = Derivative::Variable(1);
//! let f = exp(&(&x * &y)) + 3.0 * &x;
//! let df_dx = f.diff_partial(0);
//! println!("f = {}, df/dx = {}", f, df_dx);
//! assert_eq!(df_dx.call_slice(&[0.0, 2.0]).unwrap(), 5.0);
//! ```
/// error type of the expression graph
pub mod derivative_error;
/// node kinds, evaluation, printing and statistics of the graph
pub mod derivative_node;
/// constructors that fold trivial arithmetic while building nodes
pub mod derivative_factories;
/// memoized partial differentiation
pub mod derivative_engine;
/// `Derivative` handle with arithmetic operators
pub mod derivative_wrapper;
/// jacobian, gradient and hessian of expressions
pub mod derivative_functions;
