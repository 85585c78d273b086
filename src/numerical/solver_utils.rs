//! Pieces shared by the nonlinear solvers: logger set up, statistics output and sanity checks
//! of evaluated matrices.
use crate::Utils::logger::init_logger;
use crate::numerical::solver_config::SolverParams;
use crate::numerical::solver_error::SolverError;
use log::info;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use tabled::{builder::Builder, settings::Style};

/// Runs `solver` with the global logger installed at the level from `params`.
/// With loglevel "off"/"none" the logger is left alone.
pub fn run_with_logging<T, F>(params: &SolverParams, solver: F) -> Result<T, SolverError>
where
    F: FnOnce() -> Result<T, SolverError>,
{
    match params.level_filter()? {
        None => solver(),
        Some(level) => {
            // an already installed logger stays in place
            let _ = init_logger(level, None);
            info!("\n \n Program started with loglevel: {}", level);
            let res = solver();
            info!("\n \n Program ended");
            res
        }
    }
}

/// Renders name/value pairs as a table.
pub fn statistics_table(stats: &BTreeMap<String, String>) -> String {
    let mut builder = Builder::default();
    builder.push_record(["statistic".to_string(), "value".to_string()]);
    for (name, value) in stats {
        builder.push_record([name.clone(), value.clone()]);
    }
    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.to_string()
}

/// Linear algebra on NaN or infinite entries never converges, so such points are rejected.
pub fn check_finite(jac: &DMatrix<f64>, residual: &DVector<f64>) -> Result<(), SolverError> {
    if jac.iter().any(|x| !x.is_finite()) {
        return Err(SolverError::LinearSolve(
            "jacobian contains non-finite values".to_string(),
        ));
    }
    if residual.iter().any(|x| !x.is_finite()) {
        return Err(SolverError::LinearSolve(
            "residual contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_table() {
        let mut stats = BTreeMap::new();
        stats.insert("number of iterations".to_string(), "5".to_string());
        stats.insert("number of variables".to_string(), "3".to_string());
        let table = statistics_table(&stats);
        assert!(table.contains("number of iterations"));
        assert!(table.contains("number of variables"));
        assert!(table.contains('5'));
    }

    #[test]
    fn test_check_finite() {
        let jac = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let r = DVector::from_vec(vec![0.5]);
        assert!(check_finite(&jac, &r).is_ok());
        let bad_jac = DMatrix::from_row_slice(1, 2, &[f64::NAN, 2.0]);
        assert!(matches!(
            check_finite(&bad_jac, &r),
            Err(SolverError::LinearSolve(_))
        ));
        let bad_r = DVector::from_vec(vec![f64::INFINITY]);
        assert!(check_finite(&jac, &bad_r).is_err());
    }

    #[test]
    fn test_run_without_logging() {
        let mut params = SolverParams::default();
        params.loglevel = Some("off".to_string());
        let res = run_with_logging(&params, || Ok(42));
        assert_eq!(res.unwrap(), 42);
        params.loglevel = Some("loud".to_string());
        let res: Result<i32, SolverError> = run_with_logging(&params, || Ok(1));
        assert!(matches!(res, Err(SolverError::InvalidConfig(_))));
    }
}
