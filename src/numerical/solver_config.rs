//! Solver parameters shared by the Gauss-Newton, Levenberg-Marquardt and interior point solvers.
//!
//! Parameters have defaults, can be changed with `set_solver_params` or read from a TOML
//! document:
//! ```toml
//! [solver]
//! tolerance = 1e-6
//! max_iterations = 100
//! damping = 0.01
//! pinv_eps = 1e-12
//! barrier = 1e-4
//! loglevel = "warn"
//! ```
//! Keys may also sit at the top level of the document. Missing keys keep their defaults.

use crate::numerical::solver_error::SolverError;
use simplelog::LevelFilter;

const LOGLEVELS: [&str; 6] = ["debug", "info", "warn", "error", "off", "none"];

#[derive(Debug, Clone, PartialEq)]
pub struct SolverParams {
    /// stop when the step (or residual) norm falls below this value
    pub tolerance: f64,
    pub max_iterations: usize,
    /// initial Levenberg-Marquardt damping factor mu
    pub damping: f64,
    /// singular values below this are treated as zero in the pseudo-inverse
    pub pinv_eps: f64,
    /// barrier weight of the interior point method
    pub barrier: f64,
    /// debug | info | warn | error | off | none
    pub loglevel: Option<String>,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            tolerance: 1e-4,
            max_iterations: 200,
            damping: 0.01,
            pinv_eps: 1e-12,
            barrier: 1e-4,
            loglevel: Some("info".to_string()),
        }
    }
}

impl SolverParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the given parameters, `None` keeps the current value.
    pub fn set_solver_params(
        &mut self,
        tolerance: Option<f64>,
        max_iterations: Option<usize>,
        damping: Option<f64>,
        loglevel: Option<String>,
    ) -> Result<(), SolverError> {
        let mut updated = self.clone();
        if let Some(tolerance) = tolerance {
            updated.tolerance = tolerance;
        }
        if let Some(max_iterations) = max_iterations {
            updated.max_iterations = max_iterations;
        }
        if let Some(damping) = damping {
            updated.damping = damping;
        }
        if let Some(level) = loglevel {
            updated.loglevel = Some(level.to_lowercase());
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "tolerance should be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidConfig(
                "max_iterations should be a positive number".to_string(),
            ));
        }
        if !(self.damping.is_finite() && self.damping > 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "damping should be a positive number, got {}",
                self.damping
            )));
        }
        if !(self.pinv_eps.is_finite() && self.pinv_eps >= 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "pinv_eps should be a non-negative number, got {}",
                self.pinv_eps
            )));
        }
        if !(self.barrier.is_finite() && self.barrier > 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "barrier should be a positive number, got {}",
                self.barrier
            )));
        }
        self.level_filter()?;
        Ok(())
    }

    /// `None` when logging is switched off.
    pub fn level_filter(&self) -> Result<Option<LevelFilter>, SolverError> {
        match self.loglevel.as_deref() {
            None => Ok(Some(LevelFilter::Info)),
            Some(level) => parse_loglevel(level),
        }
    }

    /// Reads parameters from a TOML document, see the module docs for the layout.
    pub fn from_toml_str(input: &str) -> Result<Self, SolverError> {
        let document: toml::Table = input.parse()?;
        let table = match document.get("solver") {
            Some(toml::Value::Table(solver)) => solver,
            Some(_) => {
                return Err(SolverError::InvalidConfig(
                    "`solver` should be a table".to_string(),
                ));
            }
            None => &document,
        };
        let mut params = SolverParams::default();
        if let Some(value) = table.get("tolerance") {
            params.tolerance = toml_float("tolerance", value)?;
        }
        if let Some(value) = table.get("max_iterations") {
            let max_iterations = value.as_integer().ok_or_else(|| {
                SolverError::InvalidConfig("max_iterations should be an integer".to_string())
            })?;
            params.max_iterations = usize::try_from(max_iterations).map_err(|_| {
                SolverError::InvalidConfig(format!(
                    "max_iterations should be a positive number, got {}",
                    max_iterations
                ))
            })?;
        }
        if let Some(value) = table.get("damping") {
            params.damping = toml_float("damping", value)?;
        }
        if let Some(value) = table.get("pinv_eps") {
            params.pinv_eps = toml_float("pinv_eps", value)?;
        }
        if let Some(value) = table.get("barrier") {
            params.barrier = toml_float("barrier", value)?;
        }
        if let Some(value) = table.get("loglevel") {
            let level = value.as_str().ok_or_else(|| {
                SolverError::InvalidConfig("loglevel should be a string".to_string())
            })?;
            params.loglevel = Some(level.to_lowercase());
        }
        params.validate()?;
        Ok(params)
    }
}

fn toml_float(key: &str, value: &toml::Value) -> Result<f64, SolverError> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
        .ok_or_else(|| SolverError::InvalidConfig(format!("{} should be a number", key)))
}

/// "off"/"none" switch logging off.
pub fn parse_loglevel(level: &str) -> Result<Option<LevelFilter>, SolverError> {
    match level.to_lowercase().as_str() {
        "debug" => Ok(Some(LevelFilter::Debug)),
        "info" => Ok(Some(LevelFilter::Info)),
        "warn" => Ok(Some(LevelFilter::Warn)),
        "error" => Ok(Some(LevelFilter::Error)),
        "off" | "none" => Ok(None),
        other => Err(SolverError::InvalidConfig(format!(
            "loglevel must be one of {:?}, got {}",
            LOGLEVELS, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = SolverParams::new();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_iterations, 200);
        assert_eq!(params.level_filter().unwrap(), Some(LevelFilter::Info));
    }

    #[test]
    fn test_set_solver_params() {
        let mut params = SolverParams::default();
        params
            .set_solver_params(Some(1e-8), Some(50), None, Some("OFF".to_string()))
            .unwrap();
        assert_eq!(params.tolerance, 1e-8);
        assert_eq!(params.max_iterations, 50);
        assert_eq!(params.damping, 0.01);
        assert_eq!(params.level_filter().unwrap(), None);
    }

    #[test]
    fn test_invalid_params_leave_state_untouched() {
        let mut params = SolverParams::default();
        assert!(matches!(
            params.set_solver_params(Some(-1.0), None, None, None),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(params.set_solver_params(None, Some(0), None, None).is_err());
        assert!(params
            .set_solver_params(None, None, None, Some("verbose".to_string()))
            .is_err());
        assert_eq!(params, SolverParams::default());
    }

    #[test]
    fn test_from_toml_solver_table() {
        let params = SolverParams::from_toml_str(
            r#"
            [solver]
            tolerance = 1e-6
            max_iterations = 100
            damping = 1
            loglevel = "warn"
            "#,
        )
        .unwrap();
        assert_eq!(params.tolerance, 1e-6);
        assert_eq!(params.max_iterations, 100);
        assert_eq!(params.damping, 1.0);
        assert_eq!(params.pinv_eps, 1e-12);
        assert_eq!(params.barrier, 1e-4);
        assert_eq!(params.level_filter().unwrap(), Some(LevelFilter::Warn));
    }

    #[test]
    fn test_from_toml_top_level_keys() {
        let params = SolverParams::from_toml_str("max_iterations = 7").unwrap();
        assert_eq!(params.max_iterations, 7);
        assert_eq!(params.tolerance, 1e-4);
    }

    #[test]
    fn test_from_toml_errors() {
        assert!(matches!(
            SolverParams::from_toml_str("tolerance = "),
            Err(SolverError::ConfigParse(_))
        ));
        assert!(matches!(
            SolverParams::from_toml_str("max_iterations = -3"),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(matches!(
            SolverParams::from_toml_str("tolerance = \"small\""),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(matches!(
            SolverParams::from_toml_str("[solver]\nbarrier = 0.0"),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(matches!(
            SolverParams::from_toml_str("solver = 3"),
            Err(SolverError::InvalidConfig(_))
        ));
    }
}
