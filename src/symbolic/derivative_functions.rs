#![allow(non_camel_case_types)]

use crate::symbolic::derivative_error::DerivativeError;
use crate::symbolic::derivative_wrapper::Derivative;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
///
/// symbolic jacobian of a vector of functions and its evaluation
/// Example#
/// ```
/// use SymDiffGraph::symbolic::derivative_functions::Jacobian;
/// use SymDiffGraph::symbolic::derivative_wrapper::Derivative;
/// use nalgebra::DVector;
///     let x = Derivative::Variable(0);
///     let y = Derivative::Variable(1);
///     // function of 2 arguments
///     let vec_of_functions = vec![&x * &x + &y * &y - 10.0, &x - &y - 4.0];
///     let mut Jacobian_instance = Jacobian::from_vectors(vec_of_functions, 2).unwrap();
///     // calculate symbolic jacobian
///     Jacobian_instance.calc_jacobian();
///     // transform into human readable form
///     Jacobian_instance.readable_jacobian();
///     println!("Jacobian_instance: readable {:?}.", Jacobian_instance.readable_jacobian);
///     // evaluate jacobian and functions to nalgebra format
///     let point = DVector::from_vec(vec![10.0, 2.0]);
///     Jacobian_instance.evaluate_func_jacobian_DMatrix(&point).unwrap();
///     Jacobian_instance.evaluate_funvector_DVector(&point).unwrap();
///     assert_eq!(Jacobian_instance.evaluated_jacobian_DMatrix[(0, 0)], 20.0);
///     assert_eq!(Jacobian_instance.evaluated_functions_DVector[1], 4.0);
/// ```
pub struct Jacobian {
    pub vector_of_functions: Vec<Derivative>, // vector of functions
    pub number_of_variables: usize,           // functions depend on x[0..number_of_variables]
    pub symbolic_jacobian: Vec<Vec<Derivative>>, // symbolic_jacobian[f][x] = df/dx
    pub readable_jacobian: Vec<Vec<String>>,  // human readable jacobian
    pub evaluated_jacobian_DMatrix: DMatrix<f64>, // numerical jacobian at the last point
    pub evaluated_functions_DVector: DVector<f64>, // numerical functions at the last point
}

impl Jacobian {
    /// Rejects an empty function list or zero variables.
    pub fn from_vectors(
        vector_of_functions: Vec<Derivative>,
        number_of_variables: usize,
    ) -> Result<Self, DerivativeError> {
        if vector_of_functions.is_empty() {
            return Err(DerivativeError::EmptySystem("no functions given".to_string()));
        }
        if number_of_variables == 0 {
            return Err(DerivativeError::EmptySystem("no variables given".to_string()));
        }
        let n_f = vector_of_functions.len();
        Ok(Self {
            vector_of_functions,
            number_of_variables,
            symbolic_jacobian: Vec::new(),
            readable_jacobian: Vec::new(),
            evaluated_jacobian_DMatrix: DMatrix::zeros(n_f, number_of_variables),
            evaluated_functions_DVector: DVector::zeros(n_f),
        })
    }

    /// fills symbolic_jacobian[f][x] = f.diff_partial(x)
    pub fn calc_jacobian(&mut self) {
        self.symbolic_jacobian = self
            .vector_of_functions
            .iter()
            .map(|f| gradient(f, self.number_of_variables))
            .collect();
        info!(
            "symbolic jacobian {}x{} calculated",
            self.vector_of_functions.len(),
            self.number_of_variables
        );
    }

    pub fn readable_jacobian(&mut self) {
        self.readable_jacobian = self
            .symbolic_jacobian
            .iter()
            .map(|row| row.iter().map(|df| df.to_string()).collect())
            .collect();
    }

    /// evaluate the (i, j) element at x, just for control; needs `calc_jacobian` first
    pub fn calc_ij_element(&self, i: usize, j: usize, x: &DVector<f64>) -> Result<f64, DerivativeError> {
        let row = self
            .symbolic_jacobian
            .get(i)
            .ok_or(DerivativeError::IndexOutOfRange {
                index: i,
                len: self.symbolic_jacobian.len(),
            })?;
        let element = row.get(j).ok_or(DerivativeError::IndexOutOfRange {
            index: j,
            len: row.len(),
        })?;
        element.call(x)
    }

    pub fn evaluate_func_jacobian_DMatrix(&mut self, x: &DVector<f64>) -> Result<(), DerivativeError> {
        self.check_point(x)?;
        if self.symbolic_jacobian.is_empty() {
            self.calc_jacobian();
        }
        self.evaluated_jacobian_DMatrix = evaluate_matrix(&self.symbolic_jacobian, x)?;
        Ok(())
    }

    pub fn evaluate_funvector_DVector(&mut self, x: &DVector<f64>) -> Result<(), DerivativeError> {
        self.check_point(x)?;
        self.evaluated_functions_DVector = evaluate_vector(&self.vector_of_functions, x)?;
        Ok(())
    }

    fn check_point(&self, x: &DVector<f64>) -> Result<(), DerivativeError> {
        if x.len() != self.number_of_variables {
            return Err(DerivativeError::DimensionMismatch {
                expected: self.number_of_variables,
                found: x.len(),
            });
        }
        Ok(())
    }
}

//___________________________________GRADIENT AND HESSIAN____________________________________

/// [df/dx0, ..., df/dx(n-1)]
pub fn gradient(f: &Derivative, number_of_variables: usize) -> Vec<Derivative> {
    (0..number_of_variables).map(|j| f.diff_partial(j)).collect()
}

/// hessian[i][j] = d2f/dxi dxj, obtained by differentiating the gradient once more.
/// Thanks to the memo caches, the first derivatives are computed only once.
pub fn hessian(f: &Derivative, number_of_variables: usize) -> Vec<Vec<Derivative>> {
    let hessian: Vec<Vec<Derivative>> = gradient(f, number_of_variables)
        .iter()
        .map(|df| gradient(df, number_of_variables))
        .collect();
    debug!("symbolic hessian {0}x{0} calculated", number_of_variables);
    hessian
}

pub fn evaluate_vector(functions: &[Derivative], x: &DVector<f64>) -> Result<DVector<f64>, DerivativeError> {
    let values = functions
        .iter()
        .map(|f| f.call(x))
        .collect::<Result<Vec<f64>, DerivativeError>>()?;
    Ok(DVector::from_vec(values))
}

pub fn evaluate_matrix(
    matrix: &[Vec<Derivative>],
    x: &DVector<f64>,
) -> Result<DMatrix<f64>, DerivativeError> {
    let n_rows = matrix.len();
    let n_cols = matrix.first().map_or(0, |row| row.len());
    let mut evaluated = DMatrix::zeros(n_rows, n_cols);
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != n_cols {
            return Err(DerivativeError::DimensionMismatch {
                expected: n_cols,
                found: row.len(),
            });
        }
        for (j, element) in row.iter().enumerate() {
            evaluated[(i, j)] = element.call(x)?;
        }
    }
    Ok(evaluated)
}

pub fn evaluate_gradient(f: &Derivative, x: &DVector<f64>) -> Result<DVector<f64>, DerivativeError> {
    evaluate_vector(&gradient(f, x.len()), x)
}

pub fn evaluate_hessian(f: &Derivative, x: &DVector<f64>) -> Result<DMatrix<f64>, DerivativeError> {
    evaluate_matrix(&hessian(f, x.len()), x)
}
