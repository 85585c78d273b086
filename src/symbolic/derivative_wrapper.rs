//! # Derivative handle
//!
//! `Derivative` is the user-facing value type. It wraps a shared reference to one node of
//! the expression graph and is cheap to clone (cloning shares the node, including its
//! derivative cache).
//!
//! A `Derivative` always holds a node: there is no empty handle, so differentiation and
//! evaluation can never run against "no expression".
//!
//! ## Building expressions
//! ```
//! use SymDiffGraph::symbolic::derivative_wrapper::{Derivative, exp, log};
//! use nalgebra::DVector;
//! let x = Derivative::Variable(0);
//! let y = Derivative::Variable(1);
//! let g = &x * &x + &x * &y + &y * &y;
//! let v = DVector::from_vec(vec![3.0, 4.0]);
//! assert_eq!(g.diff_partial(0).call(&v).unwrap(), 10.0);
//! assert_eq!(g.diff_partial(1).call(&v).unwrap(), 11.0);
//! let h = 1.0 / (&x * &x + 1.0);
//! println!("h = {}, dh/dx = {}", h, h.diff_partial(0));
//! let p = exp(&(&x * &x)) + log(&x);
//! println!("p(v) = {}", p.call(&v).unwrap());
//! ```
//! Every operator routes through the simplifying factories, so `x + 0.0` is `x` itself
//! and `x * 0.0` is the constant 0.
//!
//! ## Power rule
//! `pow(&u, p).diff_partial(i)` is `p * u^(p-1)` WITHOUT the `du/dx_i` factor. Use `pow` on
//! bare variables, or chain by hand:
//! `pow(&u, p).diff_partial(i) * u.diff_partial(i)`.

use crate::symbolic::derivative_error::DerivativeError;
use crate::symbolic::derivative_factories as factories;
use crate::symbolic::derivative_node::{DerivativeNode, NodeRef};
use nalgebra::DVector;
use num_traits::{One, Zero};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::rc::Rc;

/// Shared handle on a node of the expression graph.
#[derive(Clone, Debug)]
pub struct Derivative {
    inst: NodeRef,
}

impl Derivative {
    //___________________________________CONSTRUCTION____________________________________

    pub fn from_node(inst: NodeRef) -> Self {
        Derivative { inst }
    }

    pub fn Constant(a: f64) -> Self {
        Derivative::from_node(factories::constant(a))
    }

    /// the coordinate `x[ind]`
    pub fn Variable(ind: usize) -> Self {
        Derivative::from_node(factories::variable(ind))
    }

    /// x[0], x[1], ..., x[num_vars-1]
    pub fn Variables(num_vars: usize) -> Vec<Self> {
        (0..num_vars).map(Derivative::Variable).collect()
    }

    /// F(x) = v·x
    pub fn Linear(v: DVector<f64>) -> Self {
        Derivative::from_node(factories::linear(v))
    }

    pub fn node(&self) -> &NodeRef {
        &self.inst
    }

    /// true when both handles wrap the very same node
    pub fn ptr_eq(&self, other: &Derivative) -> bool {
        Rc::ptr_eq(&self.inst, &other.inst)
    }

    pub fn is_constant(&self, c: f64) -> bool {
        self.inst.is_constant(c)
    }

    //___________________________________UNARY FUNCTIONS____________________________________

    /// self ^ p
    pub fn pow(&self, p: f64) -> Derivative {
        Derivative::from_node(factories::pow(&self.inst, p))
    }

    pub fn exp(&self) -> Derivative {
        Derivative::from_node(factories::exp(&self.inst))
    }

    /// natural logarithm
    pub fn log(&self) -> Derivative {
        Derivative::from_node(factories::log(&self.inst))
    }

    //___________________________________DIFFERENTIATION____________________________________

    /// Exact partial derivative with respect to `x[index]`. Memoized: asking again for the
    /// same index returns a handle on the same node.
    pub fn diff_partial(&self, index: usize) -> Derivative {
        Derivative::from_node(self.inst.diff_partial(index))
    }

    //___________________________________EVALUATION____________________________________

    /// Value of the expression at `x`. `x` must be at least `required_len()` long.
    pub fn call(&self, x: &DVector<f64>) -> Result<f64, DerivativeError> {
        self.inst.call(x)
    }

    pub fn call_slice(&self, x: &[f64]) -> Result<f64, DerivativeError> {
        self.inst.call_slice(x)
    }

    /// Turns the expression into a reusable closure.
    pub fn lambdify(&self) -> impl Fn(&DVector<f64>) -> Result<f64, DerivativeError> + use<> {
        let inst = Rc::clone(&self.inst);
        move |x: &DVector<f64>| inst.call(x)
    }

    pub fn required_len(&self) -> usize {
        self.inst.required_len()
    }
}

/// exp(a) as a free function
pub fn exp(a: &Derivative) -> Derivative {
    a.exp()
}

/// ln(a) as a free function
pub fn log(a: &Derivative) -> Derivative {
    a.log()
}

/// a ^ p as a free function
pub fn pow(a: &Derivative, p: f64) -> Derivative {
    a.pow(p)
}

impl From<f64> for Derivative {
    fn from(a: f64) -> Self {
        Derivative::Constant(a)
    }
}

impl From<NodeRef> for Derivative {
    fn from(inst: NodeRef) -> Self {
        Derivative::from_node(inst)
    }
}

impl fmt::Display for Derivative {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.inst)
    }
}

/// Same expression: identical node, or structurally equal graphs.
impl PartialEq for Derivative {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.inst == *other.inst
    }
}

/// With `PartialEq`, `Zero` and `One` a `Derivative` is a nalgebra scalar, so vectors and
/// matrices of expressions support `+`, `*`, `dot`, `sum` and transposition.
impl Zero for Derivative {
    fn zero() -> Self {
        Derivative::Constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.is_constant(0.0)
    }
}

impl One for Derivative {
    fn one() -> Self {
        Derivative::Constant(1.0)
    }
}

impl AsRef<DerivativeNode> for Derivative {
    fn as_ref(&self) -> &DerivativeNode {
        &self.inst
    }
}

//___________________________________OPERATORS____________________________________

/// Implements `op` for every owned/borrowed combination of handles and for `f64` on
/// either side, always going through the factory `$factory`.
macro_rules! impl_binary_op {
    ($Trait:ident, $method:ident, $factory:path) => {
        impl $Trait<&Derivative> for &Derivative {
            type Output = Derivative;
            fn $method(self, rhs: &Derivative) -> Derivative {
                Derivative::from_node($factory(&self.inst, &rhs.inst))
            }
        }
        impl $Trait<Derivative> for Derivative {
            type Output = Derivative;
            fn $method(self, rhs: Derivative) -> Derivative {
                (&self).$method(&rhs)
            }
        }
        impl $Trait<&Derivative> for Derivative {
            type Output = Derivative;
            fn $method(self, rhs: &Derivative) -> Derivative {
                (&self).$method(rhs)
            }
        }
        impl $Trait<Derivative> for &Derivative {
            type Output = Derivative;
            fn $method(self, rhs: Derivative) -> Derivative {
                self.$method(&rhs)
            }
        }
        impl $Trait<f64> for &Derivative {
            type Output = Derivative;
            fn $method(self, rhs: f64) -> Derivative {
                self.$method(&Derivative::Constant(rhs))
            }
        }
        impl $Trait<f64> for Derivative {
            type Output = Derivative;
            fn $method(self, rhs: f64) -> Derivative {
                (&self).$method(&Derivative::Constant(rhs))
            }
        }
        impl $Trait<&Derivative> for f64 {
            type Output = Derivative;
            fn $method(self, rhs: &Derivative) -> Derivative {
                (&Derivative::Constant(self)).$method(rhs)
            }
        }
        impl $Trait<Derivative> for f64 {
            type Output = Derivative;
            fn $method(self, rhs: Derivative) -> Derivative {
                (&Derivative::Constant(self)).$method(&rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, factories::add);
impl_binary_op!(Sub, sub, factories::sub);
impl_binary_op!(Mul, mul, factories::multiply);
impl_binary_op!(Div, div, factories::divide);

macro_rules! impl_assign_op {
    ($Trait:ident, $method:ident, $factory:path) => {
        impl $Trait<&Derivative> for Derivative {
            fn $method(&mut self, rhs: &Derivative) {
                self.inst = $factory(&self.inst, &rhs.inst);
            }
        }
        impl $Trait<Derivative> for Derivative {
            fn $method(&mut self, rhs: Derivative) {
                self.inst = $factory(&self.inst, &rhs.inst);
            }
        }
        impl $Trait<f64> for Derivative {
            fn $method(&mut self, rhs: f64) {
                self.inst = $factory(&self.inst, &factories::constant(rhs));
            }
        }
    };
}

impl_assign_op!(AddAssign, add_assign, factories::add);
impl_assign_op!(SubAssign, sub_assign, factories::sub);
impl_assign_op!(MulAssign, mul_assign, factories::multiply);
impl_assign_op!(DivAssign, div_assign, factories::divide);

/// -a is built as 0 - a
impl Neg for &Derivative {
    type Output = Derivative;
    fn neg(self) -> Derivative {
        0.0 - self
    }
}

impl Neg for Derivative {
    type Output = Derivative;
    fn neg(self) -> Derivative {
        0.0 - &self
    }
}
