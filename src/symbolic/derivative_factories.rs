//! # Simplifying factories
//!
//! Every node of the graph is built here. The binary constructors fold the trivial
//! zero/one identities at construction time and hand back an existing operand (the same
//! `Rc`, not a copy) whenever they can:
//!
//! | factory      | folds                                   |
//! |--------------|-----------------------------------------|
//! | `add`        | `a + 0 -> a`, `0 + b -> b`              |
//! | `sub`        | `a - 0 -> a`                            |
//! | `multiply`   | `0 * b -> 0`, `a * 0 -> 0`, `1 * b -> b`, `a * 1 -> a` |
//! | `divide`     | `0 / b -> 0`, `a / 1 -> a`              |
//!
//! Without this, every product/quotient rule application doubles the tree, and repeated
//! differentiation blows up exponentially.
//!
//! "is zero" / "is one" is `DerivativeNode::is_constant`, i.e. literal equality. Nothing
//! else is simplified: no constant folding of two constants, no reordering, no `x - x`.
//! `pow`, `exp` and `log` never reduce.

use crate::symbolic::derivative_node::{DerivativeNode, NodeKind, NodeRef};
use nalgebra::DVector;
use std::rc::Rc;

//___________________________________LEAVES____________________________________

pub fn constant(a: f64) -> NodeRef {
    DerivativeNode::new(NodeKind::Constant(a))
}

pub fn variable(ind: usize) -> NodeRef {
    DerivativeNode::new(NodeKind::Variable(ind))
}

/// F(x) = v·x
pub fn linear(v: DVector<f64>) -> NodeRef {
    DerivativeNode::new(NodeKind::Linear(v))
}

//___________________________________BINARY____________________________________

pub fn add(a: &NodeRef, b: &NodeRef) -> NodeRef {
    if b.is_constant(0.0) {
        return Rc::clone(a);
    }
    if a.is_constant(0.0) {
        return Rc::clone(b);
    }
    DerivativeNode::new(NodeKind::Add(Rc::clone(a), Rc::clone(b)))
}

pub fn sub(a: &NodeRef, b: &NodeRef) -> NodeRef {
    if b.is_constant(0.0) {
        return Rc::clone(a);
    }
    DerivativeNode::new(NodeKind::Sub(Rc::clone(a), Rc::clone(b)))
}

pub fn multiply(a: &NodeRef, b: &NodeRef) -> NodeRef {
    if a.is_constant(0.0) || b.is_constant(0.0) {
        return constant(0.0);
    }
    if a.is_constant(1.0) {
        return Rc::clone(b);
    }
    if b.is_constant(1.0) {
        return Rc::clone(a);
    }
    DerivativeNode::new(NodeKind::Multiply(Rc::clone(a), Rc::clone(b)))
}

pub fn divide(a: &NodeRef, b: &NodeRef) -> NodeRef {
    if a.is_constant(0.0) {
        return constant(0.0);
    }
    if b.is_constant(1.0) {
        return Rc::clone(a);
    }
    DerivativeNode::new(NodeKind::Divide(Rc::clone(a), Rc::clone(b)))
}

//___________________________________UNARY____________________________________

pub fn pow(a: &NodeRef, p: f64) -> NodeRef {
    DerivativeNode::new(NodeKind::Pow(Rc::clone(a), p))
}

pub fn exp(a: &NodeRef) -> NodeRef {
    DerivativeNode::new(NodeKind::Exp(Rc::clone(a)))
}

pub fn log(a: &NodeRef) -> NodeRef {
    DerivativeNode::new(NodeKind::Log(Rc::clone(a)))
}
