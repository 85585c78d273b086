//! # Differentiation engine
//!
//! Exact partial derivatives of a node with respect to one coordinate, by the classic
//! rules, with memoization on the node:
//!
//! - Constant `c`           -> 0
//! - Variable `x_i`         -> 1 if i == index, else 0
//! - Linear `v·x`           -> `v[index]` (0 past the end of `v`)
//! - `a + b`, `a - b`       -> `a' + b'`, `a' - b'`
//! - `a * b`                -> `a' * b + b' * a`                 (product rule)
//! - `a / b`                -> `(a' * b - b' * a) / (b * b)`     (quotient rule)
//! - `a ** p`               -> `p * a ** (p - 1)`                (simple power rule, see below)
//! - `Exp(a)`               -> `a' * Exp(a)`                     (chain rule)
//! - `Log(a)`               -> `a' / a`                          (chain rule)
//!
//! All composites are built through `derivative_factories`, so zero/one terms vanish as
//! soon as they appear.
//!
//! ## Memoization
//! The first `diff_partial(index)` on a node computes the rule and stores the result in the
//! node's `dp_map`; every later call with the same index returns that very node. Entries are
//! never replaced: nodes are immutable, so a cached derivative stays valid forever. Handles
//! sharing a node share its cache.
//!
//! ## Power rule limitation
//! `Pow(a, p)` differentiates as if `a` were the coordinate itself and does NOT multiply by
//! `a'`. For `a = x_i` this is exact; for `Pow` over a composite base (or with respect to a
//! coordinate `a` does not depend on) the result is wrong unless the caller chains `a'`
//! by hand, e.g. `pow(&u, p).diff_partial(i) * u.diff_partial(i)`.

use crate::symbolic::derivative_factories::{add, constant, divide, exp, multiply, pow, sub};
use crate::symbolic::derivative_node::{DerivativeNode, NodeKind, NodeRef};
use log::trace;
use std::rc::Rc;

impl DerivativeNode {
    /// Partial derivative with respect to `x[index]`, memoized per (node, index).
    pub fn diff_partial(self: &Rc<Self>, index: usize) -> NodeRef {
        if let Some(cached) = self.dp_map.borrow().get(&index) {
            return Rc::clone(cached);
        }
        // the graph has no cycles, so computing the rule never re-enters this node's cache
        let partial = self.calc_partial(index);
        trace!("d/dx[{}] of {} node computed", index, self.tag());
        Rc::clone(
            self.dp_map
                .borrow_mut()
                .entry(index)
                .or_insert(partial),
        )
    }

    /// The per-kind rule, no cache lookup.
    fn calc_partial(self: &Rc<Self>, index: usize) -> NodeRef {
        match self.kind() {
            NodeKind::Constant(_) => constant(0.0),
            NodeKind::Variable(ind) => constant(if *ind == index { 1.0 } else { 0.0 }),
            NodeKind::Linear(v) => constant(v.get(index).copied().unwrap_or(0.0)),
            NodeKind::Add(a, b) => add(&a.diff_partial(index), &b.diff_partial(index)),
            NodeKind::Sub(a, b) => sub(&a.diff_partial(index), &b.diff_partial(index)),
            NodeKind::Multiply(a, b) => {
                let da = a.diff_partial(index);
                let db = b.diff_partial(index);
                add(&multiply(&da, b), &multiply(&db, a))
            }
            NodeKind::Divide(a, b) => {
                let da = a.diff_partial(index);
                let db = b.diff_partial(index);
                let numerator = sub(&multiply(&da, b), &multiply(&db, a));
                divide(&numerator, &multiply(b, b))
            }
            NodeKind::Pow(a, p) => multiply(&constant(*p), &pow(a, p - 1.0)),
            // a fresh Exp node: caching `self` in its own dp_map would be an Rc cycle
            NodeKind::Exp(a) => multiply(&a.diff_partial(index), &exp(a)),
            NodeKind::Log(a) => divide(&a.diff_partial(index), a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::derivative_factories::{linear, log, variable};
    use crate::symbolic::derivative_node::NodeTag;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    #[test]
    fn test_leaf_rules() {
        assert!(constant(5.0).diff_partial(0).is_constant(0.0));
        for i in 0..4 {
            for j in 0..4 {
                let d = variable(j).diff_partial(i);
                assert!(d.is_constant(if i == j { 1.0 } else { 0.0 }));
            }
        }
        let lin = linear(DVector::from_vec(vec![3.0, 4.0]));
        assert!(lin.diff_partial(0).is_constant(3.0));
        assert!(lin.diff_partial(1).is_constant(4.0));
        assert!(lin.diff_partial(7).is_constant(0.0));
    }

    #[test]
    fn test_memoization_returns_identical_node() {
        let x = variable(0);
        let y = variable(1);
        let f = multiply(&x, &y);
        assert_eq!(f.cached_partials(), 0);
        let first = f.diff_partial(0);
        let second = f.diff_partial(0);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(f.cached_partials(), 1);
        f.diff_partial(1);
        f.diff_partial(1);
        assert_eq!(f.cached_partials(), 2);
        // children were differentiated once per index as well
        assert_eq!(x.cached_partials(), 2);
    }

    #[test]
    fn test_product_rule_shape() {
        let x = variable(0);
        let y = variable(1);
        // d/dx (x*y) = 1*y + 0*x -> y
        let d = multiply(&x, &y).diff_partial(0);
        assert!(Rc::ptr_eq(&d, &y));
        let d = multiply(&x, &x).diff_partial(0);
        assert_eq!(d.to_string(), "(x[0] + x[0])");
    }

    #[test]
    fn test_quotient_rule() {
        let x = variable(0);
        let one = constant(1.0);
        let h = divide(&one, &add(&multiply(&x, &x), &one));
        let dh = h.diff_partial(0);
        assert_relative_eq!(dh.call_slice(&[3.0]).unwrap(), -0.06, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_rule_builds_a_new_node() {
        let x = variable(0);
        let e = exp(&x);
        let d = e.diff_partial(0);
        assert_eq!(d.tag(), NodeTag::Exp);
        assert!(!Rc::ptr_eq(&d, &e));
        assert_relative_eq!(d.call_slice(&[1.5]).unwrap(), 1.5_f64.exp(), epsilon = 1e-12);
        assert!(e.diff_partial(1).is_constant(0.0));
    }

    #[test]
    fn test_differentiated_exp_is_freed() {
        let x = variable(0);
        let e = exp(&x);
        let weak = Rc::downgrade(&e);
        let d = e.diff_partial(0);
        drop(d);
        drop(e);
        assert!(weak.upgrade().is_none());

        let e = exp(&multiply(&x, &x));
        let weak = Rc::downgrade(&e);
        let weak_inner = match e.kind() {
            NodeKind::Exp(a) => Rc::downgrade(a),
            _ => unreachable!(),
        };
        let dd = e.diff_partial(0).diff_partial(0);
        assert_relative_eq!(
            dd.call_slice(&[1.0]).unwrap(),
            6.0 * 1.0_f64.exp(),
            epsilon = 1e-12
        );
        drop(dd);
        drop(e);
        assert!(weak.upgrade().is_none());
        assert!(weak_inner.upgrade().is_none());
        // the shared leaf is still owned by this test
        assert_eq!(Rc::strong_count(&x), 1);
    }

    #[test]
    fn test_log_rule() {
        let x = variable(0);
        let d = log(&multiply(&x, &x)).diff_partial(0);
        assert_eq!(d.tag(), NodeTag::Divide);
        assert_relative_eq!(d.call_slice(&[4.0]).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_pow_rule_ignores_inner_derivative() {
        let x = variable(0);
        let y = variable(1);
        // d/dx y^3 under the simple rule is 3*y^2, not 0
        let d = pow(&y, 3.0).diff_partial(0);
        assert_relative_eq!(d.call_slice(&[1.0, 2.0]).unwrap(), 12.0, epsilon = 1e-12);
        let d = pow(&x, 3.0).diff_partial(0);
        assert_relative_eq!(d.call_slice(&[2.0, 0.0]).unwrap(), 12.0, epsilon = 1e-12);
    }
}
