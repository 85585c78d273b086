//! # Derivative Node Module
//!
//! The expression graph itself: a closed set of node kinds, numeric evaluation of a node
//! at an input coordinate vector, and fully parenthesized printing.
//!
//! ## Main Structures
//! - `NodeKind` - the kinds of expression a node can hold (Constant, Variable, Linear,
//!   Add, Sub, Multiply, Divide, Pow, Exp, Log). Each variant carries only its own
//!   immediate children.
//! - `DerivativeNode` - one immutable unit of the graph: a `NodeKind` plus the memo cache of
//!   partial derivatives already computed for it (see `derivative_engine`).
//! - `NodeRef` - shared reference to a node. Several parents (and handles) may point at the
//!   same node, but since a node can only reference nodes that existed before it, the graph
//!   is always a DAG.
//!
//! ## Evaluation
//! `call` recurses over the children and returns `Result<f64, DerivativeError>`: a variable
//! index (or a Linear coefficient vector) reaching past the end of the input vector is
//! reported, not read out of bounds. Floating point singularities (x/0, ln of a negative
//! number) are NOT errors, inf/NaN simply propagate upward.
//!
//! Shared subexpressions are evaluated once per appearance: the input changes between calls,
//! so there is nothing safe to cache.
//!
//! ## Recursion depth
//! Every traversal here is recursive, so the stack depth equals the depth of the expression.
//! A product chain over N variables recurses N levels deep.

use crate::symbolic::derivative_error::DerivativeError;
use nalgebra::DVector;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use strum_macros::{Display, EnumDiscriminants, EnumIter};

/// Shared owning reference to a node of the graph.
pub type NodeRef = Rc<DerivativeNode>;

/// Closed set of expression kinds.
///
/// `NodeTag` (generated by strum) is the field-less twin of this enum, used for statistics
/// and logging.
#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(NodeTag), derive(Display, EnumIter, Hash, PartialOrd, Ord))]
pub enum NodeKind {
    /// numerical constant
    Constant(f64),
    /// coordinate `x[index]` of the input vector
    Variable(usize),
    /// dot product of fixed coefficients with the input vector
    Linear(DVector<f64>),
    /// left + right
    Add(NodeRef, NodeRef),
    /// left - right
    Sub(NodeRef, NodeRef),
    /// left * right
    Multiply(NodeRef, NodeRef),
    /// left / right
    Divide(NodeRef, NodeRef),
    /// base ^ exponent, the exponent is a plain number
    Pow(NodeRef, f64),
    /// e^operand
    Exp(NodeRef),
    /// natural logarithm of the operand
    Log(NodeRef),
}

/// One immutable node of the expression graph.
///
/// `kind` is fixed at construction. `dp_map` caches the partial derivative node already
/// computed for each coordinate index; it only ever grows.
pub struct DerivativeNode {
    kind: NodeKind,
    pub(crate) dp_map: RefCell<HashMap<usize, NodeRef>>,
}

impl DerivativeNode {
    pub fn new(kind: NodeKind) -> NodeRef {
        Rc::new(DerivativeNode {
            kind,
            dp_map: RefCell::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tag(&self) -> NodeTag {
        NodeTag::from(&self.kind)
    }

    /// true only for a Constant whose value equals `c` up to `f64::MIN_POSITIVE`,
    /// which in practice means exact equality.
    pub fn is_constant(&self, c: f64) -> bool {
        match self.kind {
            NodeKind::Constant(a) => (a - c).abs() < f64::MIN_POSITIVE,
            _ => false,
        }
    }

    /// number of partial derivatives memoized on this node so far
    pub fn cached_partials(&self) -> usize {
        self.dp_map.borrow().len()
    }

    //___________________________________EVALUATION____________________________________

    /// Evaluates the node at the point `x`.
    pub fn call(&self, x: &DVector<f64>) -> Result<f64, DerivativeError> {
        self.call_slice(x.as_slice())
    }

    /// Same as `call` but takes a plain slice.
    pub fn call_slice(&self, x: &[f64]) -> Result<f64, DerivativeError> {
        match &self.kind {
            NodeKind::Constant(a) => Ok(*a),
            NodeKind::Variable(ind) => x.get(*ind).copied().ok_or(DerivativeError::IndexOutOfRange {
                index: *ind,
                len: x.len(),
            }),
            NodeKind::Linear(v) => {
                if v.len() > x.len() {
                    return Err(DerivativeError::CoefficientsExceedInput {
                        coefficients: v.len(),
                        len: x.len(),
                    });
                }
                Ok(v.iter().zip(x.iter()).map(|(vi, xi)| vi * xi).sum())
            }
            NodeKind::Add(a, b) => Ok(a.call_slice(x)? + b.call_slice(x)?),
            NodeKind::Sub(a, b) => Ok(a.call_slice(x)? - b.call_slice(x)?),
            NodeKind::Multiply(a, b) => Ok(a.call_slice(x)? * b.call_slice(x)?),
            // x/0 is not guarded: inf or NaN flows upward like any other value
            NodeKind::Divide(a, b) => Ok(a.call_slice(x)? / b.call_slice(x)?),
            NodeKind::Pow(a, p) => Ok(a.call_slice(x)?.powf(*p)),
            NodeKind::Exp(a) => Ok(a.call_slice(x)?.exp()),
            NodeKind::Log(a) => Ok(a.call_slice(x)?.ln()),
        }
    }

    //___________________________________GRAPH INSPECTION____________________________________

    /// Immediate children of the node, in order.
    pub fn children(&self) -> Vec<&NodeRef> {
        match &self.kind {
            NodeKind::Constant(_) | NodeKind::Variable(_) | NodeKind::Linear(_) => Vec::new(),
            NodeKind::Add(a, b)
            | NodeKind::Sub(a, b)
            | NodeKind::Multiply(a, b)
            | NodeKind::Divide(a, b) => vec![a, b],
            NodeKind::Pow(a, _) | NodeKind::Exp(a) | NodeKind::Log(a) => vec![a],
        }
    }

    /// Visits every distinct node reachable from `self` once, shared nodes included only once.
    fn visit_distinct<'a>(
        &'a self,
        seen: &mut HashSet<*const DerivativeNode>,
        f: &mut dyn FnMut(&'a DerivativeNode),
    ) {
        if !seen.insert(self as *const DerivativeNode) {
            return;
        }
        f(self);
        for child in self.children() {
            child.visit_distinct(seen, f);
        }
    }

    /// Number of distinct nodes in the DAG rooted here.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit_distinct(&mut HashSet::new(), &mut |_: &DerivativeNode| count += 1);
        count
    }

    /// Minimal length of an input vector that `call` accepts: largest reachable variable
    /// index (or Linear coefficient count) plus one. 0 for constant expressions.
    pub fn required_len(&self) -> usize {
        let mut len = 0;
        self.visit_distinct(&mut HashSet::new(), &mut |node: &DerivativeNode| {
            let needed = match &node.kind {
                NodeKind::Variable(ind) => ind + 1,
                NodeKind::Linear(v) => v.len(),
                _ => 0,
            };
            len = len.max(needed);
        });
        len
    }

    /// Count of distinct nodes of each kind in the DAG rooted here.
    pub fn kind_statistics(&self) -> HashMap<NodeTag, usize> {
        let mut stats = HashMap::new();
        self.visit_distinct(&mut HashSet::new(), &mut |node: &DerivativeNode| {
            *stats.entry(node.tag()).or_insert(0) += 1;
        });
        stats
    }
}

/// Fully parenthesized rendering, operator precedence never has to be inferred.
impl fmt::Display for DerivativeNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            NodeKind::Constant(a) => write!(f, "{}", a),
            NodeKind::Variable(ind) => write!(f, "x[{}]", ind),
            NodeKind::Linear(v) => {
                if v.is_empty() {
                    return write!(f, "(0)");
                }
                let terms: Vec<String> = v
                    .iter()
                    .enumerate()
                    .map(|(i, vi)| format!("{}*x[{}]", vi, i))
                    .collect();
                write!(f, "({})", terms.join(" + "))
            }
            NodeKind::Add(a, b) => write!(f, "({} + {})", a, b),
            NodeKind::Sub(a, b) => write!(f, "({} - {})", a, b),
            NodeKind::Multiply(a, b) => write!(f, "({} * {})", a, b),
            NodeKind::Divide(a, b) => write!(f, "({} / {})", a, b),
            NodeKind::Pow(a, p) => write!(f, "({}**{})", a, p),
            NodeKind::Exp(a) => write!(f, "Exp({})", a),
            NodeKind::Log(a) => write!(f, "Log({})", a),
        }
    }
}

/// Structural equality of the expressions, caches are ignored. Shared subgraphs compare
/// by address first, so comparing a DAG with itself is immediate.
impl PartialEq for DerivativeNode {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.kind == other.kind
    }
}

impl fmt::Debug for DerivativeNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DerivativeNode")
            .field("kind", &self.kind)
            .field("cached_partials", &self.cached_partials())
            .finish()
    }
}
