//! # Per-branch nesting stack.
//!
//! A [`BranchContext`] is the private state of one execution branch: the
//! chain of steps currently open on it, innermost last, on top of a root
//! sentinel. The top frame is the branch's *active function*, the default
//! parent for anything opened next.
//!
//! ```text
//!  top ──► [ fn2  (parent fn1)  ]   ◄── active function
//!          [ fn1  (parent base) ]
//!          [ base (parent root) ]
//!  bottom  [ root sentinel      ]   never popped
//! ```
//!
//! ## Rules
//! - `push_local` makes a frame the new top.
//! - `pop_local(id)` removes `id` wherever it is; removing the top restores
//!   the previous active function. An absent `id` is a no-op.
//! - `fork` produces a value copy with a fresh [`BranchId`]; nothing is shared
//!   afterwards.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::events::FunctionAncestry;

/// Identifier and name of the default root sentinel.
pub const ROOT_ID: &str = "root";

static BRANCH_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(u64);

impl BranchId {
    fn next() -> Self {
        BranchId(BRANCH_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch-{}", self.0)
    }
}

/// Ordered stack of open steps for one branch.
#[derive(Debug, Clone)]
pub struct BranchContext {
    id: BranchId,
    /// `frames[0]` is the root sentinel.
    frames: Vec<FunctionAncestry>,
}

impl BranchContext {
    /// A branch holding only the default `"root"` sentinel.
    pub fn root() -> Self {
        Self::with_root(FunctionAncestry {
            function_id: Arc::from(ROOT_ID),
            function_name: Arc::from(ROOT_ID),
            parent_id: None,
            parent_name: None,
        })
    }

    /// A branch whose root sentinel is `active`.
    ///
    /// Drivers use this to attribute top-level steps to a named invocation.
    pub fn with_root(active: FunctionAncestry) -> Self {
        Self {
            id: BranchId::next(),
            frames: vec![active],
        }
    }

    #[inline]
    pub fn id(&self) -> BranchId {
        self.id
    }

    /// Current top of the stack (root sentinel when nothing is open).
    #[inline]
    pub fn active_function(&self) -> &FunctionAncestry {
        // frames is never empty: the sentinel is never popped
        &self.frames[self.frames.len() - 1]
    }

    /// Identifier of the current top.
    #[inline]
    pub fn active_span_id(&self) -> &str {
        &self.active_function().function_id
    }

    /// Number of open steps on this branch (the sentinel is not counted).
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Open step identifiers, outermost first.
    pub fn open_ids(&self) -> impl Iterator<Item = &str> {
        self.frames[1..].iter().map(|f| &*f.function_id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.open_ids().any(|open| open == id)
    }

    /// Makes `frame` the new active function.
    pub fn push_local(&mut self, frame: FunctionAncestry) {
        self.frames.push(frame);
    }

    /// Removes `id` from this branch.
    ///
    /// Returns `false` when the branch never held `id` (closed from another
    /// branch); the stack is left untouched in that case.
    pub fn pop_local(&mut self, id: &str) -> bool {
        match self.frames[1..].iter().rposition(|f| &*f.function_id == id) {
            Some(pos) => {
                self.frames.remove(pos + 1);
                true
            }
            None => false,
        }
    }

    /// Snapshot copy for a new concurrent branch.
    pub fn fork(&self) -> Self {
        Self {
            id: BranchId::next(),
            frames: self.frames.clone(),
        }
    }

    /// Innermost frame for which `is_open` holds, falling back to the sentinel.
    ///
    /// Does not modify the stack.
    pub(crate) fn innermost_open(&self, is_open: impl Fn(&str) -> bool) -> &FunctionAncestry {
        self.frames[1..]
            .iter()
            .rev()
            .find(|f| is_open(&f.function_id))
            .unwrap_or(&self.frames[0])
    }

    /// Pops top frames for which `is_open` is false. Returns how many were dropped.
    ///
    /// Frames below the first still-open one are left alone.
    pub(crate) fn prune_closed(&mut self, is_open: impl Fn(&str) -> bool) -> usize {
        let mut dropped = 0;
        while self.frames.len() > 1 {
            let top = &self.frames[self.frames.len() - 1];
            if is_open(&top.function_id) {
                break;
            }
            self.frames.pop();
            dropped += 1;
        }
        dropped
    }
}

impl Default for BranchContext {
    fn default() -> Self {
        Self::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: &str, parent: &str) -> FunctionAncestry {
        FunctionAncestry {
            function_id: Arc::from(id),
            function_name: Arc::from(id),
            parent_id: Some(Arc::from(parent)),
            parent_name: Some(Arc::from(parent)),
        }
    }

    fn ids(b: &BranchContext) -> Vec<&str> {
        b.open_ids().collect()
    }

    #[test]
    fn test_root_sentinel() {
        let b = BranchContext::root();
        assert_eq!(b.depth(), 0);
        assert_eq!(b.active_span_id(), "root");
        assert!(b.active_function().parent_id.is_none());
    }

    #[test]
    fn test_pop_top_restores_previous_active() {
        let mut b = BranchContext::root();
        b.push_local(frame("fn1", "root"));
        b.push_local(frame("fn2", "fn1"));
        assert_eq!(b.active_span_id(), "fn2");

        assert!(b.pop_local("fn2"));
        assert_eq!(b.active_span_id(), "fn1");
        assert!(b.pop_local("fn1"));
        assert_eq!(b.active_span_id(), "root");
    }

    #[test]
    fn test_pop_out_of_order_keeps_upper_frames() {
        let mut b = BranchContext::root();
        b.push_local(frame("a", "root"));
        b.push_local(frame("b", "a"));
        b.push_local(frame("c", "b"));

        assert!(b.pop_local("b"));
        assert_eq!(ids(&b), vec!["a", "c"]);
        assert_eq!(b.active_span_id(), "c");
    }

    #[test]
    fn test_pop_absent_is_noop() {
        let mut b = BranchContext::root();
        b.push_local(frame("a", "root"));
        assert!(!b.pop_local("zzz"));
        assert!(!b.pop_local("root"));
        assert_eq!(ids(&b), vec!["a"]);
    }

    #[test]
    fn test_fork_is_independent_copy() {
        let mut parent = BranchContext::root();
        parent.push_local(frame("base", "root"));

        let mut child = parent.fork();
        assert_ne!(child.id(), parent.id());
        assert_eq!(child.active_span_id(), "base");

        child.push_local(frame("a1", "base"));
        parent.pop_local("base");

        assert_eq!(ids(&child), vec!["base", "a1"]);
        assert_eq!(parent.depth(), 0);
    }

    #[test]
    fn test_prune_closed_stops_at_first_open() {
        let mut b = BranchContext::root();
        b.push_local(frame("base", "root"));
        b.push_local(frame("main", "base"));
        b.push_local(frame("inner", "main"));

        let open = |id: &str| id == "base" || id == "inner";
        assert_eq!(b.innermost_open(open).function_id.as_ref(), "inner");

        let open = |id: &str| id == "base";
        assert_eq!(b.innermost_open(open).function_id.as_ref(), "base");
        assert_eq!(b.depth(), 3);

        assert_eq!(b.prune_closed(open), 2);
        assert_eq!(ids(&b), vec!["base"]);

        assert_eq!(b.prune_closed(|_| false), 1);
        assert_eq!(b.active_span_id(), "root");
    }
}
