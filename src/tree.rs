//! # Call tree reconstruction.
//!
//! Rebuilds the parent/child structure from an ordered event list, e.g. one
//! taken from a [`StepCollector`](crate::StepCollector).
//!
//! ```text
//! events: base▶ main▶ fn1▶ fn1◀ main◀ fn3▶ fn3◀ base◀
//!
//! root
//! └── base
//!     ├── main
//!     │   └── fn1
//!     └── fn3
//! ```
//!
//! ## Rules
//! - Nodes come from start events; children keep open order.
//! - A node is a root when its parent id is not among the collected steps.
//! - A step id opened twice in the list keeps its first node.
//! - Chunk and end events without a collected start are ignored.
//! - Walking and dropping a tree use explicit stacks, so depth is bounded by
//!   memory only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::events::{StepEvent, StepKind, StepState};

/// One step in a reconstructed call tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub id: Arc<str>,
    pub name: Arc<str>,
    /// Kind of the start event.
    pub kind: StepKind,
    pub parent_id: Option<Arc<str>>,
    pub started_at: SystemTime,
    /// Emission time of the end event, if one was collected.
    pub ended_at: Option<SystemTime>,
    /// Number of chunk events seen for this step.
    pub chunks: usize,
    pub children: Vec<CallNode>,
}

impl CallNode {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Total nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }

    /// Depth-first, in open order.
    fn find(&self, id: &str) -> Option<&CallNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if &*node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

impl Drop for CallNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Forest of call nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTree {
    pub roots: Vec<CallNode>,
}

impl CallTree {
    pub fn from_events(events: &[StepEvent]) -> Self {
        let mut nodes: Vec<CallNode> = Vec::new();
        let mut index: HashMap<Arc<str>, usize> = HashMap::new();

        for ev in events {
            match ev.kind().state() {
                StepState::Start => {
                    if index.contains_key(&ev.payload.id) {
                        continue;
                    }
                    index.insert(Arc::clone(&ev.payload.id), nodes.len());
                    nodes.push(CallNode {
                        id: Arc::clone(&ev.payload.id),
                        name: Arc::clone(&ev.payload.name),
                        kind: ev.kind(),
                        parent_id: ev.ancestry.parent_id.clone(),
                        started_at: ev.emitted_at,
                        ended_at: None,
                        chunks: 0,
                        children: Vec::new(),
                    });
                }
                StepState::Chunk => {
                    if let Some(&i) = index.get(ev.id()) {
                        nodes[i].chunks += 1;
                    }
                }
                StepState::End => {
                    if let Some(&i) = index.get(ev.id()) {
                        nodes[i].ended_at.get_or_insert(ev.emitted_at);
                    }
                }
            }
        }

        // parents are always opened before their children, so attach back to
        // front; a node's subtree is complete by the time it is moved
        let mut parent_of: Vec<Option<usize>> = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let parent = node
                .parent_id
                .as_ref()
                .and_then(|p| index.get(p).copied())
                .filter(|&p| p < i);
            parent_of.push(parent);
        }

        let mut slots: Vec<Option<CallNode>> = nodes.into_iter().map(Some).collect();
        for i in (0..slots.len()).rev() {
            if let Some(p) = parent_of[i] {
                if let Some(mut child) = slots[i].take() {
                    child.children.reverse();
                    if let Some(parent) = slots[p].as_mut() {
                        parent.children.push(child);
                    }
                }
            }
        }
        for root in slots.iter_mut().flatten() {
            root.children.reverse();
        }

        Self {
            roots: slots.into_iter().flatten().collect(),
        }
    }

    /// Finds a node by step id.
    pub fn find(&self, id: &str) -> Option<&CallNode> {
        self.roots.iter().find_map(|r| r.find(id))
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.roots.iter().map(CallNode::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
