//! Append-only call/event trace tree (spec §3.2 `traces`, SPEC_FULL.md §E).
//!
//! hevm's own tracer is a zipper over a rose tree so it can append to
//! "wherever execution currently is" without re-walking from the root.
//! This engine gets the same property more simply: a stack of open node
//! indices into a flat `Vec`, mirroring the `frames` parent stack itself —
//! `push_call`/`pop` stay O(1) without needing a zipper data type.

use crate::errors::FrameHalt;
use bytes::Bytes;
use ethereum_types::{Address, U256};

#[derive(Debug, Clone)]
pub enum TraceEvent {
    Call { target: Address, calldata: Bytes, value: U256 },
    Create { address: Address },
    Log { topics: Vec<U256>, data: Bytes },
    Halt(FrameHalt),
}

#[derive(Debug, Clone)]
pub struct TraceNode {
    pub event: TraceEvent,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
}

/// Flattened rose tree of trace nodes, plus a stack tracking the
/// currently-open call so new events attach as children of it.
#[derive(Debug, Clone, Default)]
pub struct TraceTree {
    nodes: Vec<TraceNode>,
    open: Vec<usize>,
}

impl TraceTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(&mut self, event: TraceEvent) -> usize {
        let parent = self.open.last().copied();
        let ix = self.nodes.len();
        self.nodes.push(TraceNode { event, children: Vec::new(), parent });
        if let Some(p) = parent {
            #[allow(clippy::indexing_slicing)]
            self.nodes[p].children.push(ix);
        }
        ix
    }

    pub fn enter_call(&mut self, target: Address, calldata: Bytes, value: U256) {
        let ix = self.push_node(TraceEvent::Call { target, calldata, value });
        self.open.push(ix);
    }

    pub fn enter_create(&mut self, address: Address) {
        let ix = self.push_node(TraceEvent::Create { address });
        self.open.push(ix);
    }

    pub fn log(&mut self, topics: Vec<U256>, data: Bytes) {
        self.push_node(TraceEvent::Log { topics, data });
    }

    /// Closes the innermost open call/create frame, recording how it ended.
    pub fn exit(&mut self, how: FrameHalt) {
        self.push_node(TraceEvent::Halt(how));
        self.open.pop();
    }

    pub fn roots(&self) -> impl Iterator<Item = &TraceNode> {
        self.nodes.iter().filter(|n| n.parent.is_none())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_call_closes_into_parent() {
        let mut tree = TraceTree::new();
        tree.enter_call(Address::zero(), Bytes::new(), U256::zero());
        tree.log(vec![], Bytes::new());
        tree.exit(FrameHalt::Returned(Bytes::new()));
        assert_eq!(tree.len(), 3);
        assert!(tree.roots().count() == 1);
    }
}
