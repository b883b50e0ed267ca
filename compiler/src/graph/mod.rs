// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! The marking algorithm. Starting at the roots, every marked node is asked
//! for its dependencies until a fixed point is reached.

mod traversal;

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

pub use self::traversal::{FieldInclusion, TypeTraversal};

use crate::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyListEntry {
    pub node: NodeId,
    pub reason: &'static str,
}

impl DependencyListEntry {
    #[must_use]
    pub const fn new(node: NodeId, reason: &'static str) -> Self {
        Self { node, reason }
    }
}

/// `target` is only needed when `predicate` ends up marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalDependency {
    pub target: NodeId,
    pub predicate: NodeId,
    pub reason: &'static str,
}

/// Why a node was marked. Only the first reason is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkReason {
    pub reason: &'static str,

    /// `None` for roots.
    pub source: Option<NodeId>,

    /// Set when a conditional dependency fired.
    pub predicate: Option<NodeId>,
}

pub trait DependencyNodeProvider {
    type Error;

    /// Whether [`Self::static_dependencies`] can be asked. Nodes that are not
    /// computed yet are handed to the caller of
    /// [`DependencyAnalyzer::compute_marked_nodes`] in batches.
    fn static_dependencies_computed(&self, node: NodeId) -> bool;

    fn static_dependencies(&self, node: NodeId) -> Result<Vec<DependencyListEntry>, Self::Error>;

    fn conditional_dependencies(&self, node: NodeId) -> Vec<ConditionalDependency>;

    fn has_dynamic_dependencies(&self, node: NodeId) -> bool;

    /// Dependencies discovered by looking at `marked[first..]`. Called again
    /// with a higher `first` whenever new nodes have been marked since.
    fn search_dynamic_dependencies(&self, node: NodeId, marked: &[NodeId], first: usize) -> Vec<DependencyListEntry>;
}

#[derive(Debug)]
pub struct DependencyAnalyzer<'p, P: DependencyNodeProvider> {
    provider: &'p P,
    marked: Vec<NodeId>,
    marked_set: HashSet<NodeId>,
    reasons: HashMap<NodeId, MarkReason>,
    stack: Vec<NodeId>,
    deferred: Vec<NodeId>,

    /// Keyed by predicate.
    pending_conditionals: HashMap<NodeId, Vec<(NodeId, &'static str, NodeId)>>,

    /// Nodes with dynamic dependencies, with the index into `marked` they have
    /// scanned up to.
    dynamic: Vec<(NodeId, usize)>,
}

impl<'p, P: DependencyNodeProvider> DependencyAnalyzer<'p, P> {
    #[must_use]
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            marked: Vec::new(),
            marked_set: HashSet::new(),
            reasons: HashMap::new(),
            stack: Vec::new(),
            deferred: Vec::new(),
            pending_conditionals: HashMap::new(),
            dynamic: Vec::new(),
        }
    }

    pub fn add_root(&mut self, node: NodeId, reason: &'static str) {
        self.mark(node, MarkReason { reason, source: None, predicate: None });
    }

    /// Runs the marking to its fixed point. `compute_batch` receives every
    /// group of marked nodes that were not computed yet, and must compute them
    /// before returning.
    pub fn compute_marked_nodes<F>(&mut self, mut compute_batch: F) -> Result<(), P::Error>
            where F: FnMut(&[NodeId]) -> Result<(), P::Error> {
        let mut iteration = 0;
        loop {
            iteration += 1;
            self.process_stack()?;

            if !self.deferred.is_empty() {
                let batch = std::mem::take(&mut self.deferred);
                debug!("Iteration {iteration}: computing a batch of {} nodes", batch.len());
                compute_batch(&batch)?;

                for node in batch {
                    debug_assert!(self.provider.static_dependencies_computed(node), "{node} was not computed by its batch");
                    self.expand(node)?;
                }
                continue;
            }

            if self.scan_dynamic_dependencies() {
                continue;
            }

            break;
        }

        debug!("Marking finished after {iteration} iterations with {} nodes", self.marked.len());
        Ok(())
    }

    /// Marked nodes in the order they were marked. This order depends on
    /// the discovery order; sort before emitting anything.
    #[must_use]
    pub fn marked_nodes(&self) -> &[NodeId] {
        &self.marked
    }

    #[must_use]
    pub fn marked_set(&self) -> &HashSet<NodeId> {
        &self.marked_set
    }

    #[must_use]
    pub fn is_marked(&self, node: NodeId) -> bool {
        self.marked_set.contains(&node)
    }

    #[must_use]
    pub fn why_marked(&self, node: NodeId) -> Option<&MarkReason> {
        self.reasons.get(&node)
    }

    #[must_use]
    pub fn into_marked(self) -> (Vec<NodeId>, HashSet<NodeId>) {
        (self.marked, self.marked_set)
    }

    fn process_stack(&mut self) -> Result<(), P::Error> {
        while let Some(node) = self.stack.pop() {
            if !self.provider.static_dependencies_computed(node) {
                self.deferred.push(node);
                continue;
            }

            self.expand(node)?;
        }
        Ok(())
    }

    fn expand(&mut self, node: NodeId) -> Result<(), P::Error> {
        for dependency in self.provider.static_dependencies(node)? {
            self.mark(dependency.node, MarkReason {
                reason: dependency.reason,
                source: Some(node),
                predicate: None,
            });
        }

        for conditional in self.provider.conditional_dependencies(node) {
            if self.is_marked(conditional.predicate) {
                self.mark(conditional.target, MarkReason {
                    reason: conditional.reason,
                    source: Some(node),
                    predicate: Some(conditional.predicate),
                });
            } else {
                self.pending_conditionals.entry(conditional.predicate)
                    .or_default()
                    .push((conditional.target, conditional.reason, node));
            }
        }

        if self.provider.has_dynamic_dependencies(node) {
            self.dynamic.push((node, 0));
        }

        Ok(())
    }

    fn scan_dynamic_dependencies(&mut self) -> bool {
        let mut added = false;

        for index in 0..self.dynamic.len() {
            let (node, first) = self.dynamic[index];
            if first >= self.marked.len() {
                continue;
            }

            let dependencies = self.provider.search_dynamic_dependencies(node, &self.marked, first);
            self.dynamic[index].1 = self.marked.len();

            for dependency in dependencies {
                added |= self.mark(dependency.node, MarkReason {
                    reason: dependency.reason,
                    source: Some(node),
                    predicate: None,
                });
            }
        }

        added
    }

    /// Returns whether the node was newly marked. Conditional dependencies
    /// waiting on it are marked along with it.
    fn mark(&mut self, node: NodeId, reason: MarkReason) -> bool {
        if self.marked_set.contains(&node) {
            return false;
        }

        let mut worklist = vec![(node, reason)];
        while let Some((node, reason)) = worklist.pop() {
            if !self.marked_set.insert(node) {
                continue;
            }

            trace!("Marked {node}: {}", reason.reason);
            self.marked.push(node);
            self.reasons.insert(node, reason);
            self.stack.push(node);

            for (target, reason, source) in self.pending_conditionals.remove(&node).unwrap_or_default() {
                worklist.push((target, MarkReason {
                    reason,
                    source: Some(source),
                    predicate: Some(node),
                }));
            }
        }

        true
    }
}
