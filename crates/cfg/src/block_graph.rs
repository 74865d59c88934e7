// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Block-level successor graph

use std::collections::{HashMap, HashSet};

use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::Bfs,
    Direction,
};

use crate::{error::VerifyError, function::Function, value::BlockId};

/// Successor graph over the blocks of one function, backed by petgraph.
///
/// Built from the terminators currently in the layout, so it is a snapshot:
/// rebuild it after editing the function.
pub struct BlockGraph {
    graph: DiGraph<BlockId, ()>,
    nodes: HashMap<BlockId, NodeIndex>,
}

impl BlockGraph {
    /// Builds the graph, failing if a terminator names a block that is not
    /// part of the layout.
    pub fn build(func: &Function) -> Result<Self, VerifyError> {
        let mut graph = DiGraph::new();
        let nodes: HashMap<BlockId, NodeIndex> = func
            .blocks()
            .map(|block| (block, graph.add_node(block)))
            .collect();

        for block in func.blocks() {
            let Some(terminator) = func.terminator(block) else {
                continue;
            };
            for target in func.inst(terminator).successors() {
                let Some(&to) = nodes.get(&target) else {
                    return Err(VerifyError::UnknownBlock {
                        function: func.name().to_string(),
                        target,
                    });
                };
                graph.add_edge(nodes[&block], to, ());
            }
        }

        Ok(Self { graph, nodes })
    }

    pub fn predecessors(&self, block: BlockId) -> HashSet<BlockId> {
        self.neighbors(block, Direction::Incoming)
    }

    pub fn successors(&self, block: BlockId) -> HashSet<BlockId> {
        self.neighbors(block, Direction::Outgoing)
    }

    /// Blocks not reachable from `entry` by following terminators.
    pub fn unreachable_from(&self, entry: BlockId) -> Vec<BlockId> {
        let mut reachable = HashSet::new();
        if let Some(&start) = self.nodes.get(&entry) {
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                reachable.insert(node);
            }
        }
        self.graph
            .node_indices()
            .filter(|node| !reachable.contains(node))
            .map(|node| self.graph[node])
            .collect()
    }

    fn neighbors(&self, block: BlockId, direction: Direction) -> HashSet<BlockId> {
        self.nodes
            .get(&block)
            .map(|&node| {
                self.graph
                    .neighbors_directed(node, direction)
                    .map(|neighbor| self.graph[neighbor])
                    .collect()
            })
            .unwrap_or_default()
    }
}
