// Copyright 2022 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use gm_game::{Board, GameConfig, Move, Sign};
use gm_tss::score::invert_up;
use gm_tss::Score;

use crate::edge_selector::EdgeSelector;
use crate::node::{Edge, EdgeId, Node, NodeId};
use crate::param::TreeConfig;
use crate::search_task::SearchTask;

/// Where the select phase stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A leaf edge (or the unexpanded root) was reached; the task should be
    /// evaluated and expanded.
    Expand,

    /// An edge with a proven score but no child node was selected. The
    /// proof only needs to be propagated, no evaluation is required.
    InformationLeak,

    /// A proven child node was reached; its score is backed up again so the
    /// search makes progress in a proven tree.
    ReachedProvenState
}

/// The result of attaching one expanded task to the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpandOutcome {
    Expanded,

    /// Another worker expanded the same edge first.
    AlreadyExpanded,

    /// The node pool is exhausted; the simulation should be abandoned.
    AllocationFailed
}

/// The search tree shared by all workers, owning its nodes and edges in
/// index-addressed pools. All methods assume the caller holds the tree
/// lock.
pub struct Tree {
    config: GameConfig,
    tree_config: TreeConfig,

    nodes: Vec<Node>,
    edges: Vec<Edge>,
    root: Option<NodeId>,
    root_board: Board,
    root_sign: Sign,

    simulations: usize,
    max_depth_seen: usize
}

impl Tree {
    pub fn new(config: GameConfig, tree_config: TreeConfig) -> Self {
        let mut out = Self {
            config,
            tree_config,
            nodes: Vec::with_capacity(tree_config.node_bucket_size),
            edges: Vec::with_capacity(tree_config.node_bucket_size),
            root: None,
            root_board: Board::new(config.rows, config.cols),
            root_sign: Sign::Cross,
            simulations: 0,
            max_depth_seen: 0
        };

        out.set_position(&Board::new(config.rows, config.cols), Sign::Cross);
        out
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    /// Throw the tree away and re-root it at the given position.
    pub fn set_position(&mut self, board: &Board, sign_to_move: Sign) {
        self.nodes.clear();
        self.edges.clear();
        self.simulations = 0;
        self.max_depth_seen = 0;
        self.root_board = board.clone();
        self.root_sign = sign_to_move;

        let mut root = Node::new(sign_to_move, 0);
        root.mark_as_root();
        self.nodes.push(root);
        self.root = Some(0);
    }

    pub fn root_board(&self) -> &Board {
        &self.root_board
    }

    pub fn root_sign(&self) -> Sign {
        self.root_sign
    }

    pub fn root(&self) -> NodeId {
        self.root.expect("tree has no root")
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id as usize]
    }

    pub fn edges_of(&self, id: NodeId) -> &[Edge] {
        let node = &self.nodes[id as usize];
        let first = node.first_edge() as usize;
        &self.edges[first..first + node.num_edges()]
    }

    pub fn simulation_count(&self) -> usize {
        self.simulations
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn memory(&self) -> usize {
        self.nodes.capacity() * ::std::mem::size_of::<Node>()
            + self.edges.capacity() * ::std::mem::size_of::<Edge>()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth_seen
    }

    pub fn is_root_proven(&self) -> bool {
        self.node(self.root()).is_proven()
    }

    pub fn has_single_move(&self) -> bool {
        self.node(self.root()).num_edges() == 1
    }

    /// Walk from the root to a leaf, applying virtual loss along the way
    /// and recording the trajectory in `task`.
    ///
    /// # Arguments
    ///
    /// * `task` - reset to the root position by the caller
    /// * `selector` -
    ///
    pub fn select(&mut self, task: &mut SearchTask, selector: &mut dyn EdgeSelector) -> SelectOutcome {
        let mut current = self.root();

        loop {
            if self.nodes[current as usize].is_leaf() {
                return SelectOutcome::Expand;
            }

            let index = selector.select(self, current);
            let edge_id = self.nodes[current as usize].first_edge() + index as EdgeId;
            let mv = self.edges[edge_id as usize].mv();

            self.nodes[current as usize].increase_virtual_loss();
            self.edges[edge_id as usize].increase_virtual_loss();
            task.append(current, edge_id, mv);

            match self.edges[edge_id as usize].child() {
                None => {
                    if self.edges[edge_id as usize].score().is_proven() {
                        // the solver already knows this edge's outcome; no
                        // point in asking the network about it
                        return SelectOutcome::InformationLeak;
                    }
                    return SelectOutcome::Expand;
                },
                Some(child) if self.nodes[child as usize].is_proven() => {
                    return SelectOutcome::ReachedProvenState;
                },
                Some(child) => {
                    current = child;
                }
            }
        }
    }

    /// Attach the evaluated task to the tree.
    pub fn expand(&mut self, task: &SearchTask) -> ExpandOutcome {
        match task.last_pair() {
            None => {
                let root = self.root();
                if !self.nodes[root as usize].is_leaf() {
                    return ExpandOutcome::AlreadyExpanded;
                }

                self.init_node(root, task);
                ExpandOutcome::Expanded
            },
            Some(pair) => {
                if self.edges[pair.edge as usize].child().is_some() {
                    return ExpandOutcome::AlreadyExpanded;
                }
                if self.nodes.len() >= self.tree_config.max_nodes {
                    return ExpandOutcome::AllocationFailed;
                }

                let depth = self.nodes[pair.node as usize].depth() + 1;
                let child = self.nodes.len() as NodeId;
                self.nodes.push(Node::new(task.sign_to_move(), depth));
                self.init_node(child, task);
                self.edges[pair.edge as usize].set_child(child);
                self.max_depth_seen = self.max_depth_seen.max(depth);

                ExpandOutcome::Expanded
            }
        }
    }

    fn init_node(&mut self, id: NodeId, task: &SearchTask) {
        if !task.edges.is_empty() && !task.skip_edge_generation {
            let first = self.edges.len() as EdgeId;
            self.edges.extend(task.edges.iter().cloned());
            self.nodes[id as usize].set_edges(first, task.edges.len());
        }

        let node = &mut self.nodes[id as usize];
        node.set_visits(1);
        node.set_value(task.value);
        node.set_score(task.score);
        if task.edges_are_exhaustive {
            node.mark_as_fully_expanded();
        }
    }

    /// Propagate the leaf value and score of a finished task back to the
    /// root, clearing the virtual losses applied during select.
    pub fn backup(&mut self, task: &SearchTask) {
        self.simulations += 1;

        for pair in task.visited_path().iter().rev() {
            let node_sign = self.nodes[pair.node as usize].sign_to_move();
            let value = if node_sign == task.sign_to_move() { task.value } else { task.value.inverted() };

            let edge = &mut self.edges[pair.edge as usize];
            edge.update_value(value);
            edge.decrease_virtual_loss();

            if let Some(child) = edge.child() {
                let child_score = self.nodes[child as usize].score();
                if child_score.is_proven() {
                    self.edges[pair.edge as usize].set_score(invert_up(child_score));
                }
            } else if task.score.is_proven() && self.edges[pair.edge as usize].score().is_unproven() {
                // a proven task that never became a node still proves its
                // edge
                self.edges[pair.edge as usize].set_score(invert_up(task.score));
            }

            self.nodes[pair.node as usize].update_value(value);
            self.nodes[pair.node as usize].decrease_virtual_loss();
            self.update_proven(pair.node);
        }
    }

    /// Remove the virtual losses of an abandoned task without updating any
    /// statistics.
    pub fn cancel_virtual_loss(&mut self, task: &SearchTask) {
        for pair in task.visited_path().iter() {
            self.nodes[pair.node as usize].decrease_virtual_loss();
            self.edges[pair.edge as usize].decrease_virtual_loss();
        }
    }

    /// Refresh the proven statuses along the task's path after a proof was
    /// discovered below it.
    pub fn correct_information_leak(&mut self, task: &SearchTask) {
        for pair in task.visited_path().iter().rev() {
            if let Some(child) = self.edges[pair.edge as usize].child() {
                let child_score = self.nodes[child as usize].score();
                if child_score.is_proven() {
                    self.edges[pair.edge as usize].set_score(invert_up(child_score));
                }
            }
            self.update_proven(pair.node);
        }
    }

    /// Re-derive a node's proven score from its edges: a win if any edge
    /// wins, a loss only if every edge loses (and the edge set is
    /// exhaustive), a draw if nothing is unknown and a draw exists.
    fn update_proven(&mut self, id: NodeId) {
        let node = &self.nodes[id as usize];
        if node.is_leaf() {
            return;
        }

        let first = node.first_edge() as usize;
        let edges = &self.edges[first..first + node.num_edges()];

        let mut best = Score::minus_infinity();
        let mut has_unknown = false;
        for edge in edges.iter() {
            let score = edge.score();
            best = best.max(score);
            has_unknown |= score.is_unproven();
        }

        let node = &mut self.nodes[id as usize];
        if best.is_win() {
            node.set_score(best);
        } else if !has_unknown && node.is_fully_expanded() {
            // `best` is the longest loss or the preferred draw
            node.set_score(best);
        }
    }

    /// The sequence of best moves (by visit count) from the root.
    pub fn principal_variation(&self, max_length: usize) -> Vec<Move> {
        let mut out = Vec::new();
        let mut current = self.root();

        while out.len() < max_length && !self.nodes[current as usize].is_leaf() {
            let edges = self.edges_of(current);
            let best = edges.iter()
                .enumerate()
                .max_by_key(|(_, e)| {
                    let proven_win = e.score().is_win();
                    (proven_win, e.visits(), (1000.0 * e.value().expectation()) as i64)
                })
                .map(|(i, _)| i)
                .expect("non-leaf node has edges");
            let edge = &edges[best];

            out.push(edge.mv());
            match edge.child() {
                Some(child) => { current = child; },
                None => break
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_selector::PuctSelector;
    use gm_game::GameRules;
    use gm_tss::{ProvenValue, Value};

    fn tree_with_root(edges: &[(usize, usize, f32)]) -> (Tree, SearchTask) {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut tree = Tree::new(config, TreeConfig { max_nodes: 1000, node_bucket_size: 64 });
        tree.set_position(&Board::new(15, 15), Sign::Cross);

        let mut task = SearchTask::new(config);
        task.set(tree.root_board(), tree.root_sign());
        for &(row, col, policy) in edges {
            task.add_edge(Move::new(row, col, Sign::Cross));
            let last = task.edges.len() - 1;
            task.edges[last].set_policy(policy);
        }
        task.value = Value::new(0.5, 0.1);
        task.was_processed_by_network = true;

        assert_eq!(tree.expand(&task), ExpandOutcome::Expanded);
        tree.backup(&task);
        (tree, task)
    }

    #[test]
    fn root_expansion() {
        let (tree, _) = tree_with_root(&[(7, 7, 0.6), (7, 8, 0.4)]);

        assert_eq!(tree.node(tree.root()).num_edges(), 2);
        assert_eq!(tree.node(tree.root()).visits(), 1);
        assert_eq!(tree.simulation_count(), 1);
    }

    #[test]
    fn select_expand_backup_cycle() {
        let (mut tree, _) = tree_with_root(&[(7, 7, 0.6), (7, 8, 0.4)]);
        let mut selector = PuctSelector::new(1.25, 0.5);

        let config = tree.config();
        let mut task = SearchTask::new(config);
        task.set(&tree.root_board().clone(), tree.root_sign());
        let outcome = tree.select(&mut task, &mut selector);

        assert_eq!(outcome, SelectOutcome::Expand);
        assert_eq!(task.visited_path_length(), 1);
        assert_eq!(tree.node(tree.root()).virtual_loss(), 1);

        task.value = Value::new(0.7, 0.0);
        task.was_processed_by_network = true;
        task.add_edge(Move::new(0, 0, Sign::Circle));

        assert_eq!(tree.expand(&task), ExpandOutcome::Expanded);
        tree.backup(&task);

        assert_eq!(tree.node(tree.root()).virtual_loss(), 0);
        assert_eq!(tree.node(tree.root()).visits(), 2);

        // invariant: the root's edge visits sum to its visits minus one
        let edge_visits: i32 = tree.edges_of(tree.root()).iter().map(|e| e.visits()).sum();
        assert_eq!(edge_visits, tree.node(tree.root()).visits() - 1);
    }

    #[test]
    fn proven_win_propagates() {
        let (mut tree, _) = tree_with_root(&[(7, 7, 0.6), (7, 8, 0.4)]);
        let mut selector = PuctSelector::new(1.25, 0.5);

        let mut task = SearchTask::new(tree.config());
        task.set(&tree.root_board().clone(), tree.root_sign());
        tree.select(&mut task, &mut selector);

        // the child is a proven loss for the side to move there, so the
        // root is a proven win
        task.score = Score::loss_in(1);
        task.value = Value::loss();
        task.skip_edge_generation = true;

        tree.expand(&task);
        tree.backup(&task);

        assert!(tree.is_root_proven());
        assert_eq!(tree.node(tree.root()).score().proven_value(), ProvenValue::Win);
        assert_eq!(tree.node(tree.root()).score().distance(), 2);
    }

    #[test]
    fn duplicate_expansion_is_detected() {
        let (mut tree, _) = tree_with_root(&[(7, 7, 0.9), (7, 8, 0.1)]);
        let mut selector = PuctSelector::new(1.25, 0.5);

        let mut first = SearchTask::new(tree.config());
        first.set(&tree.root_board().clone(), tree.root_sign());
        tree.select(&mut first, &mut selector);
        first.value = Value::new(0.5, 0.0);
        first.was_processed_by_network = true;
        first.add_edge(Move::new(0, 0, Sign::Circle));
        assert_eq!(tree.expand(&first), ExpandOutcome::Expanded);
        tree.backup(&first);

        // a second task expanding the same edge loses the race
        assert_eq!(tree.expand(&first), ExpandOutcome::AlreadyExpanded);
    }

    #[test]
    fn allocation_failure_is_reported() {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut tree = Tree::new(config, TreeConfig { max_nodes: 1, node_bucket_size: 4 });
        tree.set_position(&Board::new(15, 15), Sign::Cross);

        let mut task = SearchTask::new(config);
        task.set(tree.root_board(), tree.root_sign());
        task.add_edge(Move::new(7, 7, Sign::Cross));
        task.was_processed_by_network = true;
        tree.expand(&task);
        tree.backup(&task);

        let mut selector = PuctSelector::new(1.25, 0.5);
        let mut second = SearchTask::new(config);
        second.set(&tree.root_board().clone(), tree.root_sign());
        tree.select(&mut second, &mut selector);
        second.was_processed_by_network = true;

        assert_eq!(tree.expand(&second), ExpandOutcome::AllocationFailed);
        tree.cancel_virtual_loss(&second);
        assert_eq!(tree.node(tree.root()).virtual_loss(), 0);
    }
}
