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

use gm_game::{board, Board, GameConfig, Move, Sign};
use gm_nn::InputFeatures;
use gm_tss::{Score, Value};
use gm_utils::Matrix;

use crate::node::{Edge, EdgeId, NodeId};

/// A node and the edge taken out of it during the select phase. They always
/// come in pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeEdgePair {
    pub node: NodeId,
    pub edge: EdgeId
}

/// The scratch state of one simulation: the trajectory through the tree,
/// the board at its end, and everything the solver and the network compute
/// for that position.
#[derive(Clone)]
pub struct SearchTask {
    config: GameConfig,
    visited_path: Vec<NodeEdgePair>,
    board: Board,
    sign_to_move: Sign,

    pub features: InputFeatures,
    pub policy: Matrix<f32>,
    pub action_values: Matrix<Value>,
    pub action_scores: Matrix<Score>,
    pub value: Value,
    pub score: Score,
    pub moves_left: f32,

    pub edges: Vec<Edge>,
    pub defensive_moves: Vec<Move>,

    pub must_defend: bool,
    pub was_processed_by_network: bool,
    pub was_processed_by_solver: bool,
    pub skip_edge_generation: bool,

    /// Set when the simulation was abandoned (e.g. the node pool is full);
    /// its virtual losses are already cancelled and it must not back up.
    pub abandoned: bool,

    /// Whether `edges` covers every non-losing legal move, which is what a
    /// proven loss at this node requires.
    pub edges_are_exhaustive: bool
}

impl SearchTask {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            visited_path: Vec::with_capacity(64),
            board: Board::new(config.rows, config.cols),
            sign_to_move: Sign::Cross,
            features: InputFeatures::new(config.rows, config.cols),
            policy: Matrix::new(config.rows, config.cols),
            action_values: Matrix::new(config.rows, config.cols),
            action_scores: Matrix::new(config.rows, config.cols),
            value: Value::default(),
            score: Score::default(),
            moves_left: 0.0,
            edges: Vec::new(),
            defensive_moves: Vec::new(),
            must_defend: false,
            was_processed_by_network: false,
            was_processed_by_solver: false,
            skip_edge_generation: false,
            abandoned: false,
            edges_are_exhaustive: false
        }
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    /// Reset the task to the given starting position.
    pub fn set(&mut self, base: &Board, sign_to_move: Sign) {
        self.visited_path.clear();
        self.board = base.clone();
        self.sign_to_move = sign_to_move;
        self.policy.fill(0.0);
        self.action_values.fill(Value::default());
        self.action_scores.fill(Score::default());
        self.value = Value::default();
        self.score = Score::default();
        self.moves_left = 0.0;
        self.edges.clear();
        self.defensive_moves.clear();
        self.must_defend = false;
        self.was_processed_by_network = false;
        self.was_processed_by_solver = false;
        self.skip_edge_generation = false;
        self.abandoned = false;
        self.edges_are_exhaustive = false;
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn sign_to_move(&self) -> Sign {
        self.sign_to_move
    }

    /// Record one step of the select phase, applying the move to the local
    /// board copy.
    pub fn append(&mut self, node: NodeId, edge: EdgeId, mv: Move) {
        self.visited_path.push(NodeEdgePair { node, edge });
        board::put_move(&mut self.board, mv);
        self.sign_to_move = mv.sign().invert();
    }

    pub fn visited_path(&self) -> &[NodeEdgePair] {
        &self.visited_path
    }

    pub fn visited_path_length(&self) -> usize {
        self.visited_path.len()
    }

    pub fn last_pair(&self) -> Option<NodeEdgePair> {
        self.visited_path.last().copied()
    }

    pub fn is_ready(&self) -> bool {
        self.score.is_proven() || self.was_processed_by_network
    }

    pub fn add_edge(&mut self, mv: Move) {
        self.edges.push(Edge::new(mv, 0.0, Value::default(), Score::default()));
    }

    pub fn add_defensive_move(&mut self, mv: Move) {
        self.defensive_moves.push(mv);
    }
}

/// A fixed-size buffer of in-flight search tasks; two of them implement the
/// double buffering of the asynchronous pipeline.
pub struct SearchTaskList {
    tasks: Vec<SearchTask>,
    stored: usize,
    max_size: usize
}

impl SearchTaskList {
    pub fn new(config: GameConfig, max_size: usize) -> Self {
        Self {
            tasks: (0..max_size).map(|_| SearchTask::new(config)).collect(),
            stored: 0,
            max_size
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn clear(&mut self) {
        self.stored = 0;
    }

    /// Cap the number of tasks used per batch; existing allocations are
    /// kept.
    pub fn resize(&mut self, max_size: usize) {
        debug_assert_eq!(self.stored, 0);

        while self.tasks.len() < max_size {
            let config = self.tasks[0].config();
            self.tasks.push(SearchTask::new(config));
        }
        self.max_size = max_size;
    }

    pub fn next(&mut self) -> &mut SearchTask {
        debug_assert!(self.stored < self.max_size);
        self.stored += 1;
        &mut self.tasks[self.stored - 1]
    }

    pub fn remove_last(&mut self) {
        debug_assert!(self.stored > 0);
        self.stored -= 1;
    }

    pub fn get(&self, index: usize) -> &SearchTask {
        debug_assert!(index < self.stored);
        &self.tasks[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut SearchTask {
        debug_assert!(index < self.stored);
        &mut self.tasks[index]
    }
}
