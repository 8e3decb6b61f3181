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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_utils::Backoff;
use rand::{thread_rng, Rng};

use gm_game::{board, Board, Move, Sign};
use gm_nn::Network;
use gm_tss::{Score, SharedHashTable, Value};

use crate::edge_selector::{BestEdgeSelector, EdgeSelector};
use crate::param::EngineSettings;
use crate::search::SearchStats;
use crate::time_control::TimeStrategy;
use crate::tree::Tree;
use crate::worker::SearchThread;

/// The typed messages exchanged with protocol collaborators. Parsing the
/// line-level tournament syntax is their job, not the engine's.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    StartProgram,
    SetOption { name: String, value: String },
    SetPosition(Vec<Move>),
    StartSearch(SearchGoal),
    StopSearch,
    ExitProgram,
    BestMove(Vec<Move>),
    Info(String),
    Error(String),
    PlainString(String),
    UnknownCommand(String)
}

/// What the controller wants from the next search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchGoal {
    BestMove,
    Ponder,
    Swap2
}

/// Per-edge slice of the final search summary.
#[derive(Clone, Debug)]
pub struct EdgeSummary {
    pub mv: Move,
    pub visits: i32,
    pub policy: f32,
    pub value: Value,
    pub score: Score
}

/// The outcome of a finished (or stopped) search.
#[derive(Clone, Debug)]
pub struct SearchSummary {
    pub value: Value,
    pub score: Score,
    pub visits: i32,
    pub edges: Vec<EdgeSummary>,
    pub principal_variation: Vec<Move>
}

/// The decision of the swap2 opening controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Swap2Decision {
    PlaceOpening(Vec<Move>),
    Swap,
    Stay(Move),
    Balance(Vec<Move>)
}

/// The engine facade: one shared tree, one shared transposition table, and
/// a set of worker threads started and stopped per search.
pub struct SearchEngine {
    settings: EngineSettings,
    tree: Arc<Mutex<Tree>>,
    shared_table: Arc<SharedHashTable>,
    network_factory: Box<dyn Fn() -> Box<dyn Network> + Send + Sync>,

    threads: Vec<SearchThread>,
    is_running: Arc<AtomicBool>,
    accumulated_stats: SearchStats
}

impl SearchEngine {
    pub fn new(
        settings: EngineSettings,
        network_factory: Box<dyn Fn() -> Box<dyn Network> + Send + Sync>
    ) -> Self {
        let tree = Tree::new(settings.game_config, settings.tree_config);
        let shared_table = Arc::new(SharedHashTable::new(settings.search_config.tss.hash_table_size));

        Self {
            settings,
            tree: Arc::new(Mutex::new(tree)),
            shared_table,
            network_factory,
            threads: Vec::new(),
            is_running: Arc::new(AtomicBool::new(false)),
            accumulated_stats: SearchStats::default()
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn board(&self) -> Board {
        self.tree.lock().expect("could not acquire tree lock").root_board().clone()
    }

    pub fn sign_to_move(&self) -> Sign {
        self.tree.lock().expect("could not acquire tree lock").root_sign()
    }

    /// Re-root the search at the given position. Must not be called while
    /// a search is running.
    pub fn set_position(&mut self, board: &Board, sign_to_move: Sign) {
        assert!(self.is_search_finished(), "cannot change the position mid-search");

        self.tree.lock().expect("could not acquire tree lock").set_position(board, sign_to_move);
        self.shared_table.increase_generation();
    }

    /// Re-root the search at the position after the given moves.
    pub fn set_position_from_moves(&mut self, moves: &[Move]) {
        let config = self.settings.game_config;
        let mut board = Board::new(config.rows, config.cols);
        let mut sign_to_move = Sign::Cross;

        for &mv in moves.iter() {
            board::put_move(&mut board, mv);
            sign_to_move = mv.sign().invert();
        }
        self.set_position(&board, sign_to_move);
    }

    /// Drop all cached state: the tree and the shared hash table.
    pub fn clear_hash(&mut self) {
        assert!(self.is_search_finished(), "cannot clear caches mid-search");

        let mut tree = self.tree.lock().expect("could not acquire tree lock");
        let board = tree.root_board().clone();
        let sign = tree.root_sign();
        tree.set_position(&board, sign);
        self.shared_table.clear();
    }

    /// Start the worker threads. Returns immediately; the search runs
    /// until a stop condition triggers or `stop_search` is called.
    ///
    /// # Arguments
    ///
    /// * `time_strategy` -
    ///
    pub fn start_search(&mut self, time_strategy: Arc<dyn TimeStrategy>) {
        assert!(self.is_search_finished(), "a search is already running");

        self.reap_finished_threads();
        self.is_running.store(true, Ordering::Release);

        for _ in 0..self.settings.num_threads {
            let network = (self.network_factory)();
            let evaluator = crate::evaluator::NNEvaluator::new(network, self.settings.search_config.use_symmetries);

            self.threads.push(SearchThread::spawn(
                self.settings.clone(),
                self.tree.clone(),
                self.shared_table.clone(),
                evaluator,
                time_strategy.clone(),
                self.is_running.clone()
            ));
        }
    }

    /// Ask the workers to stop; partial results remain valid.
    pub fn stop_search(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    pub fn is_search_finished(&self) -> bool {
        self.threads.iter().all(|thread| thread.is_finished())
    }

    /// Block until every worker has exited.
    pub fn wait_until_finished(&mut self) {
        let backoff = Backoff::new();
        while !self.is_search_finished() {
            backoff.snooze();
        }
        self.reap_finished_threads();
    }

    pub fn stats(&self) -> SearchStats {
        self.accumulated_stats
    }

    /// The root edge statistics plus the principal variation.
    pub fn get_summary(&self, max_pv_length: usize) -> SearchSummary {
        let tree = self.tree.lock().expect("could not acquire tree lock");
        let root = tree.root();
        let node = tree.node(root);

        let mut edges: Vec<EdgeSummary> = tree.edges_of(root).iter()
            .map(|edge| EdgeSummary {
                mv: edge.mv(),
                visits: edge.visits(),
                policy: edge.policy(),
                value: edge.value(),
                score: edge.score()
            })
            .collect();
        edges.sort_by_key(|summary| ::std::cmp::Reverse((summary.score, summary.visits)));

        SearchSummary {
            value: node.value(),
            score: node.score(),
            visits: node.visits(),
            edges,
            principal_variation: tree.principal_variation(max_pv_length)
        }
    }

    /// The move the engine would play right now.
    pub fn best_move(&self) -> Option<Move> {
        let tree = self.tree.lock().expect("could not acquire tree lock");
        let root = tree.root();

        if tree.node(root).is_leaf() {
            return None;
        }

        let mut selector = BestEdgeSelector::new(self.settings.style.style_factor());
        let index = selector.select(&tree, root);
        Some(tree.edges_of(root)[index].mv())
    }

    fn reap_finished_threads(&mut self) {
        for thread in self.threads.drain(..) {
            self.accumulated_stats += thread.join();
        }
    }
}

/// Runs one search to completion and reports the best move.
pub struct BestMoveController;

impl BestMoveController {
    pub fn run(engine: &mut SearchEngine, time_strategy: Arc<dyn TimeStrategy>) -> Option<Move> {
        engine.start_search(time_strategy);
        engine.wait_until_finished();
        engine.best_move()
    }
}

/// The swap2 opening protocol: place three stones, or evaluate the
/// offered opening and swap, play on, or balance with two more stones.
pub struct Swap2Controller {
    openings: Vec<Vec<Move>>
}

impl Default for Swap2Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Swap2Controller {
    pub fn new() -> Self {
        // a few well-known balanced swap2 openings
        let openings = vec! [
            vec! [Move::new(7, 7, Sign::Cross), Move::new(8, 8, Sign::Circle), Move::new(9, 9, Sign::Cross)],
            vec! [Move::new(7, 7, Sign::Cross), Move::new(7, 8, Sign::Circle), Move::new(9, 10, Sign::Cross)],
            vec! [Move::new(7, 7, Sign::Cross), Move::new(8, 9, Sign::Circle), Move::new(6, 9, Sign::Cross)]
        ];

        Self { openings }
    }

    /// Decide the swap2 move for the engine's current position.
    ///
    /// # Arguments
    ///
    /// * `engine` -
    /// * `time_strategy` - the budget for each internal evaluation search
    ///
    pub fn decide(&self, engine: &mut SearchEngine, time_strategy: Arc<dyn TimeStrategy>) -> Swap2Decision {
        let stones = board::number_of_moves(&engine.board());

        match stones {
            0 => {
                let index = thread_rng().gen_range(0..self.openings.len());
                Swap2Decision::PlaceOpening(self.openings[index].clone())
            },
            3 => {
                let expectation = Self::evaluate(engine, time_strategy.clone());

                if expectation < 1.0 / 3.0 {
                    Swap2Decision::Swap
                } else if expectation > 2.0 / 3.0 {
                    Swap2Decision::Stay(engine.best_move().expect("the root is expanded"))
                } else {
                    // the position is level; add two stones that keep it
                    // that way
                    let first = Self::balancing_move(engine);
                    let mut next = engine.board();
                    board::put_move(&mut next, first);
                    engine.set_position(&next, first.sign().invert());

                    Self::evaluate(engine, time_strategy);
                    let second = Self::balancing_move(engine);

                    Swap2Decision::Balance(vec! [first, second])
                }
            },
            _ => {
                let expectation = Self::evaluate(engine, time_strategy);

                if expectation < 0.5 {
                    Swap2Decision::Swap
                } else {
                    Swap2Decision::Stay(engine.best_move().expect("the root is expanded"))
                }
            }
        }
    }

    fn evaluate(engine: &mut SearchEngine, time_strategy: Arc<dyn TimeStrategy>) -> f32 {
        engine.start_search(time_strategy);
        engine.wait_until_finished();
        engine.get_summary(1).value.expectation()
    }

    /// The move whose Q-value is closest to an even game.
    fn balancing_move(engine: &SearchEngine) -> Move {
        let tree = engine.tree.lock().expect("could not acquire tree lock");
        let root = tree.root();
        assert!(!tree.node(root).is_leaf(), "balancing requires an expanded root");

        tree.edges_of(root).iter()
            .min_by(|a, b| {
                let a_balance = (a.value().expectation() - 0.5).abs();
                let b_balance = (b.value().expectation() - 0.5).abs();
                a_balance.partial_cmp(&b_balance).expect("values are finite")
            })
            .map(|edge| edge.mv())
            .expect("the root has edges")
    }
}
