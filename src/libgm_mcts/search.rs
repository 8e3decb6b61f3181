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

use std::fmt;
use std::sync::Arc;

use gm_game::patterns::PatternCalculator;
use gm_game::GameConfig;
use gm_tss::score::invert_down;
use gm_tss::{SharedHashTable, ThreatSpaceSearch};

use crate::edge_generator::{BaseGenerator, EdgeGenerator};
use crate::edge_selector::{EdgeSelector, PuctSelector};
use crate::evaluator::NNEvaluator;
use crate::param::SearchConfig;
use crate::search_task::SearchTaskList;
use crate::tree::{ExpandOutcome, SelectOutcome, Tree};

/// Counters accumulated per worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchStats {
    pub nb_duplicate_nodes: u64,
    pub nb_information_leaks: u64,
    pub nb_wasted_expansions: u64,
    pub nb_proven_states: u64,
    pub nb_network_evaluations: u64,
    pub nb_node_count: u64
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "----SearchStats----")?;
        writeln!(f, "nb_duplicate_nodes     = {}", self.nb_duplicate_nodes)?;
        writeln!(f, "nb_information_leaks   = {}", self.nb_information_leaks)?;
        writeln!(f, "nb_wasted_expansions   = {}", self.nb_wasted_expansions)?;
        writeln!(f, "nb_proven_states       = {}", self.nb_proven_states)?;
        writeln!(f, "nb_network_evaluations = {}", self.nb_network_evaluations)?;
        writeln!(f, "nb_node_count          = {}", self.nb_node_count)
    }
}

impl ::std::ops::AddAssign for SearchStats {
    fn add_assign(&mut self, other: SearchStats) {
        self.nb_duplicate_nodes += other.nb_duplicate_nodes;
        self.nb_information_leaks += other.nb_information_leaks;
        self.nb_wasted_expansions += other.nb_wasted_expansions;
        self.nb_proven_states += other.nb_proven_states;
        self.nb_network_evaluations += other.nb_network_evaluations;
        self.nb_node_count += other.nb_node_count;
    }
}

/// The batch size ramp of the asynchronous loop: it doubles for every 8x
/// increase in the number of simulations.
pub fn batch_size_for(simulation_count: usize, max_batch_size: usize) -> usize {
    let ramp = (simulation_count.max(1) as f64).cbrt() as usize;
    ramp.clamp(1, max_batch_size)
}

/// One worker's share of the search pipeline: the two task buffers, the
/// solver, and the generate/expand/backup plumbing around the shared tree.
pub struct Search {
    game_config: GameConfig,
    search_config: SearchConfig,

    buffers: [SearchTaskList; 2],
    current_buffer: usize,

    solver: ThreatSpaceSearch,
    calculator: PatternCalculator,
    generator: Box<dyn EdgeGenerator>,
    selector: Box<dyn EdgeSelector>,

    stats: SearchStats
}

impl Search {
    pub fn new(game_config: GameConfig, search_config: SearchConfig, shared_table: Arc<SharedHashTable>) -> Self {
        Self {
            game_config,
            search_config,
            buffers: [
                SearchTaskList::new(game_config, search_config.max_batch_size),
                SearchTaskList::new(game_config, search_config.max_batch_size)
            ],
            current_buffer: 0,
            solver: ThreatSpaceSearch::new(game_config, shared_table),
            calculator: PatternCalculator::new(game_config),
            generator: Box::new(BaseGenerator::new(
                search_config.max_children,
                search_config.policy_expansion_threshold,
                true
            )),
            selector: Box::new(PuctSelector::new(
                search_config.exploration_constant,
                search_config.style_factor
            )),
            stats: SearchStats::default()
        }
    }

    /// Replace the edge selector, e.g. for balanced opening searches.
    pub fn with_selector(mut self, selector: Box<dyn EdgeSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the edge generator.
    pub fn with_generator(mut self, generator: Box<dyn EdgeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.search_config
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    pub fn solver(&mut self) -> &mut ThreatSpaceSearch {
        &mut self.solver
    }

    pub fn use_buffer(&mut self, index: usize) {
        debug_assert!(index < 2);
        self.current_buffer = index;
    }

    pub fn switch_buffer(&mut self) {
        self.current_buffer = 1 - self.current_buffer;
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.buffers[self.current_buffer].resize(batch_size.clamp(1, self.search_config.max_batch_size));
    }

    /// Pull search tasks out of the tree until the buffer is full. Bounded
    /// retries keep duplicate leaves and information leaks from stalling
    /// the pipeline.
    ///
    /// # Arguments
    ///
    /// * `tree` - the caller holds the tree lock
    /// * `max_simulations` -
    ///
    pub fn select(&mut self, tree: &mut Tree, max_simulations: usize) {
        let buffer = &mut self.buffers[self.current_buffer];
        let selector = &mut self.selector;
        let mut number_of_trials = 2 * buffer.max_size();
        let root_board = tree.root_board().clone();
        let root_sign = tree.root_sign();

        while buffer.stored() < buffer.max_size() && tree.simulation_count() <= max_simulations {
            let task = buffer.next();
            task.set(&root_board, root_sign);
            let outcome = tree.select(task, selector.as_mut());

            let index = buffer.stored() - 1;
            if Self::is_duplicate(buffer, index) {
                // the search could continue, but every duplicate would
                // waste a network evaluation
                let task = buffer.get(index);
                tree.cancel_virtual_loss(task);
                buffer.remove_last();
                self.stats.nb_duplicate_nodes += 1;
                break;
            }

            match outcome {
                SelectOutcome::Expand => {},
                SelectOutcome::InformationLeak => {
                    let task = buffer.get(index);
                    tree.correct_information_leak(task);
                    tree.cancel_virtual_loss(task);
                    buffer.remove_last();
                    self.stats.nb_information_leaks += 1;
                },
                SelectOutcome::ReachedProvenState => {
                    // propagate the proven score again so the search makes
                    // progress even in a proven tree
                    let task = buffer.get_mut(index);
                    let edge_score = {
                        let pair = task.last_pair().expect("a proven state has a path");
                        tree.edge(pair.edge).score()
                    };
                    task.score = invert_down(edge_score);
                    task.value = task.score.to_value();
                    task.was_processed_by_solver = true;
                    task.skip_edge_generation = true;

                    tree.backup(buffer.get(index));
                    buffer.remove_last();
                    self.stats.nb_proven_states += 1;
                }
            }

            // in theory we can keep hitting proven states forever, so bail
            // out after a bounded number of attempts
            number_of_trials -= 1;
            if number_of_trials == 0 {
                break;
            }
        }
    }

    /// Run the solver over every buffered task and record its findings.
    pub fn solve(&mut self) {
        let buffer = &mut self.buffers[self.current_buffer];

        for i in 0..buffer.stored() {
            let task = buffer.get_mut(i);
            let report = self.solver.solve(
                task.board(),
                task.sign_to_move(),
                self.search_config.tss.mode,
                self.search_config.tss.max_positions
            );

            for &(mv, score) in report.actions.iter() {
                task.action_scores[(mv.row(), mv.col())] = score;
                if score.is_proven() {
                    task.action_values[(mv.row(), mv.col())] = score.to_value();
                }
            }
            if report.must_defend {
                task.must_defend = true;
                for &mv in report.defensive_moves.iter() {
                    task.add_defensive_move(mv);
                }
            }
            task.score = report.score;
            if report.score.is_proven() {
                task.value = report.score.to_value();
                task.moves_left = report.score.distance() as f32;
            }

            self.calculator.set_board(task.board(), task.sign_to_move());
            task.features.encode(&mut self.calculator);
            task.was_processed_by_solver = true;
        }
    }

    /// Push the tasks that still need a network opinion into the
    /// evaluator's queue.
    pub fn schedule_to_nn(&mut self, evaluator: &mut NNEvaluator) {
        let buffer = &self.buffers[self.current_buffer];

        for i in 0..buffer.stored() {
            let task = buffer.get(i);
            let is_root = task.visited_path_length() == 0;

            // proven tasks are skipped, except at the root where the full
            // policy is still wanted
            if is_root || !task.score.is_proven() {
                evaluator.add_to_queue(i, self.game_config.rows, self.game_config.cols);
                self.stats.nb_network_evaluations += 1;
            }
        }
    }

    pub fn are_tasks_ready(&self) -> bool {
        let buffer = &self.buffers[self.current_buffer];

        (0..buffer.stored()).all(|i| buffer.get(i).is_ready())
    }

    /// Derive the edge list of every buffered task. Does not touch the
    /// tree, so it runs outside the tree lock.
    pub fn generate_edges(&mut self) {
        let buffer = &mut self.buffers[self.current_buffer];

        for i in 0..buffer.stored() {
            let task = buffer.get_mut(i);
            if !task.skip_edge_generation {
                self.generator.generate(task);
            }
        }
    }

    /// Attach the evaluated tasks to the tree.
    pub fn expand(&mut self, tree: &mut Tree) {
        let buffer = &mut self.buffers[self.current_buffer];

        for i in 0..buffer.stored() {
            match tree.expand(buffer.get(i)) {
                ExpandOutcome::Expanded => {},
                ExpandOutcome::AlreadyExpanded => {
                    self.stats.nb_wasted_expansions += 1;
                },
                ExpandOutcome::AllocationFailed => {
                    tree.cancel_virtual_loss(buffer.get(i));
                    buffer.get_mut(i).abandoned = true;
                }
            }
        }
    }

    /// Back every finished task up the tree and recycle the buffer.
    pub fn backup(&mut self, tree: &mut Tree) {
        let buffer = &mut self.buffers[self.current_buffer];

        for i in 0..buffer.stored() {
            let task = buffer.get(i);
            if !task.abandoned {
                tree.backup(task);
                self.stats.nb_node_count += 1;
            }
        }
        buffer.clear();
    }

    /// Cancel everything in flight in both buffers, e.g. when the search
    /// is stopped mid-iteration.
    pub fn cleanup(&mut self, tree: &mut Tree) {
        for buffer in self.buffers.iter_mut() {
            for i in 0..buffer.stored() {
                let task = buffer.get(i);
                if !task.abandoned {
                    tree.cancel_virtual_loss(task);
                }
            }
            buffer.clear();
        }
    }

    /// Evaluate the current buffer's queued tasks synchronously.
    pub fn evaluate(&mut self, evaluator: &mut NNEvaluator) {
        evaluator.evaluate_graph(&mut self.buffers[self.current_buffer]);
    }

    /// Launch the current buffer's queued tasks on the evaluator thread.
    pub fn evaluate_async_launch(&mut self, evaluator: &mut NNEvaluator) -> ::std::time::Instant {
        evaluator.async_evaluate_graph_launch(&mut self.buffers[self.current_buffer])
    }

    /// Join the batch launched one iteration ago, which belongs to the
    /// other buffer.
    pub fn evaluate_async_join_previous(&mut self, evaluator: &mut NNEvaluator) {
        evaluator.async_evaluate_graph_join(&mut self.buffers[1 - self.current_buffer]);
    }

    fn is_duplicate(buffer: &SearchTaskList, index: usize) -> bool {
        let task = buffer.get(index);

        (0..index).any(|i| buffer.get(i).last_pair() == task.last_pair())
    }
}
