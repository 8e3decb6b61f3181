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

use ordered_float::OrderedFloat;

use gm_game::{board, rules, Move, Sign};
use gm_tss::{ProvenValue, Score, Value};

use crate::node::Edge;
use crate::search_task::SearchTask;

/// Turns an evaluated task into the edge list its node will carry.
pub trait EdgeGenerator: Send {
    fn generate(&self, task: &mut SearchTask);
}

/// The standard generator: defensive-move override while defending, the
/// full legal move set otherwise, pruned to the strongest candidates by
/// policy prior.
pub struct BaseGenerator {
    max_edges: usize,
    policy_threshold: f32,
    fully_expand_root: bool
}

impl BaseGenerator {
    pub fn new(max_edges: usize, policy_threshold: f32, fully_expand_root: bool) -> Self {
        Self { max_edges, policy_threshold, fully_expand_root }
    }
}

impl EdgeGenerator for BaseGenerator {
    fn generate(&self, task: &mut SearchTask) {
        debug_assert!(task.is_ready());

        if task.must_defend && task.visited_path_length() > 0 {
            debug_assert!(task.was_processed_by_solver);

            let defensive_moves = task.defensive_moves.clone();
            for mv in defensive_moves {
                task.add_edge(mv);
            }
            initialize_edges(task);

            // every move outside the defensive set loses faster than the
            // defences do
            task.edges_are_exhaustive = true;
        } else {
            let max_edges = if task.visited_path_length() == 0 && self.fully_expand_root {
                usize::MAX
            } else {
                self.max_edges
            };
            let early_prune = task.visited_path_length() != 0;

            let skipped = create_legal_edges(task, early_prune, self.policy_threshold);
            initialize_edges(task);
            if !task.was_processed_by_solver {
                check_terminal_conditions(task, skipped == 0);
            }
            let pruned = prune_weak_moves(&mut task.edges, max_edges);
            task.edges_are_exhaustive = skipped == 0 && !pruned && !(task.score.is_win() && early_prune);
        }

        if task.edges.is_empty() {
            // a terminal position (e.g. a filled board); the node becomes a
            // leaf carrying only its proven score
            return;
        }
        renormalize_policy(&mut task.edges);
    }
}

/// Fully expands every node down to the given depth, so that shallow moves
/// are compared on equal footing; used for opening balancing.
pub struct BalancedGenerator {
    balance_depth: usize,
    base: Box<dyn EdgeGenerator>
}

impl BalancedGenerator {
    pub fn new(balance_depth: usize, base: Box<dyn EdgeGenerator>) -> Self {
        Self { balance_depth, base }
    }
}

impl EdgeGenerator for BalancedGenerator {
    fn generate(&self, task: &mut SearchTask) {
        debug_assert!(task.is_ready());

        if task.visited_path_length() < self.balance_depth {
            BaseGenerator::new(usize::MAX, 0.0, true).generate(task);
        } else {
            self.base.generate(task);
        }
    }
}

/// Add one edge per legal move. With a proven win and pruning enabled only
/// the winning moves are added. Returns the number of legal moves skipped
/// by the policy threshold.
fn create_legal_edges(task: &mut SearchTask, prune: bool, policy_threshold: f32) -> usize {
    let (rows, cols) = (task.board().rows(), task.board().cols());

    if task.score.is_win() && prune {
        for row in 0..rows {
            for col in 0..cols {
                if task.action_scores[(row, col)].is_win() {
                    debug_assert_eq!(task.board()[(row, col)], Sign::None);
                    task.add_edge(Move::new(row, col, task.sign_to_move()));
                }
            }
        }
        return 0;
    }

    let mut skipped = 0;
    for row in 0..rows {
        for col in 0..cols {
            if task.board()[(row, col)] == Sign::None {
                if task.policy[(row, col)] >= policy_threshold || !prune {
                    task.add_edge(Move::new(row, col, task.sign_to_move()));
                } else {
                    skipped += 1;
                }
            }
        }
    }

    // a position with legal moves must produce at least one edge, even if
    // the whole policy mass sits below the threshold
    if task.edges.is_empty() && skipped > 0 {
        for row in 0..rows {
            for col in 0..cols {
                if task.board()[(row, col)] == Sign::None {
                    task.add_edge(Move::new(row, col, task.sign_to_move()));
                }
            }
        }
        skipped = 0;
    }
    skipped
}

/// Copy the per-square policy, value and score planes into the edges.
fn initialize_edges(task: &mut SearchTask) {
    let mut edges = ::std::mem::take(&mut task.edges);

    for edge in edges.iter_mut() {
        let mv = edge.mv();
        edge.set_policy(task.policy[(mv.row(), mv.col())]);
        edge.set_value(task.action_values[(mv.row(), mv.col())]);
        edge.set_score(task.action_scores[(mv.row(), mv.col())]);
    }
    task.edges = edges;
}

/// Detect immediately decided moves by playing each candidate: a winning
/// move proves the task a win, a full set of losing moves a loss.
///
/// # Arguments
///
/// * `task` -
/// * `is_exhaustive` - whether `task.edges` covers every legal move
///
fn check_terminal_conditions(task: &mut SearchTask, is_exhaustive: bool) {
    let config = task.config();
    let sign_to_move = task.sign_to_move();
    let mut edges = ::std::mem::take(&mut task.edges);
    let mut board = task.board().clone();

    let mut has_win = false;
    let mut has_draw = false;
    let mut num_losing = 0;

    for edge in edges.iter_mut() {
        let mv = edge.mv();

        board::put_move(&mut board, mv);
        let outcome = rules::get_outcome(config.rules, &board, mv, config.draw_after);
        board::undo_move(&mut board, mv);

        match ProvenValue::from_outcome(outcome, sign_to_move) {
            ProvenValue::Unknown => {},
            ProvenValue::Loss => {
                num_losing += 1;
                edge.set_score(Score::loss_in(1));
                edge.set_value(Value::loss());
            },
            ProvenValue::Draw => {
                has_draw = true;
                edge.set_score(Score::draw_in(1));
                edge.set_value(Value::draw());
            },
            ProvenValue::Win => {
                has_win = true;
                edge.set_score(Score::win_in(1));
                edge.set_value(Value::win());
            }
        }
    }

    if has_win {
        task.score = Score::win_in(1);
        task.value = Value::win();
    } else if has_draw {
        task.score = Score::draw_in(1);
        task.value = Value::draw();
    } else if num_losing == edges.len() && is_exhaustive {
        task.score = Score::loss_in(1);
        task.value = Value::loss();
    }

    task.edges = edges;
}

/// Keep the `max_edges` strongest edges by policy prior. Returns true if
/// anything was dropped.
fn prune_weak_moves(edges: &mut Vec<Edge>, max_edges: usize) -> bool {
    if edges.len() <= max_edges {
        return false;
    }

    edges.sort_by_key(|edge| ::std::cmp::Reverse((edge.score(), OrderedFloat(edge.policy()))));
    edges.truncate(max_edges);
    true
}

/// Scale the edge priors so that they sum to one.
fn renormalize_policy(edges: &mut [Edge]) {
    let total: f32 = edges.iter().map(|e| e.policy()).sum();

    if (total - 1.0).abs() > 0.01 {
        if total <= 0.0 {
            let uniform = 1.0 / edges.len() as f32;
            for edge in edges.iter_mut() {
                edge.set_policy(uniform);
            }
        } else {
            let recip = total.recip();
            for edge in edges.iter_mut() {
                edge.set_policy(edge.policy() * recip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_game::{Board, GameConfig, GameRules, Sign};

    fn ready_task(config: GameConfig, stones: &[(usize, usize, Sign)], sign_to_move: Sign) -> SearchTask {
        let mut board = Board::new(config.rows, config.cols);
        for &(row, col, sign) in stones {
            board[(row, col)] = sign;
        }

        let mut task = SearchTask::new(config);
        task.set(&board, sign_to_move);
        task.was_processed_by_network = true;
        task
    }

    #[test]
    fn full_root_expansion() {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut task = ready_task(config, &[(7, 7, Sign::Cross)], Sign::Circle);

        BaseGenerator::new(32, 1.0e-4, true).generate(&mut task);

        assert_eq!(task.edges.len(), 15 * 15 - 1);
        assert!(task.edges_are_exhaustive);

        let total: f32 = task.edges.iter().map(|e| e.policy()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn interior_nodes_are_pruned_by_policy() {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut task = ready_task(config, &[(7, 7, Sign::Cross)], Sign::Circle);
        task.append(0, 0, Move::new(8, 8, Sign::Circle));

        // concentrate the policy on a few squares
        task.policy[(7, 6)] = 0.5;
        task.policy[(6, 6)] = 0.3;
        task.policy[(6, 7)] = 0.2;

        BaseGenerator::new(8, 1.0e-4, true).generate(&mut task);

        assert_eq!(task.edges.len(), 3);
        assert!(!task.edges_are_exhaustive);
    }

    #[test]
    fn defensive_moves_override_generation() {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut task = ready_task(config, &[], Sign::Cross);
        task.append(0, 0, Move::new(0, 0, Sign::Cross));
        task.must_defend = true;
        task.was_processed_by_solver = true;
        task.add_defensive_move(Move::new(5, 4, Sign::Circle));
        task.add_defensive_move(Move::new(5, 9, Sign::Circle));

        BaseGenerator::new(32, 1.0e-4, true).generate(&mut task);

        assert_eq!(task.edges.len(), 2);
        assert!(task.edges_are_exhaustive);
        assert_eq!(task.edges[0].mv(), Move::new(5, 4, Sign::Circle));
    }

    #[test]
    fn terminal_win_is_detected() {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut task = ready_task(config, &[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross),
            (6, 5, Sign::Circle), (6, 6, Sign::Circle), (6, 7, Sign::Circle)
        ], Sign::Cross);
        for row in 0..15 {
            for col in 0..15 {
                task.policy[(row, col)] = 1.0 / 225.0;
            }
        }

        BaseGenerator::new(usize::MAX, 0.0, true).generate(&mut task);

        assert_eq!(task.score, Score::win_in(1));
        let winning: Vec<&Edge> = task.edges.iter().filter(|e| e.score().is_win()).collect();
        assert_eq!(winning.len(), 2);
    }
}
