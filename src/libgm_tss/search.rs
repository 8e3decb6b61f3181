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
use std::time::{Duration, Instant};

use gm_game::patterns::{PatternCalculator, ThreatType};
use gm_game::{zobrist, Board, GameConfig, HashKey128, Move, Sign};

use crate::actions::{ActionList, ActionStack};
use crate::hashtable::{SharedHashTable, SharedTableData};
use crate::movegen::{MoveGenerator, MoveGeneratorMode, OPP_WEIGHT, OWN_WEIGHT};
use crate::score::{invert_down, invert_up, Bound, Score};

/// How hard the solver tries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TssMode {
    /// Only game end conditions are checked.
    Basic,

    /// The static solver and move generator run once.
    Static,

    /// Full iterative-deepening threat-space search.
    Recursive
}

/// Counters accumulated across calls to `solve`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TssStats {
    pub hits: u64,
    pub total_positions: u64,
    pub cache_hits: u64,
    pub cache_calls: u64
}

impl fmt::Display for TssStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "----TssStats----")?;
        writeln!(f, "solved           = {}", self.hits)?;
        writeln!(f, "total_positions  = {}", self.total_positions)?;
        writeln!(f, "cache_hits/calls = {}/{}", self.cache_hits, self.cache_calls)
    }
}

/// Everything the solver learned about one position.
#[derive(Clone, Debug, Default)]
pub struct TssReport {
    pub score: Score,
    pub actions: Vec<(Move, Score)>,
    pub defensive_moves: Vec<Move>,
    pub must_defend: bool,
    pub has_initiative: bool,
    pub node_count: usize
}

/// Iterative-deepening alpha-beta over tactical moves only, shared between
/// its roles as a terminal-proof solver and a move-ordering oracle for the
/// tree search.
pub struct ThreatSpaceSearch {
    config: GameConfig,
    calculator: PatternCalculator,
    generator: MoveGenerator,
    stack: ActionStack,
    shared_table: Arc<SharedHashTable>,
    movegen_mode: MoveGeneratorMode,

    hash: HashKey128,
    max_positions: usize,
    position_counter: usize,
    deadline: Option<Instant>,
    stats: TssStats
}

const MAX_DEPTH: i32 = 100;

impl ThreatSpaceSearch {
    pub fn new(config: GameConfig, shared_table: Arc<SharedHashTable>) -> Self {
        Self {
            config,
            calculator: PatternCalculator::new(config),
            generator: MoveGenerator::new(config),
            stack: ActionStack::new(16 * config.rows * config.cols),
            shared_table,
            movegen_mode: MoveGeneratorMode::Threats,
            hash: HashKey128::default(),
            max_positions: 0,
            position_counter: 0,
            deadline: None,
            stats: TssStats::default()
        }
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn memory(&self) -> usize {
        self.stack.size() * ::std::mem::size_of::<crate::actions::Action>() + self.shared_table.memory()
    }

    /// Age out transposition table entries; called between top-level
    /// searches.
    pub fn increase_generation(&self) {
        self.shared_table.increase_generation();
    }

    pub fn set_time_limit(&mut self, limit: Option<Duration>) {
        self.deadline = limit.map(|d| Instant::now() + d);
    }

    pub fn stats(&self) -> TssStats {
        self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = TssStats::default();
    }

    /// Solve the given position up to `max_positions` visited nodes.
    ///
    /// # Arguments
    ///
    /// * `board` -
    /// * `sign_to_move` -
    /// * `mode` -
    /// * `max_positions` -
    ///
    pub fn solve(&mut self, board: &Board, sign_to_move: Sign, mode: TssMode, max_positions: usize) -> TssReport {
        self.calculator.set_board(board, sign_to_move);
        self.hash = zobrist::get_hash(board, sign_to_move);
        self.max_positions = max_positions;
        self.position_counter = 0;

        let mut root = self.stack.create_root();
        let score = match mode {
            TssMode::Basic => {
                let score = self.generator.generate(&mut self.calculator, &mut self.stack, &mut root, MoveGeneratorMode::Basic);
                self.stack.advance(root.len());
                score
            },
            TssMode::Static => {
                let score = self.generator.generate(&mut self.calculator, &mut self.stack, &mut root, self.movegen_mode);
                self.stack.advance(root.len());
                score
            },
            TssMode::Recursive => {
                let mut score = Score::default();

                for depth in (2..=MAX_DEPTH).step_by(2) {
                    let high_water = self.stack.high_water_mark();
                    score = self.recursive_solve(depth, Score::minus_infinity(), Score::plus_infinity(), &mut root);

                    // stop once the position is proven, the budget is
                    // exhausted, or the last iteration added nothing new
                    if score.is_proven()
                        || self.position_counter >= self.max_positions
                        || self.out_of_time()
                        || (depth > 2 && self.stack.high_water_mark() == high_water)
                    {
                        break;
                    }
                }
                score
            }
        };

        self.stats.total_positions += self.position_counter as u64;
        self.stats.hits += score.is_proven() as u64;

        let actions: Vec<(Move, Score)> = self.stack.iter(&root)
            .map(|action| (action.mv, action.score))
            .collect();
        let defensive_moves = if root.must_defend {
            actions.iter().map(|&(mv, _)| mv).collect()
        } else {
            Vec::new()
        };

        TssReport {
            score,
            actions,
            defensive_moves,
            must_defend: root.must_defend,
            has_initiative: root.has_initiative,
            node_count: self.position_counter
        }
    }

    /* -------- private -------- */

    fn out_of_time(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn recursive_solve(&mut self, depth_remaining: i32, alpha: Score, beta: Score, actions: &mut ActionList) -> Score {
        debug_assert!(depth_remaining >= 0);
        debug_assert!(alpha < beta);

        let is_root = actions.is_root();
        let mut alpha = alpha;

        // probe the shared hash table; at the root the full action list is
        // still required, so stored scores never cut there
        let mut hash_move = Move::NULL;
        self.stats.cache_calls += 1;
        if let Some(entry) = self.shared_table.seek(self.hash) {
            self.stats.cache_hits += 1;
            hash_move = entry.best_move();

            if !is_root {
                let stored = entry.score();
                if stored.is_proven() {
                    return stored;
                }
                if entry.depth() >= depth_remaining {
                    match entry.bound() {
                        Bound::Exact => { return stored; },
                        Bound::Lower if stored >= beta => { return stored; },
                        Bound::Upper if stored <= alpha => { return stored; },
                        _ => {}
                    }
                }
            }
        }

        self.position_counter += 1;

        if actions.is_empty() {
            let static_score = self.generator.generate(&mut self.calculator, &mut self.stack, actions, self.movegen_mode);
            self.stack.advance(actions.len());

            if static_score.is_proven() {
                // a proof holds at any depth
                self.shared_table.insert(self.hash, SharedTableData::new(
                    actions.must_defend,
                    actions.has_initiative,
                    Bound::Exact,
                    depth_remaining.max(static_score.distance()),
                    static_score,
                    self.stack.best_move(actions)
                ));
                return static_score;
            }
            if !is_root && !actions.has_initiative && !actions.must_defend {
                // no forcing continuation; the threat space ends here
                return self.evaluate();
            }
        }

        if depth_remaining <= 0 {
            return self.evaluate();
        }

        let original_alpha = alpha;
        let mut best_score = Score::minus_infinity();
        let mut best_move = Move::NULL;

        for i in 0..actions.len() {
            // move ordering: the hash move first, then the best remaining
            // action by current score
            if i == 0 && self.is_move_legal(hash_move) && self.stack.move_closer_to_front(actions, hash_move, 0) {
                // nothing else to do
            } else {
                let mut best_index = i;
                for j in i + 1..actions.len() {
                    if self.stack.get(actions, best_index).score < self.stack.get(actions, j).score {
                        best_index = j;
                    }
                }
                self.stack.swap(actions, i, best_index);
            }

            let action = self.stack.get(actions, i);
            if action.score.is_unproven() && self.position_counter < self.max_positions && !self.out_of_time() {
                let mut child = self.stack.create_from_action(actions, i);

                zobrist::update_hash(&mut self.hash, action.mv);
                self.shared_table.prefetch(self.hash);
                self.calculator.add_move(action.mv);

                let result = invert_up(self.recursive_solve(
                    depth_remaining - 1,
                    invert_down(beta),
                    invert_down(alpha),
                    &mut child
                ));

                self.calculator.undo_move(action.mv);
                zobrist::update_hash(&mut self.hash, action.mv);

                self.stack.set_score(actions, i, result);
                self.stack.finalize(actions, i, &child);
            }

            let score = self.stack.get(actions, i).score;
            if score > best_score {
                best_score = score;
                best_move = self.stack.get(actions, i).mv;

                if !is_root {
                    // exact scores are wanted at the root
                    if best_score >= beta {
                        break; // fail-soft beta cutoff
                    }
                    if best_score > alpha {
                        alpha = best_score;
                    }
                }
            }
        }

        if actions.is_empty() {
            return self.evaluate();
        }
        if best_score.is_loss() {
            if actions.is_fully_expanded {
                // omitted moves are covered by the baseline, so the loss
                // stands; prefer whichever lasts longer
                if actions.baseline_score.is_proven() && actions.baseline_score > best_score {
                    best_score = actions.baseline_score;
                }
            } else {
                // not every move was considered, so a loss cannot be proven
                best_score = self.evaluate();
            }
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        let stored_depth = if best_score.is_proven() {
            // a proof holds at any depth
            depth_remaining.max(best_score.distance())
        } else {
            depth_remaining
        };
        self.shared_table.insert(self.hash, SharedTableData::new(
            actions.must_defend,
            actions.has_initiative,
            bound,
            stored_depth,
            best_score,
            best_move
        ));

        debug_assert!(best_score != Score::minus_infinity());
        best_score
    }

    fn is_move_legal(&self, mv: Move) -> bool {
        !mv.is_null()
            && mv.sign() == self.calculator.sign_to_move()
            && mv.row() < self.config.rows
            && mv.col() < self.config.cols
            && self.calculator.sign_at(mv.row(), mv.col()) == Sign::None
    }

    /// Deterministic linear combination of the threat histograms, from the
    /// side to move's point of view.
    fn evaluate(&self) -> Score {
        let own = self.calculator.sign_to_move();
        let opp = own.invert();

        let mut result = 12;
        for threat in ThreatType::Open3 as usize..=ThreatType::Five as usize {
            result += OWN_WEIGHT[threat] * self.calculator.threat_histogram(own).number_of(ThreatType::from_u8(threat as u8)) as i32;
            result += OPP_WEIGHT[threat] * self.calculator.threat_histogram(opp).number_of(ThreatType::from_u8(threat as u8)) as i32;
        }

        Score::from_eval(result.clamp(-1000, 1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_game::GameRules;

    fn board_with(moves: &[(usize, usize, Sign)]) -> Board {
        let mut board = Board::new(15, 15);
        for &(row, col, sign) in moves {
            board[(row, col)] = sign;
        }
        board
    }

    fn solver() -> ThreatSpaceSearch {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        ThreatSpaceSearch::new(config, Arc::new(SharedHashTable::new(1 << 16)))
    }

    #[test]
    fn win_in_one() {
        let board = board_with(&[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross),
            (6, 5, Sign::Circle), (6, 6, Sign::Circle), (6, 7, Sign::Circle)
        ]);
        let mut tss = solver();

        let report = tss.solve(&board, Sign::Cross, TssMode::Recursive, 10_000);

        assert_eq!(report.score, Score::win_in(1));
        let (best, score) = report.actions[0];
        assert!(best == Move::new(7, 4, Sign::Cross) || best == Move::new(7, 9, Sign::Cross));
        assert_eq!(score, Score::win_in(1));
    }

    #[test]
    fn must_defend_against_open_four() {
        let board = board_with(&[
            (5, 5, Sign::Circle), (5, 6, Sign::Circle), (5, 7, Sign::Circle), (5, 8, Sign::Circle),
            (9, 9, Sign::Cross), (9, 10, Sign::Cross), (10, 10, Sign::Cross)
        ]);
        let mut tss = solver();

        let report = tss.solve(&board, Sign::Cross, TssMode::Static, 1_000);

        assert!(report.must_defend);
        let defensive: Vec<Move> = report.defensive_moves;
        assert!(defensive.contains(&Move::new(5, 4, Sign::Cross)));
        assert!(defensive.contains(&Move::new(5, 9, Sign::Cross)));
    }

    #[test]
    fn win_by_forcing_sequence() {
        // (7,8) makes a four and builds a column three at the same time;
        // after the forced block at (7,9) the column turns into an open
        // four, so cross wins in five plys
        let board = board_with(&[
            (7, 4, Sign::Circle),
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross),
            (5, 8, Sign::Cross), (6, 8, Sign::Cross),
            (0, 0, Sign::Circle), (0, 2, Sign::Circle), (2, 0, Sign::Circle), (2, 2, Sign::Circle)
        ]);
        let mut tss = solver();

        let report = tss.solve(&board, Sign::Cross, TssMode::Recursive, 100_000);

        assert_eq!(report.score, Score::win_in(5), "score is {}", report.score);
        let best = report.actions.iter().max_by_key(|&&(_, score)| score).unwrap();
        assert_eq!(best.0, Move::new(7, 8, Sign::Cross));
    }

    #[test]
    fn quiet_position_is_unproven() {
        let board = board_with(&[(7, 7, Sign::Cross), (8, 8, Sign::Circle)]);
        let mut tss = solver();

        let report = tss.solve(&board, Sign::Cross, TssMode::Recursive, 10_000);

        assert!(report.score.is_unproven());
        assert!(!report.must_defend);
    }

    #[test]
    fn proven_root_is_stored_exactly() {
        let board = board_with(&[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross),
            (6, 5, Sign::Circle), (6, 6, Sign::Circle), (6, 7, Sign::Circle)
        ]);
        let mut tss = solver();

        let report = tss.solve(&board, Sign::Cross, TssMode::Recursive, 10_000);
        assert!(report.score.is_win());

        let entry = tss.shared_table.seek(zobrist::get_hash(&board, Sign::Cross));
        assert!(entry.is_some());
        let entry = entry.unwrap();
        assert!(entry.score().is_win());
        assert_eq!(entry.bound(), Bound::Exact);
    }
}
