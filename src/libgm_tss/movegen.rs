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

use gm_game::patterns::{col_step, row_step, PatternCalculator, PatternType, ThreatType, ALL_DIRECTIONS};
use gm_game::{GameConfig, GameRules, Move, Sign};

use crate::actions::{ActionList, ActionStack};
use crate::score::Score;

/// How many candidate moves to enumerate for one ply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveGeneratorMode {
    /// Only check whether the game is already decided.
    Basic,

    /// Forcing moves only: own fives, fours and threes, and refutations of
    /// the opponent's threats.
    Threats,

    /// Threats plus the neighbourhood of existing stones.
    Reduced,

    /// Every legal move.
    Optimal
}

/// Move ordering and evaluation weights per threat type, for the side to
/// move and for the opponent.
pub(crate) const OWN_WEIGHT: [i32; ThreatType::COUNT] = [0, 0, 19, 49, 76, 170, 33, 159, 252, 0];
pub(crate) const OPP_WEIGHT: [i32; ThreatType::COUNT] = [0, 0, -1, -50, -45, -135, -14, -154, -496, 0];

/// Enumerates tactical candidate moves from the pattern calculator state
/// and proves trivially decided positions.
#[derive(Clone)]
pub struct MoveGenerator {
    config: GameConfig
}

impl MoveGenerator {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    /// Fill `list` with the candidate moves of the current position under
    /// the given mode, setting `has_initiative`, `must_defend`,
    /// `is_fully_expanded` and `baseline_score`. Returns a proven score if
    /// the position can be statically decided, and an unknown score
    /// otherwise.
    ///
    /// # Arguments
    ///
    /// * `calc` -
    /// * `stack` -
    /// * `list` -
    /// * `mode` -
    ///
    pub fn generate(
        &self,
        calc: &mut PatternCalculator,
        stack: &mut ActionStack,
        list: &mut ActionList,
        mode: MoveGeneratorMode
    ) -> Score {
        let own = calc.sign_to_move();
        let opp = own.invert();

        // adjudicated draws leave nothing to search
        if calc.number_of_moves() >= self.config.draw_after {
            return Score::draw_in(0);
        }

        // a five of our own ends the game immediately
        if let Some(mv) = self.first_usable(calc, own, ThreatType::Five) {
            stack.push(list, mv, Score::win_in(1));
            list.has_initiative = true;
            list.is_fully_expanded = true;
            return Score::win_in(1);
        }

        if mode == MoveGeneratorMode::Basic {
            return Score::default();
        }

        list.has_initiative = self.has_any_usable_four(calc, own);

        // the opponent completes a five unless we answer right now
        let opponent_fives: Vec<Move> = calc.threat_histogram(opp).get(ThreatType::Five).to_vec();
        if !opponent_fives.is_empty() {
            list.must_defend = true;
            list.is_fully_expanded = true;
            list.baseline_score = Score::loss_in(2);

            for &five in opponent_fives.iter() {
                self.push_unique(calc, stack, list, own, five.location().row as usize, five.location().col as usize);
            }
            self.push_own_fours(calc, stack, list, own);

            let distinct = distinct_locations(&opponent_fives);
            if distinct >= 2 && !list.has_initiative {
                // two fives cannot both be blocked, and there is no
                // counter-check to interleave
                return Score::loss_in(2);
            }
            return Score::default();
        }

        // an open four (or a double-four fork) of our own cannot be
        // defended once placed
        for threat in [ThreatType::Open4, ThreatType::Fork4x4] {
            if let Some(mv) = self.first_usable(calc, own, threat) {
                stack.push(list, mv, Score::win_in(3));
                list.has_initiative = true;
                return Score::win_in(3);
            }
        }

        // our own forcing moves
        self.push_own_fours(calc, stack, list, own);
        for threat in [ThreatType::Fork3x3, ThreatType::Open3] {
            for row_col in self.usable(calc, own, threat) {
                self.push_unique(calc, stack, list, own, row_col.0, row_col.1);
            }
        }

        // the opponent threatens an open four; collect the answers
        let opponent_open_fours: Vec<Move> = [ThreatType::Open4, ThreatType::Fork4x4].iter()
            .flat_map(|&t| calc.threat_histogram(opp).get(t).iter().copied())
            .collect();
        if !opponent_open_fours.is_empty() {
            list.must_defend = true;

            for &mv in opponent_open_fours.iter() {
                let (row, col) = (mv.row(), mv.col());
                self.push_unique(calc, stack, list, own, row, col);
                self.push_defensive_cells(calc, stack, list, own, opp, row, col);
            }
        }

        match mode {
            MoveGeneratorMode::Reduced => {
                self.push_neighbourhood(calc, stack, list, own);
            },
            MoveGeneratorMode::Optimal => {
                let mut empty = 0;
                for row in 0..self.config.rows {
                    for col in 0..self.config.cols {
                        if calc.sign_at(row, col) == Sign::None {
                            empty += 1;
                            self.push_unique(calc, stack, list, own, row, col);
                        }
                    }
                }
                list.is_fully_expanded = true;

                if empty == 0 {
                    return Score::draw_in(0);
                }
            },
            _ => {}
        }

        Score::default()
    }

    /* -------- private -------- */

    /// Returns the squares of the given threat type that the side to move
    /// may actually occupy (i.e. not forbidden under RENJU).
    fn usable(&self, calc: &mut PatternCalculator, sign: Sign, threat: ThreatType) -> Vec<(usize, usize)> {
        let squares: Vec<Move> = calc.threat_histogram(sign).get(threat).to_vec();

        squares.into_iter()
            .map(|mv| (mv.row(), mv.col()))
            .filter(|&(row, col)| self.is_playable(calc, sign, row, col))
            .collect()
    }

    fn first_usable(&self, calc: &mut PatternCalculator, sign: Sign, threat: ThreatType) -> Option<Move> {
        self.usable(calc, sign, threat).first()
            .map(|&(row, col)| Move::new(row, col, sign))
    }

    fn is_playable(&self, calc: &mut PatternCalculator, sign: Sign, row: usize, col: usize) -> bool {
        self.config.rules != GameRules::Renju
            || sign != Sign::Cross
            || !calc.is_forbidden(row, col)
    }

    fn has_any_usable_four(&self, calc: &mut PatternCalculator, sign: Sign) -> bool {
        [ThreatType::HalfOpen4, ThreatType::Fork4x3, ThreatType::Fork4x4, ThreatType::Open4].iter()
            .any(|&t| !self.usable(calc, sign, t).is_empty())
    }

    fn push_own_fours(&self, calc: &mut PatternCalculator, stack: &mut ActionStack, list: &mut ActionList, own: Sign) {
        for threat in [ThreatType::Open4, ThreatType::Fork4x4, ThreatType::Fork4x3, ThreatType::HalfOpen4] {
            for (row, col) in self.usable(calc, own, threat) {
                self.push_unique(calc, stack, list, own, row, col);
            }
        }
    }

    /// The cells that weaken the opponent's open-three patterns at the
    /// given promotion square.
    fn push_defensive_cells(
        &self,
        calc: &mut PatternCalculator,
        stack: &mut ActionStack,
        list: &mut ActionList,
        own: Sign,
        opp: Sign,
        row: usize,
        col: usize
    ) {
        let pad = calc.padding() as isize;

        for dir in ALL_DIRECTIONS {
            if calc.pattern_type_at(opp, row, col, dir) < PatternType::Open3 {
                continue;
            }

            let mask = calc.defensive_moves(opp, row, col, dir);
            let (dr, dc) = (row_step(dir), col_step(dir));

            for cell in 0..2 * calc.padding() + 1 {
                if mask & (1 << cell) == 0 {
                    continue;
                }
                let nr = row as isize + (cell as isize - pad) * dr;
                let nc = col as isize + (cell as isize - pad) * dc;

                if nr >= 0 && nc >= 0 && (nr as usize) < self.config.rows && (nc as usize) < self.config.cols
                    && calc.sign_at(nr as usize, nc as usize) == Sign::None
                {
                    self.push_unique(calc, stack, list, own, nr as usize, nc as usize);
                }
            }
        }
    }

    fn push_neighbourhood(&self, calc: &mut PatternCalculator, stack: &mut ActionStack, list: &mut ActionList, own: Sign) {
        for row in 0..self.config.rows {
            for col in 0..self.config.cols {
                if calc.sign_at(row, col) == Sign::None && self.has_nearby_stone(calc, row, col) {
                    self.push_unique(calc, stack, list, own, row, col);
                }
            }
        }
    }

    fn has_nearby_stone(&self, calc: &PatternCalculator, row: usize, col: usize) -> bool {
        for dr in -2isize..=2 {
            for dc in -2isize..=2 {
                let (nr, nc) = (row as isize + dr, col as isize + dc);
                if nr >= 0 && nc >= 0 && (nr as usize) < self.config.rows && (nc as usize) < self.config.cols
                    && calc.sign_at(nr as usize, nc as usize).is_player()
                {
                    return true;
                }
            }
        }
        false
    }

    fn push_unique(
        &self,
        calc: &mut PatternCalculator,
        stack: &mut ActionStack,
        list: &mut ActionList,
        own: Sign,
        row: usize,
        col: usize
    ) {
        debug_assert_eq!(calc.sign_at(row, col), Sign::None);

        let mv = Move::new(row, col, own);
        if stack.contains(list, mv) || !self.is_playable(calc, own, row, col) {
            return;
        }

        let ordering = OWN_WEIGHT[calc.threat_at(own, row, col) as usize]
            - OPP_WEIGHT[calc.threat_at(own.invert(), row, col) as usize];
        stack.push(list, mv, Score::from_eval(ordering.clamp(-1000, 1000)));
    }
}

fn distinct_locations(moves: &[Move]) -> usize {
    let mut seen: Vec<(usize, usize)> = Vec::with_capacity(moves.len());
    for mv in moves.iter() {
        let loc = (mv.row(), mv.col());
        if !seen.contains(&loc) {
            seen.push(loc);
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_game::Board;

    fn setup(moves: &[(usize, usize, Sign)], sign_to_move: Sign) -> (PatternCalculator, ActionStack) {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut board = Board::new(15, 15);
        for &(row, col, sign) in moves {
            board[(row, col)] = sign;
        }

        let mut calc = PatternCalculator::new(config);
        calc.set_board(&board, sign_to_move);
        (calc, ActionStack::new(4096))
    }

    #[test]
    fn win_in_one_is_found() {
        let (mut calc, mut stack) = setup(&[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross)
        ], Sign::Cross);
        let generator = MoveGenerator::new(calc.config());
        let mut list = stack.create_root();

        let score = generator.generate(&mut calc, &mut stack, &mut list, MoveGeneratorMode::Threats);

        assert_eq!(score, Score::win_in(1));
        assert_eq!(list.len(), 1);
        let mv = stack.get(&list, 0).mv;
        assert!(mv == Move::new(7, 4, Sign::Cross) || mv == Move::new(7, 9, Sign::Cross));
    }

    #[test]
    fn open_four_forces_defence() {
        let (mut calc, mut stack) = setup(&[
            (5, 5, Sign::Circle), (5, 6, Sign::Circle), (5, 7, Sign::Circle), (5, 8, Sign::Circle)
        ], Sign::Cross);
        let generator = MoveGenerator::new(calc.config());
        let mut list = stack.create_root();

        let score = generator.generate(&mut calc, &mut stack, &mut list, MoveGeneratorMode::Threats);

        assert!(list.must_defend);
        assert!(stack.contains(&list, Move::new(5, 4, Sign::Cross)));
        assert!(stack.contains(&list, Move::new(5, 9, Sign::Cross)));
        assert_eq!(list.len(), 2);
        // cross has no counter-four, so the position is statically lost
        assert_eq!(score, Score::loss_in(2));
    }

    #[test]
    fn own_open_four_wins_in_three() {
        let (mut calc, mut stack) = setup(&[
            (9, 4, Sign::Cross), (9, 5, Sign::Cross), (9, 6, Sign::Cross),
            (0, 0, Sign::Circle), (0, 1, Sign::Circle)
        ], Sign::Cross);
        let generator = MoveGenerator::new(calc.config());
        let mut list = stack.create_root();

        let score = generator.generate(&mut calc, &mut stack, &mut list, MoveGeneratorMode::Threats);

        assert_eq!(score, Score::win_in(3));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn optimal_mode_is_fully_expanded() {
        let (mut calc, mut stack) = setup(&[(7, 7, Sign::Cross)], Sign::Circle);
        let generator = MoveGenerator::new(calc.config());
        let mut list = stack.create_root();

        let score = generator.generate(&mut calc, &mut stack, &mut list, MoveGeneratorMode::Optimal);

        assert!(score.is_unproven());
        assert!(list.is_fully_expanded);
        assert_eq!(list.len(), 15 * 15 - 1);
    }
}
