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

use std::sync::Arc;

use gm_utils::Matrix;

use crate::board::Board;
use crate::moves::Move;
use crate::patterns::histogram::ThreatHistogram;
use crate::patterns::pattern::{col_step, row_step, Direction, ALL_DIRECTIONS};
use crate::patterns::table::{PatternTable, PatternType};
use crate::patterns::threat::{Threat, ThreatTable, ThreatType};
use crate::rules::{GameConfig, GameRules};
use crate::sign::Sign;

/// The four directional pattern types of one square, for either colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PatternGroup {
    cross: [PatternType; 4],
    circle: [PatternType; 4]
}

/// Incrementally maintained tactical state of one board position: for every
/// empty square the pattern classification of the four lines through it,
/// the aggregated threat per colour, and per-colour threat histograms.
///
/// After any sequence of `add_move` / `undo_move` calls the state is
/// identical to `set_board` on the resulting position.
#[derive(Clone)]
pub struct PatternCalculator {
    config: GameConfig,
    pad: usize,
    sign_to_move: Sign,
    stones: usize,

    internal: Matrix<Sign>,
    raw: Matrix<[u32; 4]>,
    types: Matrix<PatternGroup>,
    threats: Matrix<Threat>,

    cross_threats: ThreatHistogram,
    circle_threats: ThreatHistogram,

    pattern_table: Arc<PatternTable>,
    threat_table: Arc<ThreatTable>
}

impl PatternCalculator {
    pub fn new(config: GameConfig) -> Self {
        let pad = PatternTable::length(config.rules) / 2;
        let rows = config.rows;
        let cols = config.cols;

        Self {
            config,
            pad,
            sign_to_move: Sign::Cross,
            stones: 0,
            internal: Matrix::from_fill(rows + 2 * pad, cols + 2 * pad, Sign::Illegal),
            raw: Matrix::new(rows, cols),
            types: Matrix::new(rows, cols),
            threats: Matrix::new(rows, cols),
            cross_threats: ThreatHistogram::new(),
            circle_threats: ThreatHistogram::new(),
            pattern_table: PatternTable::get(config.rules),
            threat_table: ThreatTable::get(config.rules)
        }
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn padding(&self) -> usize {
        self.pad
    }

    pub fn sign_to_move(&self) -> Sign {
        self.sign_to_move
    }

    pub fn sign_at(&self, row: usize, col: usize) -> Sign {
        self.internal[(self.pad + row, self.pad + col)]
    }

    pub fn number_of_moves(&self) -> usize {
        self.stones
    }

    /// The window encoding at the given square along `dir`, with the centre
    /// cell forced empty as the pattern table expects.
    pub fn raw_feature_at(&self, row: usize, col: usize, dir: Direction) -> u32 {
        self.raw[(row, col)][dir] & !(3 << (2 * self.pad))
    }

    pub fn pattern_type_at(&self, sign: Sign, row: usize, col: usize, dir: Direction) -> PatternType {
        let group = &self.types[(row, col)];
        if sign == Sign::Cross { group.cross[dir] } else { group.circle[dir] }
    }

    pub fn pattern_types_at(&self, sign: Sign, row: usize, col: usize) -> [PatternType; 4] {
        let group = &self.types[(row, col)];
        if sign == Sign::Cross { group.cross } else { group.circle }
    }

    pub fn threat_at(&self, sign: Sign, row: usize, col: usize) -> ThreatType {
        self.threats[(row, col)].for_sign(sign)
    }

    /// The window cells (as a bitmask) where the opponent of `sign` has to
    /// answer the pattern of `sign` at this square and direction.
    pub fn defensive_moves(&self, sign: Sign, row: usize, col: usize, dir: Direction) -> u16 {
        self.pattern_table.pattern_data(self.raw_feature_at(row, col, dir)).defensive_moves(sign)
    }

    pub fn threat_histogram(&self, sign: Sign) -> &ThreatHistogram {
        debug_assert!(sign.is_player());
        if sign == Sign::Cross { &self.cross_threats } else { &self.circle_threats }
    }

    /// Rebuild the whole state from the given board.
    ///
    /// # Arguments
    ///
    /// * `board` -
    /// * `sign_to_move` -
    ///
    pub fn set_board(&mut self, board: &Board, sign_to_move: Sign) {
        debug_assert_eq!(board.rows(), self.config.rows);
        debug_assert_eq!(board.cols(), self.config.cols);

        self.sign_to_move = sign_to_move;
        self.stones = 0;
        self.internal.fill(Sign::Illegal);
        for row in 0..board.rows() {
            for col in 0..board.cols() {
                self.internal[(self.pad + row, self.pad + col)] = board[(row, col)];
                self.stones += board[(row, col)].is_player() as usize;
            }
        }

        self.calculate_raw_features();
        self.classify_all();
    }

    /// Place a move, updating the neighbourhood incrementally.
    pub fn add_move(&mut self, mv: Move) {
        debug_assert!(mv.sign().is_player());
        debug_assert_eq!(self.sign_at(mv.row(), mv.col()), Sign::None);

        let (row, col) = (mv.row(), mv.col());

        // the centre no longer carries threats of its own
        let old = self.threats[(row, col)];
        self.cross_threats.remove(old.for_cross, Move::new(row, col, Sign::Cross));
        self.circle_threats.remove(old.for_circle, Move::new(row, col, Sign::Circle));
        self.threats[(row, col)] = Threat::default();
        self.types[(row, col)] = PatternGroup::default();

        // which neighbours can change is recorded in the update masks of
        // the windows through the centre
        let update_masks = [
            self.window_data_update_mask(row, col, 0),
            self.window_data_update_mask(row, col, 1),
            self.window_data_update_mask(row, col, 2),
            self.window_data_update_mask(row, col, 3)
        ];

        self.internal[(self.pad + row, self.pad + col)] = mv.sign();
        self.stones += 1;
        self.splat_sign(row, col, mv.sign());
        self.reclassify_neighbourhood(row, col, &update_masks);

        self.sign_to_move = mv.sign().invert();
    }

    /// Take back a move, updating the neighbourhood incrementally.
    pub fn undo_move(&mut self, mv: Move) {
        debug_assert_eq!(self.sign_at(mv.row(), mv.col()), mv.sign());

        let (row, col) = (mv.row(), mv.col());

        self.internal[(self.pad + row, self.pad + col)] = Sign::None;
        self.stones -= 1;
        self.splat_sign(row, col, Sign::None);

        let update_masks = [
            self.window_data_update_mask(row, col, 0),
            self.window_data_update_mask(row, col, 1),
            self.window_data_update_mask(row, col, 2),
            self.window_data_update_mask(row, col, 3)
        ];
        self.reclassify_neighbourhood(row, col, &update_masks);

        // the centre is empty again and carries threats of its own
        self.reclassify_square(row, col);

        self.sign_to_move = mv.sign();
    }

    /// Returns true if placing Cross here would form a 3x3 fork, a 4x4 fork
    /// or an overline, which lose immediately under RENJU. Needs mutable
    /// access because genuine open threes are verified by probing.
    pub fn is_forbidden(&mut self, row: usize, col: usize) -> bool {
        if self.config.rules != GameRules::Renju || self.sign_at(row, col) != Sign::None {
            return false;
        }

        match self.threats[(row, col)].for_cross {
            ThreatType::Overline | ThreatType::Fork4x4 => true,
            ThreatType::Fork3x3 => self.verify_double_three(row, col),
            _ => false
        }
    }

    /// Returns true if placing Cross at the given empty square forms four
    /// in a row along `dir`.
    pub fn is_straight_four_at(&self, row: usize, col: usize, dir: Direction) -> bool {
        debug_assert_eq!(self.sign_at(row, col), Sign::None);

        let encoding = self.raw_feature_at(row, col, dir) | ((Sign::Cross as u32) << (2 * self.pad));
        let length = 2 * self.pad + 1;

        (0..=length - 4).any(|shift| (encoding >> (2 * shift)) & 0xFF == 0x55)
    }

    /* -------- private -------- */

    fn window_data_update_mask(&self, row: usize, col: usize, dir: Direction) -> u16 {
        self.pattern_table.pattern_data(self.raw_feature_at(row, col, dir)).update_mask()
    }

    /// Write `sign` into the windows of every square within range of the
    /// centre, along all four directions.
    fn splat_sign(&mut self, row: usize, col: usize, sign: Sign) {
        let pad = self.pad as isize;

        for dir in ALL_DIRECTIONS {
            let (dr, dc) = (row_step(dir), col_step(dir));

            for i in -pad..=pad {
                let nr = row as isize + i * dr;
                let nc = col as isize + i * dc;

                if self.raw.is_inside(nr, nc) {
                    let cell = (pad - i) as u32;
                    let window = &mut self.raw[(nr as usize, nc as usize)][dir];
                    *window &= !(3 << (2 * cell));
                    *window |= (sign as u32) << (2 * cell);
                }
            }
        }
    }

    /// Reclassify every empty in-range neighbour flagged by the update
    /// masks of the centre windows.
    fn reclassify_neighbourhood(&mut self, row: usize, col: usize, update_masks: &[u16; 4]) {
        let pad = self.pad as isize;

        for dir in ALL_DIRECTIONS {
            let (dr, dc) = (row_step(dir), col_step(dir));

            for i in -pad..=pad {
                if i == 0 {
                    continue;
                }
                // the neighbour at offset i is the cell at index pad + i of
                // the centre window
                if update_masks[dir] & (1 << (pad + i)) == 0 {
                    continue;
                }

                let nr = row as isize + i * dr;
                let nc = col as isize + i * dc;

                if self.raw.is_inside(nr, nc) && self.sign_at(nr as usize, nc as usize) == Sign::None {
                    self.reclassify_direction(nr as usize, nc as usize, dir);
                }
            }
        }
    }

    /// Refresh the pattern type in one direction and the aggregated threat
    /// of an empty square.
    fn reclassify_direction(&mut self, row: usize, col: usize, dir: Direction) {
        let data = self.pattern_table.pattern_data(self.raw_feature_at(row, col, dir));
        let group = &mut self.types[(row, col)];
        group.cross[dir] = data.for_sign(Sign::Cross);
        group.circle[dir] = data.for_sign(Sign::Circle);

        self.refresh_threat(row, col);
    }

    /// Refresh all four directions and the aggregated threat of an empty
    /// square.
    fn reclassify_square(&mut self, row: usize, col: usize) {
        for dir in ALL_DIRECTIONS {
            let data = self.pattern_table.pattern_data(self.raw_feature_at(row, col, dir));
            let group = &mut self.types[(row, col)];
            group.cross[dir] = data.for_sign(Sign::Cross);
            group.circle[dir] = data.for_sign(Sign::Circle);
        }

        self.refresh_threat(row, col);
    }

    fn refresh_threat(&mut self, row: usize, col: usize) {
        let group = self.types[(row, col)];
        let new_threat = Threat {
            for_cross: self.threat_table.threat(group.cross).for_cross,
            for_circle: self.threat_table.threat(group.circle).for_circle
        };
        let old_threat = self.threats[(row, col)];

        if new_threat != old_threat {
            self.cross_threats.remove(old_threat.for_cross, Move::new(row, col, Sign::Cross));
            self.cross_threats.add(new_threat.for_cross, Move::new(row, col, Sign::Cross));
            self.circle_threats.remove(old_threat.for_circle, Move::new(row, col, Sign::Circle));
            self.circle_threats.add(new_threat.for_circle, Move::new(row, col, Sign::Circle));
            self.threats[(row, col)] = new_threat;
        }
    }

    fn calculate_raw_features(&mut self) {
        let pad = self.pad as isize;

        for row in 0..self.config.rows {
            for col in 0..self.config.cols {
                let mut windows = [0u32; 4];

                for dir in ALL_DIRECTIONS {
                    let (dr, dc) = (row_step(dir), col_step(dir));
                    let mut encoding = 0u32;

                    for i in -pad..=pad {
                        let nr = (self.pad as isize + row as isize + i * dr) as usize;
                        let nc = (self.pad as isize + col as isize + i * dc) as usize;
                        encoding |= (self.internal[(nr, nc)] as u32) << (2 * (pad + i) as u32);
                    }
                    windows[dir] = encoding;
                }

                self.raw[(row, col)] = windows;
            }
        }
    }

    fn classify_all(&mut self) {
        self.cross_threats.clear();
        self.circle_threats.clear();
        self.types.fill(PatternGroup::default());
        self.threats.fill(Threat::default());

        for row in 0..self.config.rows {
            for col in 0..self.config.cols {
                if self.sign_at(row, col) == Sign::None {
                    self.reclassify_square(row, col);
                }
            }
        }
    }

    fn verify_double_three(&mut self, row: usize, col: usize) -> bool {
        let pad = self.pad as isize;
        let open_three_dirs: Vec<Direction> = ALL_DIRECTIONS.iter()
            .copied()
            .filter(|&dir| self.types[(row, col)].cross[dir] == PatternType::Open3)
            .collect();

        if open_three_dirs.len() < 2 {
            return false;
        }

        // the windows through the candidate move, before it is placed
        let pre_move_masks: Vec<u16> = open_three_dirs.iter()
            .map(|&dir| self.defensive_moves(Sign::Cross, row, col, dir))
            .collect();

        self.add_move(Move::new(row, col, Sign::Cross));

        let mut genuine = 0;
        for (&dir, &mask) in open_three_dirs.iter().zip(pre_move_masks.iter()) {
            let (dr, dc) = (row_step(dir), col_step(dir));

            // an open three is genuine only if one of its defusing squares
            // lets Cross complete a straight four that is itself legal
            let is_genuine = (0..=2 * self.pad).any(|cell| {
                if mask & (1 << cell) == 0 {
                    return false;
                }
                let i = cell as isize - pad;
                let nr = row as isize + i * dr;
                let nc = col as isize + i * dc;

                self.raw.is_inside(nr, nc)
                    && self.sign_at(nr as usize, nc as usize) == Sign::None
                    && self.is_straight_four_at(nr as usize, nc as usize, dir)
                    && !self.is_forbidden(nr as usize, nc as usize)
            });

            if is_genuine {
                genuine += 1;
            }
        }

        self.undo_move(Move::new(row, col, Sign::Cross));

        genuine >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board;

    fn freestyle_15() -> GameConfig {
        GameConfig::new(GameRules::Freestyle, 15, 15)
    }

    fn calculator_with(config: GameConfig, moves: &[(usize, usize, Sign)]) -> PatternCalculator {
        let mut calc = PatternCalculator::new(config);
        calc.set_board(&Board::new(config.rows, config.cols), Sign::Cross);
        for &(row, col, sign) in moves {
            calc.add_move(Move::new(row, col, sign));
        }
        calc
    }

    #[test]
    fn incremental_matches_rebuild() {
        let config = freestyle_15();
        let moves = [
            (7, 7, Sign::Cross), (7, 8, Sign::Circle),
            (8, 7, Sign::Cross), (8, 8, Sign::Circle),
            (9, 7, Sign::Cross), (6, 6, Sign::Circle),
            (10, 7, Sign::Cross)
        ];
        let incremental = calculator_with(config, &moves);

        let mut board = Board::new(15, 15);
        for &(row, col, sign) in moves.iter() {
            board::put_move(&mut board, Move::new(row, col, sign));
        }
        let mut fresh = PatternCalculator::new(config);
        fresh.set_board(&board, Sign::Circle);

        for row in 0..15 {
            for col in 0..15 {
                assert_eq!(incremental.raw[(row, col)], fresh.raw[(row, col)], "raw at ({},{})", row, col);
                assert_eq!(incremental.types[(row, col)], fresh.types[(row, col)], "types at ({},{})", row, col);
                assert_eq!(incremental.threats[(row, col)], fresh.threats[(row, col)], "threats at ({},{})", row, col);
            }
        }
    }

    #[test]
    fn add_then_undo_is_identity() {
        let config = freestyle_15();
        let calc = calculator_with(config, &[(7, 7, Sign::Cross), (8, 8, Sign::Circle)]);

        let mut probed = calc.clone();
        probed.add_move(Move::new(9, 9, Sign::Cross));
        probed.undo_move(Move::new(9, 9, Sign::Cross));

        for row in 0..15 {
            for col in 0..15 {
                assert_eq!(probed.raw[(row, col)], calc.raw[(row, col)]);
                assert_eq!(probed.types[(row, col)], calc.types[(row, col)]);
                assert_eq!(probed.threats[(row, col)], calc.threats[(row, col)]);
            }
        }
        assert_eq!(probed.sign_to_move(), calc.sign_to_move());
    }

    #[test]
    fn four_in_a_row_is_a_five_threat() {
        let config = freestyle_15();
        let calc = calculator_with(config, &[
            (7, 5, Sign::Cross), (0, 0, Sign::Circle),
            (7, 6, Sign::Cross), (0, 1, Sign::Circle),
            (7, 7, Sign::Cross), (0, 2, Sign::Circle),
            (7, 8, Sign::Cross)
        ]);

        assert_eq!(calc.threat_at(Sign::Cross, 7, 4), ThreatType::Five);
        assert_eq!(calc.threat_at(Sign::Cross, 7, 9), ThreatType::Five);
        assert_eq!(calc.threat_histogram(Sign::Cross).number_of(ThreatType::Five), 2);
    }

    #[test]
    fn renju_double_three_is_forbidden() {
        let config = GameConfig::new(GameRules::Renju, 15, 15);
        let mut calc = calculator_with(config, &[
            (7, 5, Sign::Cross), (0, 0, Sign::Circle),
            (7, 6, Sign::Cross), (0, 1, Sign::Circle),
            (5, 7, Sign::Cross), (0, 2, Sign::Circle),
            (6, 7, Sign::Cross), (0, 3, Sign::Circle)
        ]);

        // playing at (7,7) creates the open threes _XXX_ both horizontally
        // and vertically
        assert_eq!(calc.threat_at(Sign::Cross, 7, 7), ThreatType::Fork3x3);
        assert!(calc.is_forbidden(7, 7));
        assert!(!calc.is_forbidden(3, 3));
    }

    #[test]
    fn renju_overline_is_forbidden() {
        let config = GameConfig::new(GameRules::Renju, 15, 15);
        let mut calc = calculator_with(config, &[
            (7, 4, Sign::Cross), (0, 0, Sign::Circle),
            (7, 5, Sign::Cross), (0, 1, Sign::Circle),
            (7, 6, Sign::Cross), (0, 2, Sign::Circle),
            (7, 8, Sign::Cross), (0, 3, Sign::Circle),
            (7, 9, Sign::Cross), (0, 4, Sign::Circle)
        ]);

        // (7,7) would connect six stones in a row
        assert_eq!(calc.threat_at(Sign::Cross, 7, 7), ThreatType::Overline);
        assert!(calc.is_forbidden(7, 7));

        // the square does nothing for circle
        assert_eq!(calc.threat_at(Sign::Circle, 7, 7), ThreatType::None);
    }
}
