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

use gm_game::augment::augment;
use gm_game::patterns::{PatternCalculator, PatternType, ALL_DIRECTIONS};
use gm_game::{GameRules, Sign};
use gm_utils::Matrix;

pub const LEGAL: u32 = 1;
pub const OWN_STONE: u32 = 1 << 1;
pub const OPPONENT_STONE: u32 = 1 << 2;
pub const FORBIDDEN: u32 = 1 << 3;
pub const CROSS_TO_MOVE: u32 = 1 << 4;
pub const CIRCLE_TO_MOVE: u32 = 1 << 5;
pub const ONES: u32 = 1 << 6;

pub const OWN_OPEN_4: u32 = 1 << 16;
pub const OWN_DOUBLE_4: u32 = 1 << 17;
pub const OWN_FIVE: u32 = 1 << 18;
pub const OWN_OVERLINE: u32 = 1 << 19;

pub const OPPONENT_OPEN_4: u32 = 1 << 28;
pub const OPPONENT_DOUBLE_4: u32 = 1 << 29;
pub const OPPONENT_FIVE: u32 = 1 << 30;
pub const OPPONENT_OVERLINE: u32 = 1 << 31;

/// The per-square input planes of the neural network, one `u32` of feature
/// bits per square:
///
/// ```text
/// bit  0     legal move
/// bit  1     own stone
/// bit  2     opponent stone
/// bit  3     forbidden move (RENJU)
/// bit  4     cross to move
/// bit  5     circle to move
/// bit  6     ones (constant)
/// bit  7     zeros (constant)
/// bits  8-11 own open three, one bit per direction
/// bits 12-15 own half-open four, one bit per direction
/// bit  16    own open four (any direction)
/// bit  17    own double four
/// bit  18    own five
/// bit  19    own overline
/// bits 20-31 the same block for the opponent
/// ```
///
/// This layout must stay bit-compatible between training and inference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFeatures {
    planes: Matrix<u32>
}

/// The per-pattern-type contribution: directional bits for threes and
/// half-open fours, aggregated bits for everything stronger.
fn pattern_bits(pattern: PatternType, dir: usize) -> u32 {
    match pattern {
        PatternType::Open3 => 1 << dir,
        PatternType::HalfOpen4 => 1 << (4 + dir),
        PatternType::Open4 => 1 << 8,
        PatternType::Double4 => 1 << 9,
        PatternType::Five => 1 << 10,
        PatternType::Overline => 1 << 11,
        _ => 0
    }
}

impl InputFeatures {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { planes: Matrix::new(rows, cols) }
    }

    pub fn rows(&self) -> usize {
        self.planes.rows()
    }

    pub fn cols(&self) -> usize {
        self.planes.cols()
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.planes[(row, col)]
    }

    /// Fill the planes from the pattern calculator state, from the point
    /// of view of its side to move.
    ///
    /// # Arguments
    ///
    /// * `calc` -
    ///
    pub fn encode(&mut self, calc: &mut PatternCalculator) {
        debug_assert_eq!(self.rows(), calc.config().rows);
        debug_assert_eq!(self.cols(), calc.config().cols);

        let own = calc.sign_to_move();
        let opp = own.invert();
        let to_move = if own == Sign::Cross { CROSS_TO_MOVE } else { CIRCLE_TO_MOVE };

        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let mut bits = to_move | ONES;

                match calc.sign_at(row, col) {
                    Sign::None => { bits |= LEGAL; },
                    sign if sign == own => { bits |= OWN_STONE; },
                    _ => { bits |= OPPONENT_STONE; }
                }

                let mut own_bits = 0;
                let mut opp_bits = 0;
                for dir in ALL_DIRECTIONS {
                    own_bits |= pattern_bits(calc.pattern_type_at(own, row, col, dir), dir);
                    opp_bits |= pattern_bits(calc.pattern_type_at(opp, row, col, dir), dir);
                }
                bits |= (own_bits << 8) | (opp_bits << 20);

                self.planes[(row, col)] = bits;
            }
        }

        if calc.config().rules == GameRules::Renju && own == Sign::Cross {
            for row in 0..self.rows() {
                for col in 0..self.cols() {
                    if calc.sign_at(row, col) == Sign::None && calc.is_forbidden(row, col) {
                        self.planes[(row, col)] |= FORBIDDEN;
                    }
                }
            }
        }
    }

    /// Apply a board symmetry in place. The direction-indexed bit groups
    /// are permuted to match the transformed directions.
    ///
    /// # Arguments
    ///
    /// * `mode` -
    ///
    pub fn apply_symmetry(&mut self, mode: i32) {
        self.planes = augment(&self.planes, mode);

        // directions transform with the board: reflections swap the two
        // diagonals, transpositions swap rows and columns, rotations do
        // both
        let permutation = match mode.abs() {
            0 | 3 => return,
            1 | 2 => [0, 1, 3, 2],
            4 | 5 => [1, 0, 2, 3],
            _ => [1, 0, 3, 2]
        };

        for bits in self.planes.iter_mut() {
            *bits = shuffle_directions(*bits, permutation);
        }
    }
}

/// Permute the four direction-indexed bits of each directional group.
fn shuffle_directions(data: u32, permutation: [u32; 4]) -> u32 {
    const GROUP_MASK: u32 = (1 << 8) | (1 << 12) | (1 << 20) | (1 << 24);

    let mut result = data & 0xF00F_00FF;
    for (d, &source) in permutation.iter().enumerate() {
        result |= ((data >> source) & GROUP_MASK) << d;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_game::{Board, GameConfig};

    fn features_of(moves: &[(usize, usize, Sign)], sign_to_move: Sign) -> InputFeatures {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut board = Board::new(15, 15);
        for &(row, col, sign) in moves {
            board[(row, col)] = sign;
        }

        let mut calc = PatternCalculator::new(config);
        calc.set_board(&board, sign_to_move);

        let mut features = InputFeatures::new(15, 15);
        features.encode(&mut calc);
        features
    }

    #[test]
    fn stones_and_legality() {
        let features = features_of(&[(7, 7, Sign::Cross), (8, 8, Sign::Circle)], Sign::Cross);

        assert_eq!(features.get(7, 7) & (LEGAL | OWN_STONE | OPPONENT_STONE), OWN_STONE);
        assert_eq!(features.get(8, 8) & (LEGAL | OWN_STONE | OPPONENT_STONE), OPPONENT_STONE);
        assert_eq!(features.get(0, 0) & (LEGAL | OWN_STONE | OPPONENT_STONE), LEGAL);
        assert!(features.get(0, 0) & CROSS_TO_MOVE != 0);
        assert!(features.get(0, 0) & ONES != 0);
    }

    #[test]
    fn five_threat_is_marked() {
        let features = features_of(&[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross)
        ], Sign::Cross);

        assert!(features.get(7, 4) & OWN_FIVE != 0);
        assert!(features.get(7, 9) & OWN_FIVE != 0);
        assert_eq!(features.get(7, 4) & OPPONENT_FIVE, 0);
    }

    #[test]
    fn own_and_opponent_blocks_swap_with_side_to_move() {
        let cross_view = features_of(&[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross)
        ], Sign::Cross);
        let circle_view = features_of(&[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross)
        ], Sign::Circle);

        assert!(cross_view.get(7, 4) & OWN_FIVE != 0);
        assert!(circle_view.get(7, 4) & OPPONENT_FIVE != 0);
    }

    #[test]
    fn symmetry_round_trip() {
        let features = features_of(&[
            (3, 5, Sign::Cross), (3, 6, Sign::Cross), (3, 7, Sign::Cross),
            (0, 0, Sign::Circle), (1, 1, Sign::Circle)
        ], Sign::Cross);

        for mode in 0..8 {
            let mut transformed = features.clone();
            transformed.apply_symmetry(mode);
            transformed.apply_symmetry(-mode);

            assert_eq!(transformed, features, "mode {}", mode);
        }
    }

    #[test]
    fn transposition_swaps_direction_bits() {
        // completing a horizontal pair into an open three becomes a
        // vertical completion under transpose
        let mut features = features_of(&[
            (3, 5, Sign::Cross), (3, 6, Sign::Cross)
        ], Sign::Cross);
        let horizontal_bit = 1 << 8;
        let vertical_bit = 1 << 9;

        assert!(features.get(3, 4) & horizontal_bit != 0);
        features.apply_symmetry(4);
        assert!(features.get(4, 3) & vertical_bit != 0);
        assert_eq!(features.get(4, 3) & horizontal_bit, 0);
    }
}
