// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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
use std::str::FromStr;

use crate::board::{self, Board};
use crate::moves::Move;
use crate::patterns::{col_step, row_step, Direction, PatternTable, PatternType, ThreatTable, ThreatType, ALL_DIRECTIONS};
use crate::sign::Sign;

/// The supported rule variants. They differ in the shapes that count as a
/// winning five and, for RENJU, in the moves forbidden to Cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameRules {
    Freestyle,
    Standard,
    Renju,
    Caro5,
    Caro6
}

impl fmt::Display for GameRules {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            GameRules::Freestyle => "FREESTYLE",
            GameRules::Standard => "STANDARD",
            GameRules::Renju => "RENJU",
            GameRules::Caro5 => "CARO5",
            GameRules::Caro6 => "CARO6"
        };
        write!(f, "{}", name)
    }
}

impl FromStr for GameRules {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FREESTYLE" => Ok(GameRules::Freestyle),
            "STANDARD" => Ok(GameRules::Standard),
            "RENJU" => Ok(GameRules::Renju),
            "CARO5" => Ok(GameRules::Caro5),
            "CARO6" => Ok(GameRules::Caro6),
            other => Err(format!("unknown rule '{}'", other))
        }
    }
}

/// The result of a finished (or unfinished) game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameOutcome {
    #[default]
    Unknown,
    Draw,
    CrossWin,
    CircleWin
}

/// Static description of the game being played.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub rules: GameRules,
    pub rows: usize,
    pub cols: usize,

    /// The game is adjudicated as a draw once this many stones are on the
    /// board.
    pub draw_after: usize
}

impl GameConfig {
    pub fn new(rules: GameRules, rows: usize, cols: usize) -> Self {
        debug_assert!(rows <= 20 && cols <= 20);

        Self { rules, rows, cols, draw_after: rows * cols }
    }

    pub fn with_draw_after(mut self, draw_after: usize) -> Self {
        self.draw_after = draw_after;
        self
    }
}

/// Read the window encoding along `dir` centred at the given square, with
/// the centre cell left empty. Off-board cells read as `Illegal`.
fn window_at(board: &Board, row: usize, col: usize, dir: Direction, pad: usize) -> u32 {
    let (dr, dc) = (row_step(dir), col_step(dir));
    let mut encoding = 0u32;

    for i in -(pad as isize)..=pad as isize {
        if i == 0 {
            continue;
        }
        let nr = row as isize + i * dr;
        let nc = col as isize + i * dc;
        let sign = if board.is_inside(nr, nc) { board[(nr as usize, nc as usize)] } else { Sign::Illegal };

        encoding |= (sign as u32) << (2 * (pad as isize + i) as u32);
    }
    encoding
}

/// The four directional pattern types of `sign` if it were to occupy the
/// given square.
fn pattern_group_at(rules: GameRules, board: &Board, row: usize, col: usize, sign: Sign) -> [PatternType; 4] {
    let table = PatternTable::get(rules);
    let pad = table.window_length() / 2;
    let mut group = [PatternType::None; 4];

    for dir in ALL_DIRECTIONS {
        let encoding = window_at(board, row, col, dir, pad);
        group[dir] = table.pattern_data(encoding).for_sign(sign);
    }
    group
}

/// Classify the position after `last_move` was played.
///
/// # Arguments
///
/// * `rules` -
/// * `board` - the board with `last_move` already on it
/// * `last_move` -
/// * `draw_after` -
///
pub fn get_outcome(rules: GameRules, board: &Board, last_move: Move, draw_after: usize) -> GameOutcome {
    debug_assert!(last_move.sign().is_player());
    debug_assert_eq!(board[(last_move.row(), last_move.col())], last_move.sign());

    let group = pattern_group_at(rules, board, last_move.row(), last_move.col(), last_move.sign());

    if group.iter().any(|&p| p == PatternType::Five) {
        return match last_move.sign() {
            Sign::Cross => GameOutcome::CrossWin,
            _ => GameOutcome::CircleWin
        };
    }

    if rules == GameRules::Renju && last_move.sign() == Sign::Cross {
        let mut probe = board.clone();
        board::undo_move(&mut probe, last_move);

        if is_forbidden(&mut probe, last_move) {
            return GameOutcome::CircleWin;
        }
    }

    if board::is_full(board) || board::number_of_moves(board) >= draw_after {
        GameOutcome::Draw
    } else {
        GameOutcome::Unknown
    }
}

/// Returns true if `mv` is a forbidden move under RENJU: a 3x3 fork, a 4x4
/// fork or an overline for Cross. Fives are never forbidden. The board must
/// not contain the move yet; it is restored before returning.
///
/// # Arguments
///
/// * `board` -
/// * `mv` -
///
pub fn is_forbidden(board: &mut Board, mv: Move) -> bool {
    if mv.sign() != Sign::Cross {
        return false;
    }
    if board[(mv.row(), mv.col())] != Sign::None {
        // occupied squares are illegal, not forbidden
        return false;
    }

    let table = PatternTable::get(GameRules::Renju);
    let pad = table.window_length() / 2;
    let mut group = pattern_group_at(GameRules::Renju, board, mv.row(), mv.col(), Sign::Cross);

    let open_threes = group.iter().filter(|&&p| p == PatternType::Open3).count();
    if open_threes >= 2 {
        // a pair of open threes is only a fork if both are genuine: there
        // must be a completion into a straight four that is itself legal
        let windows: Vec<u32> = ALL_DIRECTIONS.iter()
            .map(|&dir| window_at(board, mv.row(), mv.col(), dir, pad))
            .collect();

        board::put_move(board, mv);
        for dir in ALL_DIRECTIONS {
            if group[dir] != PatternType::Open3 {
                continue;
            }

            let defensive = table.pattern_data(windows[dir]).defensive_moves(Sign::Cross);
            let (dr, dc) = (row_step(dir), col_step(dir));
            let mut is_genuine = false;

            for cell in 0..2 * pad + 1 {
                if defensive & (1 << cell) == 0 {
                    continue;
                }
                let i = cell as isize - pad as isize;
                let nr = mv.row() as isize + i * dr;
                let nc = mv.col() as isize + i * dc;

                if board.is_inside(nr, nc) && board[(nr as usize, nc as usize)] == Sign::None {
                    let completion = Move::new(nr as usize, nc as usize, Sign::Cross);

                    if is_straight_four(board, completion, dir, pad) && !is_forbidden(board, completion) {
                        is_genuine = true;
                        break;
                    }
                }
            }

            if !is_genuine {
                group[dir] = PatternType::None;
            }
        }
        board::undo_move(board, mv);
    }

    let threat = ThreatTable::get(GameRules::Renju).threat(group).for_cross;
    matches!(threat, ThreatType::Overline | ThreatType::Fork4x4 | ThreatType::Fork3x3)
}

/// Returns true if placing `mv` forms four Cross stones in a row along
/// `dir`.
fn is_straight_four(board: &Board, mv: Move, dir: Direction, pad: usize) -> bool {
    debug_assert_eq!(board[(mv.row(), mv.col())], Sign::None);

    let encoding = window_at(board, mv.row(), mv.col(), dir, pad) | ((Sign::Cross as u32) << (2 * pad));
    let length = 2 * pad + 1;

    (0..=length - 4).any(|shift| (encoding >> (2 * shift)) & 0xFF == 0x55)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(rows: usize, cols: usize, moves: &[(usize, usize, Sign)]) -> Board {
        let mut board = Board::new(rows, cols);
        for &(row, col, sign) in moves {
            board[(row, col)] = sign;
        }
        board
    }

    #[test]
    fn horizontal_five_wins() {
        let board = board_with(15, 15, &[
            (7, 3, Sign::Cross), (7, 4, Sign::Cross), (7, 5, Sign::Cross),
            (7, 6, Sign::Cross), (7, 7, Sign::Cross)
        ]);
        let last = Move::new(7, 5, Sign::Cross);

        for rules in [GameRules::Freestyle, GameRules::Standard, GameRules::Renju] {
            assert_eq!(get_outcome(rules, &board, last, 225), GameOutcome::CrossWin, "{}", rules);
        }
    }

    #[test]
    fn caro_blocked_five_does_not_win() {
        let board = board_with(15, 15, &[
            (6, 2, Sign::Circle),
            (6, 3, Sign::Cross), (6, 4, Sign::Cross), (6, 5, Sign::Cross),
            (6, 6, Sign::Cross), (6, 7, Sign::Cross),
            (6, 8, Sign::Circle)
        ]);
        let last = Move::new(6, 5, Sign::Cross);

        assert_eq!(get_outcome(GameRules::Caro5, &board, last, 225), GameOutcome::Unknown);
        assert_eq!(get_outcome(GameRules::Freestyle, &board, last, 225), GameOutcome::CrossWin);
        assert_eq!(get_outcome(GameRules::Standard, &board, last, 225), GameOutcome::CrossWin);
    }

    #[test]
    fn caro_five_with_one_open_end_wins() {
        let board = board_with(15, 15, &[
            (6, 3, Sign::Cross), (6, 4, Sign::Cross), (6, 5, Sign::Cross),
            (6, 6, Sign::Cross), (6, 7, Sign::Cross),
            (6, 8, Sign::Circle)
        ]);
        let last = Move::new(6, 5, Sign::Cross);

        assert_eq!(get_outcome(GameRules::Caro5, &board, last, 225), GameOutcome::CrossWin);
    }

    #[test]
    fn standard_overline_does_not_win() {
        let board = board_with(15, 15, &[
            (7, 3, Sign::Cross), (7, 4, Sign::Cross), (7, 5, Sign::Cross),
            (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross)
        ]);
        let last = Move::new(7, 5, Sign::Cross);

        assert_eq!(get_outcome(GameRules::Standard, &board, last, 225), GameOutcome::Unknown);
        assert_eq!(get_outcome(GameRules::Freestyle, &board, last, 225), GameOutcome::CrossWin);
    }

    #[test]
    fn renju_double_three_loses_for_cross() {
        let mut board = board_with(15, 15, &[
            (7, 5, Sign::Cross), (7, 6, Sign::Cross),
            (5, 7, Sign::Cross), (6, 7, Sign::Cross),
            (0, 0, Sign::Circle), (0, 1, Sign::Circle),
            (0, 2, Sign::Circle), (0, 3, Sign::Circle)
        ]);
        let mv = Move::new(7, 7, Sign::Cross);

        assert!(is_forbidden(&mut board, mv));

        board::put_move(&mut board, mv);
        assert_eq!(get_outcome(GameRules::Renju, &board, mv, 225), GameOutcome::CircleWin);
        board::undo_move(&mut board, mv);

        // the same shape is fine for white
        assert_eq!(get_outcome(GameRules::Freestyle, &board_with(15, 15, &[(7, 7, Sign::Cross)]), Move::new(7, 7, Sign::Cross), 225), GameOutcome::Unknown);
    }

    #[test]
    fn draw_by_move_count() {
        let board = board_with(3, 3, &[
            (0, 0, Sign::Cross), (0, 1, Sign::Circle), (0, 2, Sign::Cross),
            (1, 0, Sign::Circle), (1, 1, Sign::Cross), (1, 2, Sign::Circle),
            (2, 0, Sign::Cross), (2, 1, Sign::Circle), (2, 2, Sign::Cross)
        ]);

        assert_eq!(get_outcome(GameRules::Freestyle, &board, Move::new(2, 2, Sign::Cross), 9), GameOutcome::Draw);
    }
}
