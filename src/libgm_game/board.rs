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

use gm_utils::Matrix;

use crate::moves::Move;
use crate::sign::Sign;

/// A board is a plain matrix of signs; all bookkeeping lives in the pattern
/// calculator instead.
pub type Board = Matrix<Sign>;

/// Place the given move on the board. The target square must be empty.
///
/// # Arguments
///
/// * `board` -
/// * `mv` -
///
pub fn put_move(board: &mut Board, mv: Move) {
    debug_assert!(mv.sign().is_player());
    debug_assert_eq!(board[(mv.row(), mv.col())], Sign::None);

    board[(mv.row(), mv.col())] = mv.sign();
}

/// Remove the given move from the board. The target square must hold the
/// sign of the move.
///
/// # Arguments
///
/// * `board` -
/// * `mv` -
///
pub fn undo_move(board: &mut Board, mv: Move) {
    debug_assert_eq!(board[(mv.row(), mv.col())], mv.sign());

    board[(mv.row(), mv.col())] = Sign::None;
}

/// Returns the number of stones on the board.
pub fn number_of_moves(board: &Board) -> usize {
    board.iter().filter(|s| s.is_player()).count()
}

/// Returns true if there are no empty squares left.
pub fn is_full(board: &Board) -> bool {
    board.iter().all(|&s| s != Sign::None)
}

/// Returns the sign whose turn it is, derived from the stone counts. Cross
/// always moves first.
pub fn sign_to_move(board: &Board) -> Sign {
    let crosses = board.iter().filter(|&&s| s == Sign::Cross).count();
    let circles = board.iter().filter(|&&s| s == Sign::Circle).count();

    debug_assert!(crosses == circles || crosses == circles + 1);
    if crosses == circles { Sign::Cross } else { Sign::Circle }
}

/// Render the board as one line of characters per row.
pub fn to_string(board: &Board) -> String {
    let mut out = String::with_capacity(board.rows() * (board.cols() + 1));

    for row in 0..board.rows() {
        for col in 0..board.cols() {
            out.push(board[(row, col)].to_char());
        }
        out.push('\n');
    }

    out
}

/// Parse a board from the format produced by `to_string`. All rows must
/// have the same length.
///
/// # Arguments
///
/// * `text` -
///
pub fn from_string(text: &str) -> Option<Board> {
    let lines: Vec<&str> = text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    let rows = lines.len();
    let cols = lines.first()?.chars().count();

    if rows == 0 || cols == 0 || rows > 20 || cols > 20 {
        return None;
    }

    let mut board = Board::new(rows, cols);

    for (row, line) in lines.iter().enumerate() {
        if line.chars().count() != cols {
            return None;
        }
        for (col, ch) in line.chars().enumerate() {
            match Sign::from_char(ch) {
                Some(sign) if sign != Sign::Illegal => { board[(row, col)] = sign; },
                _ => { return None; }
            }
        }
    }

    Some(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let mut board = Board::new(5, 5);
        board[(0, 0)] = Sign::Cross;
        board[(2, 3)] = Sign::Circle;
        board[(4, 4)] = Sign::Cross;

        assert_eq!(from_string(&to_string(&board)), Some(board));
    }

    #[test]
    fn put_and_undo() {
        let mut board = Board::new(15, 15);
        let mv = Move::new(7, 7, Sign::Cross);

        put_move(&mut board, mv);
        assert_eq!(number_of_moves(&board), 1);
        assert_eq!(sign_to_move(&board), Sign::Circle);

        undo_move(&mut board, mv);
        assert_eq!(number_of_moves(&board), 0);
        assert_eq!(sign_to_move(&board), Sign::Cross);
    }

    #[test]
    fn ragged_input_is_rejected() {
        assert_eq!(from_string("___\n__\n"), None);
        assert_eq!(from_string(""), None);
    }
}
