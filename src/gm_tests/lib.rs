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

//! Cross-crate integration tests live in `tests/`; this library only hosts
//! a few helpers shared between them.

extern crate gm_game;

use gm_game::{Board, Sign};

/// Build a board from a list of stones.
pub fn board_with(rows: usize, cols: usize, stones: &[(usize, usize, Sign)]) -> Board {
    let mut board = Board::new(rows, cols);
    for &(row, col, sign) in stones {
        board[(row, col)] = sign;
    }
    board
}

/// A full 15x15 board with no five anywhere: the colour of each square
/// follows `(col + 2 * row) mod 4`, which bounds every line run at two.
pub fn drawn_board() -> Board {
    let mut board = Board::new(15, 15);
    for row in 0..15 {
        for col in 0..15 {
            board[(row, col)] = if (col + 2 * row) % 4 < 2 { Sign::Cross } else { Sign::Circle };
        }
    }
    board
}
