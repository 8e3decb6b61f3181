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

/// The number of usable symmetries for a board of the given shape: the
/// full dihedral group of eight for square boards, four otherwise.
pub fn available_symmetries(rows: usize, cols: usize) -> usize {
    if rows == cols { 8 } else { 4 }
}

/// Resolve a (possibly negative, i.e. inverse) augmentation mode into the
/// forward transform to apply. Only the two rotations differ from their
/// inverse.
fn resolve(mode: i32) -> i32 {
    match mode {
        -7 => 6,
        -6 => 7,
        m if m < 0 => -m,
        m => m
    }
}

/// Map a square through the given symmetry.
///
/// # Arguments
///
/// * `row`, `col` -
/// * `rows`, `cols` - the board shape
/// * `mode` - one of the eight symmetries, negative for the inverse
///
pub fn augment_location(row: usize, col: usize, rows: usize, cols: usize, mode: i32) -> (usize, usize) {
    debug_assert!(resolve(mode) < 4 || rows == cols);

    match resolve(mode) {
        0 => (row, col),
        1 => (rows - 1 - row, col),
        2 => (row, cols - 1 - col),
        3 => (rows - 1 - row, cols - 1 - col),
        4 => (col, row),
        5 => (cols - 1 - col, rows - 1 - row),
        6 => (col, rows - 1 - row),
        7 => (cols - 1 - col, row),
        _ => unreachable!()
    }
}

/// Map a move through the given symmetry.
pub fn augment_move(mv: Move, rows: usize, cols: usize, mode: i32) -> Move {
    let (row, col) = augment_location(mv.row(), mv.col(), rows, cols, mode);
    Move::new(row, col, mv.sign())
}

/// Returns a copy of `input` mapped through the given symmetry.
///
/// # Arguments
///
/// * `input` -
/// * `mode` -
///
pub fn augment<T: Clone + Default>(input: &Matrix<T>, mode: i32) -> Matrix<T> {
    let (rows, cols) = (input.rows(), input.cols());
    let transposes = resolve(mode) >= 4;
    let mut out = if transposes { Matrix::new(cols, rows) } else { Matrix::new(rows, cols) };

    for row in 0..rows {
        for col in 0..cols {
            let (tr, tc) = augment_location(row, col, rows, cols, mode);
            out[(tr, tc)] = input[(row, col)].clone();
        }
    }
    out
}
