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

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::board::Board;
use crate::moves::Move;
use crate::sign::Sign;

const MAX_SIZE: usize = 20;

/// A 128-bit board hash. The low half indexes the shared hash table, the
/// high half verifies entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HashKey128 {
    pub low: u64,
    pub high: u64
}

impl HashKey128 {
    fn xor_assign(&mut self, other: HashKey128) {
        self.low ^= other.low;
        self.high ^= other.high;
    }
}

struct ZobristKeys {
    squares: Vec<HashKey128>, // (row, col, sign - 1)
    sign_to_move: HashKey128
}

lazy_static! {
    static ref KEYS: ZobristKeys = {
        // a fixed seed so that hashes are stable across processes
        let mut rng = SmallRng::seed_from_u64(0x6a09e667f3bcc908);
        let mut squares = Vec::with_capacity(MAX_SIZE * MAX_SIZE * 2);

        for _ in 0..MAX_SIZE * MAX_SIZE * 2 {
            squares.push(HashKey128 { low: rng.gen(), high: rng.gen() });
        }

        ZobristKeys {
            squares,
            sign_to_move: HashKey128 { low: rng.gen(), high: rng.gen() }
        }
    };
}

fn key_of(mv: Move) -> HashKey128 {
    debug_assert!(mv.sign().is_player());

    let index = 2 * (mv.row() * MAX_SIZE + mv.col()) + (mv.sign() as usize - 1);
    KEYS.squares[index]
}

/// Returns the hash of an entire board with the given sign to move.
///
/// # Arguments
///
/// * `board` -
/// * `sign_to_move` -
///
pub fn get_hash(board: &Board, sign_to_move: Sign) -> HashKey128 {
    let mut hash = HashKey128::default();

    for row in 0..board.rows() {
        for col in 0..board.cols() {
            let sign = board[(row, col)];
            if sign.is_player() {
                hash.xor_assign(key_of(Move::new(row, col, sign)));
            }
        }
    }
    if sign_to_move == Sign::Circle {
        hash.xor_assign(KEYS.sign_to_move);
    }
    hash
}

/// Toggle the given move in the hash, flipping the sign to move as well.
/// Applying the same move twice restores the original hash.
///
/// # Arguments
///
/// * `hash` -
/// * `mv` -
///
pub fn update_hash(hash: &mut HashKey128, mv: Move) {
    hash.xor_assign(key_of(mv));
    hash.xor_assign(KEYS.sign_to_move);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_matches_full_hash() {
        let mut board = Board::new(15, 15);
        let mut hash = get_hash(&board, Sign::Cross);
        let moves = [
            Move::new(7, 7, Sign::Cross),
            Move::new(7, 8, Sign::Circle),
            Move::new(8, 8, Sign::Cross)
        ];

        for &mv in moves.iter() {
            board[(mv.row(), mv.col())] = mv.sign();
            update_hash(&mut hash, mv);
        }

        assert_eq!(hash, get_hash(&board, Sign::Circle));
    }

    #[test]
    fn order_does_not_matter() {
        let a = Move::new(3, 4, Sign::Cross);
        let b = Move::new(4, 3, Sign::Circle);

        let mut first = HashKey128::default();
        update_hash(&mut first, a);
        update_hash(&mut first, b);

        let mut second = HashKey128::default();
        update_hash(&mut second, b);
        update_hash(&mut second, a);

        assert_eq!(first, second);
    }

    #[test]
    fn update_is_an_involution() {
        let original = get_hash(&Board::new(15, 15), Sign::Cross);
        let mut hash = original;

        update_hash(&mut hash, Move::new(0, 0, Sign::Cross));
        assert_ne!(hash, original);
        update_hash(&mut hash, Move::new(0, 0, Sign::Cross));
        assert_eq!(hash, original);
    }
}
