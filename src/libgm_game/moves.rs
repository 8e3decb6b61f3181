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

use crate::sign::Sign;

/// A board coordinate without a sign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub row: u8,
    pub col: u8
}

impl Location {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row: row as u8, col: col as u8 }
    }
}

/// A move, i.e. a board coordinate together with the sign placed there.
/// Packed into 16 bits as `row:5 | col:5 | sign:2 | pad:4` so that it fits
/// into transposition table entries. Moves compare by their packed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Move {
    packed: u16
}

impl Move {
    /// The distinguished "no move" value.
    pub const NULL: Move = Move { packed: 0xFFFF };

    pub fn new(row: usize, col: usize, sign: Sign) -> Self {
        debug_assert!(row < 32 && col < 32);

        Self {
            packed: (row as u16) | ((col as u16) << 5) | ((sign as u16) << 10)
        }
    }

    pub fn from_location(location: Location, sign: Sign) -> Self {
        Self::new(location.row as usize, location.col as usize, sign)
    }

    pub fn row(self) -> usize {
        (self.packed & 31) as usize
    }

    pub fn col(self) -> usize {
        ((self.packed >> 5) & 31) as usize
    }

    pub fn sign(self) -> Sign {
        Sign::from_u8(((self.packed >> 10) & 3) as u8)
    }

    pub fn location(self) -> Location {
        Location { row: self.row() as u8, col: self.col() as u8 }
    }

    pub fn is_null(self) -> bool {
        self == Move::NULL
    }

    pub fn to_short(self) -> u16 {
        self.packed
    }

    pub fn from_short(packed: u16) -> Self {
        Self { packed }
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NULL
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_null() {
            write!(f, "(null)")
        } else {
            write!(f, "{} ({},{})", self.sign(), self.row(), self.col())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_round_trip() {
        for row in 0..20 {
            for col in 0..20 {
                for sign in [Sign::Cross, Sign::Circle] {
                    let m = Move::new(row, col, sign);

                    assert_eq!(m.row(), row);
                    assert_eq!(m.col(), col);
                    assert_eq!(m.sign(), sign);
                    assert_eq!(Move::from_short(m.to_short()), m);
                }
            }
        }
    }

    #[test]
    fn null_is_distinct() {
        assert!(Move::NULL.is_null());
        assert!(!Move::new(0, 0, Sign::Cross).is_null());
        assert_eq!(Move::default(), Move::NULL);
    }
}
