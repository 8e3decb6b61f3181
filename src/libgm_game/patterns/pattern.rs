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

use crate::sign::Sign;

/// One of the four line directions through a square.
pub type Direction = usize;

pub const HORIZONTAL: Direction = 0;
pub const VERTICAL: Direction = 1;
pub const DIAGONAL: Direction = 2;
pub const ANTIDIAGONAL: Direction = 3;

pub const ALL_DIRECTIONS: [Direction; 4] = [HORIZONTAL, VERTICAL, DIAGONAL, ANTIDIAGONAL];

/// Returns the row increment of one step along `dir`.
pub fn row_step(dir: Direction) -> isize {
    if dir == HORIZONTAL { 0 } else { 1 }
}

/// Returns the column increment of one step along `dir`.
pub fn col_step(dir: Direction) -> isize {
    match dir {
        HORIZONTAL | DIAGONAL => 1,
        ANTIDIAGONAL => -1,
        _ => 0
    }
}

/// A line window of odd length centred on one square, packed two bits per
/// cell with cell zero in the least significant bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePattern {
    length: usize,
    encoding: u32
}

impl LinePattern {
    pub fn new(length: usize) -> Self {
        debug_assert!(length % 2 == 1 && length <= 13);

        Self { length, encoding: 0 }
    }

    pub fn from_encoding(length: usize, encoding: u32) -> Self {
        debug_assert!(encoding < (1 << (2 * length)));

        Self { length, encoding }
    }

    /// Parse a window from its text form, e.g. `"|_XXO_"`.
    pub fn from_str(text: &str) -> Self {
        let mut out = Self::new(text.chars().count());
        for (i, ch) in text.chars().enumerate() {
            out.set(i, Sign::from_char(ch).unwrap());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn center(&self) -> usize {
        self.length / 2
    }

    pub fn encode(&self) -> u32 {
        self.encoding
    }

    pub fn get(&self, index: usize) -> Sign {
        debug_assert!(index < self.length);
        Sign::from_u8(((self.encoding >> (2 * index)) & 3) as u8)
    }

    pub fn set(&mut self, index: usize, sign: Sign) {
        debug_assert!(index < self.length);
        self.encoding &= !(3 << (2 * index));
        self.encoding |= (sign as u32) << (2 * index);
    }

    pub fn set_center(&mut self, sign: Sign) {
        self.set(self.center(), sign);
    }

    pub fn get_center(&self) -> Sign {
        self.get(self.center())
    }

    /// Returns the mirror image of this window.
    pub fn flip(&self) -> LinePattern {
        let mut out = Self::new(self.length);
        for i in 0..self.length {
            out.set(self.length - 1 - i, self.get(i));
        }
        out
    }

    /// A window is valid if it could appear on a real board: the centre is
    /// empty and off-board markers only occur as a contiguous run touching
    /// either end.
    pub fn is_valid(&self) -> bool {
        if self.get_center() != Sign::None {
            return false;
        }

        let center = self.center();
        let mut in_border = false;
        for i in (0..center).rev() {
            match (self.get(i) == Sign::Illegal, in_border) {
                (true, _) => { in_border = true; },
                (false, true) => { return false; },
                (false, false) => {}
            }
        }
        in_border = false;
        for i in center + 1..self.length {
            match (self.get(i) == Sign::Illegal, in_border) {
                (true, _) => { in_border = true; },
                (false, true) => { return false; },
                (false, false) => {}
            }
        }
        true
    }
}

impl fmt::Display for LinePattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.length {
            write!(f, "{}", self.get(i))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_round_trip() {
        let p = LinePattern::from_str("__XO_OX|_");

        assert_eq!(LinePattern::from_encoding(9, p.encode()), p);
        assert_eq!(format!("{}", p), "__XO_OX|_");
    }

    #[test]
    fn validity() {
        assert!(LinePattern::from_str("||___X___").is_valid());
        assert!(LinePattern::from_str("___X_X__|").is_valid());
        assert!(!LinePattern::from_str("____X____").is_valid());
        assert!(!LinePattern::from_str("|_|______").is_valid());
        assert!(!LinePattern::from_str("_____|_X_").is_valid());
        assert!(!LinePattern::from_str("____O____").is_valid());
    }

    #[test]
    fn flip_is_involution() {
        let p = LinePattern::from_str("|XO__X_OO");

        assert_eq!(p.flip().flip(), p);
        assert_eq!(format!("{}", p.flip()), "OO_X__OX|");
    }
}
