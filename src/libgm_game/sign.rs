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

/// The contents of a single board square. `Illegal` marks squares outside of
/// the board, it only ever appears in the padded border of the pattern
/// calculator and in line windows that stick out over the edge.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Sign {
    #[default]
    None = 0,
    Cross = 1,
    Circle = 2,
    Illegal = 3
}

impl Sign {
    /// Returns the opponent of this sign. `None` and `Illegal` are left
    /// unchanged.
    pub fn invert(self) -> Sign {
        match self {
            Sign::Cross => Sign::Circle,
            Sign::Circle => Sign::Cross,
            other => other
        }
    }

    pub fn is_player(self) -> bool {
        self == Sign::Cross || self == Sign::Circle
    }

    pub fn from_u8(value: u8) -> Sign {
        match value & 3 {
            0 => Sign::None,
            1 => Sign::Cross,
            2 => Sign::Circle,
            _ => Sign::Illegal
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Sign::None => '_',
            Sign::Cross => 'X',
            Sign::Circle => 'O',
            Sign::Illegal => '|'
        }
    }

    pub fn from_char(ch: char) -> Option<Sign> {
        match ch {
            '_' => Some(Sign::None),
            'X' => Some(Sign::Cross),
            'O' => Some(Sign::Circle),
            '|' => Some(Sign::Illegal),
            _ => None
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}
