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
use std::ops::Neg;

use gm_game::{GameOutcome, Sign};

use crate::value::Value;

/// Whether a position has been tactically proven. The numeric order makes
/// the packed score totally ordered: any win beats any unproven score,
/// which beats any draw, which beats any loss.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvenValue {
    Loss = 0,
    Draw = 1,
    #[default]
    Unknown = 2,
    Win = 3
}

impl ProvenValue {
    /// Translate a game outcome into a proof for the given side to move.
    pub fn from_outcome(outcome: GameOutcome, sign_to_move: Sign) -> ProvenValue {
        match outcome {
            GameOutcome::Unknown => ProvenValue::Unknown,
            GameOutcome::Draw => ProvenValue::Draw,
            GameOutcome::CrossWin => {
                if sign_to_move == Sign::Cross { ProvenValue::Win } else { ProvenValue::Loss }
            },
            GameOutcome::CircleWin => {
                if sign_to_move == Sign::Circle { ProvenValue::Win } else { ProvenValue::Loss }
            }
        }
    }
}

/// The bound stored with a transposition table entry.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Bound {
    #[default]
    None = 0,
    Lower = 1,
    Upper = 2,
    Exact = 3
}

impl Bound {
    pub fn from_u8(value: u8) -> Bound {
        debug_assert!(value < 4);
        unsafe { ::std::mem::transmute(value) }
    }
}

/// A 16-bit search score: three bits of proof status and thirteen bits of
/// evaluation stored with a +4000 offset. For proven scores the evaluation
/// encodes the distance to the end of the game, so that among wins the
/// quicker one compares higher and among losses the longer one does.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    data: u16
}

const EVAL_OFFSET: i32 = 4000;
const EVAL_MASK: u16 = 8191;

impl Default for Score {
    fn default() -> Self {
        Score::new(ProvenValue::Unknown, 0)
    }
}

impl Score {
    pub fn new(pv: ProvenValue, evaluation: i32) -> Self {
        debug_assert!((-EVAL_OFFSET..=EVAL_OFFSET).contains(&evaluation));

        Self {
            data: ((pv as u16) << 13) | ((EVAL_OFFSET + evaluation) as u16)
        }
    }

    pub fn from_eval(evaluation: i32) -> Self {
        Score::new(ProvenValue::Unknown, evaluation)
    }

    pub fn win() -> Self {
        Score::new(ProvenValue::Win, 0)
    }

    pub fn win_in(plys: i32) -> Self {
        Score::new(ProvenValue::Win, -plys)
    }

    pub fn loss() -> Self {
        Score::new(ProvenValue::Loss, 0)
    }

    pub fn loss_in(plys: i32) -> Self {
        Score::new(ProvenValue::Loss, plys)
    }

    pub fn draw() -> Self {
        Score::new(ProvenValue::Draw, 0)
    }

    pub fn draw_in(plys: i32) -> Self {
        Score::new(ProvenValue::Draw, plys)
    }

    pub fn minus_infinity() -> Self {
        Score::from_short(0x0000)
    }

    pub fn plus_infinity() -> Self {
        Score::from_short(0xFFFF)
    }

    pub fn min_value() -> Self {
        Score::minus_infinity()
    }

    pub fn max_value() -> Self {
        Score::plus_infinity()
    }

    pub fn from_short(raw: u16) -> Self {
        Self { data: raw }
    }

    pub fn to_short(self) -> u16 {
        self.data
    }

    pub fn eval(self) -> i32 {
        (self.data & EVAL_MASK) as i32 - EVAL_OFFSET
    }

    pub fn proven_value(self) -> ProvenValue {
        match (self.data >> 13) & 3 {
            0 => ProvenValue::Loss,
            1 => ProvenValue::Draw,
            2 => ProvenValue::Unknown,
            _ => ProvenValue::Win
        }
    }

    /// The number of plys until the proven end of the game; zero for
    /// unproven scores.
    pub fn distance(self) -> i32 {
        match self.proven_value() {
            ProvenValue::Loss | ProvenValue::Draw => self.eval(),
            ProvenValue::Unknown => 0,
            ProvenValue::Win => -self.eval()
        }
    }

    pub fn is_unproven(self) -> bool {
        self.proven_value() == ProvenValue::Unknown
    }

    pub fn is_proven(self) -> bool {
        self.proven_value() != ProvenValue::Unknown && self.is_finite()
    }

    pub fn is_win(self) -> bool {
        self.proven_value() == ProvenValue::Win && self.is_finite()
    }

    pub fn is_draw(self) -> bool {
        self.proven_value() == ProvenValue::Draw
    }

    pub fn is_loss(self) -> bool {
        self.proven_value() == ProvenValue::Loss && self.is_finite()
    }

    pub fn is_infinite(self) -> bool {
        self == Score::minus_infinity() || self == Score::plus_infinity()
    }

    pub fn is_finite(self) -> bool {
        !self.is_infinite()
    }

    pub fn increase_distance(&mut self, plys: i32) {
        if self.is_finite() {
            match self.proven_value() {
                ProvenValue::Loss | ProvenValue::Draw => { *self = Score::new(self.proven_value(), self.eval() + plys); },
                ProvenValue::Unknown => {},
                ProvenValue::Win => { *self = Score::new(self.proven_value(), self.eval() - plys); }
            }
        }
    }

    pub fn decrease_distance(&mut self, plys: i32) {
        self.increase_distance(-plys);
    }

    /// The value a proven score corresponds to. Unproven evaluations map
    /// linearly onto the win rate.
    pub fn to_value(self) -> Value {
        match self.proven_value() {
            ProvenValue::Loss => if self.is_finite() { Value::loss() } else { Value::default() },
            ProvenValue::Draw => Value::draw(),
            ProvenValue::Win => if self.is_finite() { Value::win() } else { Value::default() },
            ProvenValue::Unknown => {
                let win_rate = ((1000 + self.eval()) as f32 / 2000.0).clamp(0.0, 1.0);
                Value::new(win_rate, 0.0)
            }
        }
    }
}

impl Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        match self.proven_value() {
            ProvenValue::Loss => {
                if self.is_finite() { Score::new(ProvenValue::Win, -self.eval()) } else { Score::plus_infinity() }
            },
            ProvenValue::Draw => Score::new(ProvenValue::Draw, self.eval()),
            ProvenValue::Unknown => Score::new(ProvenValue::Unknown, -self.eval()),
            ProvenValue::Win => {
                if self.is_finite() { Score::new(ProvenValue::Loss, -self.eval()) } else { Score::minus_infinity() }
            }
        }
    }
}

/// Invert the score for the other player, increasing the distance to the
/// proven end by one ply. Used when passing a score up the search tree.
pub fn invert_up(score: Score) -> Score {
    match score.proven_value() {
        ProvenValue::Loss if score.is_finite() => Score::win_in(score.distance() + 1),
        ProvenValue::Draw => Score::draw_in(score.distance() + 1),
        ProvenValue::Win if score.is_finite() => Score::loss_in(score.distance() + 1),
        _ => -score
    }
}

/// Invert the score for the other player, decreasing the distance to the
/// proven end by one ply. Used when passing a window down the search tree.
pub fn invert_down(score: Score) -> Score {
    match score.proven_value() {
        ProvenValue::Loss if score.is_finite() => Score::win_in(score.distance() - 1),
        ProvenValue::Draw => Score::draw_in(score.distance() - 1),
        ProvenValue::Win if score.is_finite() => Score::loss_in(score.distance() - 1),
        _ => -score
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == Score::minus_infinity() {
            write!(f, "-inf")
        } else if *self == Score::plus_infinity() {
            write!(f, "+inf")
        } else {
            match self.proven_value() {
                ProvenValue::Loss => write!(f, "L{}", self.distance()),
                ProvenValue::Draw => write!(f, "D{}", self.distance()),
                ProvenValue::Win => write!(f, "W{}", self.distance()),
                ProvenValue::Unknown => write!(f, "{:+}", self.eval())
            }
        }
    }
}
