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

use std::ops::{Add, Mul, Sub};

/// The expected outcome of a position from the point of view of the side
/// to move, as (win rate, draw rate). The loss rate is whatever remains.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Value {
    pub win_rate: f32,
    pub draw_rate: f32
}

impl Value {
    pub fn new(win_rate: f32, draw_rate: f32) -> Self {
        Self { win_rate, draw_rate }
    }

    pub fn win() -> Self {
        Self { win_rate: 1.0, draw_rate: 0.0 }
    }

    pub fn draw() -> Self {
        Self { win_rate: 0.0, draw_rate: 1.0 }
    }

    pub fn loss() -> Self {
        Self { win_rate: 0.0, draw_rate: 0.0 }
    }

    pub fn loss_rate(&self) -> f32 {
        1.0 - self.win_rate - self.draw_rate
    }

    /// A draw counts as half a win.
    pub fn expectation(&self) -> f32 {
        self.win_rate + 0.5 * self.draw_rate
    }

    /// The same outcome distribution seen by the other player.
    pub fn inverted(&self) -> Value {
        Value {
            win_rate: self.loss_rate(),
            draw_rate: self.draw_rate
        }
    }

    pub fn is_valid(&self) -> bool {
        self.win_rate >= 0.0 && self.draw_rate >= 0.0
            && self.win_rate.is_finite() && self.draw_rate.is_finite()
            && self.win_rate + self.draw_rate <= 1.0 + 1e-4
    }

    /// Clip the rates back into the probability simplex after accumulated
    /// floating point drift.
    pub fn clip_to_bounds(&mut self) {
        self.win_rate = self.win_rate.clamp(0.0, 1.0);
        self.draw_rate = self.draw_rate.clamp(0.0, 1.0 - self.win_rate);
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        Value::new(self.win_rate + rhs.win_rate, self.draw_rate + rhs.draw_rate)
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Value) -> Value {
        Value::new(self.win_rate - rhs.win_rate, self.draw_rate - rhs.draw_rate)
    }
}

impl Mul<f32> for Value {
    type Output = Value;

    fn mul(self, rhs: f32) -> Value {
        Value::new(self.win_rate * rhs, self.draw_rate * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectation() {
        assert_eq!(Value::win().expectation(), 1.0);
        assert_eq!(Value::draw().expectation(), 0.5);
        assert_eq!(Value::loss().expectation(), 0.0);
    }

    #[test]
    fn inversion_swaps_win_and_loss() {
        let value = Value::new(0.6, 0.3);
        let inverted = value.inverted();

        assert!((inverted.win_rate - 0.1).abs() < 1e-6);
        assert!((inverted.draw_rate - 0.3).abs() < 1e-6);
        assert!((inverted.expectation() + value.expectation() - 1.0).abs() < 1e-6);
    }
}
