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

use crate::moves::Move;
use crate::patterns::threat::ThreatType;

/// For one colour, the set of empty squares currently carrying each threat
/// type. Squares with no threat are not tracked.
#[derive(Clone, Debug)]
pub struct ThreatHistogram {
    threats: [Vec<Move>; ThreatType::COUNT]
}

impl Default for ThreatHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreatHistogram {
    pub fn new() -> Self {
        let mut threats: [Vec<Move>; ThreatType::COUNT] = Default::default();
        for list in threats.iter_mut().skip(1) {
            list.reserve(64);
        }

        Self { threats }
    }

    pub fn get(&self, threat: ThreatType) -> &[Move] {
        &self.threats[threat as usize]
    }

    pub fn number_of(&self, threat: ThreatType) -> usize {
        self.threats[threat as usize].len()
    }

    pub fn add(&mut self, threat: ThreatType, mv: Move) {
        if threat != ThreatType::None {
            self.threats[threat as usize].push(mv);
        }
    }

    pub fn remove(&mut self, threat: ThreatType, mv: Move) {
        if threat != ThreatType::None {
            let list = &mut self.threats[threat as usize];
            let index = list.iter().position(|&m| m == mv)
                .expect("the threat must exist in the list");
            list.swap_remove(index);
        }
    }

    pub fn clear(&mut self) {
        for list in self.threats.iter_mut() {
            list.clear();
        }
    }

    /// Returns true if this colour can make a four (or better) somewhere.
    pub fn has_any_four(&self) -> bool {
        self.number_of(ThreatType::HalfOpen4) > 0
            || self.number_of(ThreatType::Fork4x3) > 0
            || self.number_of(ThreatType::Fork4x4) > 0
            || self.number_of(ThreatType::Open4) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::Sign;

    #[test]
    fn add_remove_round_trip() {
        let mut histogram = ThreatHistogram::new();
        let a = Move::new(1, 2, Sign::Cross);
        let b = Move::new(3, 4, Sign::Cross);

        histogram.add(ThreatType::Open3, a);
        histogram.add(ThreatType::Open3, b);
        histogram.add(ThreatType::Five, b);
        assert_eq!(histogram.number_of(ThreatType::Open3), 2);
        assert!(histogram.has_any_four() == false);

        histogram.remove(ThreatType::Open3, a);
        assert_eq!(histogram.get(ThreatType::Open3), &[b]);

        histogram.remove(ThreatType::Five, b);
        assert_eq!(histogram.number_of(ThreatType::Five), 0);
    }

    #[test]
    fn none_threats_are_ignored() {
        let mut histogram = ThreatHistogram::new();
        histogram.add(ThreatType::None, Move::new(0, 0, Sign::Cross));

        assert_eq!(histogram.number_of(ThreatType::None), 0);
    }
}
