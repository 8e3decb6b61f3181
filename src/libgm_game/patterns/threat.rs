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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::patterns::table::PatternType;
use crate::rules::GameRules;
use crate::sign::Sign;

/// The aggregated tactical classification of one square for one colour,
/// combining its four directional patterns.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThreatType {
    #[default]
    None = 0,
    HalfOpen3 = 1,
    Open3 = 2,
    HalfOpen4 = 3,
    Fork3x3 = 4,
    Fork4x3 = 5,
    Fork4x4 = 6,
    Open4 = 7,
    Five = 8,
    Overline = 9
}

impl ThreatType {
    pub const COUNT: usize = 10;

    pub fn from_u8(value: u8) -> ThreatType {
        debug_assert!(value < 10);
        unsafe { ::std::mem::transmute(value) }
    }

    /// Returns true if playing this square creates a four or better.
    pub fn is_four_or_better(self) -> bool {
        matches!(self, ThreatType::HalfOpen4 | ThreatType::Fork4x3 | ThreatType::Fork4x4 | ThreatType::Open4 | ThreatType::Five)
    }
}

/// A threat as seen by either colour. The pair differs only under RENJU,
/// where a shape can be forbidden for Cross but a plain win for Circle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Threat {
    pub for_cross: ThreatType,
    pub for_circle: ThreatType
}

impl Threat {
    fn same(t: ThreatType) -> Self {
        Self { for_cross: t, for_circle: t }
    }

    fn split(for_cross: ThreatType, for_circle: ThreatType) -> Self {
        Self { for_cross, for_circle }
    }

    pub fn for_sign(&self, sign: Sign) -> ThreatType {
        debug_assert!(sign.is_player());
        if sign == Sign::Cross { self.for_cross } else { self.for_circle }
    }
}

/// Lookup from the four directional pattern types of one colour to the
/// aggregated threat, with the rule-specific fork resolutions baked in.
pub struct ThreatTable {
    threats: Vec<Threat>
}

impl ThreatTable {
    /// Returns the process-wide table for the given rule variant, building
    /// it on first use.
    pub fn get(rules: GameRules) -> Arc<ThreatTable> {
        lazy_static! {
            static ref TABLES: Mutex<HashMap<GameRules, Arc<ThreatTable>>> = Mutex::new(HashMap::new());
        }

        let mut tables = TABLES.lock().expect("could not acquire threat table lock");
        tables.entry(rules)
            .or_insert_with(|| Arc::new(ThreatTable::new(rules)))
            .clone()
    }

    fn new(rules: GameRules) -> ThreatTable {
        let mut threats = vec! [Threat::default(); 8 * 8 * 8 * 8];

        for index in 0..threats.len() {
            let group = [
                PatternType::from_u8((index & 7) as u8),
                PatternType::from_u8(((index >> 3) & 7) as u8),
                PatternType::from_u8(((index >> 6) & 7) as u8),
                PatternType::from_u8(((index >> 9) & 7) as u8)
            ];
            threats[index] = threat_of(group, rules);
        }

        ThreatTable { threats }
    }

    pub fn threat(&self, group: [PatternType; 4]) -> Threat {
        self.threats[Self::index_of(group)]
    }

    fn index_of(group: [PatternType; 4]) -> usize {
        (group[0] as usize) | ((group[1] as usize) << 3) | ((group[2] as usize) << 6) | ((group[3] as usize) << 9)
    }
}

fn count(group: [PatternType; 4], pattern: PatternType) -> usize {
    group.iter().filter(|&&p| p == pattern).count()
}

fn contains(group: [PatternType; 4], pattern: PatternType) -> bool {
    count(group, pattern) > 0
}

fn is_fork_3x3(group: [PatternType; 4]) -> bool {
    count(group, PatternType::Open3) >= 2
}

fn is_fork_4x3(group: [PatternType; 4]) -> bool {
    let threes = count(group, PatternType::Open3);
    let fours = count(group, PatternType::Open4) + count(group, PatternType::HalfOpen4);
    threes >= 1 && fours >= 1
}

fn is_fork_4x4(group: [PatternType; 4]) -> bool {
    let fours = count(group, PatternType::Open4) + count(group, PatternType::HalfOpen4);
    contains(group, PatternType::Double4) || fours >= 2
}

fn threat_of(group: [PatternType; 4], rules: GameRules) -> Threat {
    if contains(group, PatternType::Five) {
        // a five is never forbidden, not even in renju
        return Threat::same(ThreatType::Five);
    }

    if rules == GameRules::Renju {
        if contains(group, PatternType::Overline) {
            // forbidden for cross, but completes a row for circle
            return Threat::split(ThreatType::Overline, ThreatType::Five);
        }
        if is_fork_4x4(group) {
            return Threat::same(ThreatType::Fork4x4);
        }
        if contains(group, PatternType::Open4) {
            if is_fork_3x3(group) {
                // an open four and a 3x3 fork can coexist at one spot in
                // different directions; the fork makes it forbidden for
                // cross
                return Threat::split(ThreatType::Fork3x3, ThreatType::Open4);
            }
            return Threat::same(ThreatType::Open4);
        }
        if is_fork_4x3(group) {
            if is_fork_3x3(group) {
                // the 4x3 fork itself is allowed, but together with a 3x3
                // fork the move is forbidden for cross
                return Threat::split(ThreatType::Fork3x3, ThreatType::Fork4x3);
            }
            return Threat::same(ThreatType::Fork4x3);
        }
    } else {
        if is_fork_4x4(group) {
            return Threat::same(ThreatType::Fork4x4);
        }
        if contains(group, PatternType::Open4) {
            return Threat::same(ThreatType::Open4);
        }
        if is_fork_4x3(group) {
            return Threat::same(ThreatType::Fork4x3);
        }
    }

    if is_fork_3x3(group) {
        return Threat::same(ThreatType::Fork3x3);
    }
    if contains(group, PatternType::HalfOpen4) {
        return Threat::same(ThreatType::HalfOpen4);
    }
    if contains(group, PatternType::Open3) {
        return Threat::same(ThreatType::Open3);
    }
    if contains(group, PatternType::HalfOpen3) {
        return Threat::same(ThreatType::HalfOpen3);
    }
    Threat::same(ThreatType::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(a: PatternType, b: PatternType, c: PatternType, d: PatternType) -> [PatternType; 4] {
        [a, b, c, d]
    }

    #[test]
    fn five_beats_everything() {
        let table = ThreatTable::get(GameRules::Renju);
        let threat = table.threat(group(PatternType::Five, PatternType::Overline, PatternType::None, PatternType::None));

        assert_eq!(threat.for_cross, ThreatType::Five);
        assert_eq!(threat.for_circle, ThreatType::Five);
    }

    #[test]
    fn renju_forks_are_asymmetric() {
        let table = ThreatTable::get(GameRules::Renju);
        let double_three = table.threat(group(PatternType::Open3, PatternType::Open3, PatternType::None, PatternType::None));
        let overline = table.threat(group(PatternType::Overline, PatternType::None, PatternType::None, PatternType::None));

        assert_eq!(double_three.for_cross, ThreatType::Fork3x3);
        assert_eq!(double_three.for_circle, ThreatType::Fork3x3);
        assert_eq!(overline.for_cross, ThreatType::Overline);
        assert_eq!(overline.for_circle, ThreatType::Five);
    }

    #[test]
    fn freestyle_forks() {
        let table = ThreatTable::get(GameRules::Freestyle);

        assert_eq!(
            table.threat(group(PatternType::HalfOpen4, PatternType::HalfOpen4, PatternType::None, PatternType::None)).for_cross,
            ThreatType::Fork4x4
        );
        assert_eq!(
            table.threat(group(PatternType::HalfOpen4, PatternType::Open3, PatternType::None, PatternType::None)).for_cross,
            ThreatType::Fork4x3
        );
        assert_eq!(
            table.threat(group(PatternType::Double4, PatternType::None, PatternType::None, PatternType::None)).for_cross,
            ThreatType::Fork4x4
        );
    }
}
