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

use std::sync::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::patterns::classifier::PatternClassifier;
use crate::patterns::pattern::LinePattern;
use crate::rules::GameRules;
use crate::sign::Sign;

/// The tactical classification of one line window for one colour, ordered
/// by strength.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternType {
    #[default]
    None = 0,
    HalfOpen3 = 1,
    Open3 = 2,
    HalfOpen4 = 3,
    Open4 = 4,
    Double4 = 5,
    Five = 6,
    Overline = 7
}

impl PatternType {
    pub fn from_u8(value: u8) -> PatternType {
        debug_assert!(value < 8);
        unsafe { ::std::mem::transmute(value) }
    }
}

/// Everything the tables know about one window encoding: the pattern type
/// for either colour, the update mask (window cells whose own patterns can
/// change when the centre changes, i.e. the empty cells) and per-colour
/// defensive-move masks (cells where the *other* colour has to respond to
/// stop promotion towards a five or an open four).
#[derive(Clone, Copy, Debug, Default)]
pub struct PatternEncoding {
    cross: PatternType,
    circle: PatternType,
    update_mask: u16,
    defensive_cross: u16,
    defensive_circle: u16
}

impl PatternEncoding {
    pub fn for_sign(&self, sign: Sign) -> PatternType {
        debug_assert!(sign.is_player());
        if sign == Sign::Cross { self.cross } else { self.circle }
    }

    pub fn must_be_updated(&self, index: usize) -> bool {
        self.update_mask & (1 << index) != 0
    }

    pub fn update_mask(&self) -> u16 {
        self.update_mask
    }

    /// The cells where the opponent of `sign` must play to defuse this
    /// window for `sign`.
    pub fn defensive_moves(&self, sign: Sign) -> u16 {
        debug_assert!(sign.is_player());
        if sign == Sign::Cross { self.defensive_cross } else { self.defensive_circle }
    }
}

/// The full per-rule-variant pattern lookup table, built once and then
/// read-only.
pub struct PatternTable {
    rules: GameRules,
    length: usize,
    patterns: Vec<PatternEncoding>
}

impl PatternTable {
    /// The window length used by the given rule variant.
    pub fn length(rules: GameRules) -> usize {
        if rules == GameRules::Freestyle { 9 } else { 11 }
    }

    /// Returns the process-wide table for the given rule variant, building
    /// it on first use.
    pub fn get(rules: GameRules) -> Arc<PatternTable> {
        lazy_static! {
            static ref TABLES: Mutex<HashMap<GameRules, Arc<PatternTable>>> = Mutex::new(HashMap::new());
        }

        let mut tables = TABLES.lock().expect("could not acquire pattern table lock");
        tables.entry(rules)
            .or_insert_with(|| Arc::new(PatternTable::new(rules)))
            .clone()
    }

    fn new(rules: GameRules) -> PatternTable {
        let length = Self::length(rules);
        let mut out = PatternTable {
            rules,
            length,
            patterns: vec! [PatternEncoding::default(); 1 << (2 * length)]
        };

        out.init_patterns();
        out
    }

    pub fn rules(&self) -> GameRules {
        self.rules
    }

    pub fn window_length(&self) -> usize {
        self.length
    }

    /// Look up the classification of a window encoding. The centre cell
    /// bits must be zero (empty).
    pub fn pattern_data(&self, encoding: u32) -> PatternEncoding {
        self.patterns[encoding as usize]
    }

    /* -------- construction -------- */

    fn init_patterns(&mut self) {
        let for_cross = ThreatClassifier::new(self.rules, Sign::Cross);
        let for_circle = ThreatClassifier::new(self.rules, Sign::Circle);
        let mut was_processed = vec! [false; self.patterns.len()];

        for encoding in 0..self.patterns.len() as u32 {
            if was_processed[encoding as usize] {
                continue;
            }

            let mut line = LinePattern::from_encoding(self.length, encoding);
            if !line.is_valid() {
                continue;
            }

            line.set_center(Sign::Cross);
            let cross = for_cross.classify(&line);
            line.set_center(Sign::Circle);
            let circle = for_circle.classify(&line);
            line.set_center(Sign::None);

            let entry = PatternEncoding {
                cross,
                circle,
                update_mask: self.update_mask_of(&line),
                defensive_cross: self.defensive_mask_of(&for_cross, &line, Sign::Cross, cross),
                defensive_circle: self.defensive_mask_of(&for_circle, &line, Sign::Circle, circle)
            };

            // the classification is symmetric under reflection, so fill the
            // mirrored encoding at the same time
            let flipped = line.flip();
            let flipped_entry = PatternEncoding {
                cross,
                circle,
                update_mask: reverse_mask(entry.update_mask, self.length),
                defensive_cross: reverse_mask(entry.defensive_cross, self.length),
                defensive_circle: reverse_mask(entry.defensive_circle, self.length)
            };

            self.patterns[encoding as usize] = entry;
            was_processed[encoding as usize] = true;
            self.patterns[flipped.encode() as usize] = flipped_entry;
            was_processed[flipped.encode() as usize] = true;
        }
    }

    /// Only empty cells can carry a pattern of their own, so they are
    /// exactly the cells that may need reclassification when the centre
    /// changes.
    fn update_mask_of(&self, line: &LinePattern) -> u16 {
        let mut mask = 0u16;
        for i in 0..self.length {
            if line.get(i) == Sign::None {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// The cells at which the opponent of `sign` weakens this window below
    /// its current classification.
    fn defensive_mask_of(
        &self,
        classifier: &ThreatClassifier,
        line: &LinePattern,
        sign: Sign,
        current: PatternType
    ) -> u16 {
        if current == PatternType::None {
            return 0;
        }

        let mut mask = 0u16;
        let mut probe = *line;
        probe.set_center(sign);

        for i in 0..self.length {
            if i != line.center() && probe.get(i) == Sign::None {
                probe.set(i, sign.invert());
                if classifier.classify(&probe) < current {
                    mask |= 1 << i;
                }
                probe.set(i, Sign::None);
            }
        }
        mask
    }
}

/// Classifies a window (with its centre already set to the colour under
/// test) into a `PatternType`, strongest first.
struct ThreatClassifier {
    is_overline: PatternClassifier,
    is_five: PatternClassifier,
    is_open_four: PatternClassifier,
    is_double_four: PatternClassifier,
    is_half_open_four: PatternClassifier,
    is_open_three: PatternClassifier,
    is_half_open_three: PatternClassifier
}

impl ThreatClassifier {
    fn new(rules: GameRules, sign: Sign) -> Self {
        Self {
            is_overline: PatternClassifier::is_overline(rules, sign),
            is_five: PatternClassifier::is_five(rules, sign),
            is_open_four: PatternClassifier::is_open_four(rules, sign),
            is_double_four: PatternClassifier::is_double_four(rules, sign),
            is_half_open_four: PatternClassifier::is_half_open_four(rules, sign),
            is_open_three: PatternClassifier::is_open_three(rules, sign),
            is_half_open_three: PatternClassifier::is_half_open_three(rules, sign)
        }
    }

    fn classify(&self, line: &LinePattern) -> PatternType {
        if self.is_five.is_matching(line) {
            PatternType::Five
        } else if self.is_overline.is_matching(line) {
            PatternType::Overline
        } else if self.is_open_four.is_matching(line) {
            PatternType::Open4
        } else if self.is_double_four.is_matching(line) {
            PatternType::Double4
        } else if self.is_half_open_four.is_matching(line) {
            PatternType::HalfOpen4
        } else if self.is_open_three.is_matching(line) {
            PatternType::Open3
        } else if self.is_half_open_three.is_matching(line) {
            PatternType::HalfOpen3
        } else {
            PatternType::None
        }
    }
}

fn reverse_mask(mask: u16, length: usize) -> u16 {
    let mut out = 0u16;
    for i in 0..length {
        if mask & (1 << i) != 0 {
            out |= 1 << (length - 1 - i);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(table: &PatternTable, text: &str) -> PatternEncoding {
        let line = LinePattern::from_str(text);
        assert!(line.is_valid(), "{} is not a valid window", text);
        table.pattern_data(line.encode())
    }

    #[test]
    fn freestyle_classification() {
        let table = PatternTable::get(GameRules::Freestyle);

        assert_eq!(lookup(&table, "__XX_XX__").for_sign(Sign::Cross), PatternType::Five);
        assert_eq!(lookup(&table, "XOOO_____").for_sign(Sign::Circle), PatternType::HalfOpen4);
        assert_eq!(lookup(&table, "___O_OO__").for_sign(Sign::Circle), PatternType::Open4);
        assert_eq!(lookup(&table, "___X_X___").for_sign(Sign::Cross), PatternType::Open3);
        assert_eq!(lookup(&table, "_________").for_sign(Sign::Cross), PatternType::None);
    }

    #[test]
    fn open_four_defence_is_both_ends() {
        let table = PatternTable::get(GameRules::Freestyle);
        // placing O at the centre of __OO_O___ gives the open four
        // __OOOO___; the cells weakening it are the two adjacent ends
        let entry = lookup(&table, "__OO_O___");

        assert_eq!(entry.for_sign(Sign::Circle), PatternType::Open4);
        assert_eq!(entry.defensive_moves(Sign::Circle), (1 << 1) | (1 << 6));
    }

    #[test]
    fn completed_five_has_no_side_defence() {
        let table = PatternTable::get(GameRules::Freestyle);
        let entry = lookup(&table, "OXXX_X__O");

        // the centre completes a five; the only defence is the centre
        // itself, which is carried by the threat histogram instead of the
        // side mask
        assert_eq!(entry.for_sign(Sign::Cross), PatternType::Five);
        assert_eq!(entry.defensive_moves(Sign::Cross), 0);
    }

    #[test]
    fn update_mask_is_the_empty_cells() {
        let table = PatternTable::get(GameRules::Freestyle);
        let entry = lookup(&table, "_X_O_____");

        for (i, ch) in "_X_O_____".chars().enumerate() {
            assert_eq!(entry.must_be_updated(i), ch == '_');
        }
    }

    #[test]
    fn mirrored_encodings_agree() {
        let table = PatternTable::get(GameRules::Freestyle);
        let line = LinePattern::from_str("_XX__O_O_");
        let flipped = line.flip();

        assert_eq!(
            table.pattern_data(line.encode()).for_sign(Sign::Cross),
            table.pattern_data(flipped.encode()).for_sign(Sign::Cross)
        );
    }
}
