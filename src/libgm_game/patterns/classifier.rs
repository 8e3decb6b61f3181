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

use crate::patterns::pattern::LinePattern;
use crate::rules::GameRules;
use crate::sign::Sign;

/// One parsed matching rule. Each position holds the set of signs allowed
/// there, and the rule matches a window if it matches any contiguous
/// sub-range of it.
///
/// The rule syntax is a sequence of cells, where a cell is one of the
/// literal characters `_`, `X`, `O`, `|`, or a bracketed set such as
/// `[_|]`, `[not X]` or `[any]`.
#[derive(Clone, Debug)]
pub struct MatchingRule {
    allowed: Vec<u8> // bitmask over the four sign values
}

impl MatchingRule {
    pub fn new(text: &str) -> Self {
        let mut allowed = Vec::with_capacity(text.len());
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '[' => {
                    let end = chars[i..].iter().position(|&c| c == ']').expect("unterminated rule set") + i;
                    let body: String = chars[i + 1..end].iter().collect();

                    if let Some(excluded) = body.strip_prefix("not ") {
                        let sign = Sign::from_char(excluded.chars().next().unwrap()).unwrap();
                        allowed.push(0b1111 & !(1 << sign as u8));
                    } else if body == "any" {
                        allowed.push(0b1111);
                    } else {
                        let mut mask = 0u8;
                        for ch in body.chars() {
                            mask |= 1 << Sign::from_char(ch).unwrap() as u8;
                        }
                        allowed.push(mask);
                    }
                    i = end + 1;
                },
                ch => {
                    let sign = Sign::from_char(ch).expect("incorrect rule character");
                    allowed.push(1 << sign as u8);
                    i += 1;
                }
            }
        }

        Self { allowed }
    }

    /// Returns the first offset at which this rule matches the window, if
    /// any.
    pub fn find_match(&self, pattern: &LinePattern) -> Option<usize> {
        if pattern.len() < self.allowed.len() {
            return None;
        }

        (0..=pattern.len() - self.allowed.len()).find(|&offset| {
            self.allowed.iter().enumerate()
                .all(|(j, &mask)| mask & (1 << pattern.get(offset + j) as u8) != 0)
        })
    }

    pub fn is_matching(&self, pattern: &LinePattern) -> bool {
        self.find_match(pattern).is_some()
    }
}

/// A set of matching rules recognising one pattern type for one sign under
/// one rule variant.
#[derive(Clone, Debug)]
pub struct PatternClassifier {
    rules: Vec<MatchingRule>
}

impl PatternClassifier {
    fn from_literals(literals: Vec<String>) -> Self {
        Self {
            rules: literals.iter().map(|s| MatchingRule::new(s)).collect()
        }
    }

    pub fn is_matching(&self, pattern: &LinePattern) -> bool {
        self.rules.iter().any(|rule| rule.is_matching(pattern))
    }

    /// Wrap every rule as `prefix RULE postfix`.
    fn guard_both(literals: Vec<String>, prefix: &str, postfix: &str) -> Vec<String> {
        literals.into_iter()
            .map(|lit| format!("{}{}{}", prefix, lit, postfix))
            .collect()
    }

    /// Replace every rule by the pair `open RULE blocked` / `blocked RULE
    /// open`, i.e. at least one side must satisfy `open`.
    fn guard_either(literals: Vec<String>, open: &str, blocked: &str) -> Vec<String> {
        literals.into_iter()
            .flat_map(|lit| {
                vec! [
                    format!("{}{}{}", open, lit, blocked),
                    format!("{}{}{}", blocked, lit, open)
                ]
            })
            .collect()
    }

    /// Apply the rule-variant guards shared by all exact-length shapes
    /// (five, half-open four, half-open three).
    fn exact_shape(rules: GameRules, sign: Sign, literals: Vec<String>) -> Self {
        let not_own = format!("[not {}]", sign.to_char());

        let literals = match rules {
            GameRules::Freestyle => literals,
            GameRules::Standard => Self::guard_both(literals, &not_own, &not_own),
            GameRules::Renju if sign == Sign::Cross => Self::guard_both(literals, &not_own, &not_own),
            GameRules::Renju => literals,
            GameRules::Caro5 | GameRules::Caro6 => Self::guard_either(literals, "[_|]", &not_own)
        };

        Self::from_literals(literals)
    }

    /// Apply the rule-variant guards shared by all open shapes (open four,
    /// double four, open three).
    fn open_shape(rules: GameRules, sign: Sign, literals: Vec<String>) -> Self {
        let not_own = format!("[not {}]", sign.to_char());

        let literals = match rules {
            GameRules::Freestyle => literals,
            GameRules::Standard => Self::guard_both(literals, &not_own, &not_own),
            GameRules::Renju if sign == Sign::Cross => Self::guard_both(literals, &not_own, &not_own),
            GameRules::Renju => literals,
            GameRules::Caro5 | GameRules::Caro6 => Self::guard_both(literals, "[_|]", "[_|]")
        };

        Self::from_literals(literals)
    }

    pub fn is_five(rules: GameRules, sign: Sign) -> Self {
        Self::exact_shape(rules, sign, vec! [run(sign, win_length(rules))])
    }

    pub fn is_overline(rules: GameRules, sign: Sign) -> Self {
        Self::from_literals(vec! [run(sign, win_length(rules) + 1)])
    }

    pub fn is_open_four(rules: GameRules, sign: Sign) -> Self {
        let k = win_length(rules);

        Self::open_shape(rules, sign, vec! [format!("_{}_", run(sign, k - 1))])
    }

    pub fn is_double_four(rules: GameRules, sign: Sign) -> Self {
        let k = win_length(rules);
        let literals = (1..=k - 2)
            .map(|b| {
                let a = k - 1 - b;
                format!("{}_{}_{}", run(sign, a), run(sign, b), run(sign, a))
            })
            .collect();

        Self::open_shape(rules, sign, literals)
    }

    pub fn is_half_open_four(rules: GameRules, sign: Sign) -> Self {
        let k = win_length(rules);

        Self::exact_shape(rules, sign, windows_with_gaps(sign, k, 1))
    }

    pub fn is_open_three(rules: GameRules, sign: Sign) -> Self {
        let literals = windows_with_gaps(sign, win_length(rules) - 1, 1).into_iter()
            .map(|w| format!("_{}_", w))
            .collect();

        Self::open_shape(rules, sign, literals)
    }

    pub fn is_half_open_three(rules: GameRules, sign: Sign) -> Self {
        Self::exact_shape(rules, sign, windows_with_gaps(sign, win_length(rules), 2))
    }
}

/// Returns the number of stones in a row needed to win under `rules`.
pub fn win_length(rules: GameRules) -> usize {
    if rules == GameRules::Caro6 { 6 } else { 5 }
}

/// A run of `count` stones of `sign`.
fn run(sign: Sign, count: usize) -> String {
    sign.to_char().to_string().repeat(count)
}

/// All windows of `length` cells holding `length - gaps` stones of `sign`
/// and `gaps` empty cells.
fn windows_with_gaps(sign: Sign, length: usize, gaps: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut indices = vec! [0usize; gaps];

    fn recurse(sign: Sign, length: usize, chosen: &mut Vec<usize>, depth: usize, start: usize, out: &mut Vec<String>) {
        if depth == chosen.len() {
            let window: String = (0..length)
                .map(|i| if chosen.contains(&i) { '_' } else { sign.to_char() })
                .collect();
            out.push(window);
        } else {
            for i in start..length {
                chosen[depth] = i;
                recurse(sign, length, chosen, depth + 1, i + 1, out);
            }
        }
    }

    recurse(sign, length, &mut indices, 0, 0, &mut out);
    out.retain(|w| w.contains(sign.to_char()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> LinePattern {
        LinePattern::from_str(text)
    }

    #[test]
    fn rule_parsing() {
        let rule = MatchingRule::new("[not X]XXXXX[_|]");

        assert!(rule.is_matching(&p("OXXXXX_")));
        assert!(rule.is_matching(&p("_XXXXX|")));
        assert!(!rule.is_matching(&p("XXXXXX_")));
        assert!(!rule.is_matching(&p("OXXXXXO")));
    }

    #[test]
    fn freestyle_five_inside_overline() {
        let five = PatternClassifier::is_five(GameRules::Freestyle, Sign::Cross);

        assert!(five.is_matching(&p("__XXXXX__")));
        assert!(five.is_matching(&p("_XXXXXX__")));
    }

    #[test]
    fn standard_five_is_exact() {
        let five = PatternClassifier::is_five(GameRules::Standard, Sign::Cross);
        let overline = PatternClassifier::is_overline(GameRules::Standard, Sign::Cross);

        assert!(five.is_matching(&p("__XXXXX__")));
        assert!(!five.is_matching(&p("_XXXXXX__")));
        assert!(overline.is_matching(&p("_XXXXXX__")));
    }

    #[test]
    fn caro_five_needs_an_open_end() {
        let five = PatternClassifier::is_five(GameRules::Caro5, Sign::Cross);

        assert!(five.is_matching(&p("_OXXXXX__")));
        assert!(five.is_matching(&p("|XXXXX_O_")));
        assert!(!five.is_matching(&p("_OXXXXXO_")));
    }

    #[test]
    fn caro6_needs_six() {
        let five = PatternClassifier::is_five(GameRules::Caro6, Sign::Circle);

        assert!(!five.is_matching(&p("__OOOOO__X_")));
        assert!(five.is_matching(&p("_OOOOOO_X__")));
    }

    #[test]
    fn open_three_literal_count() {
        // the freestyle open three literals are _XXX__, _XX_X_, _X_XX_ and
        // __XXX_
        let open_three = PatternClassifier::is_open_three(GameRules::Freestyle, Sign::Cross);

        assert!(open_three.is_matching(&p("___XXX___")));
        assert!(open_three.is_matching(&p("__XX_X___")));
        assert!(!open_three.is_matching(&p("O_XXX_O__")));
    }

    #[test]
    fn half_open_four_has_one_gap() {
        let four = PatternClassifier::is_half_open_four(GameRules::Freestyle, Sign::Circle);

        assert!(four.is_matching(&p("OOO_O____")));
        assert!(four.is_matching(&p("O_OOO____")));
        assert!(!four.is_matching(&p("OO__O____")));
    }
}
