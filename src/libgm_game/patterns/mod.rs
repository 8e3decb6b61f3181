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

mod classifier;
mod calculator;
mod histogram;
mod pattern;
mod table;
mod threat;

pub use self::calculator::PatternCalculator;
pub use self::classifier::{MatchingRule, PatternClassifier};
pub use self::histogram::ThreatHistogram;
pub use self::pattern::{col_step, row_step, Direction, LinePattern, ALL_DIRECTIONS, ANTIDIAGONAL, DIAGONAL, HORIZONTAL, VERTICAL};
pub use self::table::{PatternEncoding, PatternTable, PatternType};
pub use self::threat::{Threat, ThreatTable, ThreatType};
