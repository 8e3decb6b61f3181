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

extern crate gm_game;
extern crate gm_utils;

pub mod actions;
pub mod hashtable;
pub mod movegen;
pub mod score;
pub mod search;
pub mod value;

pub use self::actions::{Action, ActionList, ActionStack};
pub use self::hashtable::{SharedHashTable, SharedTableData};
pub use self::movegen::{MoveGenerator, MoveGeneratorMode};
pub use self::score::{Bound, ProvenValue, Score};
pub use self::search::{ThreatSpaceSearch, TssMode, TssReport, TssStats};
pub use self::value::Value;
