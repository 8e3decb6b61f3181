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

extern crate crossbeam_channel;
extern crate crossbeam_utils;
extern crate gm_game;
extern crate gm_nn;
extern crate gm_tss;
extern crate gm_utils;
extern crate lazy_static;
extern crate ordered_float;
extern crate rand;
extern crate rand_distr;

pub mod edge_generator;
pub mod edge_selector;
pub mod engine;
pub mod evaluator;
pub mod node;
pub mod param;
pub mod search;
pub mod search_task;
pub mod time_control;
pub mod tree;
pub mod worker;

pub use self::engine::{Message, SearchEngine, SearchGoal, SearchSummary};
pub use self::param::{EngineSettings, EngineStyle, SearchConfig, TreeConfig, TssConfig};
pub use self::tree::{ExpandOutcome, SelectOutcome, Tree};
