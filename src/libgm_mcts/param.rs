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

use gm_game::GameConfig;
use gm_tss::TssMode;
use gm_utils::config;

/// What the engine optimizes for: `style_factor` is the weight of draws in
/// the optimized quantity `P(win) + style * P(draw)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineStyle {
    Defensive,
    Balanced,
    Aggressive
}

impl EngineStyle {
    pub fn style_factor(self) -> f32 {
        match self {
            EngineStyle::Defensive => 1.0,
            EngineStyle::Balanced => 0.5,
            EngineStyle::Aggressive => 0.0
        }
    }
}

/// Limits of the shared search tree.
#[derive(Clone, Copy, Debug)]
pub struct TreeConfig {
    pub max_nodes: usize,
    pub node_bucket_size: usize
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_nodes: *config::MAX_NODES,
            node_bucket_size: 1 << 16
        }
    }
}

/// Knobs of the threat-space-search collaborator.
#[derive(Clone, Copy, Debug)]
pub struct TssConfig {
    pub mode: TssMode,
    pub max_positions: usize,
    pub hash_table_size: usize
}

impl Default for TssConfig {
    fn default() -> Self {
        Self {
            mode: TssMode::Recursive,
            max_positions: 100,
            hash_table_size: 1 << 20
        }
    }
}

/// Knobs of one search worker.
#[derive(Clone, Copy, Debug)]
pub struct SearchConfig {
    pub max_batch_size: usize,
    pub exploration_constant: f32,
    pub style_factor: f32,
    pub max_children: usize,
    pub policy_expansion_threshold: f32,
    pub use_symmetries: bool,
    pub tss: TssConfig
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: *config::BATCH_SIZE,
            exploration_constant: 1.25,
            style_factor: 0.5,
            max_children: 32,
            policy_expansion_threshold: 1.0e-4,
            use_symmetries: *config::USE_SYMMETRIES,
            tss: TssConfig::default()
        }
    }
}

/// Everything the controller layer needs to know about the engine setup.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub game_config: GameConfig,
    pub search_config: SearchConfig,
    pub tree_config: TreeConfig,
    pub style: EngineStyle,

    pub num_threads: usize,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub max_memory: usize,
    pub max_simulations: usize
}

impl EngineSettings {
    pub fn new(game_config: GameConfig) -> Self {
        Self {
            game_config,
            search_config: SearchConfig::default(),
            tree_config: TreeConfig::default(),
            style: EngineStyle::Balanced,
            num_threads: *config::NUM_THREADS,
            max_depth: game_config.rows * game_config.cols,
            max_nodes: *config::MAX_NODES,
            max_memory: *config::MAX_TREE_MEMORY,
            max_simulations: usize::MAX
        }
    }
}
