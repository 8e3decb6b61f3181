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

use std::time::{Duration, Instant};

use crate::tree::Tree;

pub enum TimeStrategyResult {
    NotExpired(usize),
    NotExtended,
    Expired,
    Extended
}

pub trait TimeStrategy: Send + Sync {
    /// Check if this time period has expired, and if so whether it should
    /// be extended further.
    ///
    /// # Arguments
    ///
    /// * `tree` - the search tree.
    ///
    fn try_extend(&self, tree: &Tree) -> TimeStrategyResult;
}

/// Stop after a fixed number of simulations.
pub struct RolloutLimit {
    limit: usize
}

impl RolloutLimit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TimeStrategy for RolloutLimit {
    fn try_extend(&self, tree: &Tree) -> TimeStrategyResult {
        let count = tree.simulation_count();

        if count < self.limit {
            TimeStrategyResult::NotExpired(self.limit - count)
        } else {
            TimeStrategyResult::Expired
        }
    }
}

/// Stop after a wall-clock budget, estimating the remaining rollouts from
/// the pace so far.
pub struct TimeLimit {
    start: Instant,
    budget: Duration
}

impl TimeLimit {
    pub fn new(budget: Duration) -> Self {
        Self { start: Instant::now(), budget }
    }
}

impl TimeStrategy for TimeLimit {
    fn try_extend(&self, tree: &Tree) -> TimeStrategyResult {
        let elapsed = self.start.elapsed();

        if elapsed >= self.budget {
            TimeStrategyResult::Expired
        } else {
            let remaining = self.budget - elapsed;
            let pace = tree.simulation_count() as f64 / elapsed.as_secs_f64().max(1.0e-3);
            let estimate = (pace * remaining.as_secs_f64()) as usize;

            TimeStrategyResult::NotExpired(estimate)
        }
    }
}

/// Never stop; used while pondering, where the controller stops the
/// search explicitly.
#[derive(Default)]
pub struct Infinite;

impl TimeStrategy for Infinite {
    fn try_extend(&self, _tree: &Tree) -> TimeStrategyResult {
        TimeStrategyResult::NotExpired(usize::MAX)
    }
}

/// Returns the minimum number of rollouts that are necessary for the
/// second most visited edge at the root to become the most visited.
///
/// # Arguments
///
/// * `tree` -
///
fn min_promote_rollouts(tree: &Tree) -> usize {
    let edges = tree.edges_of(tree.root());
    let mut top_1 = 0i32;
    let mut top_2 = 0i32;

    for edge in edges.iter() {
        let count = edge.visits();
        if count > top_1 {
            top_2 = top_1;
            top_1 = count;
        } else if count > top_2 {
            top_2 = count;
        }
    }

    (top_1 - top_2).max(0) as usize
}

/// Implements a time control scheme based on the `UNST-N` and `EARLY-C`
/// strategies as suggested by _Hendrik Baier_ and _Mark H.M. Winands_ [1]:
/// terminate the search early if the second most visited edge cannot catch
/// up to the most visited one in the remaining time.
///
/// [1] _Hendrik Baier_ and _Mark H.M. Winands_, "Time Management for
///     Monte-Carlo Tree Search in Go"
///
pub fn is_done(tree: &Tree, strategy: &dyn TimeStrategy) -> bool {
    if tree.simulation_count() == 0 || tree.node(tree.root()).is_leaf() {
        false
    } else {
        match strategy.try_extend(tree) {
            TimeStrategyResult::NotExpired(remaining) => {
                min_promote_rollouts(tree) > remaining
            },
            TimeStrategyResult::Extended => false,
            _ => true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::TreeConfig;
    use crate::search_task::SearchTask;
    use gm_game::{Board, GameConfig, GameRules, Move, Sign};
    use gm_tss::Value;

    fn small_tree() -> Tree {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut tree = Tree::new(config, TreeConfig { max_nodes: 100, node_bucket_size: 16 });

        let mut task = SearchTask::new(config);
        task.set(&Board::new(15, 15), Sign::Cross);
        task.add_edge(Move::new(7, 7, Sign::Cross));
        task.add_edge(Move::new(7, 8, Sign::Cross));
        task.value = Value::new(0.5, 0.0);
        task.was_processed_by_network = true;
        tree.expand(&task);
        tree.backup(&task);
        tree
    }

    #[test]
    fn rollout_limit_expires() {
        let tree = small_tree();
        let strategy = RolloutLimit::new(1);

        assert!(is_done(&tree, &strategy));
    }

    #[test]
    fn rollout_limit_with_room_left() {
        let tree = small_tree();
        let strategy = RolloutLimit::new(1000);

        assert!(!is_done(&tree, &strategy));
    }

    #[test]
    fn infinite_never_stops() {
        let tree = small_tree();

        assert!(!is_done(&tree, &Infinite));
    }

    #[test]
    fn expired_time_limit_stops() {
        let tree = small_tree();
        let strategy = TimeLimit::new(Duration::from_secs(0));

        assert!(is_done(&tree, &strategy));
    }
}
