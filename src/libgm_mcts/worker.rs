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

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use gm_tss::SharedHashTable;

use crate::evaluator::NNEvaluator;
use crate::param::EngineSettings;
use crate::search::{batch_size_for, Search, SearchStats};
use crate::time_control::{self, TimeStrategy};
use crate::tree::Tree;

/// One search worker: owns a `Search` pipeline and an evaluator, and
/// shares the tree with its siblings. The thread body catches panics so a
/// failing worker cannot take the engine down.
pub struct SearchThread {
    handle: Option<JoinHandle<SearchStats>>,
    is_running: Arc<AtomicBool>
}

impl SearchThread {
    /// Spawn a worker that searches until a stop condition triggers or
    /// `is_running` is cleared.
    ///
    /// # Arguments
    ///
    /// * `settings` -
    /// * `tree` -
    /// * `shared_table` - transposition table shared by all workers
    /// * `evaluator` -
    /// * `time_strategy` -
    /// * `is_running` -
    ///
    pub fn spawn(
        settings: EngineSettings,
        tree: Arc<Mutex<Tree>>,
        shared_table: Arc<SharedHashTable>,
        evaluator: NNEvaluator,
        time_strategy: Arc<dyn TimeStrategy>,
        is_running: Arc<AtomicBool>
    ) -> Self {
        let running = is_running.clone();
        let handle = thread::Builder::new()
            .name("search_worker".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run(settings, tree, shared_table, evaluator, time_strategy, running)
                }));

                match result {
                    Ok(stats) => stats,
                    Err(_) => {
                        eprintln!("search worker panicked; the current search is abandoned");
                        SearchStats::default()
                    }
                }
            })
            .expect("could not spawn search worker");

        Self {
            handle: Some(handle),
            is_running
        }
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Wait for the worker and return its statistics.
    pub fn join(mut self) -> SearchStats {
        self.handle.take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl Drop for SearchThread {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    settings: EngineSettings,
    tree: Arc<Mutex<Tree>>,
    shared_table: Arc<SharedHashTable>,
    mut evaluator: NNEvaluator,
    time_strategy: Arc<dyn TimeStrategy>,
    is_running: Arc<AtomicBool>
) -> SearchStats {
    let mut search = Search::new(settings.game_config, settings.search_config, shared_table);

    {
        let tree = tree.lock().expect("could not acquire tree lock");
        if is_stop_condition_fulfilled(&tree, &settings, time_strategy.as_ref()) {
            return search.stats();
        }
    }

    if evaluator.is_on_gpu() {
        asynchronous_run(&mut search, &tree, &mut evaluator, &settings, time_strategy.as_ref(), &is_running);
    } else {
        serial_run(&mut search, &tree, &mut evaluator, &settings, time_strategy.as_ref(), &is_running);
    }

    let mut tree = tree.lock().expect("could not acquire tree lock");
    search.cleanup(&mut tree);
    search.stats()
}

/// The straight pipeline: each batch is evaluated in place.
fn serial_run(
    search: &mut Search,
    tree: &Mutex<Tree>,
    evaluator: &mut NNEvaluator,
    settings: &EngineSettings,
    time_strategy: &dyn TimeStrategy,
    is_running: &AtomicBool
) {
    loop {
        {
            let mut tree = tree.lock().expect("could not acquire tree lock");
            let batch_size = batch_size_for(tree.simulation_count(), search.config().max_batch_size);
            search.set_batch_size(batch_size);
            search.select(&mut tree, settings.max_simulations);
        }
        search.solve();
        search.schedule_to_nn(evaluator);
        search.evaluate(evaluator);

        search.generate_edges(); // this step does not require the tree lock
        {
            let mut tree = tree.lock().expect("could not acquire tree lock");
            search.expand(&mut tree);
            search.backup(&mut tree);
            if is_stop_condition_fulfilled(&tree, settings, time_strategy) {
                break;
            }
        }
        if !is_running.load(Ordering::Acquire) {
            break;
        }
    }
}

/// The double-buffered pipeline: one buffer expands and backs up on the
/// CPU while the other one computes on the device.
fn asynchronous_run(
    search: &mut Search,
    tree: &Mutex<Tree>,
    evaluator: &mut NNEvaluator,
    settings: &EngineSettings,
    time_strategy: &dyn TimeStrategy,
    is_running: &AtomicBool
) {
    search.use_buffer(0);
    loop {
        search.generate_edges(); // this step does not require the tree lock
        {
            let mut tree = tree.lock().expect("could not acquire tree lock");
            search.expand(&mut tree);
            search.backup(&mut tree);
            if is_stop_condition_fulfilled(&tree, settings, time_strategy) {
                break;
            }
            let batch_size = batch_size_for(tree.simulation_count(), search.config().max_batch_size);
            search.set_batch_size(batch_size);
            search.select(&mut tree, settings.max_simulations);
        }
        search.solve();
        search.schedule_to_nn(evaluator);
        search.evaluate_async_join_previous(evaluator);
        search.evaluate_async_launch(evaluator);
        search.switch_buffer();

        if !is_running.load(Ordering::Acquire) {
            break;
        }
    }
    search.evaluate_async_join_previous(evaluator);
}

fn is_stop_condition_fulfilled(tree: &Tree, settings: &EngineSettings, time_strategy: &dyn TimeStrategy) -> bool {
    if tree.simulation_count() >= settings.max_simulations {
        return true;
    }
    if tree.memory() >= settings.max_memory {
        return true;
    }
    if tree.node_count() >= settings.max_nodes {
        return true;
    }
    if tree.max_depth() >= settings.max_depth {
        return true;
    }
    if tree.is_root_proven() {
        return true;
    }
    if tree.has_single_move() {
        return true;
    }
    time_control::is_done(tree, time_strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::TreeConfig;
    use crate::time_control::RolloutLimit;
    use gm_game::{Board, GameConfig, GameRules, Sign};
    use gm_nn::LinearNetwork;

    fn settings() -> EngineSettings {
        let mut settings = EngineSettings::new(GameConfig::new(GameRules::Freestyle, 15, 15));
        settings.search_config.max_batch_size = 4;
        settings.search_config.use_symmetries = false;
        settings.search_config.tss.max_positions = 200;
        settings
    }

    #[test]
    fn worker_searches_until_the_rollout_limit() {
        let settings = settings();
        let tree = Arc::new(Mutex::new(Tree::new(settings.game_config, TreeConfig { max_nodes: 100_000, node_bucket_size: 1024 })));
        tree.lock().unwrap().set_position(&Board::new(15, 15), Sign::Cross);

        let shared_table = Arc::new(SharedHashTable::new(1 << 16));
        let evaluator = NNEvaluator::new(Box::new(LinearNetwork::new(settings.game_config)), false);
        let is_running = Arc::new(AtomicBool::new(true));

        let worker = SearchThread::spawn(
            settings,
            tree.clone(),
            shared_table,
            evaluator,
            Arc::new(RolloutLimit::new(64)),
            is_running
        );
        let stats = worker.join();

        let tree = tree.lock().unwrap();
        // the early-termination heuristic may stop before the limit, but
        // never much after it
        assert!(tree.simulation_count() > 0);
        assert!(tree.simulation_count() <= 64 + 8, "ran {} simulations", tree.simulation_count());
        assert!(stats.nb_node_count > 0);
        assert_eq!(tree.node(tree.root()).virtual_loss(), 0);
    }

    #[test]
    fn stopping_mid_search_leaves_a_valid_tree() {
        let settings = settings();
        let tree = Arc::new(Mutex::new(Tree::new(settings.game_config, TreeConfig { max_nodes: 100_000, node_bucket_size: 1024 })));
        tree.lock().unwrap().set_position(&Board::new(15, 15), Sign::Cross);

        let shared_table = Arc::new(SharedHashTable::new(1 << 16));
        let evaluator = NNEvaluator::new(Box::new(LinearNetwork::new(settings.game_config)), false);
        let is_running = Arc::new(AtomicBool::new(true));

        let worker = SearchThread::spawn(
            settings,
            tree.clone(),
            shared_table,
            evaluator,
            Arc::new(crate::time_control::Infinite),
            is_running.clone()
        );

        while tree.lock().unwrap().simulation_count() < 8 {
            thread::yield_now();
        }
        worker.stop();
        worker.join();

        let tree = tree.lock().unwrap();
        assert!(tree.simulation_count() >= 8);
        assert_eq!(tree.node(tree.root()).virtual_loss(), 0);
    }
}
