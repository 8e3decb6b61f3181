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

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use gm_game::augment::{augment, available_symmetries};
use gm_nn::{Device, Network};

use crate::search_task::SearchTaskList;

/// Counters of one evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvaluatorStats {
    pub batches: u64,
    pub samples: u64
}

impl fmt::Display for EvaluatorStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "----EvaluatorStats----")?;
        writeln!(f, "total samples  = {}", self.samples)?;
        let avg = if self.batches > 0 { self.samples as f64 / self.batches as f64 } else { 0.0 };
        writeln!(f, "avg batch size = {:.2}", avg)
    }
}

struct QueueEntry {
    task_index: usize,
    symmetry: i32
}

type AsyncJob = (Box<dyn Network>, usize);

/// The worker thread that runs `forward` off the search thread, emulating
/// an asynchronous device.
struct AsyncWorker {
    submit: Sender<AsyncJob>,
    receive: Receiver<Box<dyn Network>>,
    handle: Option<JoinHandle<()>>
}

impl AsyncWorker {
    fn spawn() -> Self {
        let (submit, jobs) = bounded::<AsyncJob>(1);
        let (done, receive) = bounded::<Box<dyn Network>>(1);
        let handle = thread::Builder::new()
            .name("nn_evaluator".into())
            .spawn(move || {
                for (mut network, batch_size) in jobs.iter() {
                    network.forward(batch_size);
                    if done.send(network).is_err() {
                        break;
                    }
                }
            })
            .expect("could not spawn evaluator thread");

        Self { submit, receive, handle: Some(handle) }
    }
}

impl Drop for AsyncWorker {
    fn drop(&mut self) {
        // closing the channel terminates the worker
        let (closed, _) = bounded(1);
        self.submit = closed;

        if let Some(handle) = self.handle.take() {
            handle.join().expect("could not join evaluator thread");
        }
    }
}

/// Batches search tasks for the network and writes the outputs back,
/// undoing the symmetry each input was augmented with.
pub struct NNEvaluator {
    network: Option<Box<dyn Network>>,
    device: Device,
    max_batch_size: usize,
    use_symmetries: bool,

    waiting: Vec<QueueEntry>,
    in_progress: Vec<QueueEntry>,
    rng: SmallRng,

    worker: Option<AsyncWorker>,
    launch_time: Option<Instant>,
    time_per_sample: Duration,

    stats: EvaluatorStats
}

impl NNEvaluator {
    pub fn new(network: Box<dyn Network>, use_symmetries: bool) -> Self {
        let device = network.device();
        let max_batch_size = network.batch_size();

        Self {
            network: Some(network),
            device,
            max_batch_size,
            use_symmetries,
            waiting: Vec::with_capacity(2 * max_batch_size),
            in_progress: Vec::with_capacity(max_batch_size),
            rng: SmallRng::from_entropy(),
            worker: None,
            launch_time: None,
            time_per_sample: Duration::from_micros(250),
            stats: EvaluatorStats::default()
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn is_on_gpu(&self) -> bool {
        self.device == Device::Gpu
    }

    pub fn queue_size(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_queue_full(&self) -> bool {
        self.waiting.len() >= self.max_batch_size
    }

    pub fn clear_queue(&mut self) {
        self.waiting.clear();
    }

    pub fn stats(&self) -> EvaluatorStats {
        self.stats
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.max_batch_size = batch_size.max(1);
        if let Some(network) = self.network.as_mut() {
            network.set_batch_size(self.max_batch_size);
        }
    }

    /// Enqueue one task for evaluation with a random symmetry (or the
    /// identity when symmetries are disabled).
    ///
    /// # Arguments
    ///
    /// * `task_index` - index into the task list later passed to the
    ///   evaluate calls
    /// * `rows`, `cols` - the board shape
    ///
    pub fn add_to_queue(&mut self, task_index: usize, rows: usize, cols: usize) {
        let symmetry = if self.use_symmetries {
            self.rng.gen_range(0..available_symmetries(rows, cols) as i32)
        } else {
            0
        };

        self.waiting.push(QueueEntry { task_index, symmetry });
    }

    /// Evaluate everything in the queue synchronously, one batch at a
    /// time. Returns the estimated time per sample.
    pub fn evaluate_graph(&mut self, tasks: &mut SearchTaskList) -> Duration {
        while !self.waiting.is_empty() {
            let batch_size = self.waiting.len().min(self.max_batch_size);
            self.begin_batch(batch_size, tasks);

            let started = Instant::now();
            let network = self.network.as_mut().expect("the network is loaded");
            network.forward(batch_size);
            self.update_time_estimate(started.elapsed(), batch_size);

            self.finish_batch(tasks);
        }

        self.time_per_sample
    }

    /// Pack the next batch and hand it to the worker thread. Returns the
    /// estimated completion time, used to adapt the batch size of the
    /// overlap loop.
    pub fn async_evaluate_graph_launch(&mut self, tasks: &mut SearchTaskList) -> Instant {
        debug_assert!(self.in_progress.is_empty(), "a batch is already in flight");

        let batch_size = self.waiting.len().min(self.max_batch_size);
        if batch_size > 0 {
            self.begin_batch(batch_size, tasks);

            let network = self.network.take().expect("the network is loaded");
            let worker = self.worker.get_or_insert_with(AsyncWorker::spawn);
            worker.submit.send((network, batch_size)).expect("evaluator thread is gone");
            self.launch_time = Some(Instant::now());
        }

        Instant::now() + self.time_per_sample * batch_size as u32
    }

    /// Wait for the batch in flight and write its outputs back into the
    /// tasks.
    pub fn async_evaluate_graph_join(&mut self, tasks: &mut SearchTaskList) {
        if self.in_progress.is_empty() {
            return;
        }

        let worker = self.worker.as_ref().expect("no batch in flight");
        let network = worker.receive.recv().expect("evaluator thread is gone");
        self.network = Some(network);

        if let Some(launched) = self.launch_time.take() {
            let batch_size = self.in_progress.len();
            self.update_time_estimate(launched.elapsed(), batch_size);
        }

        self.finish_batch(tasks);
    }

    /* -------- private -------- */

    fn begin_batch(&mut self, batch_size: usize, tasks: &SearchTaskList) {
        debug_assert!(self.in_progress.is_empty());

        self.in_progress.extend(self.waiting.drain(..batch_size));
        self.stats.batches += 1;
        self.stats.samples += batch_size as u64;

        let network = self.network.as_mut().expect("the network is loaded");
        if network.batch_size() < batch_size {
            network.set_batch_size(batch_size);
        }

        for (slot, entry) in self.in_progress.iter().enumerate() {
            let task = tasks.get(entry.task_index);

            if task.was_processed_by_solver {
                let mut features = task.features.clone();
                features.apply_symmetry(entry.symmetry);
                network.pack_features(slot, &features, task.sign_to_move());
            } else {
                let board = augment(task.board(), entry.symmetry);
                network.pack_board(slot, &board, task.sign_to_move());
            }
        }
    }

    fn finish_batch(&mut self, tasks: &mut SearchTaskList) {
        let network = self.network.as_ref().expect("the network is loaded");

        for (slot, entry) in self.in_progress.iter().enumerate() {
            let output = network.unpack_output(slot);
            let task = tasks.get_mut(entry.task_index);

            task.policy = augment(&output.policy, -entry.symmetry);
            task.action_values = augment(&output.action_values, -entry.symmetry);
            task.value = output.value;
            task.moves_left = output.moves_left;
            task.was_processed_by_network = true;
        }
        self.in_progress.clear();
    }

    fn update_time_estimate(&mut self, elapsed: Duration, batch_size: usize) {
        let per_sample = elapsed / batch_size.max(1) as u32;

        // exponential smoothing so single outliers do not swing the batch
        // sizing
        self.time_per_sample = (self.time_per_sample * 7 + per_sample) / 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_game::{Board, GameConfig, GameRules, Sign};
    use gm_nn::LinearNetwork;

    fn evaluator(use_symmetries: bool) -> (NNEvaluator, SearchTaskList) {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let network = Box::new(LinearNetwork::new(config));
        let evaluator = NNEvaluator::new(network, use_symmetries);
        let tasks = SearchTaskList::new(config, 8);

        (evaluator, tasks)
    }

    #[test]
    fn synchronous_evaluation_fills_tasks() {
        let (mut evaluator, mut tasks) = evaluator(false);
        let board = Board::new(15, 15);

        tasks.next().set(&board, Sign::Cross);
        tasks.next().set(&board, Sign::Cross);
        evaluator.add_to_queue(0, 15, 15);
        evaluator.add_to_queue(1, 15, 15);

        evaluator.evaluate_graph(&mut tasks);

        for i in 0..2 {
            let task = tasks.get(i);
            assert!(task.was_processed_by_network);
            let total: f32 = task.policy.iter().sum();
            assert!((total - 1.0).abs() < 1e-3);
        }
        assert_eq!(evaluator.queue_size(), 0);
    }

    #[test]
    fn symmetric_evaluation_is_undone() {
        // on a fully symmetric position any symmetry must produce the
        // same policy after it is undone
        let (mut evaluator_plain, mut tasks_plain) = evaluator(false);
        let (mut evaluator_sym, mut tasks_sym) = evaluator(true);
        let mut board = Board::new(15, 15);
        board[(7, 7)] = Sign::Cross;

        tasks_plain.next().set(&board, Sign::Circle);
        evaluator_plain.add_to_queue(0, 15, 15);
        evaluator_plain.evaluate_graph(&mut tasks_plain);

        tasks_sym.next().set(&board, Sign::Circle);
        evaluator_sym.add_to_queue(0, 15, 15);
        evaluator_sym.evaluate_graph(&mut tasks_sym);

        let plain = &tasks_plain.get(0).policy;
        let symmetric = &tasks_sym.get(0).policy;
        for row in 0..15 {
            for col in 0..15 {
                assert!((plain[(row, col)] - symmetric[(row, col)]).abs() < 1e-5, "at ({},{})", row, col);
            }
        }
    }

    #[test]
    fn async_launch_and_join() {
        let (mut evaluator, mut tasks) = evaluator(false);
        let board = Board::new(15, 15);

        tasks.next().set(&board, Sign::Cross);
        evaluator.add_to_queue(0, 15, 15);

        evaluator.async_evaluate_graph_launch(&mut tasks);
        evaluator.async_evaluate_graph_join(&mut tasks);

        assert!(tasks.get(0).was_processed_by_network);
    }

    #[test]
    fn join_without_launch_is_a_no_op() {
        let (mut evaluator, mut tasks) = evaluator(false);

        evaluator.async_evaluate_graph_join(&mut tasks);
        assert_eq!(evaluator.queue_size(), 0);
    }
}
