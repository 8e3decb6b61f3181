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

use gm_game::patterns::PatternCalculator;
use gm_game::{Board, GameConfig, Sign};
use gm_tss::Value;
use gm_utils::math::{normalize_finite_f32, sum_finite_f32};

use crate::features::{self, InputFeatures};
use crate::network::{Device, Network, NetworkOutput};

/// A deterministic stand-in network computed from the tactical feature
/// planes: the policy is a softmax over hand-tuned pattern weights and the
/// value a squashed threat balance. It plays sensible forcing moves, which
/// is all the search needs when no trained weights are available, and it
/// keeps unit tests self-contained.
pub struct LinearNetwork {
    config: GameConfig,
    batch_size: usize,
    calculator: PatternCalculator,
    inputs: Vec<InputFeatures>,
    outputs: Vec<NetworkOutput>
}

/// Logit contribution of each tactical feature bit, own block first.
const LOGITS: [(u32, f32); 12] = [
    (features::OWN_FIVE, 12.0),
    (features::OWN_OPEN_4, 9.0),
    (features::OWN_DOUBLE_4, 9.0),
    (features::OPPONENT_FIVE, 8.0),
    (features::OPPONENT_OPEN_4, 6.0),
    (features::OPPONENT_DOUBLE_4, 6.0),
    (features::FORBIDDEN, -16.0),
    (features::OWN_OVERLINE, -2.0),
    (features::OPPONENT_OVERLINE, 0.5),
    (features::OWN_STONE, 0.0),
    (features::OPPONENT_STONE, 0.0),
    (features::ONES, 0.0)
];

impl LinearNetwork {
    pub fn new(config: GameConfig) -> Self {
        let batch_size = 1;

        Self {
            config,
            batch_size,
            calculator: PatternCalculator::new(config),
            inputs: vec! [InputFeatures::new(config.rows, config.cols)],
            outputs: vec! [NetworkOutput::new(config.rows, config.cols)]
        }
    }

    fn ensure_capacity(&mut self, batch_size: usize) {
        while self.inputs.len() < batch_size {
            self.inputs.push(InputFeatures::new(self.config.rows, self.config.cols));
            self.outputs.push(NetworkOutput::new(self.config.rows, self.config.cols));
        }
    }

    fn evaluate_one(config: GameConfig, features: &InputFeatures, output: &mut NetworkOutput) {
        let (rows, cols) = (config.rows, config.cols);
        let mut logits = vec! [::std::f32::NEG_INFINITY; rows * cols];
        let mut balance = 0.0f32;
        let mut empty = 0usize;

        for row in 0..rows {
            for col in 0..cols {
                let bits = features.get(row, col);

                if bits & features::LEGAL != 0 && bits & features::FORBIDDEN == 0 {
                    let mut logit = 0.0;
                    for &(bit, weight) in LOGITS.iter() {
                        if bits & bit != 0 {
                            logit += weight;
                        }
                    }
                    // a mild preference for squares near other stones,
                    // expressed through the directional pattern bits
                    logit += 0.25 * ((bits >> 8) & 0xFF).count_ones() as f32;
                    logit += 0.15 * ((bits >> 20) & 0xFF).count_ones() as f32;

                    logits[row * cols + col] = logit;
                    empty += 1;
                }

                balance += 0.10 * ((bits >> 8) & 0xFF).count_ones() as f32;
                balance -= 0.10 * ((bits >> 20) & 0xFF).count_ones() as f32;
                balance += 0.45 * ((bits & features::OWN_FIVE != 0) as i32 as f32);
                balance -= 0.45 * ((bits & features::OPPONENT_FIVE != 0) as i32 as f32);
            }
        }

        // softmax over the legal squares
        let max_logit = logits.iter().cloned().fold(::std::f32::NEG_INFINITY, f32::max);
        for logit in logits.iter_mut() {
            *logit = if logit.is_finite() { (*logit - max_logit).exp() } else { 0.0 };
        }
        let total = sum_finite_f32(&logits);
        if total > 1e-6 {
            normalize_finite_f32(&mut logits, total);
        }

        let win_rate = 0.5 + 0.5 * balance.tanh();
        let draw_rate = if empty <= 2 { 0.5 } else { 0.02 };

        for row in 0..rows {
            for col in 0..cols {
                output.policy[(row, col)] = logits[row * cols + col];
                output.action_values[(row, col)] = Value::default();
            }
        }
        output.value = Value::new(win_rate.clamp(0.0, 1.0 - draw_rate), draw_rate);
        output.moves_left = empty as f32 / 2.0;
    }
}

impl Network for LinearNetwork {
    fn config(&self) -> GameConfig {
        self.config
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn set_batch_size(&mut self, batch_size: usize) {
        debug_assert!(batch_size >= 1);
        self.batch_size = batch_size;
        self.ensure_capacity(batch_size);
    }

    fn pack_board(&mut self, index: usize, board: &Board, sign_to_move: Sign) {
        self.ensure_capacity(index + 1);
        self.calculator.set_board(board, sign_to_move);

        let (calculator, inputs) = (&mut self.calculator, &mut self.inputs);
        inputs[index].encode(calculator);
    }

    fn pack_features(&mut self, index: usize, features: &InputFeatures, _sign_to_move: Sign) {
        self.ensure_capacity(index + 1);
        self.inputs[index] = features.clone();
    }

    fn forward(&mut self, batch_size: usize) {
        debug_assert!(batch_size <= self.inputs.len());

        for index in 0..batch_size {
            Self::evaluate_one(self.config, &self.inputs[index], &mut self.outputs[index]);
        }
    }

    fn unpack_output(&self, index: usize) -> NetworkOutput {
        self.outputs[index].clone()
    }
}
