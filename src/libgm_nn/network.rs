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

use gm_game::{Board, GameConfig, Sign};
use gm_tss::Value;
use gm_utils::Matrix;

use crate::features::InputFeatures;

/// Where a network computes. Drives the choice between the serial and the
/// double-buffered search loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu
}

/// Everything a network produces for one position.
#[derive(Clone, Debug)]
pub struct NetworkOutput {
    /// Probability of each square being the best move, normalised over the
    /// board.
    pub policy: Matrix<f32>,

    /// Expected outcome after playing each square.
    pub action_values: Matrix<Value>,

    /// Expected outcome of the position as a whole.
    pub value: Value,

    /// Predicted number of moves until the game ends.
    pub moves_left: f32
}

impl NetworkOutput {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            policy: Matrix::new(rows, cols),
            action_values: Matrix::new(rows, cols),
            value: Value::default(),
            moves_left: 0.0
        }
    }
}

/// The inference contract between the search and a policy/value network.
/// Implementations batch up to `batch_size` positions, packed one at a
/// time, and evaluate them in one `forward` call. Inputs are either the
/// raw board or precomputed feature planes; both describe the position
/// from the side to move's point of view.
///
/// With the same inputs packed, `forward` must produce the same outputs;
/// any stochasticity (symmetry averaging, dropout) belongs to the caller.
pub trait Network: Send {
    fn config(&self) -> GameConfig;

    fn device(&self) -> Device;

    fn batch_size(&self) -> usize;

    fn set_batch_size(&mut self, batch_size: usize);

    /// Pack a position into batch slot `index` from the raw board.
    fn pack_board(&mut self, index: usize, board: &Board, sign_to_move: Sign);

    /// Pack a position into batch slot `index` from feature planes.
    fn pack_features(&mut self, index: usize, features: &InputFeatures, sign_to_move: Sign);

    /// Evaluate the first `batch_size` packed slots.
    fn forward(&mut self, batch_size: usize);

    /// Read back the outputs of batch slot `index` after `forward`.
    fn unpack_output(&self, index: usize) -> NetworkOutput;
}
