// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use std::env;
use std::str::FromStr;

/// Returns the value of the environment variable `name`, or `default` if it
/// is unset or cannot be parsed.
///
/// # Arguments
///
/// * `name` -
/// * `default` -
///
fn get_env<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.parse::<T>().unwrap_or(default),
        Err(_) => default
    }
}

lazy_static! {
    /// The number of search threads sharing one tree.
    pub static ref NUM_THREADS: usize = get_env("NUM_THREADS", 1);

    /// The maximum number of positions per batch sent to the neural network.
    pub static ref BATCH_SIZE: usize = get_env("BATCH_SIZE", 32);

    /// The maximum number of nodes kept in the search tree.
    pub static ref MAX_NODES: usize = get_env("MAX_NODES", 5_000_000);

    /// The maximum amount of memory (in bytes) the search tree may use.
    pub static ref MAX_TREE_MEMORY: usize = get_env("MAX_TREE_MEMORY", 256 * 1024 * 1024);

    /// The softmax temperature applied when picking the final move.
    pub static ref TEMPERATURE: f32 = get_env("TEMPERATURE", 0.7);

    /// Whether to augment neural network inputs with a random symmetry.
    pub static ref USE_SYMMETRIES: bool = get_env("USE_SYMMETRIES", true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        assert!(*NUM_THREADS >= 1);
        assert!(*BATCH_SIZE >= 1);
        assert!(*TEMPERATURE > 0.0);
    }

    #[test]
    fn unset_variable_gives_default() {
        assert_eq!(get_env("GM_DOES_NOT_EXIST", 42usize), 42);
    }
}
