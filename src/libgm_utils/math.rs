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

/// Returns the sum of all finite elements in `values`.
///
/// # Arguments
///
/// * `values` -
///
pub fn sum_finite_f32(values: &[f32]) -> f32 {
    values.iter().filter(|x| x.is_finite()).sum()
}

/// Scale all finite elements in `values` by the reciprocal of `total` so
/// that they sum to one.
///
/// # Arguments
///
/// * `values` -
/// * `total` -
///
pub fn normalize_finite_f32(values: &mut [f32], total: f32) {
    let recip = total.recip();

    for value in values.iter_mut() {
        if value.is_finite() {
            *value *= recip;
        }
    }
}

/// Returns the smallest power of two that is not less than `value`.
pub fn round_to_power_of_2(value: usize) -> usize {
    value.next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_skips_infinities() {
        let values = [1.0, ::std::f32::NEG_INFINITY, 2.0, ::std::f32::NAN, 3.0];

        assert_eq!(sum_finite_f32(&values), 6.0);
    }

    #[test]
    fn normalize_to_one() {
        let mut values = [1.0, 3.0, ::std::f32::NEG_INFINITY];
        let total = sum_finite_f32(&values);
        normalize_finite_f32(&mut values, total);

        assert!((values[0] - 0.25).abs() < 1e-6);
        assert!((values[1] - 0.75).abs() < 1e-6);
        assert_eq!(values[2], ::std::f32::NEG_INFINITY);
    }

    #[test]
    fn power_of_2() {
        assert_eq!(round_to_power_of_2(1000), 1024);
        assert_eq!(round_to_power_of_2(1024), 1024);
    }
}
