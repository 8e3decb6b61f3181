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

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use gm_game::{HashKey128, Move};
use gm_utils::math::round_to_power_of_2;

use crate::score::{Bound, Score};

const KEY_MASK: u64 = 0xFFFF_0000_0000_0000;

/// The 64-bit payload of one transposition table entry:
///
/// ```text
/// bits  0     must_defend
/// bits  1     has_initiative
/// bits  2-3   bound
/// bits  4-7   generation  (set by the table)
/// bits  8-15  depth + 128
/// bits 16-31  score
/// bits 32-47  best move
/// bits 48-63  high bits of the low hash word  (set by the table)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SharedTableData {
    data: u64
}

impl SharedTableData {
    pub fn new(must_defend: bool, has_initiative: bool, bound: Bound, depth: i32, score: Score, best_move: Move) -> Self {
        let mut data = 0u64;
        data |= must_defend as u64;
        data |= (has_initiative as u64) << 1;
        data |= (bound as u64) << 2;
        // generation is filled in by the hash table on insertion
        data |= ((128 + depth.clamp(-128, 127)) as u64) << 8;
        data |= (score.to_short() as u64) << 16;
        data |= (best_move.to_short() as u64) << 32;
        // the key bits are filled in by the hash table on insertion

        Self { data }
    }

    pub fn must_defend(self) -> bool {
        self.data & 1 != 0
    }

    pub fn has_initiative(self) -> bool {
        (self.data >> 1) & 1 != 0
    }

    pub fn bound(self) -> Bound {
        Bound::from_u8(((self.data >> 2) & 3) as u8)
    }

    pub fn generation(self) -> i32 {
        ((self.data >> 4) & 15) as i32
    }

    pub fn depth(self) -> i32 {
        ((self.data >> 8) & 255) as i32 - 128
    }

    pub fn score(self) -> Score {
        Score::from_short(((self.data >> 16) & 0xFFFF) as u16)
    }

    pub fn best_move(self) -> Move {
        Move::from_short(((self.data >> 32) & 0xFFFF) as u16)
    }

    fn key_bits(self) -> u64 {
        self.data & KEY_MASK
    }

    fn with_generation_and_key(mut self, generation: i32, low_key: u64) -> Self {
        self.data &= !(KEY_MASK | 0xF0);
        self.data |= (generation.clamp(0, 15) as u64) << 4;
        self.data |= low_key & KEY_MASK;
        self
    }
}

/// One bucket slot: the value word next to an XOR-locked key word. Readers
/// recompute the key from both words, so a torn concurrent write never
/// validates; it just reads as a miss.
#[derive(Default)]
struct Entry {
    key_xor: AtomicU64,
    value: AtomicU64
}

impl Entry {
    fn load(&self) -> (u64, SharedTableData) {
        let value = self.value.load(Ordering::Relaxed);
        let key = self.key_xor.load(Ordering::Relaxed) ^ value;
        (key, SharedTableData { data: value })
    }

    fn store(&self, hash: HashKey128, value: SharedTableData) {
        self.key_xor.store(hash.high ^ value.data, Ordering::Relaxed);
        self.value.store(value.data, Ordering::Relaxed);
    }

    fn matches(key: u64, value: SharedTableData, hash: HashKey128) -> bool {
        key == hash.high && value.key_bits() == hash.low & KEY_MASK
    }
}

const BUCKET_SIZE: usize = 4;

/// A lock-free transposition table shared by all threat-space searches.
/// Writers never synchronise; stale or torn entries are treated as misses.
pub struct SharedHashTable {
    buckets: Vec<[Entry; BUCKET_SIZE]>,
    mask: u64,
    generation: AtomicUsize
}

impl SharedHashTable {
    pub fn new(size: usize) -> Self {
        let num_buckets = round_to_power_of_2(size.max(BUCKET_SIZE)) / BUCKET_SIZE;
        let mut buckets = Vec::with_capacity(num_buckets);
        buckets.resize_with(num_buckets, Default::default);

        Self {
            buckets,
            mask: (num_buckets - 1) as u64,
            generation: AtomicUsize::new(0)
        }
    }

    pub fn memory(&self) -> usize {
        self.buckets.len() * ::std::mem::size_of::<[Entry; BUCKET_SIZE]>()
    }

    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            for entry in bucket.iter() {
                entry.key_xor.store(0, Ordering::Relaxed);
                entry.value.store(0, Ordering::Relaxed);
            }
        }
    }

    /// Age out old entries; called between top-level searches.
    pub fn increase_generation(&self) {
        let generation = self.generation.load(Ordering::Relaxed);
        self.generation.store((generation + 1) % 16, Ordering::Relaxed);
    }

    pub fn generation(&self) -> i32 {
        self.generation.load(Ordering::Relaxed) as i32
    }

    /// Look up the entry for `hash`, or `None` on a miss.
    pub fn seek(&self, hash: HashKey128) -> Option<SharedTableData> {
        let bucket = &self.buckets[(hash.low & self.mask) as usize];

        for entry in bucket.iter() {
            let (key, value) = entry.load();
            if Entry::matches(key, value, hash) {
                return Some(value);
            }
        }
        None
    }

    /// Store `value` for `hash`, replacing a matching entry when the new
    /// data is authoritative, otherwise the least valuable slot.
    pub fn insert(&self, hash: HashKey128, value: SharedTableData) {
        let value = value.with_generation_and_key(self.generation(), hash.low);
        let bucket = &self.buckets[(hash.low & self.mask) as usize];

        if value.score().is_proven() || value.bound() == Bound::Exact {
            for entry in bucket.iter() {
                let (key, old) = entry.load();
                if Entry::matches(key, old, hash) {
                    entry.store(hash, value);
                    return;
                }
            }
        }

        // the first slot is the always-replace one; the rest are replaced
        // by depth, discounted by age
        let mut found = 0;
        for i in 1..BUCKET_SIZE {
            if self.value_of(&bucket[i]) < self.value_of(&bucket[found]) {
                found = i;
            }
        }
        bucket[found].store(hash, value);
    }

    /// Best-effort hint that `hash` will be probed soon.
    pub fn prefetch(&self, hash: HashKey128) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};

            let bucket = &self.buckets[(hash.low & self.mask) as usize];
            _mm_prefetch::<_MM_HINT_T0>(bucket as *const _ as *const i8);
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = hash;
    }

    /// The fraction of used entries, estimated over a prefix of the table.
    pub fn load_factor(&self) -> f64 {
        let sample = self.buckets.len().min(1024);
        let mut used = 0;

        for bucket in self.buckets.iter().take(sample) {
            for entry in bucket.iter() {
                let (_, value) = entry.load();
                used += (value.bound() != Bound::None) as usize;
            }
        }
        used as f64 / (sample * BUCKET_SIZE) as f64
    }

    fn value_of(&self, entry: &Entry) -> i32 {
        let (_, value) = entry.load();
        value.depth() - (self.generation() - value.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gm_game::Sign;

    fn hash_of(low: u64, high: u64) -> HashKey128 {
        HashKey128 { low, high }
    }

    #[test]
    fn round_trip() {
        let table = SharedHashTable::new(1024);
        let hash = hash_of(0x1234_5678_9abc_def0, 0x0fed_cba9_8765_4321);
        let data = SharedTableData::new(true, false, Bound::Exact, 7, Score::win_in(5), Move::new(3, 4, Sign::Cross));

        table.insert(hash, data);
        let found = table.seek(hash).expect("entry must be present");

        assert!(found.must_defend());
        assert!(!found.has_initiative());
        assert_eq!(found.bound(), Bound::Exact);
        assert_eq!(found.depth(), 7);
        assert_eq!(found.score(), Score::win_in(5));
        assert_eq!(found.best_move(), Move::new(3, 4, Sign::Cross));
    }

    #[test]
    fn wrong_high_word_misses() {
        let table = SharedHashTable::new(1024);
        let hash = hash_of(42, 0xdead_beef);

        table.insert(hash, SharedTableData::new(false, false, Bound::Lower, 1, Score::from_eval(10), Move::NULL));

        assert!(table.seek(hash).is_some());
        assert!(table.seek(hash_of(42, 0xbeef_dead)).is_none());
    }

    #[test]
    fn torn_write_reads_as_miss() {
        let table = SharedHashTable::new(64);
        let hash = hash_of(7, 777);
        let data = SharedTableData::new(false, false, Bound::Exact, 3, Score::from_eval(1), Move::NULL);

        table.insert(hash, data);

        // simulate a torn write by clobbering only the value word
        let bucket = &table.buckets[(hash.low & table.mask) as usize];
        for entry in bucket.iter() {
            let (key, value) = entry.load();
            if Entry::matches(key, value, hash) {
                entry.value.store(value.data ^ 0xffff_0000, Ordering::Relaxed);
            }
        }

        assert!(table.seek(hash).is_none());
    }

    #[test]
    fn proven_scores_overwrite_in_place() {
        let table = SharedHashTable::new(64);
        let hash = hash_of(3, 33);

        table.insert(hash, SharedTableData::new(false, false, Bound::Lower, 2, Score::from_eval(50), Move::NULL));
        table.insert(hash, SharedTableData::new(false, false, Bound::Exact, 9, Score::win_in(3), Move::NULL));

        let found = table.seek(hash).expect("entry must be present");
        assert_eq!(found.depth(), 9);
        assert!(found.score().is_win());
    }

    #[test]
    fn generation_wraps() {
        let table = SharedHashTable::new(64);
        for _ in 0..20 {
            table.increase_generation();
        }

        assert_eq!(table.generation(), 4);
    }
}
