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

use gm_game::Move;

use crate::score::Score;

/// One candidate move of a threat-space-search node, together with its
/// current score and the arena slice reserved for its children.
#[derive(Clone, Copy, Debug)]
pub struct Action {
    pub mv: Move,
    pub score: Score,
    offset: i32,
    count: u16
}

impl Default for Action {
    fn default() -> Self {
        Self { mv: Move::NULL, score: Score::default(), offset: -1, count: 0 }
    }
}

impl Action {
    fn init(&mut self, mv: Move, score: Score) {
        self.mv = mv;
        self.score = score;
        self.offset = -1;
        self.count = 0;
    }
}

/// A view of one ply's actions: a contiguous slice of the stack plus the
/// metadata the move generator attaches to it.
#[derive(Clone, Copy, Debug)]
pub struct ActionList {
    start: usize,
    len: usize,
    distance_from_root: u16,

    /// The score of legal moves that were not generated, e.g. quiet moves
    /// omitted while defending.
    pub baseline_score: Score,
    pub last_move: Move,
    pub is_fully_expanded: bool,
    pub has_initiative: bool,
    pub must_defend: bool
}

impl ActionList {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_root(&self) -> bool {
        self.distance_from_root == 0
    }

    pub fn distance_from_root(&self) -> usize {
        self.distance_from_root as usize
    }
}

/// A stack-allocated arena holding the actions of every ply of one search.
/// Slices are handed out in recursion order and reclaimed wholesale when
/// the search restarts.
pub struct ActionStack {
    data: Vec<Action>,
    offset: usize,
    high_water: usize
}

impl ActionStack {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec! [Action::default(); 1 + size],
            offset: 1, // offset zero is reserved
            high_water: 1
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The highest arena offset touched since the last `create_root`. Used
    /// to detect a stagnant iterative-deepening iteration.
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    /// Reset the arena and return an empty root list.
    pub fn create_root(&mut self) -> ActionList {
        self.offset = 1;
        self.high_water = 1;

        ActionList {
            start: 0,
            len: 0,
            distance_from_root: 0,
            baseline_score: Score::default(),
            last_move: Move::NULL,
            is_fully_expanded: false,
            has_initiative: false,
            must_defend: false
        }
    }

    /// Returns the child list hanging off `parent[index]`, allocating its
    /// arena slot lazily on first use.
    pub fn create_from_action(&mut self, parent: &mut ActionList, index: usize) -> ActionList {
        debug_assert!(index < parent.len);

        let slot = parent.start + index;
        if self.data[slot].offset < 0 {
            debug_assert_eq!(self.data[slot].count, 0);
            self.data[slot].offset = self.offset as i32;
        }

        let action = self.data[slot];
        ActionList {
            start: action.offset as usize,
            len: action.count as usize,
            distance_from_root: parent.distance_from_root + 1,
            baseline_score: Score::default(),
            last_move: action.mv,
            is_fully_expanded: false,
            has_initiative: false,
            must_defend: false
        }
    }

    /// Record the now-final size of a child list in its parent action, and
    /// advance the arena head past it.
    pub fn finalize(&mut self, parent: &mut ActionList, index: usize, child: &ActionList) {
        let slot = parent.start + index;
        self.data[slot].count = child.len as u16;
    }

    pub fn advance(&mut self, count: usize) {
        self.offset += count;
        if self.offset >= self.data.len() {
            self.data.resize(self.offset.next_power_of_two().max(self.data.len()), Action::default());
        }
        self.high_water = self.high_water.max(self.offset);
    }

    /// Append a move to the given list. The list must be the most recently
    /// created one, i.e. its slice must end at the arena head. The arena
    /// grows as needed; indices stay stable.
    pub fn push(&mut self, list: &mut ActionList, mv: Move, score: Score) {
        let slot = list.start + list.len;
        if slot >= self.data.len() {
            self.data.resize((slot + 1).next_power_of_two(), Action::default());
        }

        self.data[slot].init(mv, score);
        list.len += 1;
    }

    pub fn get(&self, list: &ActionList, index: usize) -> Action {
        debug_assert!(index < list.len);
        self.data[list.start + index]
    }

    pub fn set_score(&mut self, list: &ActionList, index: usize, score: Score) {
        debug_assert!(index < list.len);
        self.data[list.start + index].score = score;
    }

    pub fn swap(&mut self, list: &ActionList, a: usize, b: usize) {
        debug_assert!(a < list.len && b < list.len);
        self.data.swap(list.start + a, list.start + b);
    }

    pub fn contains(&self, list: &ActionList, mv: Move) -> bool {
        (0..list.len).any(|i| self.get(list, i).mv == mv)
    }

    /// Move the given move to `offset` if it occurs at or after it.
    pub fn move_closer_to_front(&mut self, list: &ActionList, mv: Move, offset: usize) -> bool {
        for i in offset..list.len {
            if self.get(list, i).mv == mv {
                self.swap(list, offset, i);
                return true;
            }
        }
        false
    }

    pub fn best_move(&self, list: &ActionList) -> Move {
        let mut best_score = Score::min_value();
        let mut best = Move::NULL;

        for i in 0..list.len {
            let action = self.get(list, i);
            if action.score >= best_score {
                best_score = action.score;
                best = action.mv;
            }
        }
        best
    }

    pub fn iter<'a>(&'a self, list: &'a ActionList) -> impl Iterator<Item = Action> + 'a {
        (0..list.len).map(move |i| self.get(list, i))
    }
}
