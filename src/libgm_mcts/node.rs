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

use gm_game::{Move, Sign};
use gm_tss::{Score, Value};

/// Index of a node in the tree's node pool.
pub type NodeId = u32;

/// Index of an edge in the tree's edge pool.
pub type EdgeId = u32;

/// Sentinel for "no node".
pub const NULL_NODE: NodeId = u32::MAX;

const FLAG_ROOT: u8 = 0x01;
const FLAG_FULLY_EXPANDED: u8 = 0x02;

/// One position in the search tree. The identity (the position itself) is
/// implicit in the path from the root; the node only stores statistics.
#[derive(Clone, Debug)]
pub struct Node {
    value: Value,
    variance_acc: f32,
    visits: i32,
    score: Score,
    sign_to_move: Sign,
    depth: u16,
    virtual_loss: u16,
    flags: u8,

    first_edge: EdgeId,
    num_edges: u16
}

impl Node {
    pub fn new(sign_to_move: Sign, depth: usize) -> Self {
        Self {
            value: Value::default(),
            variance_acc: 0.0,
            visits: 0,
            score: Score::default(),
            sign_to_move,
            depth: depth as u16,
            virtual_loss: 0,
            flags: 0,
            first_edge: 0,
            num_edges: 0
        }
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn set_value(&mut self, value: Value) {
        debug_assert!(value.is_valid());
        self.value = value;
    }

    /// Welford-style running update of the mean value and its variance
    /// accumulator.
    pub fn update_value(&mut self, eval: Value) {
        self.visits += 1;
        let step = 1.0 / self.visits as f32;
        let delta = eval.expectation() - self.value.expectation();

        self.value = self.value + (eval - self.value) * step;
        self.value.clip_to_bounds();
        self.variance_acc += delta * (eval.expectation() - self.value.expectation());
    }

    pub fn visits(&self) -> i32 {
        self.visits
    }

    pub fn set_visits(&mut self, visits: i32) {
        self.visits = visits;
    }

    /// The sample variance of the backed-up expectations. Needs at least
    /// two visits.
    pub fn variance(&self) -> f32 {
        debug_assert!(self.visits >= 2);
        self.variance_acc / (self.visits - 1) as f32
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn set_score(&mut self, score: Score) {
        self.score = score;
    }

    pub fn is_proven(&self) -> bool {
        self.score.is_proven()
    }

    pub fn sign_to_move(&self) -> Sign {
        self.sign_to_move
    }

    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    pub fn virtual_loss(&self) -> i32 {
        self.virtual_loss as i32
    }

    pub fn increase_virtual_loss(&mut self) {
        self.virtual_loss += 1;
    }

    pub fn decrease_virtual_loss(&mut self) {
        debug_assert!(self.virtual_loss > 0);
        self.virtual_loss -= 1;
    }

    pub fn is_root(&self) -> bool {
        self.flags & FLAG_ROOT != 0
    }

    pub fn mark_as_root(&mut self) {
        self.flags |= FLAG_ROOT;
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.flags & FLAG_FULLY_EXPANDED != 0
    }

    pub fn mark_as_fully_expanded(&mut self) {
        self.flags |= FLAG_FULLY_EXPANDED;
    }

    pub fn is_leaf(&self) -> bool {
        self.num_edges == 0
    }

    pub fn first_edge(&self) -> EdgeId {
        self.first_edge
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges as usize
    }

    pub fn set_edges(&mut self, first_edge: EdgeId, num_edges: usize) {
        debug_assert!(num_edges < u16::MAX as usize);
        self.first_edge = first_edge;
        self.num_edges = num_edges as u16;
    }
}

/// One move out of a node, holding the prior and the child statistics as
/// seen from the parent. The child node is attached lazily on expansion.
#[derive(Clone, Debug)]
pub struct Edge {
    mv: Move,
    policy: f32,
    value: Value,
    score: Score,
    visits: i32,
    virtual_loss: u16,
    child: NodeId
}

impl Default for Edge {
    fn default() -> Self {
        Self {
            mv: Move::NULL,
            policy: 0.0,
            value: Value::default(),
            score: Score::default(),
            visits: 0,
            virtual_loss: 0,
            child: NULL_NODE
        }
    }
}

impl Edge {
    pub fn new(mv: Move, policy: f32, value: Value, score: Score) -> Self {
        Self {
            mv,
            policy,
            value,
            score,
            visits: 0,
            virtual_loss: 0,
            child: NULL_NODE
        }
    }

    pub fn mv(&self) -> Move {
        self.mv
    }

    pub fn policy(&self) -> f32 {
        self.policy
    }

    pub fn set_policy(&mut self, policy: f32) {
        self.policy = policy;
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    pub fn update_value(&mut self, eval: Value) {
        self.visits += 1;
        let step = 1.0 / self.visits as f32;
        self.value = self.value + (eval - self.value) * step;
        self.value.clip_to_bounds();
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn set_score(&mut self, score: Score) {
        self.score = score;
    }

    pub fn visits(&self) -> i32 {
        self.visits
    }

    pub fn virtual_loss(&self) -> i32 {
        self.virtual_loss as i32
    }

    pub fn increase_virtual_loss(&mut self) {
        self.virtual_loss += 1;
    }

    pub fn decrease_virtual_loss(&mut self) {
        debug_assert!(self.virtual_loss > 0);
        self.virtual_loss -= 1;
    }

    pub fn child(&self) -> Option<NodeId> {
        if self.child == NULL_NODE { None } else { Some(self.child) }
    }

    pub fn set_child(&mut self, child: NodeId) {
        debug_assert_eq!(self.child, NULL_NODE);
        self.child = child;
    }

    /// The quantity the search optimizes for this edge, discounted by the
    /// virtual losses currently in flight.
    pub fn q_value(&self, style_factor: f32) -> f32 {
        let q = self.value.expectation() + style_factor * self.value.draw_rate;
        let total = (self.visits + self.virtual_loss as i32) as f32;

        if total > 0.0 {
            q * self.visits as f32 / total
        } else {
            q
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welford_mean_and_variance() {
        let mut node = Node::new(Sign::Cross, 0);

        node.update_value(Value::new(1.0, 0.0));
        node.update_value(Value::new(0.0, 0.0));
        node.update_value(Value::new(1.0, 0.0));
        node.update_value(Value::new(0.0, 0.0));

        assert_eq!(node.visits(), 4);
        assert!((node.value().expectation() - 0.5).abs() < 1e-6);
        assert!((node.variance() - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn virtual_loss_discounts_q() {
        let mut edge = Edge::new(Move::new(0, 0, Sign::Cross), 0.5, Value::new(0.8, 0.0), Score::default());

        let q0 = edge.q_value(0.5);
        edge.increase_virtual_loss();
        edge.update_value(Value::new(0.8, 0.0));
        let q1 = edge.q_value(0.5);

        assert!((q0 - 0.8).abs() < 1e-6);
        assert!(q1 < q0);
    }

    #[test]
    fn child_is_lazy() {
        let mut edge = Edge::default();

        assert!(edge.child().is_none());
        edge.set_child(17);
        assert_eq!(edge.child(), Some(17));
    }
}
