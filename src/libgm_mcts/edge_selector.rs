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

use ordered_float::OrderedFloat;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gumbel};

use crate::node::{Edge, NodeId};
use crate::tree::Tree;

/// Picks one outgoing edge of a node during the select phase. Edges whose
/// child is a proven win for the side to move are taken immediately;
/// proven losses are avoided unless nothing else remains.
pub trait EdgeSelector: Send {
    /// Returns the index of the selected edge within the node's edge list.
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize;
}

/// Shared proven-score handling: a winning edge short-circuits, losing
/// edges are skipped unless every edge loses. Returns the surviving
/// candidate indices.
fn candidate_indices(edges: &[Edge]) -> Vec<usize> {
    debug_assert!(!edges.is_empty());

    if let Some(winning) = edges.iter().position(|e| e.score().is_win()) {
        return vec! [winning];
    }

    let unproven: Vec<usize> = (0..edges.len())
        .filter(|&i| !edges[i].score().is_loss())
        .collect();

    if unproven.is_empty() {
        // everything loses; pick the most stubborn defence
        let best = (0..edges.len())
            .max_by_key(|&i| edges[i].score())
            .unwrap();
        vec! [best]
    } else {
        unproven
    }
}

/// The PUCT rule: `Q(e) + c * P(e) * sqrt(N_parent) / (1 + N_e)` with
/// `Q(e) = E[win] + style * P(draw)`.
pub struct PuctSelector {
    exploration_constant: f32,
    style_factor: f32
}

impl PuctSelector {
    pub fn new(exploration_constant: f32, style_factor: f32) -> Self {
        Self { exploration_constant, style_factor }
    }
}

impl EdgeSelector for PuctSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        let edges = tree.edges_of(node);
        let candidates = candidate_indices(edges);
        let sqrt_visits = (tree.node(node).visits() as f32).sqrt();

        candidates.into_iter()
            .max_by_key(|&i| {
                let edge = &edges[i];
                let in_flight = (edge.visits() + edge.virtual_loss()) as f32;
                let exploration = self.exploration_constant * edge.policy() * sqrt_visits / (1.0 + in_flight);

                OrderedFloat(edge.q_value(self.style_factor) + exploration)
            })
            .unwrap()
    }
}

/// PUCT with Gumbel noise mixed into the root priors, regenerated per
/// search so that repeated searches explore differently.
pub struct NoisyPuctSelector {
    exploration_constant: f32,
    style_factor: f32,
    rng: SmallRng,
    noisy_policy: Vec<f32>,
    initialized_for: Option<NodeId>
}

impl NoisyPuctSelector {
    pub fn new(exploration_constant: f32, style_factor: f32) -> Self {
        Self {
            exploration_constant,
            style_factor,
            rng: SmallRng::from_entropy(),
            noisy_policy: Vec::new(),
            initialized_for: None
        }
    }

    fn initialize(&mut self, tree: &Tree, node: NodeId) {
        let gumbel = Gumbel::new(0.0f32, 1.0f32).expect("could not create gumbel distribution");
        let edges = tree.edges_of(node);

        self.noisy_policy = edges.iter()
            .map(|edge| {
                let logit = edge.policy().max(1e-9).ln();
                let noise: f32 = gumbel.sample(&mut self.rng);
                (logit + noise).exp()
            })
            .collect();

        let total: f32 = self.noisy_policy.iter().sum();
        if total > 0.0 {
            for policy in self.noisy_policy.iter_mut() {
                *policy /= total;
            }
        }
        self.initialized_for = Some(node);
    }
}

impl EdgeSelector for NoisyPuctSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        if !tree.node(node).is_root() {
            return PuctSelector::new(self.exploration_constant, self.style_factor).select(tree, node);
        }
        if self.initialized_for != Some(node) || self.noisy_policy.len() != tree.node(node).num_edges() {
            self.initialize(tree, node);
        }

        let edges = tree.edges_of(node);
        let candidates = candidate_indices(edges);
        let sqrt_visits = (tree.node(node).visits() as f32).sqrt();

        candidates.into_iter()
            .max_by_key(|&i| {
                let edge = &edges[i];
                let in_flight = (edge.visits() + edge.virtual_loss()) as f32;
                let exploration = self.exploration_constant * self.noisy_policy[i] * sqrt_visits / (1.0 + in_flight);

                OrderedFloat(edge.q_value(self.style_factor) + exploration)
            })
            .unwrap()
    }
}

/// The prior-free UCT rule, for positions where the policy is not to be
/// trusted.
pub struct UctSelector {
    exploration_constant: f32,
    style_factor: f32
}

impl UctSelector {
    pub fn new(exploration_constant: f32, style_factor: f32) -> Self {
        Self { exploration_constant, style_factor }
    }
}

impl EdgeSelector for UctSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        let edges = tree.edges_of(node);
        let candidates = candidate_indices(edges);
        let log_visits = (tree.node(node).visits().max(1) as f32).ln();

        candidates.into_iter()
            .max_by_key(|&i| {
                let edge = &edges[i];
                let in_flight = 1.0 + (edge.visits() + edge.virtual_loss()) as f32;
                let exploration = self.exploration_constant * (log_visits / in_flight).sqrt();

                OrderedFloat(edge.q_value(self.style_factor) + exploration)
            })
            .unwrap()
    }
}

/// Picks the most visited edge; used to extract the final move.
#[derive(Default)]
pub struct MaxVisitSelector;

impl EdgeSelector for MaxVisitSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        let edges = tree.edges_of(node);

        (0..edges.len())
            .max_by_key(|&i| edges[i].visits())
            .unwrap()
    }
}

/// Picks the edge with the best Q-value.
pub struct MaxValueSelector {
    style_factor: f32
}

impl MaxValueSelector {
    pub fn new(style_factor: f32) -> Self {
        Self { style_factor }
    }
}

impl EdgeSelector for MaxValueSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        let edges = tree.edges_of(node);

        (0..edges.len())
            .max_by_key(|&i| OrderedFloat(edges[i].q_value(self.style_factor)))
            .unwrap()
    }
}

/// Picks the move to actually play: proven scores first, then visits, then
/// value.
pub struct BestEdgeSelector {
    style_factor: f32
}

impl BestEdgeSelector {
    pub fn new(style_factor: f32) -> Self {
        Self { style_factor }
    }
}

impl EdgeSelector for BestEdgeSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        let edges = tree.edges_of(node);

        (0..edges.len())
            .max_by_key(|&i| {
                let edge = &edges[i];
                (edge.score(), edge.visits(), OrderedFloat(edge.q_value(self.style_factor)))
            })
            .unwrap()
    }
}

/// Forces every edge to be tried before any is revisited, down to the
/// given depth; useful for generating balanced openings.
pub struct BalancedSelector {
    balance_depth: usize,
    base: Box<dyn EdgeSelector>
}

impl BalancedSelector {
    pub fn new(balance_depth: usize, base: Box<dyn EdgeSelector>) -> Self {
        Self { balance_depth, base }
    }
}

impl EdgeSelector for BalancedSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        if tree.node(node).depth() < self.balance_depth {
            let edges = tree.edges_of(node);

            (0..edges.len())
                .min_by_key(|&i| edges[i].visits() + edges[i].virtual_loss())
                .unwrap()
        } else {
            self.base.select(tree, node)
        }
    }
}

/// Sequential halving at the root: the simulation budget is spent in
/// phases, each phase splitting its visits evenly among a shrinking set of
/// the currently best candidates. Below the root it behaves like PUCT.
pub struct SequentialHalvingSelector {
    max_edges: usize,
    max_simulations: usize,
    c_visit: f32,
    c_scale: f32,
    rng: SmallRng,
    gumbel_noise: Vec<f32>,
    initialized_for: Option<NodeId>,
    fallback: PuctSelector
}

impl SequentialHalvingSelector {
    pub fn new(max_edges: usize, max_simulations: usize) -> Self {
        Self {
            max_edges: max_edges.max(2),
            max_simulations,
            c_visit: 50.0,
            c_scale: 1.0,
            rng: SmallRng::from_entropy(),
            gumbel_noise: Vec::new(),
            initialized_for: None,
            fallback: PuctSelector::new(1.25, 0.5)
        }
    }

    /// The sigma transform of the Q-value used to mix values into the
    /// ranking of candidates.
    fn sigma(&self, q: f32, max_visits: i32) -> f32 {
        (self.c_visit + max_visits as f32) * self.c_scale * q
    }

    fn ranking(&self, edges: &[Edge], index: usize, max_visits: i32) -> f32 {
        let edge = &edges[index];
        let logit = edge.policy().max(1e-9).ln();

        logit + self.gumbel_noise[index] + self.sigma(edge.q_value(0.5), max_visits)
    }
}

impl EdgeSelector for SequentialHalvingSelector {
    fn select(&mut self, tree: &Tree, node: NodeId) -> usize {
        if !tree.node(node).is_root() {
            return self.fallback.select(tree, node);
        }

        let num_edges = tree.node(node).num_edges();
        if self.initialized_for != Some(node) || self.gumbel_noise.len() != num_edges {
            let gumbel = Gumbel::new(0.0f32, 1.0f32).expect("could not create gumbel distribution");
            self.gumbel_noise = (0..num_edges).map(|_| gumbel.sample(&mut self.rng)).collect();
            self.initialized_for = Some(node);
        }

        let edges = tree.edges_of(node);
        let spent = tree.node(node).visits() as usize;
        let max_visits = edges.iter().map(|e| e.visits()).max().unwrap_or(0);

        // the number of surviving candidates halves every time another
        // equal share of the budget has been spent
        let phases = (self.max_edges.max(2) as f32).log2().ceil() as usize;
        let phase = if self.max_simulations == 0 {
            0
        } else {
            (spent * phases / self.max_simulations.max(1)).min(phases.saturating_sub(1))
        };
        let surviving = (self.max_edges >> phase).max(2).min(edges.len());

        let mut order: Vec<usize> = candidate_indices(edges);
        order.sort_by_key(|&i| ::std::cmp::Reverse(OrderedFloat(self.ranking(edges, i, max_visits))));
        order.truncate(surviving);

        // within the surviving set, spread visits evenly
        order.into_iter()
            .min_by_key(|&i| edges[i].visits() + edges[i].virtual_loss())
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::TreeConfig;
    use crate::search_task::SearchTask;
    use gm_game::{Board, GameConfig, GameRules, Move, Sign};
    use gm_tss::{Score, Value};

    fn tree_with_edges(edges: &[(f32, Score)]) -> Tree {
        let config = GameConfig::new(GameRules::Freestyle, 15, 15);
        let mut tree = Tree::new(config, TreeConfig { max_nodes: 100, node_bucket_size: 16 });

        let mut task = SearchTask::new(config);
        task.set(&Board::new(15, 15), Sign::Cross);
        for (i, &(policy, score)) in edges.iter().enumerate() {
            task.add_edge(Move::new(0, i, Sign::Cross));
            let last = task.edges.len() - 1;
            task.edges[last].set_policy(policy);
            task.edges[last].set_score(score);
        }
        task.value = Value::new(0.5, 0.0);
        task.was_processed_by_network = true;
        tree.expand(&task);
        tree.backup(&task);
        tree
    }

    #[test]
    fn puct_prefers_high_policy_when_unvisited() {
        let tree = tree_with_edges(&[(0.1, Score::default()), (0.8, Score::default()), (0.1, Score::default())]);
        let mut selector = PuctSelector::new(1.25, 0.5);

        assert_eq!(selector.select(&tree, tree.root()), 1);
    }

    #[test]
    fn proven_wins_are_selected_immediately() {
        let tree = tree_with_edges(&[(0.9, Score::default()), (0.05, Score::win_in(2)), (0.05, Score::default())]);

        let mut puct = PuctSelector::new(1.25, 0.5);
        let mut uct = UctSelector::new(1.4, 0.5);
        let mut best = BestEdgeSelector::new(0.5);

        assert_eq!(puct.select(&tree, tree.root()), 1);
        assert_eq!(uct.select(&tree, tree.root()), 1);
        assert_eq!(best.select(&tree, tree.root()), 1);
    }

    #[test]
    fn proven_losses_are_avoided() {
        let tree = tree_with_edges(&[(0.9, Score::loss_in(3)), (0.1, Score::default())]);
        let mut selector = PuctSelector::new(1.25, 0.5);

        assert_eq!(selector.select(&tree, tree.root()), 1);
    }

    #[test]
    fn all_losing_picks_the_longest_defence() {
        let tree = tree_with_edges(&[(0.5, Score::loss_in(2)), (0.5, Score::loss_in(6))]);
        let mut selector = PuctSelector::new(1.25, 0.5);

        assert_eq!(selector.select(&tree, tree.root()), 1);
    }

    #[test]
    fn balanced_selector_spreads_visits() {
        let tree = tree_with_edges(&[(0.9, Score::default()), (0.05, Score::default()), (0.05, Score::default())]);
        let mut selector = BalancedSelector::new(2, Box::new(PuctSelector::new(1.25, 0.5)));

        // all edges are unvisited, so the first index wins the tie; once
        // it gains a virtual visit the others follow
        let first = selector.select(&tree, tree.root());
        assert_eq!(first, 0);
    }
}
