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

//! End-to-end checks of the solver and the full search on hand-built
//! positions.

extern crate gm_game;
extern crate gm_mcts;
extern crate gm_nn;
extern crate gm_tests;
extern crate gm_tss;

use std::sync::Arc;

use gm_game::{board, rules, zobrist, GameConfig, GameOutcome, GameRules, Move, Sign};
use gm_mcts::engine::BestMoveController;
use gm_mcts::time_control::RolloutLimit;
use gm_mcts::{EngineSettings, SearchEngine};
use gm_nn::{LinearNetwork, Network};
use gm_tests::{board_with, drawn_board};
use gm_tss::{Bound, Score, SharedHashTable, ThreatSpaceSearch, TssMode};

fn solver(config: GameConfig) -> (ThreatSpaceSearch, Arc<SharedHashTable>) {
    let table = Arc::new(SharedHashTable::new(1 << 18));
    (ThreatSpaceSearch::new(config, table.clone()), table)
}

fn engine(config: GameConfig) -> SearchEngine {
    let mut settings = EngineSettings::new(config);
    settings.num_threads = 1;
    settings.search_config.max_batch_size = 4;
    settings.search_config.use_symmetries = false;
    settings.search_config.tss.max_positions = 1000;

    SearchEngine::new(settings, Box::new(move || -> Box<dyn Network> { Box::new(LinearNetwork::new(config)) }))
}

/// Four cross stones in a row: the solver proves the win in one, and the
/// tree search plays the winning square.
#[test]
fn win_in_one_freestyle() {
    let config = GameConfig::new(GameRules::Freestyle, 15, 15);
    let stones = [
        (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 8, Sign::Cross),
        (6, 5, Sign::Circle), (6, 6, Sign::Circle), (6, 7, Sign::Circle)
    ];
    let board = board_with(15, 15, &stones);
    let winning = [Move::new(7, 4, Sign::Cross), Move::new(7, 9, Sign::Cross)];

    let (mut tss, _) = solver(config);
    let report = tss.solve(&board, Sign::Cross, TssMode::Recursive, 10_000);
    assert_eq!(report.score, Score::win_in(1));
    assert!(winning.contains(&report.actions[0].0));

    let mut engine = engine(config);
    engine.set_position(&board, Sign::Cross);
    let best = BestMoveController::run(&mut engine, Arc::new(RolloutLimit::new(16)));
    assert!(winning.contains(&best.unwrap()));
}

/// An opponent open four forces the defence: the generator flags
/// `must_defend`, lists exactly the two end squares, and the search plays
/// one of them.
#[test]
fn must_defend_an_open_four() {
    let config = GameConfig::new(GameRules::Freestyle, 15, 15);
    let stones = [
        (5, 5, Sign::Circle), (5, 6, Sign::Circle), (5, 7, Sign::Circle), (5, 8, Sign::Circle),
        (9, 9, Sign::Cross), (9, 10, Sign::Cross), (10, 10, Sign::Cross)
    ];
    let board = board_with(15, 15, &stones);
    let defences = [Move::new(5, 4, Sign::Cross), Move::new(5, 9, Sign::Cross)];

    let (mut tss, _) = solver(config);
    let report = tss.solve(&board, Sign::Cross, TssMode::Static, 1_000);
    assert!(report.must_defend);
    assert_eq!(report.defensive_moves.len(), 2);
    assert!(defences.iter().all(|mv| report.defensive_moves.contains(mv)));

    let mut engine = engine(config);
    engine.set_position(&board, Sign::Cross);
    let best = BestMoveController::run(&mut engine, Arc::new(RolloutLimit::new(32)));
    assert!(defences.contains(&best.unwrap()), "played {:?}", best);
}

/// A seven-ply forcing sequence: a four-check, a second four-check through
/// the new stone, and an open four to finish. The solver proves it and the
/// transposition table keeps an exact entry for the root.
#[test]
fn victory_by_continued_threats_in_seven() {
    let config = GameConfig::new(GameRules::Freestyle, 15, 15);
    let stones = [
        // the blocked row three, extended by a lone stone two to the right
        (7, 4, Sign::Circle),
        (7, 5, Sign::Cross), (7, 6, Sign::Cross), (7, 7, Sign::Cross), (7, 10, Sign::Cross),
        // the blocked diagonal pair pointing at the row's extension square
        (4, 5, Sign::Circle), (5, 6, Sign::Cross), (6, 7, Sign::Cross),
        // the anti-diagonal pair that turns into the finishing open three
        (6, 11, Sign::Cross),
        // quiet circle stones to keep the stone counts legal
        (0, 0, Sign::Circle), (0, 2, Sign::Circle), (2, 0, Sign::Circle),
        (2, 2, Sign::Circle), (12, 12, Sign::Circle)
    ];
    let board = board_with(15, 15, &stones);

    let (mut tss, table) = solver(config);
    let report = tss.solve(&board, Sign::Cross, TssMode::Recursive, 100_000);

    assert_eq!(report.score, Score::win_in(7), "score is {}", report.score);
    let best = report.actions.iter().max_by_key(|&&(_, score)| score).unwrap();
    assert_eq!(best.0, Move::new(7, 8, Sign::Cross));

    let entry = table.seek(zobrist::get_hash(&board, Sign::Cross)).expect("the root is in the table");
    assert_eq!(entry.bound(), Bound::Exact);
    assert!(entry.depth() >= 7, "stored depth is {}", entry.depth());
    assert!(entry.score().is_win());
}

/// RENJU forbids the 3x3 fork for cross: the square is reported forbidden,
/// and playing it loses on the spot.
#[test]
fn renju_forbidden_double_three() {
    let stones = [
        (7, 5, Sign::Cross), (7, 6, Sign::Cross),
        (5, 7, Sign::Cross), (6, 7, Sign::Cross),
        (0, 0, Sign::Circle), (0, 2, Sign::Circle), (2, 0, Sign::Circle), (2, 2, Sign::Circle)
    ];
    let mut board = board_with(15, 15, &stones);
    let mv = Move::new(7, 7, Sign::Cross);

    assert!(rules::is_forbidden(&mut board, mv));

    board::put_move(&mut board, mv);
    assert_eq!(rules::get_outcome(GameRules::Renju, &board, mv, 225), GameOutcome::CircleWin);
}

/// CARO only scores a five with at least one open end.
#[test]
fn caro_blocked_five() {
    let stones = [
        (6, 2, Sign::Circle),
        (6, 3, Sign::Cross), (6, 4, Sign::Cross), (6, 5, Sign::Cross),
        (6, 6, Sign::Cross), (6, 7, Sign::Cross),
        (6, 8, Sign::Circle)
    ];
    let board = board_with(15, 15, &stones);
    let last = Move::new(6, 5, Sign::Cross);

    assert_eq!(rules::get_outcome(GameRules::Caro5, &board, last, 225), GameOutcome::Unknown);
    assert_eq!(rules::get_outcome(GameRules::Freestyle, &board, last, 225), GameOutcome::CrossWin);
    assert_eq!(rules::get_outcome(GameRules::Standard, &board, last, 225), GameOutcome::CrossWin);
}

/// A filled board with no five is a draw, and the search backs the drawn
/// value up to the root.
#[test]
fn draw_by_fill() {
    let config = GameConfig::new(GameRules::Freestyle, 15, 15);
    let full = drawn_board();

    let outcome = rules::get_outcome(GameRules::Freestyle, &full, Move::new(14, 14, full[(14, 14)]), 225);
    assert_eq!(outcome, GameOutcome::Draw);

    // leave two squares open so the search has something to compare; both
    // lines fill the board without a five
    let mut nearly_full = full.clone();
    nearly_full[(0, 0)] = Sign::None;
    nearly_full[(0, 3)] = Sign::None;
    assert_eq!(board::sign_to_move(&nearly_full), Sign::Cross);

    let mut engine = engine(config);
    engine.set_position(&nearly_full, Sign::Cross);
    let best = BestMoveController::run(&mut engine, Arc::new(RolloutLimit::new(64)));
    assert!(best == Some(Move::new(0, 0, Sign::Cross)) || best == Some(Move::new(0, 3, Sign::Cross)));

    let summary = engine.get_summary(2);
    assert!(summary.score.is_draw(), "root score is {}", summary.score);
    assert!(summary.value.draw_rate >= 0.45, "root value is {:?}", summary.value);
}
