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

extern crate gm_game;
extern crate gm_mcts;
extern crate gm_nn;
extern crate gm_utils;
#[macro_use] extern crate lazy_static;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use gm_game::{board, Board, GameConfig, GameRules, Sign};
use gm_mcts::engine::BestMoveController;
use gm_mcts::time_control::RolloutLimit;
use gm_mcts::{EngineSettings, SearchEngine};
use gm_nn::{LinearNetwork, Network};

lazy_static! {
    static ref USAGE: String = format!(
        "Usage: {} [options]\n\
         \n\
         Options:\n\
         \x20 --rule <name>      FREESTYLE, STANDARD, RENJU, CARO5, or CARO6 (default FREESTYLE)\n\
         \x20 --size <n>         board size up to 20 (default 15)\n\
         \x20 --rollouts <n>     simulations per move (default 512)\n\
         \x20 --moves <n>        number of self-play moves to run (default 8)\n",
        env::args().next().unwrap_or_else(|| "gomu".into())
    );
}

struct Arguments {
    rules: GameRules,
    size: usize,
    rollouts: usize,
    moves: usize
}

fn parse_arguments() -> Arguments {
    let mut out = Arguments {
        rules: GameRules::Freestyle,
        size: 15,
        rollouts: 512,
        moves: 8
    };
    let mut args = env::args().skip(1);

    while let Some(flag) = args.next() {
        let mut value = || args.next().unwrap_or_default();

        match flag.as_str() {
            "--rule" => {
                out.rules = value().parse().unwrap_or_else(|reason: String| {
                    eprintln!("{}", reason);
                    process::exit(1);
                });
            },
            "--size" => { out.size = value().parse().unwrap_or(15).clamp(5, 20); },
            "--rollouts" => { out.rollouts = value().parse().unwrap_or(512).max(1); },
            "--moves" => { out.moves = value().parse().unwrap_or(8); },
            "--help" | "-h" => {
                println!("{}", *USAGE);
                process::exit(0);
            },
            other => {
                eprintln!("unrecognized option '{}'\n\n{}", other, *USAGE);
                process::exit(1);
            }
        }
    }
    out
}

/// Play a short self-play game and print one line per move, as a smoke
/// test of the full search pipeline.
fn main() {
    let arguments = parse_arguments();
    let config = GameConfig::new(arguments.rules, arguments.size, arguments.size);
    let settings = EngineSettings::new(config);
    let mut engine = SearchEngine::new(settings, Box::new(move || -> Box<dyn Network> { Box::new(LinearNetwork::new(config)) }));

    let mut current = Board::new(config.rows, config.cols);
    let mut sign_to_move = Sign::Cross;

    println!("rules {}, board {}x{}, {} rollouts per move", config.rules, config.rows, config.cols, arguments.rollouts);

    for move_number in 1..=arguments.moves {
        engine.set_position(&current, sign_to_move);

        let started = Instant::now();
        let best = BestMoveController::run(&mut engine, Arc::new(RolloutLimit::new(arguments.rollouts)));
        let elapsed = started.elapsed();
        let summary = engine.get_summary(8);

        let best = match best {
            Some(mv) => mv,
            None => {
                println!("no legal moves left");
                break;
            }
        };

        println!(
            "{:3}. {}  value {:.3}  score {}  {} visits in {:.2}s",
            move_number,
            best,
            summary.value.expectation(),
            summary.score,
            summary.visits,
            elapsed.as_secs_f64()
        );

        board::put_move(&mut current, best);
        let outcome = gm_game::rules::get_outcome(config.rules, &current, best, config.draw_after);
        if outcome != gm_game::GameOutcome::Unknown {
            println!("game over: {:?}", outcome);
            break;
        }
        sign_to_move = sign_to_move.invert();
    }

    println!("{}", board::to_string(&current));
}
