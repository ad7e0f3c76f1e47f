use std::env;
use std::sync::Arc;

use getopts::Options;

use splitline::clock::SystemClock;
use splitline::pg::PgStore;
use splitline::store::RecordStore;
use splitline::Engine;

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("e", "eid", "event id", "EID");
    opts.optflag("j", "json", "print as JSON");
    opts.optflag("h", "help", "print this help menu");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => panic!("{}", f),
    };
    if matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }
    let eid_str = matches.opt_str("e");

    if eid_str.is_none() {
        print_usage(&program, opts);
        return;
    }

    let eid: i64 = eid_str.unwrap().parse().expect("event id must be a number");

    let store = Arc::new(PgStore::connect().expect("failed to open record store"));
    let engine = Engine::new(store.clone(), Arc::new(SystemClock));

    let event = match store.get_event(eid) {
        Ok(event) => event,
        Err(err) => {
            eprintln!("Failed to load event: {}", err);
            std::process::exit(1);
        }
    };
    let board = match engine.leaderboard(eid) {
        Ok(board) => board,
        Err(err) => {
            eprintln!("Failed to compute leaderboard: {}", err);
            std::process::exit(1);
        }
    };

    if matches.opt_present("j") {
        println!(
            "{}",
            serde_json::to_string_pretty(&board).expect("leaderboard must serialize")
        );
        return;
    }

    println!("Leaderboard for {}:", event.name);
    let station_count = event.stations.len();
    for row in board {
        match row.total_ms {
            Some(total_ms) => println!(
                "{} {} - {}/{} stations, {} ms ({})",
                row.rank, row.name, row.progress, station_count, total_ms, row.status
            ),
            None => println!(
                "{} {} - {}/{} stations ({})",
                row.rank, row.name, row.progress, station_count, row.status
            ),
        }
    }
}
