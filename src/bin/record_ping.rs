use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use getopts::Options;

use splitline::clock::{Clock, SystemClock};
use splitline::pg::PgStore;
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
    opts.optopt("a", "aid", "athlete id", "AID");
    opts.optopt("s", "station", "station id", "STATION");
    opts.optopt("t", "time", "completion time (RFC 3339, defaults to now)", "TIME");
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
    let aid_str = matches.opt_str("a");
    let station = matches.opt_str("s");

    if eid_str.is_none() || aid_str.is_none() || station.is_none() {
        print_usage(&program, opts);
        return;
    }

    let eid: i64 = eid_str.unwrap().parse().expect("event id must be a number");
    let aid: i64 = aid_str.unwrap().parse().expect("athlete id must be a number");

    let clock = Arc::new(SystemClock);
    let now = match matches.opt_str("t") {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .expect("time must be RFC 3339")
            .with_timezone(&Utc),
        None => clock.now(),
    };

    let store = PgStore::connect().expect("failed to open record store");
    let engine = Engine::new(Arc::new(store), clock);

    match engine.record_ping(eid, aid, &station.unwrap(), now) {
        Ok(outcome) => {
            match outcome.split_ms {
                Some(split_ms) => println!(
                    "Athlete {} advanced to progress {} (split {} ms)",
                    aid, outcome.progress, split_ms
                ),
                None => println!("Athlete {} advanced to progress {}", aid, outcome.progress),
            }
            if outcome.finished {
                println!("Athlete {} has finished!", aid);
            }
        }
        Err(err) => {
            eprintln!("Failed to record ping: {}", err);
            std::process::exit(1);
        }
    }
}
