use std::env;
use std::sync::Arc;

use getopts::Options;

use splitline::clock::SystemClock;
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
    opts.optflag("u", "undo", "reverse the last completed station");
    opts.optflag("r", "reset", "wipe all completions for the athlete");
    opts.optflag("d", "dnf", "mark the athlete as disqualified");
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
    let actions = [
        matches.opt_present("u"),
        matches.opt_present("r"),
        matches.opt_present("d"),
    ];

    if eid_str.is_none() || aid_str.is_none() || actions.iter().filter(|a| **a).count() != 1 {
        print_usage(&program, opts);
        return;
    }

    let eid: i64 = eid_str.unwrap().parse().expect("event id must be a number");
    let aid: i64 = aid_str.unwrap().parse().expect("athlete id must be a number");

    let store = PgStore::connect().expect("failed to open record store");
    let engine = Engine::new(Arc::new(store), Arc::new(SystemClock));

    let corrected = if actions[0] {
        engine.undo(eid, aid)
    } else if actions[1] {
        engine.reset(eid, aid)
    } else {
        engine.disqualify(eid, aid)
    };
    match corrected {
        Ok(athlete) => println!(
            "Athlete {} is now {} at progress {}",
            athlete.id, athlete.status, athlete.progress
        ),
        Err(err) => {
            eprintln!("Failed to correct athlete: {}", err);
            std::process::exit(1);
        }
    }
}
