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
    opts.optflag("s", "start", "activate the event");
    opts.optflag("x", "stop", "complete the event");
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
    let start = matches.opt_present("s");
    let stop = matches.opt_present("x");

    if eid_str.is_none() || start == stop {
        print_usage(&program, opts);
        return;
    }

    let eid: i64 = eid_str.unwrap().parse().expect("event id must be a number");

    let store = PgStore::connect().expect("failed to open record store");
    let engine = Engine::new(Arc::new(store), Arc::new(SystemClock));

    let updated = if start {
        engine.start_event(eid)
    } else {
        engine.stop_event(eid)
    };
    match updated {
        Ok(event) => println!("Event {} is now {}", event.id, event.status),
        Err(err) => {
            eprintln!("Failed to update event: {}", err);
            std::process::exit(1);
        }
    }
}
