use std::env;
use std::sync::Arc;

use getopts::Options;

use splitline::clock::SystemClock;
use splitline::models::Station;
use splitline::pg::PgStore;
use splitline::Engine;

fn print_usage(program: &str, opts: Options) {
    let brief = format!(
        "Usage: {} -n NAME STATION [STATION ...]\n\
         Each STATION is an id, optionally followed by a display name as id:name",
        program
    );
    print!("{}", opts.usage(&brief));
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("n", "name", "event name", "NAME");
    opts.optflag("h", "help", "print this help menu");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => panic!("{}", f),
    };
    if matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }
    let name = matches.opt_str("n");

    if name.is_none() || matches.free.is_empty() {
        print_usage(&program, opts);
        return;
    }

    let stations: Vec<Station> = matches
        .free
        .iter()
        .map(|spec| {
            let (id, name) = spec.split_once(':').unwrap_or((spec.as_str(), spec.as_str()));
            Station {
                id: id.to_string(),
                name: name.to_string(),
                kind: None,
            }
        })
        .collect();

    let store = PgStore::connect().expect("failed to open record store");
    let engine = Engine::new(Arc::new(store), Arc::new(SystemClock));

    match engine.create_event(&name.unwrap(), stations) {
        Ok(event) => println!("Created event with ID {}", event.id),
        Err(err) => {
            eprintln!("Failed to create event: {}", err);
            std::process::exit(1);
        }
    }
}
