use std::env;

use getopts::Options;

use splitline::pg::PgStore;
use splitline::store::RecordStore;

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
    opts.optopt("n", "name", "athlete name", "NAME");
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
    let name = matches.opt_str("n");

    if eid_str.is_none() || name.is_none() {
        print_usage(&program, opts);
        return;
    }

    let eid: i64 = eid_str.unwrap().parse().expect("event id must be a number");

    let store = PgStore::connect().expect("failed to open record store");
    match store.insert_athlete(eid, &name.unwrap()) {
        Ok(athlete) => println!("Created athlete with ID {}", athlete.id),
        Err(err) => {
            eprintln!("Failed to create athlete: {}", err);
            std::process::exit(1);
        }
    }
}
