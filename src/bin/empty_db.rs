use splitline::pg::PgStore;

fn main() {
    env_logger::init();

    let store = PgStore::connect().expect("failed to open record store");
    store.empty_db().expect("failed to empty DB");
}
