use splitline::pg::PgStore;

fn main() {
    env_logger::init();

    let store = PgStore::connect().expect("failed to open record store");
    match store.create_schema() {
        Ok(_) => println!("Created schema"),
        Err(err) => println!("Failed to create DB: {}", err),
    }
}
