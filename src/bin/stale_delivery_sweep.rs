//! Cron entrypoint: auto-complete deliveries stuck OUT_FOR_DELIVERY for
//! more than 24 hours. Run from a scheduler, e.g. daily.

use diesel::{Connection, PgConnection};
use dotenvy::dotenv;
use farmlink::application::orders;
use std::env;

fn main() {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let mut conn =
        PgConnection::establish(&database_url).expect("Failed to connect to the database");

    match orders::sweep_stale_deliveries(&mut conn) {
        Ok(completed) => {
            log::info!("stale delivery sweep done: {} orders completed", completed.len())
        }
        Err(e) => {
            log::error!("stale delivery sweep failed: {e}");
            std::process::exit(1);
        }
    }
}
