//! Cron entrypoint: open one SCHEDULED payout per farmer holding PENDING
//! earnings. Run from a scheduler, e.g. weekly.

use diesel::{Connection, PgConnection};
use dotenvy::dotenv;
use farmlink::application::payouts;
use std::env;

fn main() {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let mut conn =
        PgConnection::establish(&database_url).expect("Failed to connect to the database");

    match payouts::run_weekly_batch(&mut conn) {
        Ok(created) => log::info!("weekly payout run done: {} payouts scheduled", created.len()),
        Err(e) => {
            log::error!("weekly payout run failed: {e}");
            std::process::exit(1);
        }
    }
}
