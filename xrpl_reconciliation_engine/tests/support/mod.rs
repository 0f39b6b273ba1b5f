#![allow(dead_code)]

use log::*;

pub fn init_logging() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

pub fn random_db_url() -> String {
    format!("sqlite://{}/xre_test_store_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}
