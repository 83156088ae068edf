mod env;
mod migrations;
mod report;
mod routes;
pub mod utils;

pub use utils::{test_db, test_utils};
