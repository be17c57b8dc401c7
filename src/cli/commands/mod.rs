//! CLI command implementations.

mod ask;
mod config;
mod doctor;
mod ingest;
mod list;
mod search;
mod show;

pub use ask::run_ask;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;
pub use show::{run_delete, run_show};
