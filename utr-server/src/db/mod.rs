//! Database access for the study server
//!
//! One module per table group. Schema creation and migrations live in
//! `utr_common::db`; these modules only run queries.

pub mod captures;
pub mod images;
pub mod moodboard;
pub mod questionnaires;
pub mod sessions;
pub mod stats;
pub mod users;

pub use utr_common::db::init_database;
