//! HTTP front-end: accepts scrape requests and runs them one at a time in the
//! background.

pub mod job_store;
pub mod model;
pub mod queue;
pub mod routes;
pub mod runner;
