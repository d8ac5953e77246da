pub mod api;
pub mod config;
pub mod fetch;
pub mod humanize;
pub mod jobs;
pub mod messaging;
pub mod observability;
pub mod queue;
pub mod store;
pub mod worker;
