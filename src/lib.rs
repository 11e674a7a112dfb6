pub mod admin;
pub mod api;
pub mod catalog;
pub mod config;
pub mod humanize;
pub mod ingest;
pub mod observability;
pub mod processors;
pub mod queue;
pub mod schema;
pub mod storage;
pub mod worker;
