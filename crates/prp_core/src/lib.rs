pub mod citations;
pub mod config;
pub mod domain;
pub mod error;
pub mod evidence;
pub mod fragment;
pub mod ingest;
pub mod manifest;
pub mod references;
pub mod runlog;
pub mod thread;
