pub mod cli;
pub mod coveralls;
pub mod error;
pub mod ingest;
pub mod merge;
pub mod model;
pub mod parsers;
pub mod project;
pub mod resolve;
