pub mod batch;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod error;
pub mod filename;
pub mod front_contract;
pub mod ingest;
pub mod schema;
pub mod supervisor;
pub mod tailer;
