mod ingest_server;

pub use ingest_server::{handle_message, Handled, IngestServer};
