mod common;
mod ingest;
mod reports;
