pub mod access;
pub mod auth;
pub mod export;
pub mod ingest;
pub mod range_query;
pub mod reading_store;
pub mod resampler;
pub mod span;
pub mod users;

#[cfg(test)]
pub mod testing;
