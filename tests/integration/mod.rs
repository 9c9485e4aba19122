//! Integration tests for db-ask.
//!
//! Only `postgres_test` needs a database (via DATABASE_URL).

pub mod materializer_test;
pub mod pipeline_test;
pub mod postgres_test;
pub mod translator_test;
