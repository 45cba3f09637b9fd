//! Integration tests: the full stage pipeline against in-memory and
//! filesystem stores.

mod memory_store;
mod pipeline;
