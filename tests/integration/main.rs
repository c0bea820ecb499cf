//! Integration test modules.

mod batch_test;
mod common;
mod concurrency_test;
mod ledger_to_acwr_test;
mod rebuild_test;
