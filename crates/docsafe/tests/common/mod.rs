//! Shared test utilities for docsafe integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temp directory and a fake mailbox
//! - Builders for Gmail messages and sample PDFs
//! - In-memory fakes for the mail service, converters and progress reporting

pub mod builders;
pub mod fakes;
pub mod harness;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use fakes::*;
#[allow(unused_imports)]
pub use harness::TestHarness;
