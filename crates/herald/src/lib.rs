//! Library surface of the herald binary, used by the binary entry point and
//! the integration tests.

pub mod daemon;
pub mod dispatch;
