//! Library target of the `outbox` binary, so integration tests can drive the
//! sub-commands directly.

pub mod cli;
