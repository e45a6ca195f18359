//! Conformance test groups built on the framework.

pub mod write_cmd;
