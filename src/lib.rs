//! Library surface for the bridge binary, so integration tests can exercise
//! the dispatch logic over real loopback sockets instead of only the binary.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod osc;
pub mod serial;
pub mod session;
pub mod translator;
