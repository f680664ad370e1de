//! Server and client plumbing around hyper.

pub mod client;
pub mod controller;
pub mod errors;
pub mod request_util;
