//! Operator override channel: a local Unix socket speaking line-delimited
//! JSON, through which an operator can reset, pin, unpin, or inspect
//! contained processes.

mod protocol;
mod server;

pub use protocol::{Command, OverrideHandler, Request, Response};
pub use server::{
    OperatorError, OperatorResult, OperatorServer, MAX_CONNECTIONS, MAX_REQUEST_BYTES,
    REQUEST_TIMEOUT,
};
