//! Todo relay: function handlers, their HTTP surface and background runtime.

pub mod app;
pub mod functions;
pub mod runtime;
