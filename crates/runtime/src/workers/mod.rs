//! Background tasks owned by the runtime.
//!
//! Every worker watches the same shutdown signal, so a single
//! [`Runtime::stop`](crate::Runtime::stop) ends all of them.
mod dispatch;
mod periodic;

pub(crate) use dispatch::DispatchWorker;
pub(crate) use periodic::PeriodicWorker;
