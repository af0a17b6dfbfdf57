mod controller;
mod loop_worker;

pub use controller::Poller;
pub use loop_worker::{polling_loop, SharedRunState, SharedSource};
