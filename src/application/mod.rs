pub mod billing;
pub mod pipeline;
pub mod router;
pub mod session;
