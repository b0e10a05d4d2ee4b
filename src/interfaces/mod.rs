pub mod reply;
pub mod webhook;
