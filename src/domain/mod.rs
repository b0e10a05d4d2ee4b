pub mod bill;
pub mod event;
pub mod money;
pub mod ports;
pub mod reconcile;
pub mod slip;
