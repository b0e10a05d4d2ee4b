pub mod content;
pub mod in_memory;
pub mod qr;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod vision;
