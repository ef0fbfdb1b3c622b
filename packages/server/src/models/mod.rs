pub mod entry;
pub mod image;
pub mod shared;
pub mod storage;
