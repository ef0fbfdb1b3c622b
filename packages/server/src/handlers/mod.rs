pub mod company;
pub mod entry;
pub mod image;
pub mod maintenance;
pub mod storage;
