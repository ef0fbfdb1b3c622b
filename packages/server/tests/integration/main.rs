mod common;

mod company;
mod entry;
mod image;
mod maintenance;
