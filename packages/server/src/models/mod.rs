pub mod report;
pub mod shared;
