pub mod job;
pub mod review;
