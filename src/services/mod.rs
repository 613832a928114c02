pub mod review_queue;
pub mod storage;
