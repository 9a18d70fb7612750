pub mod error_utils;
pub mod network;
pub mod retry_delay;
