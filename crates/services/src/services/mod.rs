pub mod allocation;
pub mod config;
pub mod import;
pub mod sms;
