pub mod allocation;
pub mod person;
pub mod room;
