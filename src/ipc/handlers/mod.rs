pub mod academics;
pub mod auth;
pub mod core;
pub mod fees;
pub mod students;
pub mod subjects;
pub mod summary;
