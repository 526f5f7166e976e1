pub mod admin;
pub mod exec;
pub mod health;
pub mod jobs;
pub mod workers;
