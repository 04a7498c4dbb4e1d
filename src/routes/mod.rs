pub mod analyses;
pub mod chat;
pub mod health;
pub mod locations;
