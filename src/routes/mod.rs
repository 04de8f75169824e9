pub mod agenda;
pub mod clients;
pub mod dashboard;
pub mod events;
pub mod messages;
pub mod profile;
pub mod public;
pub mod reports;
pub mod services;
