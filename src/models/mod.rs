pub mod custom_field;
pub mod document;
pub mod email;
pub mod followup;
pub mod queue;
pub mod response;
pub mod ticket;
pub mod user;
pub mod webhook;
