pub mod custom_fields;
pub mod email;
pub mod followups;
pub mod public;
pub mod queues;
pub mod tickets;
pub mod users;
