pub mod confirmation;
pub mod pending;
pub mod push;
