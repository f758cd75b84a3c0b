pub mod connectivity;
pub mod error;
pub mod intake;
pub mod model;
pub mod payload;
pub mod scheduler;
pub mod submitter;
