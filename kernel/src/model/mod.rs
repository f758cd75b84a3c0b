pub mod book;
pub mod id;
pub mod loan;
pub mod notification;
pub mod push;
pub mod user;
