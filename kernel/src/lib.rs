pub mod model;
pub mod push;
pub mod repository;
pub mod service;
