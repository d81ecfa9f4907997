pub mod entities;
pub mod repository;
pub mod services;
pub mod single_use;
pub mod value_objects;
