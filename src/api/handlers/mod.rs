pub mod auth;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod root;
