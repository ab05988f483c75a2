pub mod user;
pub mod catalog;
pub mod order;
pub mod payment;

pub use user::*;
pub use catalog::*;
pub use order::*;
pub use payment::*;
