pub mod booking;
pub mod catalog;
pub mod payment;
pub mod user;

pub use booking::*;
pub use catalog::*;
pub use payment::*;
pub use user::*;
