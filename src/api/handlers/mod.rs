pub mod payments;
pub mod root;
