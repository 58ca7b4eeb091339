pub mod payments;
pub mod plans;
pub mod root;
