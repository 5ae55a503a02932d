pub mod email;
pub mod range;
