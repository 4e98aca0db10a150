pub mod distance;
pub mod donation;
pub mod verification;
