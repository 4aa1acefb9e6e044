pub mod health;
pub mod similarity;
pub mod upload;
