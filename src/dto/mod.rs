pub mod health;
pub mod peripheral;
pub mod ws;
