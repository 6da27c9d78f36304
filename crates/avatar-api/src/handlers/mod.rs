pub mod avatar;
pub mod health;
