pub mod affirm;
pub mod health;
