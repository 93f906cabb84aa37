// Business logic service implementations

pub mod health;
