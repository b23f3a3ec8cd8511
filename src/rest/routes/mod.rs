pub mod claims;
pub mod health;
pub mod objects;
pub mod scan;
pub mod users;
