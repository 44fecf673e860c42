pub mod auth;
pub mod home;
pub mod legacy;
pub mod users;
