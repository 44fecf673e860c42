pub mod password;
pub mod privileges;
pub mod session;

pub use privileges::Privileges;
