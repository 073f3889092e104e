pub mod error;
pub mod instance;
pub mod member;
pub mod value;
