pub mod access;
pub mod auth;
pub mod catalog;
pub mod email;
pub mod otp;
pub mod password;

pub use access::{AccessService, Requirement};
pub use auth::AuthService;
pub use catalog::CatalogService;
pub use email::EmailService;
pub use otp::OtpService;
pub use password::PasswordService;
