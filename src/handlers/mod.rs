pub mod admin;
pub mod courses;
pub mod health;
pub mod login;
pub mod profile;
pub mod register;
pub mod two_factor;

pub use admin::{demote_user, list_users, promote_user, update_user_status};
pub use courses::{complete_task, get_course, get_progress, list_courses};
pub use health::health_check;
pub use login::{login, login_otp};
pub use profile::{get_profile, update_profile};
pub use register::register;
pub use two_factor::{confirm_2fa, enable_2fa};
