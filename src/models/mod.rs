pub mod course;
pub mod progress;
pub mod user;

pub use course::{Course, Task};
pub use progress::UserProgress;
pub use user::{NewUser, OtpChallenge, ProfileUpdate, User, UserProfile};
