pub mod course;
pub mod progress;
pub mod user;

pub use course::CourseRepository;
pub use progress::ProgressRepository;
pub use user::UserRepository;
