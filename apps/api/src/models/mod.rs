pub mod feedback;
pub mod fs;
pub mod resume;
pub mod user;
