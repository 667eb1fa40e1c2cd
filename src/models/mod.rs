pub mod file;
pub mod user;
pub mod workspace;

pub use file::*;
pub use user::*;
pub use workspace::*;
