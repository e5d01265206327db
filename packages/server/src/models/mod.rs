pub mod note;
pub mod shared;
