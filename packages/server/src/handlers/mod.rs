pub mod health;
pub mod note;
