pub mod model;

pub use model::{Registration, User};
