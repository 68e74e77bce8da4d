pub mod model;

pub use model::{Job, JobPatch, JobStatus, NewJob};
