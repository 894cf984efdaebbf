//! Background job domain entities.

pub mod model;
pub mod payload;
pub mod state;

pub use model::Job;
pub use payload::UploadDescriptor;
pub use state::JobState;
