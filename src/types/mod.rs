pub mod events;
pub mod ids;
pub mod record;

pub use events::JobEvent;
pub use ids::JobId;
pub use record::{JobRecord, JobState};
