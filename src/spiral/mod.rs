pub mod layout;
pub mod mapper;

pub use mapper::{map_frequency, map_note, ContinuousScale, NoteTuning, PitchPoint, RadiusMode};
