pub mod captions;
pub mod controller;
pub mod feedback;

pub use captions::CaptionSpeaker;
pub use controller::HearingSimulator;
pub use feedback::{FeedbackScheduler, VolumeCell};
