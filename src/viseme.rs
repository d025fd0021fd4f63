//! Facial animation ("viseme") timeline engine

mod engine;
mod timeline;

pub use engine::{CloseStep, VisemeEngine};
pub use timeline::{Pose, VisemeFrame, VisemeTimeline};
