mod sample;
mod source;

pub use sample::{Modality, SensorSample, SourceTag};
pub use source::{PushSource, SampleCallback, SignalSource, Subscription};
