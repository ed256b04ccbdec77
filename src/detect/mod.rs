mod backend;
mod backends;
pub mod decode;
mod yolo;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use yolo::{read_data_yaml, YoloDetector, DEFAULT_CLASS_NAMES};
