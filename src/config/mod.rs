mod settings;

pub use settings::{CodecKind, Settings};
