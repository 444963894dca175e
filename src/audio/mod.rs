pub mod loader;

pub use loader::{load_audio, load_audio_sync, AudioData};
