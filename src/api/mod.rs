pub mod elevenlabs;
pub mod google_tts;
