//! Video Test Fixture Generator
//!
//! Writes placeholder video files; the client never decodes them.

use dfd_client::VideoFile;
use std::path::Path;

/// Write `size` bytes to `dir/name` and return the staged-file metadata
pub fn write_video(dir: &Path, name: &str, size: usize) -> VideoFile {
    let path = dir.join(name);
    let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, bytes).unwrap();
    VideoFile::new(path, size as u64)
}

/// Well-formed analysis response for a fake verdict
pub const FAKE_RESPONSE: &str = r#"{
    "prediction": "fake",
    "confidence": 87.5,
    "justification": "Facial landmarks jitter between frames",
    "frames": ["/static/frames/frame_0.jpg", "/static/frames/frame_1.jpg"],
    "frame_probs": [[0.2, 0.8], [0.1, 0.9]]
}"#;

/// Well-formed analysis response for a real verdict with textual confidence
pub const REAL_RESPONSE: &str = r#"{
    "prediction": "Real",
    "confidence": "92.3%",
    "justification": "Consistent lighting and motion"
}"#;
