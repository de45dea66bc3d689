//! Static binary asset backend.
//!
//! Serves one file from disk with a caller-declared content type. The
//! file is read in bounded chunks, one per scheduler tick, so a large
//! asset never monopolizes the thread. Sizes are 64-bit throughout.

use crate::{
    backend::backend::{Backend, BackendOutput, Progress},
    errors::BackendError,
};
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

// Bytes consumed from the file per work step.
const CHUNK_BYTES: usize = 64 * 1024;

/// Backend streaming one file into a response body.
pub(crate) struct StaticAsset {
    phase: Phase,
    content_type: Cow<'static, str>,
    output: Option<BackendOutput>,
}

enum Phase {
    Open(PathBuf),
    Read {
        file: File,
        expected: u64,
        body: Vec<u8>,
    },
    Done,
}

impl StaticAsset {
    pub(crate) fn new(path: impl Into<PathBuf>, content_type: impl Into<Cow<'static, str>>) -> Self {
        Self {
            phase: Phase::Open(path.into()),
            content_type: content_type.into(),
            output: None,
        }
    }

    fn open(&mut self, path: PathBuf) -> Result<Progress, BackendError> {
        let file = File::open(&path)?;
        let expected = file.metadata()?.len();

        self.phase = Phase::Read {
            file,
            expected,
            body: Vec::with_capacity(expected as usize),
        };
        Ok(Progress::Pending)
    }

    fn read_chunk(
        &mut self,
        mut file: File,
        expected: u64,
        mut body: Vec<u8>,
    ) -> Result<Progress, BackendError> {
        let mut chunk = [0u8; CHUNK_BYTES];
        let n = file.read(&mut chunk)?;

        if n == 0 {
            if body.len() as u64 != expected {
                log::debug!(
                    "asset changed size mid-read: stat said {}, got {}",
                    expected,
                    body.len()
                );
            }
            self.output = Some(BackendOutput::ok(self.content_type.clone(), body));
            return Ok(Progress::Done);
        }

        body.extend_from_slice(&chunk[..n]);
        self.phase = Phase::Read {
            file,
            expected,
            body,
        };
        Ok(Progress::Pending)
    }
}

impl Backend for StaticAsset {
    fn work(&mut self) -> Result<Progress, BackendError> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Open(path) => self.open(path),
            Phase::Read {
                file,
                expected,
                body,
            } => self.read_chunk(file, expected, body),
            Phase::Done => Ok(Progress::Done),
        }
    }

    fn take_output(&mut self) -> Option<BackendOutput> {
        self.output.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::StatusCode;
    use std::fs;

    fn temp_file(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "weathervane-asset-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, content).unwrap();
        path
    }

    fn drive(asset: &mut StaticAsset) -> BackendOutput {
        for _ in 0..1000 {
            match asset.work().unwrap() {
                Progress::Pending => {}
                Progress::Done => return asset.take_output().unwrap(),
            }
        }
        panic!("asset never completed");
    }

    #[test]
    fn small_file_round_trips() {
        let path = temp_file("small.png", b"\x89PNG fake payload");
        let mut asset = StaticAsset::new(&path, "image/png");

        let output = drive(&mut asset);
        assert_eq!(output.status, StatusCode::Ok);
        assert_eq!(output.content_type, "image/png");
        assert_eq!(output.body, b"\x89PNG fake payload");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn large_file_spans_multiple_steps() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let path = temp_file("large.bin", &payload);
        let mut asset = StaticAsset::new(&path, "application/octet-stream");

        // Open step, then at least four 64 KiB chunks.
        let mut steps = 0;
        let output = loop {
            steps += 1;
            match asset.work().unwrap() {
                Progress::Pending => {}
                Progress::Done => break asset.take_output().unwrap(),
            }
        };

        assert!(steps > 4, "expected chunked reads, saw {} steps", steps);
        assert_eq!(output.body, payload);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut asset = StaticAsset::new("/definitely/not/here.png", "image/png");

        assert!(matches!(asset.work().unwrap_err(), BackendError::Io(_)));
        assert!(asset.take_output().is_none());
    }

    #[test]
    fn output_taken_at_most_once() {
        let path = temp_file("once.bin", b"x");
        let mut asset = StaticAsset::new(&path, "application/octet-stream");

        drive(&mut asset);
        assert!(asset.take_output().is_none());

        let _ = fs::remove_file(path);
    }
}
