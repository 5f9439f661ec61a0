use crate::common::Result;
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

pub type Frame = DynamicImage;

/// Where the orchestrators get frames from. Must not block: `None` just
/// means no frame has arrived yet.
pub trait FrameSource {
    fn current_frame(&self) -> Option<Frame>;
}

impl<T: FrameSource + ?Sized> FrameSource for Arc<T> {
    fn current_frame(&self) -> Option<Frame> {
        (**self).current_frame()
    }
}

/// Latest-frame slot fed by a capture thread. Preview subscribers get every
/// published frame; the authentication loop only ever reads the latest one.
#[derive(Default)]
pub struct SharedFrameSource {
    latest: Mutex<Option<Frame>>,
    preview: Mutex<Vec<Sender<Frame>>>,
}

impl SharedFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        if let Ok(mut preview) = self.preview.lock() {
            preview.retain(|tx| tx.send(frame.clone()).is_ok());
        }
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(frame);
        }
    }

    pub fn subscribe_preview(&self) -> Receiver<Frame> {
        let (tx, rx) = channel();
        if let Ok(mut preview) = self.preview.lock() {
            preview.push(tx);
        }
        rx
    }

    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }
}

impl FrameSource for SharedFrameSource {
    fn current_frame(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }
}

/// Replays image files from a directory in name order, wrapping around.
/// Stands in for a camera when driving the CLI from recorded frames.
pub struct DirectoryFrameSource {
    files: Vec<PathBuf>,
    next: Mutex<usize>,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png" | "bmp"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        tracing::debug!("Frame directory {:?} has {} image(s)", dir, files.len());
        Ok(Self { files, next: Mutex::new(0) })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn current_frame(&self) -> Option<Frame> {
        if self.files.is_empty() {
            return None;
        }
        let mut next = self.next.lock().ok()?;
        let path = &self.files[*next % self.files.len()];
        *next = next.wrapping_add(1);

        match image::open(path) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Skipping unreadable frame {:?}: {}", path, e);
                None
            }
        }
    }
}
