//! # Voice Capture
//!
//! Two-state recorder (`Idle`, `Recording`) over an exclusive microphone
//! handle. The handle lives inside a [`MicrophoneGuard`] for the whole
//! recording, so it is released on every path out of `start_recording` and
//! `stop_recording`, including errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AppError, Result};

/// Source of an exclusive audio stream.
pub trait Microphone: Send + Sync {
    /// Fails with [`AppError::PermissionDenied`] when access is refused.
    fn acquire(&self) -> Result<Box<dyn AudioStream>>;
}

/// An acquired microphone handle.
pub trait AudioStream: Send + Sync {
    /// Starts capturing.
    fn begin(&mut self) -> Result<()>;
    /// Takes everything captured so far.
    fn drain(&mut self) -> Result<Vec<Vec<u8>>>;
    /// Gives the device back. Must be safe to call more than once.
    fn release(&mut self);
}

/// Owns a stream and releases it on drop.
pub struct MicrophoneGuard {
    stream: Box<dyn AudioStream>,
}

impl MicrophoneGuard {
    fn new(stream: Box<dyn AudioStream>) -> Self {
        Self { stream }
    }
}

impl Drop for MicrophoneGuard {
    fn drop(&mut self) {
        self.stream.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

pub struct VoiceRecorder<M: Microphone> {
    microphone: M,
    active: Option<MicrophoneGuard>,
}

impl<M: Microphone> VoiceRecorder<M> {
    pub fn new(microphone: M) -> Self {
        Self { microphone, active: None }
    }

    pub fn state(&self) -> RecorderState {
        if self.active.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// Calling this while already recording changes nothing.
    pub fn start_recording(&mut self) -> Result<RecorderState> {
        if self.active.is_some() {
            log::debug!("start_recording ignored: already recording");
            return Ok(RecorderState::Recording);
        }

        let mut guard = MicrophoneGuard::new(self.microphone.acquire()?);
        // an error here drops the guard and frees the device
        guard.stream.begin()?;
        self.active = Some(guard);
        Ok(RecorderState::Recording)
    }

    /// Returns the captured audio as base64, or `None` when nothing was
    /// recorded. The microphone is free again afterwards even if draining fails.
    pub fn stop_recording(&mut self) -> Result<Option<String>> {
        let Some(mut guard) = self.active.take() else {
            return Ok(None);
        };
        let drained = guard.stream.drain();
        drop(guard);

        let audio: Vec<u8> = drained?.concat();
        if audio.is_empty() {
            return Ok(None);
        }
        Ok(Some(STANDARD.encode(audio)))
    }
}

#[derive(Default)]
struct DeviceState {
    denied: AtomicBool,
    in_use: AtomicBool,
    capturing: AtomicBool,
    chunks: Mutex<Vec<Vec<u8>>>,
}

/// A microphone whose audio is pushed in from elsewhere, e.g. chunks
/// uploaded by a browser. Only one stream can hold it at a time.
#[derive(Clone, Default)]
pub struct BufferedMicrophone {
    device: Arc<DeviceState>,
}

impl BufferedMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses every later `acquire`, the way a platform permission prompt would.
    pub fn deny_access(&self) {
        self.device.denied.store(true, Ordering::SeqCst);
    }

    pub fn is_in_use(&self) -> bool {
        self.device.in_use.load(Ordering::SeqCst)
    }

    /// Appends a chunk to the active capture. Empty chunks and chunks
    /// arriving while nothing is capturing are dropped; returns whether the
    /// chunk was kept.
    pub fn feed(&self, chunk: &[u8]) -> bool {
        if chunk.is_empty() || !self.device.capturing.load(Ordering::SeqCst) {
            return false;
        }
        match self.device.chunks.lock() {
            Ok(mut chunks) => {
                chunks.push(chunk.to_vec());
                true
            }
            Err(_) => false,
        }
    }
}

impl Microphone for BufferedMicrophone {
    fn acquire(&self) -> Result<Box<dyn AudioStream>> {
        if self.device.denied.load(Ordering::SeqCst) {
            return Err(AppError::PermissionDenied("microphone access denied".into()));
        }
        if self
            .device
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::PermissionDenied("microphone is busy".into()));
        }
        Ok(Box::new(BufferedStream {
            device: Arc::clone(&self.device),
            released: false,
        }))
    }
}

struct BufferedStream {
    device: Arc<DeviceState>,
    released: bool,
}

impl AudioStream for BufferedStream {
    fn begin(&mut self) -> Result<()> {
        let mut chunks = self
            .device
            .chunks
            .lock()
            .map_err(|_| AppError::Backend("audio buffer poisoned".into()))?;
        chunks.clear();
        self.device.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<Vec<u8>>> {
        self.device.capturing.store(false, Ordering::SeqCst);
        let mut chunks = self
            .device
            .chunks
            .lock()
            .map_err(|_| AppError::Backend("audio buffer poisoned".into()))?;
        Ok(std::mem::take(&mut *chunks))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.capturing.store(false, Ordering::SeqCst);
        self.device.in_use.store(false, Ordering::SeqCst);
    }
}
