//! Offline render pipeline
//!
//! Runs a source buffer through an effect chain block by block and
//! optionally writes the result as a WAV file. Block processing is
//! bit-identical to a single pass over the whole buffer, so the block size
//! only bounds how often cancellation is checked.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::buffer::SampleBuffer;
use super::io::write_wav_file;
use crate::dsp::EffectChain;
use crate::error::{AuraError, Result};

/// Shared flag used to abort a running render
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation so the token can be reused
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Summary of a finished export
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub preset: String,
    pub output: PathBuf,
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: usize,
    pub bit_depth: u16,
    pub peak_db: f64,
    pub bytes: usize,
    /// Hex SHA-256 of the written file
    pub sha256: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Block-wise offline renderer
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    block_size: usize,
    cancel: CancelToken,
}

impl RenderPipeline {
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(AuraError::InvalidConfig {
                reason: "render block size must be at least one frame".to_string(),
            });
        }
        Ok(Self {
            block_size,
            cancel: CancelToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Process a copy of `source` through `chain`
    ///
    /// The chain is reset and prepared for the source format first. On
    /// cancellation the partial output is dropped and the chain is reset.
    /// A cancelled token stays cancelled until [`CancelToken::reset`].
    pub fn render(&self, source: &SampleBuffer, chain: &mut EffectChain) -> Result<SampleBuffer> {
        self.render_with_progress(source, chain, |_, _| {})
    }

    /// [`render`](Self::render), calling `progress(frames_done, total)`
    /// after every block
    pub fn render_with_progress(
        &self,
        source: &SampleBuffer,
        chain: &mut EffectChain,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<SampleBuffer> {
        let started = Instant::now();
        chain.prepare(source.sample_rate(), source.channels());
        chain.reset();

        let channels = source.channels();
        let total = source.num_frames();
        let mut output = source.clone();

        for (index, block) in output
            .samples_mut()
            .chunks_mut(self.block_size * channels)
            .enumerate()
        {
            let frames_done = index * self.block_size;
            if self.cancel.is_cancelled() {
                chain.reset();
                debug!(frames_done, total, "render cancelled");
                return Err(AuraError::Cancelled { frames_done });
            }
            let mut chunk =
                SampleBuffer::from_interleaved(block.to_vec(), channels, source.sample_rate())?;
            chain.process(&mut chunk);
            block.copy_from_slice(chunk.samples());
            progress(frames_done + chunk.num_frames(), total);
        }

        info!(
            preset = %chain.name(),
            frames = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "render complete"
        );
        Ok(output)
    }

    /// Render and write the result as integer PCM WAV
    pub fn render_to_file(
        &self,
        source: &SampleBuffer,
        chain: &mut EffectChain,
        path: &Path,
        bit_depth: u16,
    ) -> Result<RenderReport> {
        let started_at = Utc::now();
        let rendered = self.render(source, chain)?;
        let bytes = write_wav_file(path, &rendered, bit_depth)?;
        let report = RenderReport {
            preset: chain.name().to_string(),
            output: path.to_path_buf(),
            frames: rendered.num_frames(),
            sample_rate: rendered.sample_rate(),
            channels: rendered.channels(),
            bit_depth,
            peak_db: rendered.peak_db(),
            bytes: bytes.len(),
            sha256: format!("{:x}", Sha256::digest(&bytes)),
            started_at,
            finished_at: Utc::now(),
        };
        info!(path = %path.display(), bytes = report.bytes, "export written");
        Ok(report)
    }
}

/// Render with a fresh pipeline of the given block size
pub fn render_to_file(
    source: &SampleBuffer,
    chain: &mut EffectChain,
    path: &Path,
    bit_depth: u16,
    block_size: usize,
) -> Result<RenderReport> {
    RenderPipeline::new(block_size)?.render_to_file(source, chain, path, bit_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{PresetDescriptor, StageDescriptor};
    use crate::engine::io::read_wav_file;
    use test_case::test_case;

    fn chain() -> EffectChain {
        EffectChain::build(
            &PresetDescriptor::new("test")
                .with_stage(StageDescriptor::new("compressor").with("threshold_db", -20.0))
                .with_stage(StageDescriptor::new("reverb"))
                .with_stage(StageDescriptor::new("limiter")),
        )
        .unwrap()
    }

    #[test_case(1 ; "single frame blocks")]
    #[test_case(64 ; "small blocks")]
    #[test_case(1000 ; "uneven blocks")]
    fn test_block_size_does_not_change_output(block_size: usize) {
        let source = SampleBuffer::stereo_sine(220.0, 330.0, 0.8, 4410, 44100);
        let whole = RenderPipeline::new(source.num_frames())
            .unwrap()
            .render(&source, &mut chain())
            .unwrap();
        let blocked = RenderPipeline::new(block_size)
            .unwrap()
            .render(&source, &mut chain())
            .unwrap();
        assert_eq!(whole.samples(), blocked.samples());
    }

    #[test]
    fn test_source_not_mutated() {
        let source = SampleBuffer::sine(440.0, 0.5, 1000, 44100);
        let before = source.clone();
        let rendered = RenderPipeline::new(128)
            .unwrap()
            .render(&source, &mut chain())
            .unwrap();
        assert_eq!(source, before);
        assert_ne!(rendered.samples(), source.samples());
    }

    #[test]
    fn test_cancelled_render() {
        let token = CancelToken::new();
        let pipeline = RenderPipeline::new(256).unwrap().with_cancel(token.clone());
        token.cancel();
        let err = pipeline
            .render(&SampleBuffer::sine(440.0, 0.5, 1000, 44100), &mut chain())
            .unwrap_err();
        assert!(matches!(err, AuraError::Cancelled { frames_done: 0 }));
    }

    #[test]
    fn test_cancel_mid_render_then_reuse() {
        let source = SampleBuffer::stereo_sine(220.0, 330.0, 0.8, 1000, 44100);
        let pipeline = RenderPipeline::new(100).unwrap();
        let token = pipeline.cancel_token();
        let mut effects = chain();

        let mut seen = Vec::new();
        let err = pipeline
            .render_with_progress(&source, &mut effects, |done, total| {
                seen.push(done);
                assert_eq!(total, 1000);
                if done >= 300 {
                    token.cancel();
                }
            })
            .unwrap_err();
        assert!(matches!(err, AuraError::Cancelled { frames_done: 300 }));
        assert_eq!(seen, vec![100, 200, 300]);

        // Still cancelled until cleared
        assert!(pipeline.render(&source, &mut effects).is_err());
        token.reset();
        let rendered = pipeline.render(&source, &mut effects).unwrap();
        let fresh = RenderPipeline::new(100)
            .unwrap()
            .render(&source, &mut chain())
            .unwrap();
        assert_eq!(rendered.samples(), fresh.samples());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let source = SampleBuffer::stereo_sine(220.0, 330.0, 0.8, 44100, 44100);
        let pipeline = RenderPipeline::new(64).unwrap();
        let token = pipeline.cancel_token();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

        let canceller = std::thread::spawn(move || {
            started_rx.recv().unwrap();
            token.cancel();
            go_tx.send(()).unwrap();
        });
        let mut first = true;
        let err = pipeline
            .render_with_progress(&source, &mut chain(), |_, _| {
                if first {
                    first = false;
                    started_tx.send(()).unwrap();
                    go_rx.recv().unwrap();
                }
            })
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, AuraError::Cancelled { frames_done: 64 }));
    }

    #[test]
    fn test_zero_block_size_rejected() {
        assert!(RenderPipeline::new(0).is_err());
    }

    #[test]
    fn test_render_to_file_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let source = SampleBuffer::sine(440.0, 0.5, 4410, 44100);
        let report = render_to_file(&source, &mut chain(), &path, 16, 512).unwrap();

        assert_eq!(report.preset, "test");
        assert_eq!(report.frames, 4410);
        assert_eq!(report.channels, 1);
        assert_eq!(report.bytes, std::fs::metadata(&path).unwrap().len() as usize);
        assert_eq!(report.sha256.len(), 64);
        assert!(report.finished_at >= report.started_at);

        let written = read_wav_file(&path).unwrap();
        assert_eq!(written.num_frames(), 4410);
    }
}
