//! Blob id assignment and the concurrent image compression pipeline.
//!
//! Ids are handed out on the conversion thread the moment a payload is
//! encountered, so the blob offset table can be sized and indexed before any
//! compression finishes. Canvas payloads are expensive to compress and go to
//! a bounded worker pool; audio payloads are cheap and are kept until the
//! writer emits them synchronously. Completion records carry their
//! pre-assigned id, so the writer can fill offset slots in whatever order the
//! workers finish.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, instrument};

use crate::compression;
use crate::error::{Error, Result};
use crate::tree::{Audio, Canvas};

struct CanvasJob {
    id: u32,
    canvas: Canvas,
}

/// A finished canvas compression, published by a worker
#[derive(Debug)]
pub struct BitmapResult {
    /// The blob id assigned at submission time
    pub id: u32,

    /// Pixel width
    pub width: u32,

    /// Pixel height
    pub height: u32,

    /// Length of the pixel data before compression
    pub raw_len: usize,

    /// The LZ4 block, truncated to its actual length
    pub compressed: Vec<u8>,
}

/// Producer/consumer pipeline for blob payloads
///
/// Submission and consumption happen on the conversion thread; only the
/// compression itself runs on the pool. Dropping the job sender via
/// [`BlobPipeline::close_submissions`] is what lets the workers exit.
pub struct BlobPipeline {
    next_id: u32,
    jobs: Option<Sender<CanvasJob>>,
    results: Receiver<Result<BitmapResult>>,
    workers: Vec<JoinHandle<()>>,
    pending_bitmaps: usize,
    audios: Vec<(u32, Audio)>,
}

impl BlobPipeline {
    /// Spawn a pool of `worker_count` compression workers
    pub fn new(worker_count: usize) -> Self {
        let (job_tx, job_rx) = unbounded::<CanvasJob>();
        let (result_tx, result_rx) = unbounded();

        let workers = (0..worker_count.max(1))
            .map(|i| {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                thread::Builder::new()
                    .name(format!("nx-blob-{i}"))
                    .spawn(move || {
                        while let Ok(job) = jobs.recv() {
                            let outcome = compress_canvas(job);
                            if results.send(outcome).is_err() {
                                return;
                            }
                        }
                    })
                    .expect("spawning a compression worker cannot fail")
            })
            .collect();

        Self {
            next_id: 1,
            jobs: Some(job_tx),
            results: result_rx,
            workers,
            pending_bitmaps: 0,
            audios: Vec::new(),
        }
    }

    /// Assign the next blob id and enqueue the canvas for compression
    ///
    /// Never blocks; the pixel data is copied so the tree stays untouched.
    pub fn submit_canvas(&mut self, canvas: &Canvas) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending_bitmaps += 1;
        self.jobs
            .as_ref()
            .expect("submissions are closed only after flattening")
            .send(CanvasJob {
                id,
                canvas: canvas.clone(),
            })
            .expect("workers outlive the submission phase");
        id
    }

    /// Assign the next blob id and keep the audio for synchronous encoding
    pub fn submit_audio(&mut self, audio: &Audio) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.audios.push((id, audio.clone()));
        id
    }

    /// Number of blob table entries, the reserved empty blob included
    pub fn blob_count(&self) -> u32 {
        self.next_id
    }

    /// Canvas submissions whose completion record has not been consumed yet
    pub fn pending_bitmaps(&self) -> usize {
        self.pending_bitmaps
    }

    /// Hand the queued audio payloads to the writer, in submission order
    pub fn take_audios(&mut self) -> Vec<(u32, Audio)> {
        std::mem::take(&mut self.audios)
    }

    /// Stop accepting submissions so the pool can drain and exit
    pub fn close_submissions(&mut self) {
        self.jobs.take();
    }

    /// Block until any worker publishes a completion record
    ///
    /// Must only be called while [`BlobPipeline::pending_bitmaps`] is nonzero.
    /// A codec failure or a dead worker is fatal to the conversion.
    #[instrument(skip(self), err)]
    pub fn recv_bitmap(&mut self) -> Result<BitmapResult> {
        debug_assert!(self.pending_bitmaps > 0);
        let result = self
            .results
            .recv()
            .map_err(|_| Error::WorkerDisconnected)??;
        self.pending_bitmaps -= 1;
        Ok(result)
    }

    /// Wait for the pool to exit
    ///
    /// Call after closing submissions and draining every pending bitmap.
    pub fn join(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for BlobPipeline {
    fn drop(&mut self) {
        self.jobs.take();
        self.join();
    }
}

fn compress_canvas(job: CanvasJob) -> Result<BitmapResult> {
    let raw_len = job.canvas.data.len();
    let compressed = compression::compress(&job.canvas.data)?;
    debug!(
        id = job.id,
        raw_len,
        compressed_len = compressed.len(),
        "canvas compressed"
    );
    Ok(BitmapResult {
        id: job.id,
        width: job.canvas.width,
        height: job.canvas.height,
        raw_len,
        compressed,
    })
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::BlobPipeline;
    use crate::error::Result;
    use crate::tree::{Audio, Canvas};

    fn canvas(side: u32, seed: u8) -> Canvas {
        let data = (0..side * side * 4).map(|i| (i as u8).wrapping_add(seed)).collect();
        Canvas::new(side, side, data)
    }

    #[test]
    fn ids_are_assigned_in_submission_order() {
        let mut pipeline = BlobPipeline::new(2);
        assert_eq!(pipeline.submit_canvas(&canvas(2, 0)), 1);
        assert_eq!(
            pipeline.submit_audio(&Audio {
                duration_ms: 100,
                header: vec![],
                data: vec![0xFF],
            }),
            2
        );
        assert_eq!(pipeline.submit_canvas(&canvas(2, 1)), 3);
        assert_eq!(pipeline.blob_count(), 4);
    }

    #[test]
    fn every_submission_publishes_exactly_once() -> Result<()> {
        let mut pipeline = BlobPipeline::new(4);
        let submitted: Vec<u32> = (0..16).map(|i| pipeline.submit_canvas(&canvas(8, i))).collect();
        pipeline.close_submissions();

        let mut seen = HashSet::new();
        while pipeline.pending_bitmaps() > 0 {
            let result = pipeline.recv_bitmap()?;
            assert_eq!(result.width, 8);
            assert!(seen.insert(result.id));
        }
        pipeline.join();

        assert_eq!(seen, submitted.into_iter().collect());
        Ok(())
    }

    #[test]
    fn results_carry_the_raw_length() -> Result<()> {
        let mut pipeline = BlobPipeline::new(1);
        pipeline.submit_canvas(&canvas(4, 0));
        pipeline.close_submissions();

        let result = pipeline.recv_bitmap()?;
        assert_eq!(result.raw_len, 4 * 4 * 4);
        Ok(())
    }
}
