//! # Upload Management Module
//!
//! Moves network delivery off the sampling thread.
//!
//! ## Key Components
//! - `UploadManager`: owns the blocking reporter and drains the command queue
//! - `UploadCommand`: commands sent from the tick loop to the upload thread
//! - `QueuedReporter`: the `Reporter` the tick loop sees; sending only enqueues
//!
//! ## Why
//! An HTTP exchange can take up to the full inactivity timeout. Sampling runs
//! every few milliseconds, so the exchange must never run on that thread.
//! The queue is bounded: when the uploader falls behind, new readings are
//! dropped rather than piling up, and the next interval sends a fresh one.

use crate::error::ReportError;
use crate::reporter::{Delivery, Reporter};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCommand {
    Report(u32),
}

/// Runs a reporter on a dedicated thread.
pub struct UploadManager {
    command_receiver: Receiver<UploadCommand>,
    reporter: Box<dyn Reporter + Send>,
}

impl UploadManager {
    /// Creates a new UploadManager.
    ///
    /// Returns the manager and a sender holding at most `capacity` pending
    /// readings.
    pub fn new(
        reporter: Box<dyn Reporter + Send>,
        capacity: usize,
    ) -> (Self, Sender<UploadCommand>) {
        let (command_sender, command_receiver) = bounded(capacity.max(1));

        let manager = UploadManager {
            command_receiver,
            reporter,
        };

        (manager, command_sender)
    }

    /// Runs the upload loop.
    ///
    /// This should be called in a spawned thread. It will block until the command
    /// channel is closed.
    pub fn run(mut self) {
        while let Ok(command) = self.command_receiver.recv() {
            match command {
                UploadCommand::Report(bpm) => match self.reporter.send(bpm) {
                    Ok(delivery) => log::debug!("Uploader: {} BPM delivered ({:?})", bpm, delivery),
                    Err(e) => log::warn!("Uploader: {} BPM not delivered: {}", bpm, e),
                },
            }
        }

        log::info!("Uploader: command channel closed, shutting down");
    }
}

/// `Reporter` that hands readings to an `UploadManager` thread
pub struct QueuedReporter {
    sender: Option<Sender<UploadCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedReporter {
    pub fn spawn(reporter: Box<dyn Reporter + Send>, capacity: usize) -> Result<Self, ReportError> {
        let (manager, sender) = UploadManager::new(reporter, capacity);
        let worker = thread::Builder::new()
            .name("uploader".to_string())
            .spawn(move || manager.run())
            .map_err(|e| ReportError::Runtime(e.to_string()))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl Reporter for QueuedReporter {
    fn send(&mut self, bpm: u32) -> Result<Delivery, ReportError> {
        let sender = self.sender.as_ref().ok_or(ReportError::WorkerGone)?;
        match sender.try_send(UploadCommand::Report(bpm)) {
            Ok(()) => Ok(Delivery::Queued),
            Err(TrySendError::Full(_)) => Err(ReportError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(ReportError::WorkerGone),
        }
    }
}

impl Drop for QueuedReporter {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish what is queued and exit
        self.sender = None;

        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
