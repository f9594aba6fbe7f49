//! Background worker shared by the landmark detectors
//!
//! Frames go in through a std channel, packets come out through another one.
//! Dropping the input sender ends the worker, which in turn ends the poller.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use contracts::{ContractError, Frame, LandmarkPacket, LandmarkPoller};
use tracing::debug;

/// Poller over the worker's output channel
pub struct ChannelPoller {
    rx: Receiver<LandmarkPacket>,
}

impl LandmarkPoller for ChannelPoller {
    fn poll_next(&mut self) -> Option<LandmarkPacket> {
        self.rx.recv().ok()
    }
}

pub(crate) struct DetectorWorker {
    name: String,
    input: Option<Sender<(Frame, u64)>>,
    handle: Option<JoinHandle<u64>>,
}

impl DetectorWorker {
    /// Spawn the worker thread; `produce` runs once per submitted frame
    pub(crate) fn spawn<F>(name: &str, mut produce: F) -> Result<(Self, ChannelPoller), ContractError>
    where
        F: FnMut(Frame, u64) -> Option<LandmarkPacket> + Send + 'static,
    {
        let (input_tx, input_rx) = mpsc::channel::<(Frame, u64)>();
        let (output_tx, output_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name(format!("{name}-worker"))
            .spawn(move || {
                let mut emitted = 0u64;
                for (frame, timestamp) in input_rx {
                    if let Some(packet) = produce(frame, timestamp) {
                        if output_tx.send(packet).is_err() {
                            break;
                        }
                        emitted += 1;
                    }
                }
                emitted
            })
            .map_err(|e| ContractError::initialization(name, e.to_string()))?;

        Ok((
            Self {
                name: name.to_string(),
                input: Some(input_tx),
                handle: Some(handle),
            },
            ChannelPoller { rx: output_rx },
        ))
    }

    pub(crate) fn submit(&self, frame: &Frame, timestamp: u64) -> Result<(), ContractError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| ContractError::detector_submit(timestamp, "input closed"))?;
        input
            .send((frame.clone(), timestamp))
            .map_err(|_| ContractError::detector_submit(timestamp, "worker is gone"))
    }

    pub(crate) fn close(&mut self) {
        self.input.take();
    }

    pub(crate) fn join(&mut self) -> Result<(), ContractError> {
        self.close();
        match self.handle.take() {
            Some(handle) => {
                let emitted = handle.join().map_err(|_| {
                    ContractError::detector_shutdown(format!("{} worker panicked", self.name))
                })?;
                debug!(detector = %self.name, emitted, "Detector worker finished");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
