//! The butler thread: services transport work (seeks, overwrites) and keeps
//! every registered reader's rings topped up.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use ostinato_core::SamplePos;

use crate::error::{Error, Result};
use crate::reader::{DiskReader, Refill, RefillScratch};

/// How long the butler sleeps between demand polls when no request
/// arrives.
const IDLE_POLL: Duration = Duration::from_millis(10);

pub enum ButlerRequest {
    AddReader(Arc<DiskReader>),
    RemoveReader(Arc<str>),
    /// Relocate every reader, then announce completion.
    Seek {
        target: SamplePos,
        complete_refill: bool,
    },
    /// Rewrite the rings of every reader with a pending overwrite, then
    /// announce completion.
    Overwrite,
    /// Wake up and run a refill pass now.
    Summon,
    Shutdown,
}

/// Completion notices for the transport side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButlerNotice {
    TransportWorkDone,
}

/// Handle owning the butler thread.
pub struct Butler {
    request_tx: Sender<ButlerRequest>,
    notice_rx: Receiver<ButlerNotice>,
    handle: Option<JoinHandle<()>>,
}

impl Butler {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = unbounded();
        let (notice_tx, notice_rx) = bounded(16);

        let handle = thread::Builder::new()
            .name("ostinato-butler".into())
            .spawn(move || butler_loop(request_rx, notice_tx))
            .expect("failed to spawn butler thread");

        Self {
            request_tx,
            notice_rx,
            handle: Some(handle),
        }
    }

    pub fn add_reader(&self, reader: Arc<DiskReader>) -> Result<()> {
        self.send(ButlerRequest::AddReader(reader))
    }

    pub fn remove_reader(&self, name: &Arc<str>) -> Result<()> {
        self.send(ButlerRequest::RemoveReader(Arc::clone(name)))
    }

    /// Ask for a coordinated seek; completion arrives on [`Self::notices`].
    pub fn seek(&self, target: SamplePos, complete_refill: bool) -> Result<()> {
        self.send(ButlerRequest::Seek {
            target,
            complete_refill,
        })
    }

    /// Ask for pending overwrites to be serviced; completion arrives on
    /// [`Self::notices`].
    pub fn overwrite(&self) -> Result<()> {
        self.send(ButlerRequest::Overwrite)
    }

    /// Wake the butler for a refill pass (cheap; called after observing a
    /// reader's butler demand).
    pub fn summon(&self) -> Result<()> {
        self.send(ButlerRequest::Summon)
    }

    pub fn notices(&self) -> &Receiver<ButlerNotice> {
        &self.notice_rx
    }

    fn send(&self, req: ButlerRequest) -> Result<()> {
        self.request_tx
            .send(req)
            .map_err(|_| Error::ButlerUnavailable)
    }

    pub fn stop(&mut self) {
        let _ = self.request_tx.send(ButlerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Butler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn butler_loop(request_rx: Receiver<ButlerRequest>, notice_tx: Sender<ButlerNotice>) {
    let mut readers: Vec<Arc<DiskReader>> = Vec::new();
    let mut scratch = RefillScratch::new();

    debug!("butler running");

    'outer: loop {
        // Block until there is a request or it is time to poll demand.
        let first = match request_rx.recv_timeout(IDLE_POLL) {
            Ok(req) => Some(req),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Drain the queue in one batch before doing any I/O.
        let mut batch: Vec<ButlerRequest> = first.into_iter().collect();
        batch.extend(request_rx.try_iter());

        for req in batch {
            match req {
                ButlerRequest::AddReader(reader) => {
                    readers.retain(|r| r.name() != reader.name());
                    readers.push(reader);
                }
                ButlerRequest::RemoveReader(name) => {
                    readers.retain(|r| r.name() != &name);
                }
                ButlerRequest::Seek {
                    target,
                    complete_refill,
                } => {
                    for reader in &readers {
                        if let Err(e) = reader.seek(target, complete_refill, &mut scratch) {
                            error!(track = %reader.name(), error = %e, "seek failed");
                        }
                    }
                    let _ = notice_tx.send(ButlerNotice::TransportWorkDone);
                }
                ButlerRequest::Overwrite => {
                    service_overwrites(&readers);
                    let _ = notice_tx.send(ButlerNotice::TransportWorkDone);
                }
                ButlerRequest::Summon => {}
                ButlerRequest::Shutdown => break 'outer,
            }
        }

        // Demand-driven work: overwrites flagged by the RT side, then
        // refills for every reader asking.
        service_overwrites(&readers);

        for reader in &readers {
            if !reader.need_butler() {
                continue;
            }
            loop {
                match reader.refill(&mut scratch, 0) {
                    Ok(Refill::MoreWork) => continue,
                    Ok(Refill::Done) => break,
                    Err(e) => {
                        // Leave the ring as it is; the reader will drain
                        // and underrun if this persists.
                        error!(track = %reader.name(), error = %e, "refill failed");
                        break;
                    }
                }
            }
        }
    }

    debug!("butler finished");
}

fn service_overwrites(readers: &[Arc<DiskReader>]) {
    for reader in readers {
        if reader.pending_overwrite() {
            if let Err(e) = reader.overwrite_existing_buffers() {
                error!(track = %reader.name(), error = %e, "overwrite failed");
            }
        }
    }
}
