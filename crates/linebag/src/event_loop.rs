use crate::control::{Control, ControlSource};
use crate::poll::{Interest, Poller, Readiness};
use crate::ring::{Drain, Ingest, RingBuffer};
use crate::BagError;
use std::io::{self, Read, Write};
use tracing::{debug, info, trace};

/// How the event loop ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The producer reached end-of-stream and every buffered byte was written.
    Drained,
    /// The consumer went away.
    ConsumerHangup,
    /// A termination signal arrived; buffered data was discarded.
    Terminated {
        /// Signal number that requested termination.
        signo: i32,
    },
}

impl Outcome {
    /// Process exit status for this outcome.
    ///
    /// Draining and consumer hangup are successes. Termination follows the
    /// shell convention of `128 + signo`, which keeps it apart from both
    /// success and the status 1 used for errors.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Drained | Self::ConsumerHangup => 0,
            Self::Terminated { signo } => 128u8.saturating_add(signo as u8),
        }
    }
}

/// Mutable loop state carried between readiness cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    /// Output is held back until a resume request.
    pub paused: bool,
    /// The producer reached end-of-stream.
    pub producer_closed: bool,
    /// Streams the next wait should watch.
    pub interest: Interest,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            paused: false,
            producer_closed: false,
            // The ring starts empty: nothing to write yet
            interest: Interest {
                producer: true,
                consumer: false,
            },
        }
    }
}

/// Moves bytes from `producer` through the ring to `consumer`.
///
/// The loop is the only owner of the ring and of every source; it is driven
/// one readiness cycle at a time by [`dispatch`](Self::dispatch), or until an
/// [`Outcome`] by [`run`](Self::run). Within a cycle the control source is
/// handled first, then the producer, then the consumer.
#[derive(Debug)]
pub struct EventLoop<C, R, W> {
    ring: RingBuffer,
    state: LoopState,
    control: C,
    producer: R,
    consumer: W,
}

impl<C, R, W> EventLoop<C, R, W>
where
    C: ControlSource,
    R: Read,
    W: Write,
{
    pub fn new(ring: RingBuffer, control: C, producer: R, consumer: W) -> Self {
        Self {
            ring,
            state: LoopState::default(),
            control,
            producer,
            consumer,
        }
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[inline]
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn producer_mut(&mut self) -> &mut R {
        &mut self.producer
    }

    pub fn consumer(&self) -> &W {
        &self.consumer
    }

    /// Takes the loop apart, handing back the ring and the sources.
    pub fn into_parts(self) -> (RingBuffer, C, R, W) {
        (self.ring, self.control, self.producer, self.consumer)
    }

    /// Waits on `poller` and dispatches until the loop ends.
    pub fn run<P: Poller>(&mut self, mut poller: P) -> Result<Outcome, BagError> {
        debug!(
            slots = self.ring.slots(),
            slot_capacity = self.ring.slot_capacity(),
            "event loop started"
        );
        loop {
            let ready = poller.wait(self.state.interest).map_err(BagError::Poll)?;
            if let Some(outcome) = self.dispatch(ready)? {
                return Ok(outcome);
            }
        }
    }

    /// Handles one readiness cycle.
    ///
    /// Events on a stream the loop is not currently interested in are
    /// ignored. Returns `Some` once the loop must stop.
    pub fn dispatch(&mut self, ready: Readiness) -> Result<Option<Outcome>, BagError> {
        if ready.control {
            if let Some(outcome) = self.on_control()? {
                return Ok(Some(outcome));
            }
        }

        if self.state.interest.producer && (ready.producer_readable || ready.producer_hangup) {
            self.on_producer(ready)?;
        }

        if self.state.interest.consumer && ready.consumer_writable {
            if let Some(outcome) = self.on_consumer()? {
                return Ok(Some(outcome));
            }
        }

        if ready.consumer_hangup {
            info!("output hangup");
            return Ok(Some(Outcome::ConsumerHangup));
        }

        Ok(None)
    }

    // ---------------------------------------------------------------------
    // HANDLERS
    // ---------------------------------------------------------------------

    fn on_control(&mut self) -> Result<Option<Outcome>, BagError> {
        match self.control.recv().map_err(BagError::ControlSource)? {
            Control::Terminate { signo } => {
                info!(signo, "exiting");
                return Ok(Some(Outcome::Terminated { signo }));
            }
            Control::Pause => {
                info!("pausing output");
                self.state.paused = true;
                if let Some(metrics) = self.ring.metrics_mut() {
                    metrics.pauses += 1;
                }
            }
            Control::Resume => {
                info!("resuming output");
                self.state.paused = false;
                if self.ring.has_data() {
                    self.state.interest.consumer = true;
                }
            }
        }
        Ok(None)
    }

    fn on_producer(&mut self, ready: Readiness) -> Result<(), BagError> {
        if ready.producer_readable && self.ring.has_space() {
            match self.ring.ingest(&mut self.producer) {
                Ok(Ingest::EndOfStream) => {
                    self.close_producer();
                    return Ok(());
                }
                Ok(Ingest::Sealed(n)) => {
                    trace!(bytes = n, sealed = self.ring.sealed_records(), "slot sealed");
                }
                Ok(Ingest::Filling(n)) => trace!(bytes = n, "slot filling"),
                Ok(Ingest::NoSpace) => {}
                Err(e) if is_transient(&e) => trace!(error = %e, "read made no progress"),
                Err(e) => return Err(BagError::ProducerIo(e)),
            }
            // Data may now be available
            self.state.interest.consumer = true;
        } else if ready.producer_hangup && !ready.producer_readable {
            // Nothing left to read from a writer that has gone away
            self.close_producer();
            return Ok(());
        }

        if !self.ring.has_space() {
            debug!(sealed = self.ring.sealed_records(), "ring full, stalling input");
            self.state.interest.producer = false;
            if let Some(metrics) = self.ring.metrics_mut() {
                metrics.producer_stalls += 1;
            }
        }
        Ok(())
    }

    fn close_producer(&mut self) {
        let trailing = self.ring.seal_partial();
        info!(trailing, sealed = self.ring.sealed_records(), "input closed, draining");

        self.state.producer_closed = true;
        self.state.paused = false;
        self.state.interest.producer = false;
        self.state.interest.consumer = true;
    }

    fn on_consumer(&mut self) -> Result<Option<Outcome>, BagError> {
        if !self.state.paused && self.ring.has_data() {
            match self.ring.drain(&mut self.consumer) {
                Ok(Drain::Complete(n)) => trace!(bytes = n, "slot released"),
                Ok(Drain::Partial(n)) => trace!(bytes = n, "partial write"),
                Ok(Drain::Empty) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    info!("output hangup");
                    return Ok(Some(Outcome::ConsumerHangup));
                }
                Err(e) if is_transient(&e) => trace!(error = %e, "write made no progress"),
                Err(e) => return Err(BagError::ConsumerIo(e)),
            }

            // Space may have been freed
            if !self.state.producer_closed && self.ring.has_space() {
                if !self.state.interest.producer {
                    debug!("resuming input");
                }
                self.state.interest.producer = true;
            }
        } else if !self.ring.has_data() && self.state.producer_closed {
            info!("no more input, exiting");
            return Ok(Some(Outcome::Drained));
        } else {
            // Nothing to write right now
            self.state.interest.consumer = false;
        }
        Ok(None)
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
