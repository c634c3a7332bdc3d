/// Optional counters describing buffer activity over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub records_sealed: u64,
    pub records_drained: u64,
    pub partial_writes: u64,
    pub producer_stalls: u64,
    pub pauses: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_bytes_in(&mut self, n: usize) {
        self.bytes_in += n as u64;
    }

    #[inline]
    pub(crate) fn add_bytes_out(&mut self, n: usize) {
        self.bytes_out += n as u64;
    }

    /// Bytes accepted from the producer that have not been written out yet.
    pub fn buffered_bytes(&self) -> u64 {
        self.bytes_in.saturating_sub(self.bytes_out)
    }
}
