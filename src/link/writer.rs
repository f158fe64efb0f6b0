//! Transmit buffer in front of the serial port.
//!
//! Engine output is queued here and handed to the port one contiguous run at
//! a time. The next run starts only after the port reports the previous one
//! done.

use std::collections::VecDeque;

use crate::core::SerialPort;

/// Bounded transmit buffer with a single transfer in flight.
#[derive(Debug)]
pub struct SerialWriter {
    buffer: VecDeque<u8>,
    capacity: usize,
    /// Length of the run currently owned by the port.
    in_flight: Option<usize>,
    dropped: usize,
}

impl SerialWriter {
    /// Create a writer holding at most `capacity` unsent bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            in_flight: None,
            dropped: 0,
        }
    }

    /// Queue `data` and start a transfer if the port is idle.
    ///
    /// Bytes beyond the free space are dropped. Returns the number accepted.
    pub fn write<S: SerialPort + ?Sized>(&mut self, data: &[u8], port: &mut S) -> usize {
        let free = self.capacity - self.buffer.len();
        let accepted = data.len().min(free);
        self.buffer.extend(&data[..accepted]);
        self.dropped += data.len() - accepted;

        self.try_send(port);
        accepted
    }

    /// The port finished the transfer in flight.
    pub fn on_send_done<S: SerialPort + ?Sized>(&mut self, port: &mut S) {
        if let Some(sent) = self.in_flight.take() {
            self.buffer.drain(..sent);
        }
        self.try_send(port);
    }

    /// Forget queued bytes that the port does not own yet.
    pub fn clear_pending(&mut self) {
        let keep = self.in_flight.unwrap_or(0);
        self.buffer.truncate(keep);
    }

    /// Bytes queued, including the run in flight.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if the port owns a transfer.
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Return and reset the overflow counter.
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }

    fn try_send<S: SerialPort + ?Sized>(&mut self, port: &mut S) {
        if self.in_flight.is_some() || self.buffer.is_empty() {
            return;
        }

        let (run, _) = self.buffer.as_slices();
        self.in_flight = Some(run.len());
        port.send_data(run);
    }
}
