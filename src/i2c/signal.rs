// Licensed under the Apache-2.0 license

//! Transfer state machine shared between the interrupt handler and the driver.
//!
//! A [`TransferSignal`] is split exactly once into a [`Producer`], owned by
//! the interrupt handler, and a [`Consumer`], owned by the blocking driver.
//! Besides the last observed [`TransferState`] it latches every completion
//! event in a pending mask, so a waiter still sees "byte received" when an
//! auto-stop overwrote the state before the caller got to look.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::i2c::common::ErrorSource;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferState {
    /// `init` has not succeeded yet.
    Uninit = 0,
    Disabled = 1,
    Stopped = 2,
    Suspended = 3,
    /// Request marker set before waiting for `TxSent`.
    Tx = 4,
    /// Request marker set before waiting for `RxReady`.
    Rx = 5,
    TxSent = 6,
    RxReady = 7,
    /// A bus error was reported by the peripheral.
    Error = 8,
}

impl TransferState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TransferState::Disabled,
            2 => TransferState::Stopped,
            3 => TransferState::Suspended,
            4 => TransferState::Tx,
            5 => TransferState::Rx,
            6 => TransferState::TxSent,
            7 => TransferState::RxReady,
            8 => TransferState::Error,
            _ => TransferState::Uninit,
        }
    }

    /// Pending-mask bit for states that are produced by hardware events.
    const fn latch_bit(self) -> u8 {
        match self {
            TransferState::Stopped => 1 << 0,
            TransferState::Suspended => 1 << 1,
            TransferState::TxSent => 1 << 2,
            TransferState::RxReady => 1 << 3,
            TransferState::Error => 1 << 4,
            _ => 0,
        }
    }
}

const ERROR_LATCH: u8 = TransferState::Error.latch_bit();

/// Result of polling the consumer for an awaited state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Poll {
    Reached,
    Failed(ErrorSource),
    Pending,
}

pub struct TransferSignal {
    state: AtomicU8,
    pending: AtomicU8,
    error_source: AtomicU8,
    errors: AtomicU32,
    split: AtomicBool,
}

impl Default for TransferSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(TransferState::Uninit as u8),
            pending: AtomicU8::new(0),
            error_source: AtomicU8::new(0),
            errors: AtomicU32::new(0),
            split: AtomicBool::new(false),
        }
    }

    /// Hand out the two halves. Returns `None` once the signal was split.
    pub fn split(&self) -> Option<(Producer<'_>, Consumer<'_>)> {
        if self.split.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((Producer { signal: self }, Consumer { signal: self }))
    }

    #[must_use]
    pub fn state(&self) -> TransferState {
        TransferState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Bus errors reported since the signal was created.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Interrupt-side half: publishes hardware-driven transitions.
pub struct Producer<'a> {
    signal: &'a TransferSignal,
}

impl Producer<'_> {
    /// Record a transition caused by a hardware event.
    pub fn publish(&mut self, state: TransferState) {
        self.signal.state.store(state as u8, Ordering::Release);
        self.signal
            .pending
            .fetch_or(state.latch_bit(), Ordering::AcqRel);
    }

    /// Record a bus error and wake whichever wait is in progress.
    pub fn publish_error(&mut self, source: ErrorSource) {
        self.signal
            .error_source
            .store(source.bits(), Ordering::Relaxed);
        self.signal.errors.fetch_add(1, Ordering::Relaxed);
        self.publish(TransferState::Error);
    }

    #[must_use]
    pub fn state(&self) -> TransferState {
        self.signal.state()
    }
}

/// Caller-side half: requests states and consumes completions.
pub struct Consumer<'a> {
    signal: &'a TransferSignal,
}

impl Consumer<'_> {
    /// Forget completions left over from an earlier transfer.
    pub fn begin(&mut self) {
        self.signal.pending.store(0, Ordering::Release);
    }

    /// Set a request marker (`Tx`/`Rx`) before waiting on its completion.
    pub fn request(&mut self, marker: TransferState) {
        self.signal.state.store(marker as u8, Ordering::Release);
    }

    /// Lifecycle transition driven by the caller (`enable`/`disable`/`init`).
    pub fn set(&mut self, state: TransferState) {
        self.signal.state.store(state as u8, Ordering::Release);
        self.signal.pending.store(0, Ordering::Release);
    }

    /// Record a state confirmed by an already consumed completion. Latched
    /// completions are kept.
    pub fn settle(&mut self, state: TransferState) {
        self.signal.state.store(state as u8, Ordering::Release);
    }

    /// Consume the completion for `target`, or report a latched bus error.
    pub fn poll(&mut self, target: TransferState) -> Poll {
        let pending = self.signal.pending.load(Ordering::Acquire);
        if pending & ERROR_LATCH != 0 {
            self.signal
                .pending
                .fetch_and(!ERROR_LATCH, Ordering::AcqRel);
            let source = self.signal.error_source.load(Ordering::Relaxed);
            return Poll::Failed(ErrorSource::from_bits(u32::from(source)));
        }
        let bit = target.latch_bit();
        if bit != 0 && pending & bit != 0 {
            self.signal.pending.fetch_and(!bit, Ordering::AcqRel);
            return Poll::Reached;
        }
        Poll::Pending
    }

    #[must_use]
    pub fn state(&self) -> TransferState {
        self.signal.state()
    }

    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.signal.error_count()
    }
}
