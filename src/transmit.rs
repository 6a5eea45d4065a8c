//! Waveform transmit loop.
//!
//! The [`Transmitter`] resets the FIFO, generates the waveform period once and
//! then sends it as a frame over and over. Before each frame it checks that
//! the transmit FIFO has room for the whole period, and after each frame it
//! checks the interrupt status for errors. Both checks are fatal: there is no
//! retry and no recovery.

use crate::fifo::{StreamFifo, CLEAR_ALL};
use crate::ramp::{RampConfig, Waveform};
use anyhow::Result;
use awg_fifo_pac::int;
use std::time::Duration;

/// Default settling time after a FIFO reset.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(1);

/// What to do after the reset settling delay.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ResetCheck {
    /// Do not look at the device after the reset.
    #[default]
    Skip,
    /// Fail unless the interrupt status reads as 0.
    Verify,
}

/// What to do after committing a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TxCompletion {
    /// Go on to the status check right away. The next frame may be written
    /// while the previous one is still draining.
    #[default]
    FireAndForget,
    /// Poll until the FIFO reports transmit complete (or an error) before
    /// checking the status. There is no timeout.
    WaitDone,
}

/// Transmit loop settings.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TransmitConfig {
    /// Time to wait after resetting the FIFO.
    pub reset_delay: Duration,
    /// Post-reset check.
    pub reset_check: ResetCheck,
    /// Per-frame completion policy.
    pub tx_completion: TxCompletion,
    /// Stop successfully after this many frames. `None` runs forever.
    pub max_frames: Option<u64>,
}

impl Default for TransmitConfig {
    fn default() -> TransmitConfig {
        TransmitConfig {
            reset_delay: DEFAULT_RESET_DELAY,
            reset_check: ResetCheck::default(),
            tx_completion: TxCompletion::default(),
            max_frames: None,
        }
    }
}

/// Errors that end the transmit loop.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TransmitError {
    /// The transmit FIFO cannot hold a whole frame.
    #[error("not enough space in TX FIFO: need {needed} words, have {available} words")]
    InsufficientVacancy {
        /// Words in a frame.
        needed: usize,
        /// Words free in the FIFO.
        available: u32,
    },
    /// The FIFO flagged an error after a frame.
    #[error("FIFO transmission error, status {status:#010x}")]
    Transmission {
        /// Interrupt status read after the frame.
        status: u32,
    },
    /// The interrupt status was not clear after the reset.
    #[error("FIFO reset failed, status {status:#010x}")]
    ResetFailed {
        /// Interrupt status read after the reset.
        status: u32,
    },
}

/// Waveform transmit loop.
///
/// Owns the FIFO for the lifetime of the loop.
#[derive(Debug)]
pub struct Transmitter<F> {
    fifo: F,
    ramp: RampConfig,
    config: TransmitConfig,
}

impl<F: StreamFifo> Transmitter<F> {
    /// Creates a transmit loop that will send ramps described by `ramp`.
    pub fn new(fifo: F, ramp: RampConfig, config: TransmitConfig) -> Transmitter<F> {
        Transmitter { fifo, ramp, config }
    }

    /// Runs the transmit loop.
    ///
    /// This only returns if there is an error, or once `max_frames` frames
    /// have been sent. Errors that come from the FIFO are
    /// [`TransmitError`]s.
    #[tracing::instrument(name = "transmitter", skip_all)]
    pub async fn run(mut self) -> Result<()> {
        self.reset().await?;

        tracing::info!("generating ramp waveform");
        let waveform = Waveform::ramp(&self.ramp);
        let frame_length = u32::try_from(waveform.frame_length_bytes())?;
        tracing::info!(
            num_samples = waveform.len(),
            max_code = self.ramp.max_code(),
            frame_length,
            "streaming ramp waveform"
        );

        let mut frames = 0u64;
        while self.config.max_frames.map_or(true, |max| frames < max) {
            self.send_frame(&waveform, frame_length).await?;
            frames += 1;
        }
        tracing::info!(frames, "transmission finished");
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        self.fifo.reset();
        self.fifo.clear_interrupts(CLEAR_ALL);
        // completion of the reset is not polled; it is given a fixed time
        tokio::time::sleep(self.config.reset_delay).await;
        if self.config.reset_check == ResetCheck::Verify {
            let status = self.fifo.status();
            if status != 0 {
                tracing::error!("FIFO reset failed, status {status:#x}");
                return Err(TransmitError::ResetFailed { status }.into());
            }
        }
        Ok(())
    }

    async fn send_frame(&mut self, waveform: &Waveform, frame_length: u32) -> Result<()> {
        let available = self.fifo.tx_vacancy();
        tracing::trace!(available, "TX FIFO vacancy");
        if (available as usize) < waveform.len() {
            tracing::error!(
                "not enough space in TX FIFO, need {} words, have {available} words",
                waveform.len()
            );
            return Err(TransmitError::InsufficientVacancy {
                needed: waveform.len(),
                available,
            }
            .into());
        }

        for &word in waveform.words() {
            self.fifo.tx_put_word(word);
        }
        self.fifo.tx_set_len(frame_length);

        if self.config.tx_completion == TxCompletion::WaitDone {
            while self.fifo.status() & (int::TC | int::ERROR) == 0 {
                tokio::task::yield_now().await;
            }
            self.fifo.clear_interrupts(int::TC);
        }

        let status = self.fifo.status();
        if status & int::ERROR != 0 {
            tracing::error!("FIFO transmission error, status {status:#x}");
            self.fifo.clear_interrupts(int::ERROR);
            return Err(TransmitError::Transmission { status }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    enum Call {
        Reset,
        ClearInterrupts(u32),
        TxVacancy,
        TxPutWord(u32),
        TxSetLen(u32),
        Status,
    }

    #[derive(Debug, Default)]
    struct MockFifo {
        calls: RefCell<Vec<Call>>,
        vacancy: u32,
        // status values returned in order; 0 once exhausted
        statuses: RefCell<VecDeque<u32>>,
        status_reads: Cell<usize>,
    }

    impl MockFifo {
        fn with_vacancy(vacancy: u32) -> MockFifo {
            MockFifo {
                vacancy,
                ..Default::default()
            }
        }

        fn push_status(&self, status: u32) {
            self.statuses.borrow_mut().push_back(status);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl StreamFifo for MockFifo {
        fn reset(&mut self) {
            self.record(Call::Reset);
        }

        fn clear_interrupts(&mut self, mask: u32) {
            self.record(Call::ClearInterrupts(mask));
        }

        fn tx_vacancy(&self) -> u32 {
            self.record(Call::TxVacancy);
            self.vacancy
        }

        fn tx_put_word(&mut self, word: u32) {
            self.record(Call::TxPutWord(word));
        }

        fn tx_set_len(&mut self, bytes: u32) {
            self.record(Call::TxSetLen(bytes));
        }

        fn status(&self) -> u32 {
            self.record(Call::Status);
            self.status_reads.set(self.status_reads.get() + 1);
            self.statuses.borrow_mut().pop_front().unwrap_or(0)
        }
    }

    fn config(max_frames: Option<u64>) -> TransmitConfig {
        TransmitConfig {
            reset_delay: Duration::ZERO,
            max_frames,
            ..Default::default()
        }
    }

    fn frame_calls(waveform: &Waveform) -> Vec<Call> {
        let mut calls = vec![Call::TxVacancy];
        calls.extend(waveform.words().iter().map(|&w| Call::TxPutWord(w)));
        calls.push(Call::TxSetLen(1024));
        calls.push(Call::Status);
        calls
    }

    #[tokio::test]
    async fn sends_identical_frames() {
        let mut fifo = MockFifo::with_vacancy(256);
        Transmitter::new(&mut fifo, RampConfig::default(), config(Some(3)))
            .run()
            .await
            .unwrap();
        let waveform = Waveform::ramp(&RampConfig::default());
        let mut expected = vec![Call::Reset, Call::ClearInterrupts(0xffff_ffff)];
        for _ in 0..3 {
            expected.extend(frame_calls(&waveform));
        }
        assert_eq!(fifo.calls(), expected);
    }

    #[tokio::test]
    async fn insufficient_vacancy() {
        let mut fifo = MockFifo::with_vacancy(255);
        let err = Transmitter::new(&mut fifo, RampConfig::default(), config(None))
            .run()
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransmitError>(),
            Some(&TransmitError::InsufficientVacancy {
                needed: 256,
                available: 255
            })
        );
        assert_eq!(fifo.calls().last(), Some(&Call::TxVacancy));
        assert!(!fifo.calls().iter().any(|c| matches!(c, Call::TxPutWord(_))));
    }

    #[tokio::test]
    async fn transmission_error_clears_and_fails() {
        let mut fifo = MockFifo::with_vacancy(1000);
        // first frame fine, second frame reports transmit length mismatch
        fifo.push_status(0);
        fifo.push_status(int::TSE | int::TC);
        let err = Transmitter::new(&mut fifo, RampConfig::default(), config(None))
            .run()
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransmitError>(),
            Some(&TransmitError::Transmission {
                status: int::TSE | int::TC
            })
        );
        let calls = fifo.calls();
        assert_eq!(calls.last(), Some(&Call::ClearInterrupts(int::ERROR)));
        assert_eq!(calls[calls.len() - 2], Call::Status);
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::TxSetLen(_))).count(),
            2
        );
    }

    #[tokio::test]
    async fn non_error_status_bits_are_ignored() {
        let mut fifo = MockFifo::with_vacancy(256);
        fifo.push_status(int::TC | int::TFPE);
        Transmitter::new(&mut fifo, RampConfig::default(), config(Some(2)))
            .run()
            .await
            .unwrap();
        assert_eq!(fifo.status_reads.get(), 2);
    }

    #[tokio::test]
    async fn reset_check() {
        let mut fifo = MockFifo::with_vacancy(256);
        fifo.push_status(int::TRC);
        // skipped by default: the status is consumed by the first frame
        Transmitter::new(&mut fifo, RampConfig::default(), config(Some(1)))
            .run()
            .await
            .unwrap();

        let mut fifo = MockFifo::with_vacancy(256);
        fifo.push_status(int::TRC);
        let err = Transmitter::new(
            &mut fifo,
            RampConfig::default(),
            TransmitConfig {
                reset_check: ResetCheck::Verify,
                ..config(Some(1))
            },
        )
        .run()
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransmitError>(),
            Some(&TransmitError::ResetFailed { status: int::TRC })
        );
        assert_eq!(
            fifo.calls(),
            vec![Call::Reset, Call::ClearInterrupts(0xffff_ffff), Call::Status]
        );
    }

    #[tokio::test]
    async fn wait_done() {
        let mut fifo = MockFifo::with_vacancy(256);
        fifo.push_status(0);
        fifo.push_status(0);
        fifo.push_status(int::TC);
        Transmitter::new(
            &mut fifo,
            RampConfig::default(),
            TransmitConfig {
                tx_completion: TxCompletion::WaitDone,
                ..config(Some(1))
            },
        )
        .run()
        .await
        .unwrap();
        let calls = fifo.calls();
        let tail = &calls[calls.len() - 5..];
        assert_eq!(
            tail,
            &[
                Call::Status,
                Call::Status,
                Call::Status,
                Call::ClearInterrupts(int::TC),
                Call::Status,
            ]
        );
    }

    #[tokio::test]
    async fn wait_done_stops_on_error() {
        let mut fifo = MockFifo::with_vacancy(256);
        fifo.push_status(int::TPOE);
        fifo.push_status(int::TPOE);
        let err = Transmitter::new(
            &mut fifo,
            RampConfig::default(),
            TransmitConfig {
                tx_completion: TxCompletion::WaitDone,
                ..config(None)
            },
        )
        .run()
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransmitError>(),
            Some(&TransmitError::Transmission { status: int::TPOE })
        );
    }
}
