//! awg-ramp CLI arguments.
//!
//! This module contains the definition of the CLI arguments for the awg-ramp
//! application and their conversion into the library configuration types.

use crate::ramp::{self, RampConfig, SampleField};
use crate::transmit::{self, ResetCheck, TransmitConfig, TxCompletion};
use crate::uio::UioSelector;
use anyhow::Result;
use clap::Parser;
use std::time::Duration;

/// awg-ramp CLI arguments.
#[derive(Parser, Debug, Clone, Eq, PartialEq, Hash)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Name of the UIO device of the AXI4-Stream FIFO
    #[clap(long, default_value = "axi-fifo-mm-s")]
    pub uio: String,
    /// Number of the UIO device of the AXI4-Stream FIFO (overrides --uio)
    #[clap(long)]
    pub uio_num: Option<usize>,
    /// UIO map holding the FIFO registers
    #[clap(long, default_value_t = 0)]
    pub mapping: usize,
    /// Number of samples in a waveform period
    #[clap(long, default_value_t = ramp::DEFAULT_NUM_SAMPLES)]
    pub samples: usize,
    /// Code at the top of the ramp
    #[clap(long, default_value_t = ramp::DEFAULT_MAX_CODE)]
    pub max_code: u32,
    /// Bit position of the least significant code bit in each word
    #[clap(long, default_value_t = ramp::DEFAULT_SHIFT)]
    pub shift: u32,
    /// Settling time after the FIFO reset, in microseconds
    #[clap(long, default_value_t = transmit::DEFAULT_RESET_DELAY.as_micros() as u64)]
    pub reset_delay_us: u64,
    /// Fail if the FIFO status is not clear after the reset
    #[clap(long)]
    pub verify_reset: bool,
    /// Wait for each frame to be transmitted before sending the next
    #[clap(long)]
    pub wait_tx_done: bool,
    /// Stop after sending this many frames (default: run forever)
    #[clap(long)]
    pub frames: Option<u64>,
}

impl Args {
    /// Returns the UIO device selected by the arguments.
    pub fn uio_selector(&self) -> UioSelector {
        match self.uio_num {
            Some(num) => UioSelector::Num(num),
            None => UioSelector::Name(self.uio.clone()),
        }
    }

    /// Returns the ramp described by the arguments.
    pub fn ramp_config(&self) -> Result<RampConfig> {
        RampConfig::new(self.samples, self.max_code, SampleField::new(self.shift)?)
    }

    /// Returns the transmit loop settings described by the arguments.
    pub fn transmit_config(&self) -> TransmitConfig {
        TransmitConfig {
            reset_delay: Duration::from_micros(self.reset_delay_us),
            reset_check: if self.verify_reset {
                ResetCheck::Verify
            } else {
                ResetCheck::Skip
            },
            tx_completion: if self.wait_tx_done {
                TxCompletion::WaitDone
            } else {
                TxCompletion::FireAndForget
            },
            max_frames: self.frames,
        }
    }
}
