//! awg-ramp application.
//!
//! This module contains the top-level structure [`App`], which opens the FIFO
//! and owns the transmit loop that streams the waveform into it.

use crate::{args::Args, fifo::AxiFifo, transmit::Transmitter};
use anyhow::{Context, Result};

/// awg-ramp application.
#[derive(Debug)]
pub struct App {
    transmitter: Transmitter<AxiFifo>,
}

impl App {
    /// Creates a new application.
    ///
    /// The configuration is validated before the FIFO is touched.
    #[tracing::instrument(name = "App::new", level = "debug")]
    pub async fn new(args: &Args) -> Result<App> {
        let ramp = args.ramp_config().context("invalid waveform configuration")?;
        let fifo = AxiFifo::open(&args.uio_selector(), args.mapping).await?;
        Ok(App {
            transmitter: Transmitter::new(fifo, ramp, args.transmit_config()),
        })
    }

    /// Runs the application.
    ///
    /// This only returns if the transmit loop fails, or after the number of
    /// frames requested with `--frames` has been sent.
    #[tracing::instrument(name = "App::run", level = "debug", skip_all)]
    pub async fn run(self) -> Result<()> {
        self.transmitter.run().await
    }
}
