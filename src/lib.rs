//! awg-ramp streams a ramp waveform into the AXI4-Stream FIFO that feeds a
//! DAC/AWG controller IP core on a Zynq MPSoC. The FIFO registers are accessed
//! from userspace through UIO. One period of the ramp is generated at startup
//! and sent repeatedly as identical frames until an error happens.

#![warn(missing_docs)]

pub mod app;
pub mod args;
pub mod fifo;
pub mod ramp;
pub mod transmit;
pub mod uio;
