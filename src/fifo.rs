//! AXI4-Stream FIFO driver.
//!
//! This module contains the [`StreamFifo`] trait, which is the set of FIFO
//! operations used by the transmit loop, and [`AxiFifo`], the userspace driver
//! that implements it on top of the registers of an `axi_fifo_mm_s` IP core
//! mapped through UIO.

use crate::uio::{Mapping, Uio, UioSelector};
use anyhow::{Context, Result};
use awg_fifo_pac::{int, RegisterBlock, RESET_KEY};

/// Mask that clears every interrupt status bit.
pub const CLEAR_ALL: u32 = 0xffff_ffff;

/// Streaming output device.
///
/// All operations complete synchronously: register writes have been issued
/// when the call returns.
pub trait StreamFifo {
    /// Resets the device, flushing both data FIFOs and the stream interface.
    fn reset(&mut self);

    /// Clears the interrupt status bits set in `mask`.
    fn clear_interrupts(&mut self, mask: u32);

    /// Free word slots in the transmit data FIFO.
    fn tx_vacancy(&self) -> u32;

    /// Pushes one word into the transmit data FIFO.
    fn tx_put_word(&mut self, word: u32);

    /// Commits the words pushed since the last commit as a frame of `bytes`
    /// bytes.
    fn tx_set_len(&mut self, bytes: u32);

    /// Current interrupt status bits.
    fn status(&self) -> u32;

    /// Whether the transmit complete bit is set.
    fn is_tx_done(&self) -> bool {
        self.status() & int::TC != 0
    }
}

impl<F: StreamFifo + ?Sized> StreamFifo for &mut F {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn clear_interrupts(&mut self, mask: u32) {
        (**self).clear_interrupts(mask)
    }

    fn tx_vacancy(&self) -> u32 {
        (**self).tx_vacancy()
    }

    fn tx_put_word(&mut self, word: u32) {
        (**self).tx_put_word(word)
    }

    fn tx_set_len(&mut self, bytes: u32) {
        (**self).tx_set_len(bytes)
    }

    fn status(&self) -> u32 {
        (**self).status()
    }

    fn is_tx_done(&self) -> bool {
        (**self).is_tx_done()
    }
}

/// AXI4-Stream FIFO IP core.
///
/// Owns the UIO mapping of the FIFO registers. The data interface is assumed
/// to be AXI4-Lite, so words are written through the TDFD register.
#[derive(Debug)]
pub struct AxiFifo {
    registers: Registers,
    phys_addr: usize,
    uio_num: usize,
}

#[derive(Debug)]
struct Registers(Mapping);

impl std::ops::Deref for Registers {
    type Target = RegisterBlock;
    fn deref(&self) -> &Self::Target {
        unsafe { &*(self.0.addr() as *const RegisterBlock) }
    }
}

unsafe impl Send for Registers {}

impl AxiFifo {
    /// Opens the FIFO and maps its registers.
    ///
    /// The register region is the UIO map number `mapping` of the device
    /// given by `selector`. Fails if the device does not exist or if the
    /// region is too small to hold the FIFO register block.
    pub async fn open(selector: &UioSelector, mapping: usize) -> Result<AxiFifo> {
        let uio = Uio::open(selector)
            .await
            .with_context(|| format!("failed to open {selector}"))?;
        let map = uio
            .map_mapping(mapping)
            .await
            .with_context(|| format!("failed to map {selector}"))?;
        let register_block_size = std::mem::size_of::<RegisterBlock>();
        if map.len() < register_block_size {
            anyhow::bail!(
                "{selector} map{mapping} is {:#x} bytes, \
                 smaller than the FIFO register block ({register_block_size:#x} bytes)",
                map.len()
            );
        }
        let phys_addr = uio.map_addr(mapping).await?;
        let fifo = AxiFifo {
            registers: Registers(map),
            phys_addr,
            uio_num: uio.num(),
        };
        tracing::info!(
            "opened AXI4-Stream FIFO /dev/uio{} at physical address {:#08x}",
            fifo.uio_num,
            fifo.phys_addr
        );
        Ok(fifo)
    }

    /// Physical address of the FIFO registers.
    pub fn phys_addr(&self) -> usize {
        self.phys_addr
    }
}

impl StreamFifo for AxiFifo {
    fn reset(&mut self) {
        self.registers.srr.write(RESET_KEY);
    }

    fn clear_interrupts(&mut self, mask: u32) {
        self.registers.isr.write(mask & int::ALL);
    }

    fn tx_vacancy(&self) -> u32 {
        self.registers.tdfv.read()
    }

    fn tx_put_word(&mut self, word: u32) {
        self.registers.tdfd.write(word);
    }

    fn tx_set_len(&mut self, bytes: u32) {
        self.registers.tlr.write(bytes);
    }

    fn status(&self) -> u32 {
        self.registers.isr.read()
    }
}
