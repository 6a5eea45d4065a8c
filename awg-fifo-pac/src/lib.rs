//! Peripheral access for the AXI4-Stream FIFO (`axi_fifo_mm_s`).
//!
//! This crate describes the AXI4-Lite register map of the FIFO as a
//! [`RegisterBlock`] that can be overlaid on a memory-mapped region, plus the
//! bit masks of the interrupt status register.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

use vcell::VolatileCell;

/// A 32-bit device register.
///
/// All accesses are volatile.
#[repr(transparent)]
pub struct Reg(VolatileCell<u32>);

impl Reg {
    /// Reads the register.
    #[inline(always)]
    pub fn read(&self) -> u32 {
        self.0.get()
    }

    /// Writes the register.
    #[inline(always)]
    pub fn write(&self, value: u32) {
        self.0.set(value)
    }
}

impl core::fmt::Debug for Reg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // reading has side effects on some registers (TDFD, RDFD)
        f.write_str("Reg")
    }
}

/// AXI4-Stream FIFO register block.
#[repr(C)]
#[derive(Debug)]
pub struct RegisterBlock {
    /// 0x00 - Interrupt status register. Write 1 to clear.
    pub isr: Reg,
    /// 0x04 - Interrupt enable register.
    pub ier: Reg,
    /// 0x08 - Transmit data FIFO reset.
    pub tdfr: Reg,
    /// 0x0c - Transmit data FIFO vacancy, in words.
    pub tdfv: Reg,
    /// 0x10 - Transmit data FIFO data (AXI4-Lite data interface).
    pub tdfd: Reg,
    /// 0x14 - Transmit length, in bytes. Writing it commits a frame.
    pub tlr: Reg,
    /// 0x18 - Receive data FIFO reset.
    pub rdfr: Reg,
    /// 0x1c - Receive data FIFO occupancy, in words.
    pub rdfo: Reg,
    /// 0x20 - Receive data FIFO data.
    pub rdfd: Reg,
    /// 0x24 - Receive length, in bytes.
    pub rlr: Reg,
    /// 0x28 - AXI4-Stream reset.
    pub srr: Reg,
    /// 0x2c - Transmit destination.
    pub tdr: Reg,
    /// 0x30 - Receive destination.
    pub rdr: Reg,
}

/// Key that must be written to TDFR, RDFR or SRR to trigger a reset.
pub const RESET_KEY: u32 = 0xa5;

/// Interrupt status register bits.
pub mod int {
    /// Receive packet underrun read error.
    pub const RPURE: u32 = 1 << 31;
    /// Receive packet overrun read error.
    pub const RPORE: u32 = 1 << 30;
    /// Receive packet underrun error.
    pub const RPUE: u32 = 1 << 29;
    /// Transmit packet overrun error.
    pub const TPOE: u32 = 1 << 28;
    /// Transmit complete.
    pub const TC: u32 = 1 << 27;
    /// Receive complete.
    pub const RC: u32 = 1 << 26;
    /// Transmit length mismatch error.
    pub const TSE: u32 = 1 << 25;
    /// Transmit reset complete.
    pub const TRC: u32 = 1 << 24;
    /// Receive reset complete.
    pub const RRC: u32 = 1 << 23;
    /// Transmit FIFO programmable full.
    pub const TFPF: u32 = 1 << 22;
    /// Transmit FIFO programmable empty.
    pub const TFPE: u32 = 1 << 21;
    /// Receive FIFO programmable full.
    pub const RFPF: u32 = 1 << 20;
    /// Receive FIFO programmable empty.
    pub const RFPE: u32 = 1 << 19;

    /// All implemented interrupt bits.
    pub const ALL: u32 =
        RPURE | RPORE | RPUE | TPOE | TC | RC | TSE | TRC | RRC | TFPF | TFPE | RFPF | RFPE;
    /// Receive-side error bits.
    pub const RX_ERROR: u32 = RPURE | RPORE | RPUE;
    /// Transmit-side error bits.
    pub const TX_ERROR: u32 = TPOE | TSE;
    /// All error bits.
    pub const ERROR: u32 = RX_ERROR | TX_ERROR;
}

#[cfg(test)]
mod test {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn register_offsets() {
        assert_eq!(offset_of!(RegisterBlock, isr), 0x00);
        assert_eq!(offset_of!(RegisterBlock, tdfv), 0x0c);
        assert_eq!(offset_of!(RegisterBlock, tdfd), 0x10);
        assert_eq!(offset_of!(RegisterBlock, tlr), 0x14);
        assert_eq!(offset_of!(RegisterBlock, srr), 0x28);
        assert_eq!(offset_of!(RegisterBlock, rdr), 0x30);
        assert_eq!(core::mem::size_of::<RegisterBlock>(), 0x34);
    }

    #[test]
    fn interrupt_masks() {
        assert_eq!(int::ALL, 0xfff8_0000);
        assert_eq!(int::ERROR, 0xf200_0000);
        assert_eq!(int::ERROR & int::TC, 0);
    }
}
