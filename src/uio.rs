//! UIO device access.
//!
//! The FIFO is exposed by the kernel as a UIO device. This module finds the
//! device in sysfs, opens its character device and maps its register region
//! into the address space of the process.

use anyhow::{Context, Result};
use std::fmt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tokio::fs;

/// Way of locating a UIO device.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum UioSelector {
    /// The device whose `/sys/class/uio/uio*/name` matches.
    Name(String),
    /// The device `/dev/uio<num>`.
    Num(usize),
}

impl fmt::Display for UioSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UioSelector::Name(name) => write!(f, "UIO device named {name:?}"),
            UioSelector::Num(num) => write!(f, "/dev/uio{num}"),
        }
    }
}

/// An open UIO device.
#[derive(Debug)]
pub struct Uio {
    num: usize,
    file: fs::File,
}

/// A memory-mapped region of a UIO device.
///
/// Dropping the mapping unmaps the region.
#[derive(Debug)]
pub struct Mapping {
    base: *mut libc::c_void,
    effective: *mut libc::c_void,
    map_size: usize,
    effective_size: usize,
}

impl Uio {
    /// Opens the UIO device indicated by `selector`.
    pub async fn open(selector: &UioSelector) -> Result<Uio> {
        let num = match selector {
            UioSelector::Num(num) => *num,
            UioSelector::Name(name) => find_by_name(name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no UIO device named {name:?}"))?,
        };
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/dev/uio{num}"))
            .await
            .with_context(|| format!("failed to open /dev/uio{num}"))?;
        Ok(Uio { num, file })
    }

    /// Returns the number of the device, as in `/dev/uio<num>`.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Maps one of the memory regions of the device.
    ///
    /// Regions are numbered as in `/sys/class/uio/uio*/maps/map<mapping>`.
    /// Devices with a single register region use `0`.
    pub async fn map_mapping(&self, mapping: usize) -> Result<Mapping> {
        let map_size = self.map_size(mapping).await?;
        let map_offset = self.map_offset(mapping).await?;
        if map_offset >= map_size {
            anyhow::bail!("UIO map{mapping} offset {map_offset:#x} outside of map size {map_size:#x}");
        }
        // the kernel selects the region through the mmap offset
        let offset = libc::off_t::try_from(mapping * page_size::get())?;
        let base = unsafe {
            match libc::mmap(
                std::ptr::null_mut::<libc::c_void>(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.file.as_raw_fd(),
                offset,
            ) {
                libc::MAP_FAILED => {
                    return Err(std::io::Error::last_os_error())
                        .context(format!("mmap of /dev/uio{} map{mapping} failed", self.num));
                }
                x => x,
            }
        };
        let effective = unsafe { base.add(map_offset) };
        Ok(Mapping {
            base,
            effective,
            map_size,
            effective_size: map_size - map_offset,
        })
    }

    /// Size in bytes of a region, from `maps/map*/size`.
    pub async fn map_size(&self, mapping: usize) -> Result<usize> {
        self.read_map_attr(mapping, "size").await
    }

    /// Offset of the registers inside the first page of a region, from
    /// `maps/map*/offset`.
    pub async fn map_offset(&self, mapping: usize) -> Result<usize> {
        self.read_map_attr(mapping, "offset").await
    }

    /// Physical address of a region, from `maps/map*/addr`.
    pub async fn map_addr(&self, mapping: usize) -> Result<usize> {
        self.read_map_attr(mapping, "addr").await
    }

    async fn read_map_attr(&self, mapping: usize, attr: &str) -> Result<usize> {
        let path = format!("/sys/class/uio/uio{}/maps/map{mapping}/{attr}", self.num);
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {path}"))?;
        parse_hex(&contents).with_context(|| format!("malformed contents in {path}"))
    }
}

async fn find_by_name(name: &str) -> Result<Option<usize>> {
    let mut entries = fs::read_dir(Path::new("/sys/class/uio"))
        .await
        .context("failed to list /sys/class/uio")?;
    while let Some(entry) = entries.next_entry().await? {
        let Some(num) = entry
            .file_name()
            .to_str()
            .and_then(|f| f.strip_prefix("uio"))
            .and_then(|n| n.parse::<usize>().ok())
        else {
            continue;
        };
        let this_name = fs::read_to_string(entry.path().join("name")).await?;
        if this_name.trim_end() == name {
            return Ok(Some(num));
        }
    }
    Ok(None)
}

fn parse_hex(s: &str) -> Result<usize> {
    let digits = s
        .trim_end()
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("prefix 0x not present"))?;
    Ok(usize::from_str_radix(digits, 16)?)
}

impl Mapping {
    /// Virtual address at which the device registers start.
    pub fn addr(&self) -> *mut libc::c_void {
        self.effective
    }

    /// Number of bytes accessible from [`Mapping::addr`].
    pub fn len(&self) -> usize {
        self.effective_size
    }

    /// Returns `true` if no bytes are accessible.
    pub fn is_empty(&self) -> bool {
        self.effective_size == 0
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if unsafe { libc::munmap(self.base, self.map_size) } != 0 {
            tracing::warn!(
                "munmap of UIO mapping failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}
