//! This crate streams heterogeneous firmware data sources (physical
//! RAM, disk partitions, firmware descriptor tables and firmware
//! variables) behind one small pull-based byte-stream contract.
//!
//! A source is named by a colon-delimited argument string (`ram:…`,
//! `part:…`, `table:…`, `var:…`) and pulled with [`Reader::read`] until
//! it returns an empty buffer. Physical RAM comes out as an Android
//! sparse image synthesized from the firmware memory map: raw chunks for
//! conventional memory, don't-care chunks for holes and reserved
//! regions. Nothing is allocated while a RAM dump is streaming: the
//! pages being dumped include the reader's own working set, so that
//! state lives in a fixed static region acquired at open and released at
//! close.
//!
//! The platform is reached through the [`Firmware`] trait; on firmware
//! targets physical and flat addresses coincide, hosted implementations
//! supply their own mapping.
//!
//! # Example: dumping a RAM window
//! ```rust, no_run
//! use fwdump::{Firmware, Reader};
//!
//! fn dump<F: Firmware>(firmware: &F) -> fwdump::Result<Vec<u8>> {
//!     // Sparse image of physical [0x1000_0000, 0x1040_0000)
//!     let mut reader = Reader::open(firmware, "ram:10000000:400000")?;
//!
//!     let mut image = Vec::new();
//!     loop {
//!         let buf = reader.read(64 * 1024)?;
//!         if buf.is_empty() {
//!             break;
//!         }
//!         image.extend_from_slice(buf);
//!     }
//!     Ok(image)
//! }
//! ```

mod error;
mod firmware;
mod memmap;
mod part;
mod ram;
mod reader;
pub mod sparse;
mod table;
#[cfg(test)]
mod testfw;
mod var;

pub use error::{Error, Result};
pub use firmware::{Firmware, Guid, MapMeta, Partition};
pub use memmap::{MemoryDescriptor, CONVENTIONAL_MEMORY, PAGE_SIZE};
pub use reader::Reader;
