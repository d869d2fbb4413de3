use log::error;

use crate::error::{Error, Result};
use crate::firmware::{Firmware, Partition};
use crate::reader::parse_hex;

/// Size of the bounce buffer bridging block-device reads to stream
/// consumers.
const PART_BUF_SIZE: usize = 10 * 1024 * 1024;

/// Streams a byte range of a disk partition, resolved by label.
pub(crate) struct PartSource<'f, F: Firmware> {
    firmware: &'f F,
    partition: Partition,
    /// Absolute device byte offset of the first streamed byte.
    base: u64,
    /// Bytes the stream will emit.
    len: u64,
    buf: Vec<u8>,
    buf_cur: usize,
    buf_len: usize,
    need_refill: bool,
}

impl<'f, F: Firmware> PartSource<'f, F> {
    /// Opens a partition source. Arguments are the partition label,
    /// optionally followed by a byte offset and a byte length in hex,
    /// which narrow the streamed range.
    pub(crate) fn open(firmware: &'f F, argv: &[&str]) -> Result<(u64, Self)> {
        if argv.is_empty() || argv.len() > 3 {
            return Err(Error::InvalidArg);
        }

        let label = argv[0];
        let partition = firmware.partition_by_label(label).map_err(|err| {
            error!("cannot access partition '{}'", label);
            err
        })?;
        let total = partition.byte_len();

        let offset = match argv.get(1) {
            Some(token) => parse_hex(token)?,
            None => 0,
        };
        if offset >= total {
            error!(
                "offset {:#x} is past the {:#x} byte partition '{}'",
                offset, total, label
            );
            return Err(Error::InvalidArg);
        }

        let len = match argv.get(2) {
            Some(token) => {
                let length = parse_hex(token)?;
                if length == 0 || length > total - offset {
                    error!(
                        "length {:#x} does not fit partition '{}' at offset {:#x}",
                        length, label, offset
                    );
                    return Err(Error::InvalidArg);
                }
                length
            }
            None => total - offset,
        };

        let base = partition.byte_offset() + offset;
        Ok((
            len,
            Self {
                firmware,
                partition,
                base,
                len,
                buf: vec![0; PART_BUF_SIZE],
                buf_cur: 0,
                buf_len: 0,
                need_refill: true,
            },
        ))
    }

    pub(crate) fn read(&mut self, cur: u64, budget: usize) -> Result<&[u8]> {
        if self.need_refill {
            let fill = PART_BUF_SIZE.min((self.len - cur) as usize);
            self.firmware
                .read_disk(&self.partition, self.base + cur, &mut self.buf[..fill])
                .map_err(|err| {
                    error!("failed to read partition at {:#x}", self.base + cur);
                    err
                })?;
            self.buf_len = fill;
            self.buf_cur = 0;
            self.need_refill = false;
        }

        let len = budget.min(self.buf_len - self.buf_cur);
        let buf = &self.buf[self.buf_cur..self.buf_cur + len];
        self.buf_cur += len;
        if self.buf_cur == self.buf_len {
            self.need_refill = true;
        }
        Ok(buf)
    }
}
