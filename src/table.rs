use log::error;

use crate::error::{Error, Result};
use crate::firmware::Firmware;

/// Exposes a firmware descriptor table as its own bytes. The firmware
/// owns the memory, so slices are served straight out of the resident
/// table and closing is a no-op.
pub(crate) struct TableSource<'f> {
    table: &'f [u8],
}

impl<'f> TableSource<'f> {
    pub(crate) fn open<F: Firmware>(firmware: &'f F, argv: &[&str]) -> Result<(u64, Self)> {
        if argv.len() != 1 {
            return Err(Error::InvalidArg);
        }

        let signature: [u8; 4] = argv[0].as_bytes().try_into().map_err(|_| {
            error!("table signature must be exactly 4 characters, got '{}'", argv[0]);
            Error::InvalidArg
        })?;

        let table = firmware.table(signature).map_err(|err| {
            error!("cannot access table '{}'", argv[0]);
            err
        })?;

        Ok((table.len() as u64, Self { table }))
    }

    pub(crate) fn read(&self, cur: u64, budget: usize) -> &[u8] {
        let cur = cur as usize;
        &self.table[cur..cur + budget]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::reader::Reader;
    use crate::testfw::FakeFirmware;

    fn firmware_with_table() -> FakeFirmware {
        let data: Vec<u8> = (0u32..300).map(|i| (i % 256) as u8).collect();
        FakeFirmware::new().table(*b"XSDT", data)
    }

    #[test]
    fn streams_the_resident_table() {
        let firmware = firmware_with_table();
        let mut reader = Reader::open(&firmware, "table:XSDT").unwrap();
        assert_eq!(reader.total(), 300);

        let mut out = Vec::new();
        loop {
            let buf = reader.read(64).unwrap();
            if buf.is_empty() {
                break;
            }
            out.extend_from_slice(buf);
        }
        assert_eq!(out, firmware.tables[0].1);
    }

    #[test]
    fn signature_must_be_four_characters() {
        let firmware = firmware_with_table();
        assert_eq!(
            Reader::open(&firmware, "table:XSD").err(),
            Some(Error::InvalidArg)
        );
        assert_eq!(
            Reader::open(&firmware, "table:XSDTX").err(),
            Some(Error::InvalidArg)
        );
        assert_eq!(Reader::open(&firmware, "table").err(), Some(Error::InvalidArg));
        assert_eq!(
            Reader::open(&firmware, "table:XSDT:FACP").err(),
            Some(Error::InvalidArg)
        );
    }

    #[test]
    fn unknown_signature_is_not_found() {
        let firmware = firmware_with_table();
        assert_eq!(
            Reader::open(&firmware, "table:FACP").err(),
            Some(Error::NotFound)
        );
    }
}
