use std::str::FromStr;

use log::error;

use crate::error::{Error, Result};
use crate::firmware::{Firmware, Guid};

/// Exposes a firmware variable's value as its own bytes. The value is
/// fetched once at open into memory owned by the source and released
/// when the reader is dropped.
pub(crate) struct VarSource {
    value: Vec<u8>,
}

impl VarSource {
    /// Opens a variable source. Arguments are the variable name and
    /// optionally its vendor GUID; without the GUID the name must be
    /// unique across vendors.
    pub(crate) fn open<F: Firmware>(firmware: &F, argv: &[&str]) -> Result<(u64, Self)> {
        if argv.is_empty() || argv.len() > 2 {
            return Err(Error::InvalidArg);
        }

        let name = argv[0];
        let vendor = match argv.get(1) {
            Some(token) => Guid::from_str(token)?,
            None => find_by_name(firmware, name)?,
        };

        let value = firmware.variable(name, &vendor).map_err(|err| {
            error!("cannot access variable {} {}", name, vendor);
            err
        })?;

        Ok((value.len() as u64, Self { value }))
    }

    pub(crate) fn read(&self, cur: u64, budget: usize) -> &[u8] {
        let cur = cur as usize;
        &self.value[cur..cur + budget]
    }
}

/// Resolves the vendor GUID of a variable given only its name.
fn find_by_name<F: Firmware>(firmware: &F, name: &str) -> Result<Guid> {
    let mut found = None;
    for (var_name, vendor) in firmware.variables()? {
        if var_name == name {
            if found.is_some() {
                error!("found 2 variables named {}", name);
                return Err(Error::Unsupported);
            }
            found = Some(vendor);
        }
    }
    found.ok_or(Error::NotFound)
}
