//! JSON persistence of whole parameter banks.
//!
//! Loading and saving bypass the per-kind factories entirely.

use super::bank::ParamBank;
use crate::error::PersistError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

impl ParamBank {
    /// Read a bank written by [`ParamBank::save_to_file`] and check its wiring.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<ParamBank, PersistError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let bank: ParamBank =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| PersistError::Serde {
                path: path.to_path_buf(),
                source,
            })?;
        bank.validate()?;

        tracing::debug!(path = %path.display(), run_id = bank.run_id(), "loaded parameter bank");
        Ok(bank)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let io_err = |source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| PersistError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)?;

        tracing::debug!(path = %path.display(), run_id = self.run_id(), "saved parameter bank");
        Ok(())
    }
}
