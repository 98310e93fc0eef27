use std::io::{self, Seek, SeekFrom};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// The default ceiling for template sources (30 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 30 * 1024 * 1024;

/// The default ceiling for rendered output (300 MiB).
pub const DEFAULT_MAX_OUTPUT_SIZE: u64 = 300 * 1024 * 1024;

/// The default ceiling for literal `range()` loops.
pub const DEFAULT_MAX_RANGE_SIZE: u64 = 100_000;

/// Resource ceilings applied around parsing and rendering.
///
/// The input and output ceilings are independent.  Rendered output may
/// legitimately be a lot larger than the template that produced it, which is
/// why the defaults are an order of magnitude apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Limits {
    /// Maximum size of the template source in bytes.
    pub max_file_size: u64,
    /// Maximum size of the rendered output in bytes.
    pub max_output_size: u64,
    /// Maximum number of iterations of a `for` loop over a literal range.
    pub max_range_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            max_range_size: DEFAULT_MAX_RANGE_SIZE,
        }
    }
}

impl Limits {
    /// Measures a template source without reading it.
    ///
    /// The reader is seeked to its end and then back to where it was, so a
    /// subsequent read starts at the original position.
    pub fn check_file_size<R: Seek>(&self, source: &mut R) -> Result<u64, Error> {
        let size = measure(source).map_err(|err| {
            Error::new(
                ErrorKind::Size,
                format!("Template file could not be measured: {err}"),
            )
        })?;
        if size > self.max_file_size {
            return Err(Error::size(format!(
                "Template file size exceeds maximum limit of {} bytes",
                self.max_file_size
            )));
        }
        Ok(size)
    }

    /// Checks rendered text against the output ceiling.
    pub fn check_output_size(&self, text: &str) -> Result<(), Error> {
        if text.contains('\0') {
            return Err(Error::encoding("Content contains invalid binary data"));
        }
        if text.len() as u64 > self.max_output_size {
            return Err(Error::size(format!(
                "Memory consumption exceeds maximum limit of {} bytes",
                self.max_output_size
            )));
        }
        Ok(())
    }
}

fn measure<R: Seek>(source: &mut R) -> io::Result<u64> {
    let pos = source.stream_position()?;
    let end = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}
