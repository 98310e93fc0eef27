use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Error};
use tempfile::NamedTempFile;

pub const STDIN_STDOUT: &str = "-";

/// Where rendered text goes.
///
/// Files are written through a temporary file in the target directory that
/// only replaces the target on [`commit`](Self::commit).  If rendering fails
/// the previous contents of the target stay untouched.
pub enum Output {
    Stdout,
    File {
        target: PathBuf,
        temp: NamedTempFile,
    },
}

impl Output {
    pub fn new(filename: &Path) -> Result<Output, Error> {
        if filename == Path::new(STDIN_STDOUT) {
            return Ok(Output::Stdout);
        }
        let target = std::env::current_dir()?.join(filename);
        let dir = target
            .parent()
            .ok_or_else(|| anyhow!("cannot write to root"))?;
        let temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("unable to create output file in '{}'", dir.display()))?;
        Ok(Output::File { target, temp })
    }

    /// Writes rendered text, optionally followed by a newline.
    pub fn emit(&mut self, text: &str, newline: bool) -> Result<(), Error> {
        self.write_all(text.as_bytes())?;
        if newline {
            self.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn commit(self) -> Result<(), Error> {
        match self {
            Output::Stdout => io::stdout().flush()?,
            Output::File { target, temp } => {
                tracing::debug!(path = %target.display(), "persisting output");
                temp.persist(&target)
                    .with_context(|| format!("unable to write '{}'", target.display()))?;
            }
        }
        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout => io::stdout().write(buf),
            Output::File { temp, .. } => temp.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout => io::stdout().flush(),
            Output::File { temp, .. } => temp.flush(),
        }
    }
}
