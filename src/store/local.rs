//! Local config files.
//!
//! A local file holds `key=value` lines for a single section named after the
//! file stem, so `conf/user_conf.cfg` fills section `user_conf`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::parser::parse_entries;

#[derive(Debug, Error)]
pub enum LocalConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} does not name a section", .0.display())]
    InvalidName(PathBuf),
}

fn read(path: &Path) -> Result<String, LocalConfigError> {
    fs::read_to_string(path).map_err(|source| LocalConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// File text with every line terminated by `\n`.
pub fn read_raw(path: &Path) -> Result<String, LocalConfigError> {
    let text = read(path)?;
    Ok(text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .fold(String::with_capacity(text.len()), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            out
        }))
}

/// File text with the line breaks removed.
pub fn read_flat(path: &Path) -> Result<String, LocalConfigError> {
    let text = read(path)?;
    Ok(text.lines().map(|line| line.trim_end_matches('\r')).collect())
}

/// Section a local file fills: its stem, when that is usable in `section.key`.
pub fn section_name(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    let usable = !stem.is_empty() && !stem.starts_with('.') && !stem.contains(['.', '[', ']']);
    usable.then_some(stem)
}

/// Read and parse one local file into its section name and entries.
pub fn load_file(path: &Path) -> Result<(String, HashMap<String, String>), LocalConfigError> {
    let name = section_name(path).ok_or_else(|| LocalConfigError::InvalidName(path.to_path_buf()))?;
    let entries = parse_entries(&read(path)?);
    Ok((name.to_string(), entries))
}
