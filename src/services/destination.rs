//! Collision-safe file naming inside the mods directory.
//!
//! A name is claimed by creating the file with `create_new`, so two writers
//! can never end up with the same destination even without a lock.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};

/// Candidate name for attempt `counter`: `name`, then `stem (1).ext`, ...
pub fn numbered_name(file_name: &str, counter: u32) -> String {
    if counter == 0 {
        return file_name.to_string();
    }

    let path = Utf8Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!("{stem} ({counter}).{ext}"),
        _ => format!("{file_name} ({counter})"),
    }
}

/// Create a new, empty file named after `file_name` in `dir`, appending
/// ` (n)` before the extension until an unused name is found.
pub fn claim_destination(dir: &Utf8Path, file_name: &str) -> io::Result<(Utf8PathBuf, File)> {
    let mut counter = 0u32;
    loop {
        let path = dir.join(numbered_name(file_name, counter));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                counter = counter.checked_add(1).ok_or(e)?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Copy `reader` into a freshly claimed file. A partially written file is
/// removed again when the copy fails.
pub fn write_unique(dir: &Utf8Path, file_name: &str, reader: &mut dyn Read) -> io::Result<Utf8PathBuf> {
    let (path, mut file) = claim_destination(dir, file_name)?;

    if let Err(e) = io::copy(reader, &mut file).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(e);
    }

    Ok(path)
}
