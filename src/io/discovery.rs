use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use crate::application::DiscoveryError;
use crate::domain::{has_sql_suffix, MigrationFile};

/// List the migration files in `directory`, ordered by ascending sequence number.
///
/// Only regular files named `<digits>_<description>.sql` are considered. Other
/// `.sql` files are skipped with a warning; everything else is ignored.
/// Two files resolving to the same sequence number abort discovery.
pub fn discover(directory: &Path) -> Result<Vec<MigrationFile>, DiscoveryError> {
    let metadata = match fs::metadata(directory) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(DiscoveryError::Missing(directory.to_path_buf()));
        }
        Err(source) => {
            return Err(DiscoveryError::Unreadable {
                path: directory.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory(directory.to_path_buf()));
    }

    let unreadable = |source| DiscoveryError::Unreadable {
        path: directory.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if !path.is_file() {
            debug!(path = %path.display(), "Skipping non-file entry");
            continue;
        }

        match MigrationFile::from_path(path.clone()) {
            Some(file) => files.push(file),
            None => {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                if has_sql_suffix(name) {
                    warn!(file = %name, "Ignoring SQL file without a numeric NNNN_ prefix");
                } else {
                    debug!(path = %path.display(), "Skipping non-migration file");
                }
            }
        }
    }

    files.sort_by(|a, b| {
        a.sequence_number
            .cmp(&b.sequence_number)
            .then_with(|| a.name.cmp(&b.name))
    });

    if let Some(pair) = files
        .windows(2)
        .find(|pair| pair[0].sequence_number == pair[1].sequence_number)
    {
        return Err(DiscoveryError::DuplicateSequence {
            sequence_number: pair[0].sequence_number,
            first: pair[0].name.clone(),
            second: pair[1].name.clone(),
        });
    }

    Ok(files)
}
