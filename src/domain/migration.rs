use std::path::{Path, PathBuf};

/// A SQL script discovered on disk, ordered by its numeric filename prefix.
///
/// File names follow `NNNN_description.sql`. The leading digits are parsed as
/// an integer, so `0002_x.sql` and `2_x.sql` carry the same sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub sequence_number: u64,
    pub name: String,
    pub path: PathBuf,
}

impl MigrationFile {
    /// Build a migration from a path whose file name matches the naming pattern.
    /// Returns `None` for anything else.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let sequence_number = parse_sequence_number(&name)?;
        Some(Self {
            sequence_number,
            name,
            path,
        })
    }

    /// The part of the file name between the numeric prefix and `.sql`.
    pub fn description(&self) -> &str {
        let stem = if has_sql_suffix(&self.name) {
            self.name
                .get(..self.name.len() - SQL_SUFFIX.len())
                .unwrap_or(&self.name)
        } else {
            &self.name
        };
        match stem.split_once('_') {
            Some((_, description)) => description,
            None => stem,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

const SQL_SUFFIX: &str = ".sql";

/// True when the file name ends in `.sql`, ignoring case.
pub fn has_sql_suffix(file_name: &str) -> bool {
    file_name.len() > SQL_SUFFIX.len()
        && file_name
            .get(file_name.len() - SQL_SUFFIX.len()..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(SQL_SUFFIX))
}

/// Parse the sequence number of a `<digits>_<description>.sql` file name.
///
/// Example: "0003_goals.sql" -> Some(3), "goals.sql" -> None
pub fn parse_sequence_number(file_name: &str) -> Option<u64> {
    if !has_sql_suffix(file_name) {
        return None;
    }
    let stem = &file_name[..file_name.len() - SQL_SUFFIX.len()];
    let (digits, description) = stem.split_once('_')?;
    if digits.is_empty() || description.is_empty() {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
