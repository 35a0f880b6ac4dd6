//! JSON configuration loading.
//!
//! Hand-edited configuration files tend to pick up trailing `# ...` annotations,
//! which JSON does not allow. [`load_json_repairing`] recovers from that once:
//! when the first parse fails, annotations are stripped from every line, the
//! cleaned text is written back to the file and parsing is retried. A second
//! failure is reported as [`ConfigError::Parse`].

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use flappy_engine::WorldConfigError;
use serde::de::DeserializeOwned;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ConfigError {
    #[display("failed to access config file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[display("{_0}")]
    #[from]
    World(WorldConfigError),
}

/// Reads and parses a JSON file.
pub fn load_json<T, P>(path: P) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Reads and parses a JSON file, stripping `#` annotations and retrying once.
pub fn load_json_repairing<T, P>(path: P) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = read(path)?;
    let first_error = match serde_json::from_str(&text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let sanitized = strip_annotations(&text);
    if sanitized == text {
        return Err(ConfigError::Parse {
            path: path.to_owned(),
            source: first_error,
        });
    }
    log::warn!(
        "{}: {first_error}; stripping inline annotations and retrying",
        path.display()
    );
    fs::write(path, &sanitized).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&sanitized).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Removes `#` annotations outside string literals from every line.
///
/// Trailing whitespace left behind is trimmed; line structure is kept.
#[must_use]
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut in_string = false;
        let mut escaped = false;
        let mut end = line.len();
        for (pos, ch) in line.char_indices() {
            match ch {
                _ if escaped => escaped = false,
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '#' if !in_string => {
                    end = pos;
                    break;
                }
                _ => {}
            }
        }
        if end == line.len() {
            out.push_str(line);
        } else {
            out.push_str(line[..end].trim_end());
        }
    }
    out
}
