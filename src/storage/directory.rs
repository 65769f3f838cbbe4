//! A filesystem backed blood bank
//!
//! The [`Directory`] persists the in-memory stores to a directory of flat
//! files. It knows the file formats but none of the allocation rules, which
//! live in [`ReconciliationEngine`].
//!
//! ```text
//! <root>/
//!   config.toml      settings
//!   sequence.toml    next unit and request ids
//!   units.jsonl      one blood unit per line
//!   requests.jsonl   one request per line
//!   users.jsonl      one user per line
//! ```

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    domain::{self, Config, InventoryStore, ReconciliationEngine, RequestLedger, Users},
    storage::records::{RequestRecord, Sequences, UnitRecord, UserRecord},
};

const CONFIG_FILE: &str = "config.toml";
const SEQUENCE_FILE: &str = "sequence.toml";
const UNITS_FILE: &str = "units.jsonl";
const REQUESTS_FILE: &str = "requests.jsonl";
const USERS_FILE: &str = "users.jsonl";

/// In-memory state of an opened directory.
#[derive(Debug, Default)]
pub struct Loaded {
    inventory: InventoryStore,
    ledger: RequestLedger,
    users: Users,
    config: Config,
}

/// A directory that has not been read yet.
#[derive(Debug, PartialEq, Eq)]
pub struct Unloaded;

/// A filesystem backed blood bank.
#[derive(Debug)]
pub struct Directory<S> {
    /// The root of the directory records are stored in.
    root: PathBuf,
    state: S,
}

impl<S> Directory<S> {
    /// The directory's root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Directory<Unloaded> {
    /// Opens a directory at the given path.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
            state: Unloaded,
        }
    }

    /// Returns `true` if `init` has been run at this path.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.root.join(CONFIG_FILE).is_file()
    }

    /// Reads every record file into memory.
    ///
    /// Missing files are treated as empty, and a missing configuration file
    /// gives the default configuration.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable file, malformed line, or record that the
    /// stores reject (for example a duplicate id). The error names the file
    /// and, for record files, the line.
    pub fn load_all(self) -> Result<Directory<Loaded>, LoadError> {
        let config = load_config(&self.root)?;
        let mut state = Loaded {
            config,
            ..Loaded::default()
        };

        read_records(&self.root.join(UNITS_FILE), |record: UnitRecord| {
            record.load_into(&state.inventory)
        })?;
        read_records(&self.root.join(REQUESTS_FILE), |record: RequestRecord| {
            record.load_into(&state.ledger)
        })?;

        read_records(&self.root.join(USERS_FILE), |record: UserRecord| {
            record.load_into(&mut state.users)
        })?;

        if let Some(sequences) = load_sequences(&self.root)? {
            state.inventory.restore_next_id(sequences.next_unit);
            state.ledger.restore_next_id(sequences.next_request);
        }

        tracing::debug!(
            "Loaded {} units, {} requests and {} users from {}",
            state.inventory.list_all_units().len(),
            state.ledger.len(),
            state.users.len(),
            self.root.display()
        );

        Ok(Directory {
            root: self.root,
            state,
        })
    }
}

impl Directory<Loaded> {
    /// Creates a new, empty blood bank at `root` with the given configuration.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::AlreadyInitialised`] if `root` already holds a
    /// configuration file, or an I/O error if the files cannot be written.
    pub fn init(root: PathBuf, config: Config) -> Result<Self, SaveError> {
        if root.join(CONFIG_FILE).exists() {
            return Err(SaveError::AlreadyInitialised(root));
        }
        std::fs::create_dir_all(&root).map_err(|source| SaveError::Io {
            path: root.clone(),
            source,
        })?;

        let directory = Self {
            root,
            state: Loaded {
                config,
                ..Loaded::default()
            },
        };
        directory.flush()?;
        tracing::info!("Initialised blood bank at {}", directory.root.display());
        Ok(directory)
    }

    /// An engine over this directory's stores.
    #[must_use]
    pub const fn engine(&self) -> ReconciliationEngine<'_> {
        ReconciliationEngine::new(&self.state.inventory, &self.state.ledger)
    }

    /// The stock.
    #[must_use]
    pub const fn inventory(&self) -> &InventoryStore {
        &self.state.inventory
    }

    /// The request ledger.
    #[must_use]
    pub const fn ledger(&self) -> &RequestLedger {
        &self.state.ledger
    }

    /// Registered users.
    #[must_use]
    pub const fn users(&self) -> &Users {
        &self.state.users
    }

    /// Registered users, for registration and removal.
    pub const fn users_mut(&mut self) -> &mut Users {
        &mut self.state.users
    }

    /// The directory's settings.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.state.config
    }

    /// The directory's settings, for modification. Changes are written by
    /// [`Directory::flush`].
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.state.config
    }

    /// Writes the complete in-memory state back to disk.
    ///
    /// Each file is written to a temporary sibling and renamed into place, so
    /// an interrupted flush leaves every file either old or new.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written. Files already
    /// replaced stay replaced.
    pub fn flush(&self) -> Result<(), SaveError> {
        let state = &self.state;

        write_records(
            &self.root.join(UNITS_FILE),
            state.inventory.list_all_units().iter().map(UnitRecord::from),
        )?;
        write_records(
            &self.root.join(REQUESTS_FILE),
            state.ledger.list_all_requests().iter().map(RequestRecord::from),
        )?;
        write_records(
            &self.root.join(USERS_FILE),
            state.users.iter().map(UserRecord::from),
        )?;

        let sequences = Sequences {
            next_unit: state.inventory.next_id(),
            next_request: state.ledger.next_id(),
        };
        let sequence_path = self.root.join(SEQUENCE_FILE);
        let content = toml::to_string_pretty(&sequences).map_err(SaveError::Toml)?;
        replace_file(&sequence_path, content.as_bytes())?;

        let config = state.config.to_toml().map_err(SaveError::Config)?;
        replace_file(&self.root.join(CONFIG_FILE), config.as_bytes())?;

        tracing::debug!("Flushed blood bank to {}", self.root.display());
        Ok(())
    }
}

/// Errors that can occur while reading a directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A file exists but could not be read.
    #[error("failed to read {}", .path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// A line is not a well-formed record.
    #[error("{}:{}: malformed record", .path.display(), .line)]
    Malformed {
        /// The file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// A well-formed record was rejected by the stores.
    #[error("{}:{}: invalid record", .path.display(), .line)]
    Invalid {
        /// The file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Why the record was rejected.
        source: domain::Error,
    },

    /// The id sequence file could not be parsed.
    #[error("failed to parse {}", .path.display())]
    Sequence {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },

    /// The configuration file could not be parsed.
    #[error("{0}")]
    Config(String),
}

/// Errors that can occur while writing a directory.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// `init` was pointed at an existing blood bank.
    #[error("{} already contains a blood bank", .0.display())]
    AlreadyInitialised(PathBuf),

    /// A file could not be written.
    #[error("failed to write {}", .path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize record")]
    Json(#[from] serde_json::Error),

    /// The id sequence could not be serialized.
    #[error("failed to serialize id sequence")]
    Toml(#[source] toml::ser::Error),

    /// The configuration could not be saved.
    #[error("{0}")]
    Config(String),
}

fn load_config(root: &Path) -> Result<Config, LoadError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    Config::load(&path).map_err(LoadError::Config)
}

fn load_sequences(root: &Path) -> Result<Option<Sequences>, LoadError> {
    let path = root.join(SEQUENCE_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No id sequence at {}, deriving from records", path.display());
            return Ok(None);
        }
        Err(source) => return Err(LoadError::Io { path, source }),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| LoadError::Sequence { path, source })
}

fn read_records<T, F>(path: &Path, mut load: F) -> Result<(), LoadError>
where
    T: DeserializeOwned,
    F: FnMut(T) -> domain::Result<()>,
{
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Skipping missing file {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(io_error(e)),
    };

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let number = index + 1;

        let record = serde_json::from_str(&line).map_err(|source| LoadError::Malformed {
            path: path.to_path_buf(),
            line: number,
            source,
        })?;
        load(record).map_err(|source| LoadError::Invalid {
            path: path.to_path_buf(),
            line: number,
            source,
        })?;
    }
    Ok(())
}

fn write_records<T: Serialize>(
    path: &Path,
    records: impl Iterator<Item = T>,
) -> Result<(), SaveError> {
    let mut buffer = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buffer, &record)?;
        buffer.push(b'\n');
    }
    replace_file(path, &buffer)
}

fn replace_file(path: &Path, content: &[u8]) -> Result<(), SaveError> {
    let io_error = |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let temporary = path.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&temporary).map_err(io_error)?);
    writer.write_all(content).map_err(io_error)?;
    writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)
        .and_then(|file| file.sync_all())
        .map_err(io_error)?;
    std::fs::rename(&temporary, path).map_err(io_error)
}
