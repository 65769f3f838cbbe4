mod directory;
mod records;

pub use directory::{Directory, LoadError, Loaded, SaveError, Unloaded};
