//! Saved descriptors for building without a live server.
//!
//! A described command serializes to `command-<hash>.json`, where the hash
//! covers the command name and statement text. Loading verifies the text
//! against the file's copy, so a stale or colliding file surfaces as an
//! error instead of describing the wrong command.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::descriptor::CommandDescriptor;
use crate::error::{Error, Result};
use crate::options::hash_string;

/// A descriptor together with the inputs it was described from, in the
/// form that lands on disk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommandData {
    pub name: String,
    pub text: String,
    pub descriptor: CommandDescriptor,
    pub hash: String,
}

impl CommandData {
    pub fn new(text: impl Into<String>, descriptor: CommandDescriptor) -> Self {
        let text = text.into();
        let hash = content_hash(descriptor.name(), &text);

        CommandData {
            name: descriptor.name().to_owned(),
            text,
            descriptor,
            hash,
        }
    }

    /// The path this data saves to under `dir`.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("command-{}.json", self.hash))
    }

    /// Writes `command-<hash>.json` into `dir`, replacing any previous
    /// save of the same command.
    pub fn save_in(&self, dir: &Path) -> Result<()> {
        use std::io::ErrorKind;

        let path = self.path_in(dir);

        if let Err(err) = fs::remove_file(&path) {
            match err.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => (),
                _ => return Err(Error::Io(err)),
            }
        }

        // Delete-then-create-new uses the file itself as a mutex: if a
        // concurrent save re-created it in between, that save's contents
        // are equivalent and this one backs off.
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(err) => return Err(Error::Io(err)),
        };

        let mut data = Vec::with_capacity(4096);

        serde_json::to_writer_pretty(&mut data, self)
            .expect("BUG: failed to serialize command data");

        // Trailing newline keeps editors and diff tools from rewriting
        // the file.
        data.push(b'\n');

        file.write_all(&data).map_err(Error::Io)?;

        Ok(())
    }

    /// Loads a `command-<hash>.json` file and verifies it against the
    /// statement text the caller is actually building with.
    pub fn load(path: &Path, expected_text: &str) -> Result<CommandData> {
        let contents = fs::read_to_string(path).map_err(Error::Io)?;
        let data: CommandData = serde_json::from_str(&contents)?;

        if data.text != expected_text {
            return Err(err_protocol!(
                "saved command data at {} does not match the statement text; re-describe and save again",
                path.display()
            ));
        }

        Ok(data)
    }
}

fn content_hash(name: &str, text: &str) -> String {
    hash_string(&format!("{name}\n{text}"))
}
