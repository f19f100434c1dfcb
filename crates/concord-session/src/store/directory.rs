//! Directory-backed room store.
//!
//! One CBOR file per room. File names are the hex encoding of the room name
//! plus a `.room` extension, so any room name maps to a portable file name.
//! Each write goes to its own temporary sibling and is renamed into place,
//! so concurrent saves of one room never see each other's partial files.

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use concord_core::RoomSnapshot;

use super::{RoomStore, StoreError};

const EXTENSION: &str = "room";
const TEMP_SUFFIX: &str = ".room.tmp";

/// Room store writing one file per room under a directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened room store");
        Ok(Self { root })
    }

    /// Directory holding the room files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", hex::encode(name)))
    }
}

/// Room name encoded in a store file name, if it is one.
fn room_name_of(path: &Path) -> Option<String> {
    if path.extension()? != EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

impl RoomStore for DirectoryStore {
    fn room_names(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            match room_name_of(&path) {
                Some(name) => {
                    names.insert(name);
                },
                None => tracing::trace!(path = %path.display(), "skipping foreign file"),
            }
        }
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<Option<RoomSnapshot>, StoreError> {
        let path = self.path_for(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: RoomSnapshot = ciborium::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Decode { path: path.clone(), reason: e.to_string() })?;

        if snapshot.name != name {
            return Err(StoreError::Decode {
                path,
                reason: format!("snapshot belongs to room {:?}", snapshot.name),
            });
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &RoomSnapshot) -> Result<(), StoreError> {
        let path = self.path_for(&snapshot.name);
        let mut temp =
            tempfile::Builder::new().prefix(".").suffix(TEMP_SUFFIX).tempfile_in(&self.root)?;

        let mut writer = BufWriter::new(temp.as_file_mut());
        ciborium::into_writer(snapshot, &mut writer).map_err(|e| StoreError::Encode {
            room: snapshot.name.clone(),
            reason: e.to_string(),
        })?;
        writer.flush()?;
        drop(writer);
        temp.as_file().sync_all()?;

        temp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
