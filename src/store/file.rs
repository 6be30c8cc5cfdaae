use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::{debug, warn};

use super::{Batch, Error, Store};

type Document = BTreeMap<String, String>;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Store backed by a single JSON object on disk.
///
/// The file is re-read on every operation so writes made by another context
/// are always observed. Writes go to a sibling temp file which is then renamed
/// over the original, a reader never sees a half written document.
///
/// Every operation holds an OS lock on a sibling `<file>.lock` for its whole
/// read-modify-write, shared for reads and exclusive for writes, so any number
/// of handles and processes on one path see each [`Store::swap`] atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

/// Held for the duration of one operation. Dropping the file releases the OS
/// lock.
struct Locked<'a> {
    _file: File,
    _guard: MutexGuard<'a, ()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl FileStore {
    /// Opens the store, creating parent directories as needed. The file
    /// itself is created on first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = path.file_name().map(OsString::from).unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        debug!("Opened file store at {}", path.display());
        Ok(Self {
            path,
            lock_path,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, access: Access) -> Result<Locked<'_>, Error> {
        let guard = self
            .guard
            .lock()
            .map_err(|err| Error::Unavailable(err.to_string()))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        match access {
            Access::Read => file.lock_shared()?,
            Access::Write => file.lock()?,
        }
        Ok(Locked {
            _file: file,
            _guard: guard,
        })
    }

    fn load(&self) -> Result<Document, Error> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(document) => Ok(document),
            Err(err) if err.is_eof() => {
                warn!("Store file {} is empty, starting fresh", self.path.display());
                Ok(Document::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, document: &Document) -> Result<(), Error> {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .path
            .with_extension(format!("{}.{seq}.tmp", std::process::id()));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, document)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _locked = self.lock(Access::Read)?;
        Ok(self.load()?.remove(key))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, Error> {
        let _locked = self.lock(Access::Read)?;
        let document = self.load()?;
        Ok(keys.iter().map(|key| document.get(*key).cloned()).collect())
    }

    fn write_batch(&self, batch: Batch) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }
        let _locked = self.lock(Access::Write)?;
        let mut document = self.load()?;
        batch.apply_to(&mut document);
        self.save(&document)
    }

    fn swap(&self, key: &str, value: &str) -> Result<Option<String>, Error> {
        let _locked = self.lock(Access::Write)?;
        let mut document = self.load()?;
        let previous = document.insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.save(&document)?;
        }
        Ok(previous)
    }
}
