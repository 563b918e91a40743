use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::ResourceKind;
use crate::error::HomopairError;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, HomopairError>;

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, HomopairError>;

    fn contains(&self, key: &str) -> Result<bool, HomopairError> {
        Ok(self.get(key)?.is_some())
    }

    fn len(&self) -> Result<usize, HomopairError>;
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, HomopairError> {
        let entries = self.entries.lock().map_err(|err| HomopairError::Store(err.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, HomopairError> {
        let mut entries = self.entries.lock().map_err(|err| HomopairError::Store(err.to_string()))?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn len(&self) -> Result<usize, HomopairError> {
        let entries = self.entries.lock().map_err(|err| HomopairError::Store(err.to_string()))?;
        Ok(entries.len())
    }
}

#[derive(Serialize, Deserialize)]
struct LogRecord {
    k: String,
    v: String,
}

pub struct FileKvStore {
    path: Utf8PathBuf,
    inner: Mutex<FileState>,
}

struct FileState {
    entries: HashMap<String, String>,
    log: File,
}

impl FileKvStore {
    pub fn open(path: &Utf8Path) -> Result<Self, HomopairError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| HomopairError::Filesystem(err.to_string()))?;
        }

        let content = match fs::read_to_string(path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(HomopairError::Filesystem(err.to_string())),
        };
        let (entries, valid_len) = replay(path, &content)?;
        debug!(path = %path, records = entries.len(), "opened store namespace");

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| HomopairError::Filesystem(err.to_string()))?;
        if valid_len < content.len() {
            log.set_len(valid_len as u64)
                .map_err(|err| HomopairError::Filesystem(err.to_string()))?;
        }
        if !content[..valid_len].is_empty() && !content[..valid_len].ends_with('\n') {
            log.write_all(b"\n")
                .map_err(|err| HomopairError::Filesystem(err.to_string()))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileState { entries, log }),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, HomopairError> {
        let state = self.inner.lock().map_err(|err| HomopairError::Store(err.to_string()))?;
        Ok(state.entries.get(key).cloned())
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, HomopairError> {
        let mut state = self.inner.lock().map_err(|err| HomopairError::Store(err.to_string()))?;
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        let mut line = serde_json::to_vec(&LogRecord {
            k: key.to_string(),
            v: value.to_string(),
        })
        .map_err(|err| HomopairError::Store(err.to_string()))?;
        line.push(b'\n');
        append_or_rollback(&mut state.log, &line)
            .map_err(|err| HomopairError::Filesystem(err.to_string()))?;
        state.entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn len(&self) -> Result<usize, HomopairError> {
        let state = self.inner.lock().map_err(|err| HomopairError::Store(err.to_string()))?;
        Ok(state.entries.len())
    }
}

trait AppendLog: Write {
    fn size(&self) -> io::Result<u64>;

    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendLog for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

fn append_or_rollback<L: AppendLog>(log: &mut L, line: &[u8]) -> io::Result<()> {
    let before = log.size()?;
    match log.write_all(line).and_then(|_| log.flush()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Err(rollback) = log.truncate(before) {
                warn!(error = %rollback, "failed to roll back partial store write");
            }
            Err(err)
        }
    }
}

fn replay(
    path: &Utf8Path,
    content: &str,
) -> Result<(HashMap<String, String>, usize), HomopairError> {
    let mut entries = HashMap::new();
    let mut offset = 0usize;
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    for (line_no, line) in lines.iter().enumerate() {
        let record = line.trim();
        if record.is_empty() {
            offset += line.len();
            continue;
        }
        match serde_json::from_str::<LogRecord>(record) {
            // First write wins, matching set-if-absent.
            Ok(record) => {
                entries.entry(record.k).or_insert(record.v);
            }
            Err(err) if line_no + 1 == lines.len() => {
                warn!(path = %path, line = line_no + 1, %err, "discarding truncated store record");
                return Ok((entries, offset));
            }
            Err(err) => {
                return Err(HomopairError::Store(format!("{path}:{}: {err}", line_no + 1)));
            }
        }
        offset += line.len();
    }
    Ok((entries, offset))
}

#[derive(Clone)]
pub struct Store {
    root: Option<Utf8PathBuf>,
    namespaces: Arc<BTreeMap<ResourceKind, Arc<dyn KvStore>>>,
}

impl Store {
    pub fn new() -> Result<Self, HomopairError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("homopair")).ok()
            })
            .ok_or_else(|| {
                HomopairError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Self::open(&root)
    }

    pub fn open(root: &Utf8Path) -> Result<Self, HomopairError> {
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| HomopairError::Filesystem(err.to_string()))?;
        let mut namespaces: BTreeMap<ResourceKind, Arc<dyn KvStore>> = BTreeMap::new();
        for kind in ResourceKind::ALL {
            let path = Self::namespace_path(root, kind);
            namespaces.insert(kind, Arc::new(FileKvStore::open(&path)?));
        }
        Ok(Self {
            root: Some(root.to_path_buf()),
            namespaces: Arc::new(namespaces),
        })
    }

    pub fn in_memory() -> Self {
        let mut namespaces: BTreeMap<ResourceKind, Arc<dyn KvStore>> = BTreeMap::new();
        for kind in ResourceKind::ALL {
            namespaces.insert(kind, Arc::new(MemoryKvStore::new()));
        }
        Self {
            root: None,
            namespaces: Arc::new(namespaces),
        }
    }

    pub fn with_namespaces(
        mut provided: BTreeMap<ResourceKind, Arc<dyn KvStore>>,
    ) -> Self {
        for kind in ResourceKind::ALL {
            provided
                .entry(kind)
                .or_insert_with(|| Arc::new(MemoryKvStore::new()));
        }
        Self {
            root: None,
            namespaces: Arc::new(provided),
        }
    }

    pub fn namespace_path(root: &Utf8Path, kind: ResourceKind) -> Utf8PathBuf {
        root.join(format!("{}.jsonl", kind.namespace()))
    }

    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    pub fn namespace(&self, kind: ResourceKind) -> &dyn KvStore {
        // Every constructor fills all kinds.
        self.namespaces[&kind].as_ref()
    }

    pub fn counts(&self) -> Result<BTreeMap<ResourceKind, usize>, HomopairError> {
        self.namespaces
            .iter()
            .map(|(kind, store)| Ok((*kind, store.len()?)))
            .collect()
    }
}
