#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Shared test utilities for the sftp-ferry workspace.
//!
//! [`MemoryRemoteFs`] is an in-memory stand-in for a real SFTP session. It
//! implements [`RemoteFs`] over a flat map of absolute paths, supports
//! scripted one-shot failures for the compensation paths, and exposes a
//! [`MemoryRemoteHandle`] so a test can inspect state after the filesystem
//! has been boxed and consumed by the code under test. [`MemoryRemoteFactory`]
//! opens any number of sessions over the same shared state, for code that
//! follows the one-session-per-operation discipline.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use client::fs::{FileAttrs, RemoteFs, SessionFactory};
use client::ClientError;

#[derive(Clone)]
struct FileEntry {
    data: Vec<u8>,
    modified: SystemTime,
    /// Bytes added to the reported size on every stat, simulating a file
    /// that is still being written.
    grow_per_stat: u64,
    stat_size: u64,
    mode: Option<u32>,
}

struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, FileEntry>,
    /// Sessions opened over this state and not yet closed.
    open_sessions: usize,
    fail_next_put: bool,
    fail_next_rename: bool,
    fail_next_list: bool,
    fail_next_stat: bool,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "/",
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl State {
    fn add_dir_with_ancestors(&mut self, path: &str) {
        let mut current = path;
        loop {
            self.dirs.insert(current.to_owned());
            if current == "/" {
                break;
            }
            current = parent_of(current);
        }
    }

    fn is_child_of<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
        (parent_of(path) == dir).then(|| name_of(path))
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory remote filesystem session for tests.
pub struct MemoryRemoteFs {
    home: String,
    current_dir: String,
    closed: bool,
    state: Arc<Mutex<State>>,
}

/// Shared view into a [`MemoryRemoteFs`], usable after the filesystem has
/// been moved into the code under test.
#[derive(Clone)]
pub struct MemoryRemoteHandle {
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteHandle {
    /// Whether every session opened over this state has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().open_sessions == 0
    }

    /// Whether a file exists at `path`.
    #[must_use]
    pub fn has_file(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    /// Whether a directory exists at `path`.
    #[must_use]
    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    /// Contents of the file at `path`, if present.
    #[must_use]
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).map(|entry| entry.data.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }
}

/// Opens fresh [`MemoryRemoteFs`] sessions over one shared state.
pub struct MemoryRemoteFactory {
    home: String,
    state: Arc<Mutex<State>>,
}

impl SessionFactory for MemoryRemoteFactory {
    fn open(&self) -> Result<Box<dyn RemoteFs>, ClientError> {
        lock_state(&self.state).open_sessions += 1;
        Ok(Box::new(MemoryRemoteFs {
            home: self.home.clone(),
            current_dir: self.home.clone(),
            closed: false,
            state: Arc::clone(&self.state),
        }))
    }
}

impl MemoryRemoteFs {
    /// Creates an empty remote with `home` (and its ancestors) present.
    #[must_use]
    pub fn new(home: &str) -> Self {
        let mut state = State {
            dirs: BTreeSet::new(),
            files: BTreeMap::new(),
            open_sessions: 1,
            fail_next_put: false,
            fail_next_rename: false,
            fail_next_list: false,
            fail_next_stat: false,
        };
        state.add_dir_with_ancestors(home);
        Self {
            home: home.to_owned(),
            current_dir: home.to_owned(),
            closed: false,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Adds a file, creating any missing parent directories.
    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        let mut state = self.lock();
        state.add_dir_with_ancestors(parent_of(path));
        state.files.insert(
            path.to_owned(),
            FileEntry {
                data: data.to_vec(),
                modified: SystemTime::now(),
                grow_per_stat: 0,
                stat_size: data.len() as u64,
                mode: None,
            },
        );
    }

    /// Adds a directory, creating any missing ancestors.
    pub fn add_dir(&mut self, path: &str) {
        self.lock().add_dir_with_ancestors(path);
    }

    /// Whether a directory exists at `path`.
    #[must_use]
    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    /// Overrides the modification time reported for `path`.
    pub fn set_modified(&mut self, path: &str, modified: SystemTime) {
        if let Some(entry) = self.lock().files.get_mut(path) {
            entry.modified = modified;
        }
    }

    /// Makes every subsequent stat of `path` report `bytes` more than the
    /// one before it.
    pub fn grow_on_stat(&mut self, path: &str, bytes: u64) {
        if let Some(entry) = self.lock().files.get_mut(path) {
            entry.grow_per_stat = bytes;
        }
    }

    /// Makes the next `put` fail.
    pub fn fail_next_put(&mut self) {
        self.lock().fail_next_put = true;
    }

    /// Makes the next `rename` fail.
    pub fn fail_next_rename(&mut self) {
        self.lock().fail_next_rename = true;
    }

    /// Makes the next directory listing fail.
    pub fn fail_next_list(&mut self) {
        self.lock().fail_next_list = true;
    }

    /// Makes the next stat fail.
    pub fn fail_next_stat(&mut self) {
        self.lock().fail_next_stat = true;
    }

    /// Contents of the file at `path`, if present.
    #[must_use]
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).map(|entry| entry.data.clone())
    }

    /// Names of the files directly under `dir`, or `None` when the directory
    /// does not exist.
    #[must_use]
    pub fn list_names(&self, dir: &str) -> Option<Vec<String>> {
        let state = self.lock();
        if !state.dirs.contains(dir) {
            return None;
        }
        Some(
            state
                .files
                .keys()
                .filter_map(|path| State::is_child_of(path, dir))
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Permission bits last applied to `path`, if any.
    #[must_use]
    pub fn mode_of(&self, path: &str) -> Option<u32> {
        self.lock().files.get(path).and_then(|entry| entry.mode)
    }

    /// Returns a shared view for post-hoc assertions.
    #[must_use]
    pub fn handle(&self) -> MemoryRemoteHandle {
        MemoryRemoteHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Converts this seeding instance into a session factory over the same
    /// state. The instance itself no longer counts as an open session.
    #[must_use]
    pub fn into_factory(mut self) -> MemoryRemoteFactory {
        {
            let mut state = self.lock();
            if !self.closed {
                state.open_sessions -= 1;
            }
        }
        self.closed = true;
        MemoryRemoteFactory {
            home: self.home.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }
}

fn missing(op: &'static str, path: &str) -> ClientError {
    ClientError::Operation {
        op,
        path: path.to_owned(),
        reason: "no such file".to_owned(),
    }
}

impl RemoteFs for MemoryRemoteFs {
    fn home(&self) -> &str {
        &self.home
    }

    fn current_dir(&self) -> &str {
        &self.current_dir
    }

    fn change_dir(&mut self, path: &str) -> Result<(), ClientError> {
        if !self.lock().dirs.contains(path) {
            return Err(ClientError::ChangeDir {
                path: path.to_owned(),
                reason: "no such directory".to_owned(),
            });
        }
        self.current_dir = path.to_owned();
        Ok(())
    }

    fn list_files(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        {
            let mut state = self.lock();
            if state.fail_next_list {
                state.fail_next_list = false;
                return Err(ClientError::Operation {
                    op: "list",
                    path: path.to_owned(),
                    reason: "injected failure".to_owned(),
                });
            }
        }
        self.list_names(path).ok_or_else(|| missing("list", path))
    }

    fn list_directories(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        let state = self.lock();
        if !state.dirs.contains(path) {
            return Err(missing("list", path));
        }
        Ok(state
            .dirs
            .iter()
            .filter_map(|dir| State::is_child_of(dir, path))
            .map(str::to_owned)
            .collect())
    }

    fn stat(&mut self, path: &str) -> Result<FileAttrs, ClientError> {
        let mut state = self.lock();
        if state.fail_next_stat {
            state.fail_next_stat = false;
            return Err(ClientError::Operation {
                op: "stat",
                path: path.to_owned(),
                reason: "injected failure".to_owned(),
            });
        }
        let entry = state.files.get_mut(path).ok_or_else(|| missing("stat", path))?;
        let attrs = FileAttrs {
            size: entry.stat_size,
            modified: entry.modified,
        };
        entry.stat_size += entry.grow_per_stat;
        Ok(attrs)
    }

    fn open_read(&mut self, path: &str) -> Result<Box<dyn Read + Send>, ClientError> {
        let data = self
            .file_contents(path)
            .ok_or_else(|| missing("get", path))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn put(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, ClientError> {
        {
            let mut state = self.lock();
            if state.fail_next_put {
                state.fail_next_put = false;
                return Err(ClientError::Operation {
                    op: "put",
                    path: path.to_owned(),
                    reason: "injected failure".to_owned(),
                });
            }
            if !state.dirs.contains(parent_of(path)) {
                return Err(missing("put", path));
            }
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let written = data.len() as u64;
        self.lock().files.insert(
            path.to_owned(),
            FileEntry {
                stat_size: written,
                data,
                modified: SystemTime::now(),
                grow_per_stat: 0,
                mode: None,
            },
        );
        Ok(written)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state.fail_next_rename {
            state.fail_next_rename = false;
            return Err(ClientError::Operation {
                op: "rename",
                path: from.to_owned(),
                reason: "injected failure".to_owned(),
            });
        }
        if !state.dirs.contains(parent_of(to)) {
            return Err(ClientError::Operation {
                op: "rename",
                path: to.to_owned(),
                reason: "no such directory".to_owned(),
            });
        }
        let entry = state
            .files
            .remove(from)
            .ok_or_else(|| missing("rename", from))?;
        state.files.insert(to.to_owned(), entry);
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> Result<(), ClientError> {
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| missing("remove", path))
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        let occupied = state
            .files
            .keys()
            .any(|file| parent_of(file) == path)
            || state.dirs.iter().any(|dir| parent_of(dir) == path && dir != path);
        if occupied {
            return Err(ClientError::Operation {
                op: "rmdir",
                path: path.to_owned(),
                reason: "directory not empty".to_owned(),
            });
        }
        if state.dirs.remove(path) {
            Ok(())
        } else {
            Err(missing("rmdir", path))
        }
    }

    fn make_dir(&mut self, path: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        if !state.dirs.contains(parent_of(path)) {
            return Err(ClientError::Mkdir {
                path: path.to_owned(),
                reason: "no such parent directory".to_owned(),
            });
        }
        if !state.dirs.insert(path.to_owned()) {
            return Err(ClientError::Mkdir {
                path: path.to_owned(),
                reason: "already exists".to_owned(),
            });
        }
        Ok(())
    }

    fn set_permissions(&mut self, path: &str, mode: u32) -> Result<(), ClientError> {
        let mut state = self.lock();
        let entry = state
            .files
            .get_mut(path)
            .ok_or_else(|| missing("setstat", path))?;
        entry.mode = Some(mode);
        Ok(())
    }

    fn connected(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) -> Result<(), ClientError> {
        if !self.closed {
            self.closed = true;
            self.lock().open_sessions -= 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_file_creates_parent_directories() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/data/in/a.txt", b"x");
        assert!(fs.has_dir("/data/in"));
        assert!(fs.has_dir("/data"));
        assert_eq!(fs.list_names("/data/in").unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn rename_requires_target_directory() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"x");
        assert!(fs.rename("/in/a.txt", "/nope/a.txt").is_err());
        assert!(fs.rename("/in/a.txt", "/in/b.txt").is_ok());
        assert!(fs.file_contents("/in/b.txt").is_some());
    }

    #[test]
    fn grow_on_stat_reports_increasing_sizes() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        fs.add_file("/in/a.txt", b"abcd");
        fs.grow_on_stat("/in/a.txt", 10);
        let first = fs.stat("/in/a.txt").unwrap().size;
        let second = fs.stat("/in/a.txt").unwrap().size;
        assert_eq!(second, first + 10);
    }

    #[test]
    fn close_is_visible_through_the_handle() {
        let mut fs = MemoryRemoteFs::new("/home/user");
        let handle = fs.handle();
        assert!(!handle.is_closed());
        fs.close().unwrap();
        assert!(handle.is_closed());
        assert!(!fs.connected());
    }

    #[test]
    fn factory_sessions_share_state() {
        let mut seed = MemoryRemoteFs::new("/home/user");
        seed.add_file("/in/a.txt", b"x");
        let handle = seed.handle();
        let factory = seed.into_factory();
        assert!(handle.is_closed());

        let mut session = factory.open().unwrap();
        session.remove_file("/in/a.txt").unwrap();
        assert!(!handle.is_closed());
        session.close().unwrap();
        assert!(handle.is_closed());
        assert!(!handle.has_file("/in/a.txt"));
    }
}
