//! Timestamp source: where node modification times come from.

use dashmap::DashMap;
use rayon::prelude::*;
use std::time::SystemTime;

/// MTime info gathered for a file.  This also models "file is absent".
/// It's not using an Option<> just because it makes the code using it easier
/// to follow.  Missing orders before any stamp.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum MTime {
    #[default]
    Missing,
    Stamp(SystemTime),
}

impl MTime {
    pub fn now() -> MTime {
        MTime::Stamp(SystemTime::now())
    }
}

pub trait FileSystem {
    /// stat() an on-disk path, producing its MTime.
    fn stat(&self, path: &str) -> std::io::Result<MTime>;

    /// Forget anything remembered about `path`, so the next stat() goes back
    /// to storage.
    fn invalidate(&self, _path: &str) {}
}

#[derive(Default)]
pub struct RealFileSystem {}
impl RealFileSystem {
    pub fn new() -> Self {
        RealFileSystem {}
    }
}

impl FileSystem for RealFileSystem {
    fn stat(&self, path: &str) -> std::io::Result<MTime> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(MTime::Stamp(meta.modified()?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(MTime::Missing),
            Err(err) => Err(err),
        }
    }
}

/// Remembers stat() results from an underlying FileSystem.
pub struct StatCache<F> {
    inner: F,
    cache: DashMap<String, MTime>,
}

impl<F: FileSystem + Sync> StatCache<F> {
    pub fn new(inner: F) -> Self {
        StatCache {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Stat many paths up front, in parallel.
    pub fn prime<'a>(&self, paths: impl IntoParallelIterator<Item = &'a str>) -> std::io::Result<()> {
        paths.into_par_iter().try_for_each(|path| {
            if !self.cache.contains_key(path) {
                let mtime = self.inner.stat(path)?;
                self.cache.insert(path.to_owned(), mtime);
            }
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<F: FileSystem + Sync> FileSystem for StatCache<F> {
    fn stat(&self, path: &str) -> std::io::Result<MTime> {
        if let Some(mtime) = self.cache.get(path) {
            return Ok(*mtime);
        }
        let mtime = self.inner.stat(path)?;
        self.cache.insert(path.to_owned(), mtime);
        Ok(mtime)
    }

    fn invalidate(&self, path: &str) {
        self.cache.remove(path);
    }
}
