//! Binary cache read/write for `CubedSphere`, plus file and in-memory stores.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use cubesphere_geo::{Projection, PANELS};

use super::{CubedSphere, PointGeometry, GHOST};
use crate::array::PanelArray;

/// Errors related to grid cache I/O.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Wrapper for standard I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Cache blob has wrong magic or version
    #[error("bad magic or version")]
    BadHeader,
    /// Unexpected data length
    #[error("unexpected data length")]
    BadLength,
    /// Blob describes a different grid than requested
    #[error("cache holds {found}, expected {expected}")]
    KeyMismatch {
        /// Requested key
        expected: CacheKey,
        /// Key stored in the blob
        found: CacheKey,
    },
    /// Nothing stored under the key
    #[error("no cache entry for {0}")]
    Missing(CacheKey),
}

const MAGIC: &[u8; 8] = b"CSGRID\0\0";
const VERSION: u32 = 1;

/// Identity of a cached grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Cells per panel edge
    pub n: usize,
    /// Panel projection
    pub projection: Projection,
}

impl CacheKey {
    /// File name used by [`FileCache`].
    pub fn file_name(&self) -> String {
        format!("cs_{}_{}.bin", self.n, self.projection.id())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N={} {}", self.n, self.projection)
    }
}

/// Persistent store for precomputed grids.
pub trait CacheStore {
    /// Whether an entry exists for `key`.
    fn exists(&self, key: &CacheKey) -> bool;
    /// Load the grid stored under `key`.
    fn load(&self, key: &CacheKey) -> Result<CubedSphere, CacheError>;
    /// Store `grid` under `key`, replacing any existing entry.
    fn save(&mut self, key: &CacheKey, grid: &CubedSphere) -> Result<(), CacheError>;
}

/// One file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Store rooted at `dir`; the directory is created on first save.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Full path of the entry for `key`.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl CacheStore for FileCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.path(key).is_file()
    }

    fn load(&self, key: &CacheKey) -> Result<CubedSphere, CacheError> {
        let f = File::open(self.path(key))?;
        decode(&mut BufReader::new(f), key)
    }

    fn save(&mut self, key: &CacheKey, grid: &CubedSphere) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut w = BufWriter::new(File::create(self.path(key))?);
        encode(&mut w, grid)?;
        w.flush()?;
        Ok(())
    }
}

/// Byte blobs in a map; handy for tests and short-lived sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<CacheKey, Vec<u8>>,
}

impl MemoryCache {
    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the raw blob for `key` (used to exercise corrupt-cache paths).
    pub fn insert_raw(&mut self, key: CacheKey, bytes: Vec<u8>) {
        self.entries.insert(key, bytes);
    }
}

impl CacheStore for MemoryCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn load(&self, key: &CacheKey) -> Result<CubedSphere, CacheError> {
        let bytes = self.entries.get(key).ok_or(CacheError::Missing(*key))?;
        decode(&mut bytes.as_slice(), key)
    }

    fn save(&mut self, key: &CacheKey, grid: &CubedSphere) -> Result<(), CacheError> {
        let mut buf = Vec::new();
        encode(&mut buf, grid)?;
        self.entries.insert(*key, buf);
        Ok(())
    }
}

/// Write `grid` as a little-endian blob: header, four point sets, then cell areas.
pub fn encode<W: Write>(w: &mut W, grid: &CubedSphere) -> Result<(), CacheError> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    w.write_all(&u32_of(grid.n)?.to_le_bytes())?;
    w.write_all(&grid.projection.code().to_le_bytes())?;
    w.write_all(&u32_of(grid.ghost)?.to_le_bytes())?;
    for set in [&grid.centers, &grid.pu, &grid.pv, &grid.corners] {
        write_slice(w, set.as_slice())?;
    }
    write_slice(w, grid.area.as_slice())?;
    Ok(())
}

/// Read a blob written by [`encode`], checking it against `key`. The halo is rebuilt after loading.
pub fn decode<R: Read>(r: &mut R, key: &CacheKey) -> Result<CubedSphere, CacheError> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC || read_u32(r)? != VERSION {
        return Err(CacheError::BadHeader);
    }
    let n = read_u32(r)? as usize;
    let projection = Projection::from_code(read_u32(r)?).ok_or(CacheError::BadHeader)?;
    let ghost = read_u32(r)? as usize;
    if ghost != GHOST {
        return Err(CacheError::BadHeader);
    }
    let found = CacheKey { n, projection };
    if found != *key {
        return Err(CacheError::KeyMismatch { expected: *key, found });
    }

    let nt = n + 2 * GHOST;
    let centers = read_array::<_, PointGeometry>(r, nt, nt)?;
    let pu = read_array::<_, PointGeometry>(r, nt + 1, nt)?;
    let pv = read_array::<_, PointGeometry>(r, nt, nt + 1)?;
    let corners = read_array::<_, PointGeometry>(r, nt + 1, nt + 1)?;
    let area = read_array::<_, f64>(r, nt, nt)?;
    Ok(CubedSphere::from_parts(n, projection, centers, pu, pv, corners, area))
}

fn u32_of(v: usize) -> Result<u32, CacheError> {
    u32::try_from(v).map_err(|_| CacheError::BadLength)
}

fn write_slice<W: Write, T: bytemuck::Pod>(w: &mut W, data: &[T]) -> Result<(), CacheError> {
    w.write_all(&(data.len() as u64).to_le_bytes())?;
    w.write_all(bytemuck::cast_slice(data))?;
    Ok(())
}

fn read_array<R: Read, T: bytemuck::Pod>(r: &mut R, ni: usize, nj: usize) -> Result<PanelArray<T>, CacheError> {
    let expected = PANELS * ni * nj;
    let count = read_u64(r)?;
    if count != expected as u64 {
        return Err(CacheError::BadLength);
    }
    let mut bytes = vec![0u8; expected * std::mem::size_of::<T>()];
    r.read_exact(&mut bytes)?;
    let data: Vec<T> = bytemuck::pod_collect_to_vec(&bytes);
    PanelArray::from_vec(ni, nj, data).ok_or(CacheError::BadLength)
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, CacheError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, CacheError> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}
