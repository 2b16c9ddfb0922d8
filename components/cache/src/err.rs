use std::path::PathBuf;

use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("the provided stream size is smaller than 0"))]
    NegativeStreamSize {
        declared: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the provided stream size is larger than the cache"))]
    StreamLargerThanCache {
        declared: u64,
        capacity: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cache size cannot be 0"))]
    ZeroCapacity {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("current cache directory is not empty ({} bytes)", used))]
    SubdirectoryNotEmpty {
        used: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("no content resolver was configured"))]
    ResolverUnset {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot create managed cache directory {}", path.display()))]
    CreateCacheDir {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot list cache directory {}", path.display()))]
    ReadCacheDir {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot write cache entry {}", path.display()))]
    WriteEntry {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot open content locator {}", locator))]
    OpenLocator {
        locator: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    /// The caller supplied a structurally invalid parameter.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Error::NegativeStreamSize { .. }
                | Error::StreamLargerThanCache { .. }
                | Error::ZeroCapacity { .. }
        )
    }

    /// The operation is disallowed given the current cache contents.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Error::SubdirectoryNotEmpty { .. } | Error::ResolverUnset { .. }
        )
    }

    /// An underlying filesystem operation failed.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::CreateCacheDir { .. }
                | Error::ReadCacheDir { .. }
                | Error::WriteEntry { .. }
                | Error::OpenLocator { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
