//! Resolving book locations into local files.
//!
//! A reader can be pointed at a plain filesystem path, a `file://` URI, an
//! HTTP(S) URL, or an SSH-style remote path. [`FileCache`] collapses all of
//! those into a single guaranteed-local path, downloading remote content at
//! most once per distinct URL per cache lifetime:
//!
//! - **Local paths** and **`file://` URIs** are returned in absolute form,
//!   never copied into the cache.
//! - **`http`/`https`** URLs are fetched with a blocking GET and an
//!   identifying user-agent.
//! - **`ssh`** URLs shell out to the system `scp` executable.
//!
//! Downloads land in the cache directory under the URL's final path
//! segment; an already-existing file under that name is a cache hit and is
//! never re-fetched or revalidated.

mod cache;
pub mod error;
mod http;
mod scp;

pub use crate::cache::FileCache;
