pub mod backoff;
pub mod entry;
pub mod freshness;
pub mod local;
pub mod outcome;
pub mod remote;
pub mod walker;

pub use entry::{PathError, RemoteEntry, SyncTarget};
pub use freshness::Freshness;
pub use outcome::{FailureKind, FileFailure, FileOutcome, SyncFailure, SyncReport};
pub use remote::{MediaStream, RemoteFileService};
pub use walker::{DownloadProgress, SyncError, SyncWalker};
