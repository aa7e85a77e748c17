use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Stale,
    UpToDate,
    /// The remote reported no modification time.
    Unknown,
}

impl Freshness {
    pub fn needs_download(self) -> bool {
        !matches!(self, Freshness::UpToDate)
    }
}

/// Both timestamps are normalized to `offset` before comparing. Only a
/// strictly newer remote copy is stale; equal timestamps are up to date.
pub fn compare(
    remote: Option<OffsetDateTime>,
    local: Option<OffsetDateTime>,
    offset: UtcOffset,
) -> Freshness {
    let Some(local) = local.map(|t| t.to_offset(offset)) else {
        return Freshness::Missing;
    };
    let Some(remote) = remote.map(|t| t.to_offset(offset)) else {
        return Freshness::Unknown;
    };
    if remote > local {
        Freshness::Stale
    } else {
        Freshness::UpToDate
    }
}
