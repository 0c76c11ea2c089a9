use anyhow::Result;

use crate::error::Error;
use crate::history::Watermark;
use crate::record::CommitRecord;

/// Gate the whole batch against the destination tip. A record whose
/// timestamp falls strictly before the watermark would insert history
/// the destination already contains, so the entire batch is rejected
/// before any mutation. Equal timestamps are accepted. `force` skips
/// the check entirely.
pub fn check_batch(records: &[CommitRecord], watermark: &Watermark, force: bool) -> Result<()> {
    if force {
        tracing::warn!("--force given, skipping timestamp ordering check");
        return Ok(());
    }

    for record in records {
        if record.unixtime < watermark.unixtime {
            return Err(Error::OutOfOrderReplay {
                commit_time: record.unixtime,
                watermark: watermark.unixtime,
            }
            .into());
        }
    }

    Ok(())
}
