use anyhow::Result;

use crate::error::Error;
use crate::repo::DestinationRepo;

/// Metadata of the destination branch's current tip. Read fresh before
/// each run and used once to gate the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub unixtime: i64,
    pub author: String,
    pub message: String,
}

/// Phases of the tip-log parser. The change list is never consumed;
/// reaching it ends the parse.
enum Phase {
    Header,
    Message,
    Changes,
}

/// Read the destination branch tip and extract the replay watermark.
/// A branch with no readable tip is fatal: replay needs a grounding
/// point.
pub fn read_watermark<R: DestinationRepo>(repo: &R, branch: &str) -> Result<Watermark> {
    let text = repo.tip_log(branch).map_err(|e| {
        tracing::debug!("tip log unavailable: {:#}", e);
        Error::NoHistoryFound {
            branch: branch.to_string(),
        }
    })?;

    parse_tip(&text).ok_or_else(|| {
        Error::NoHistoryFound {
            branch: branch.to_string(),
        }
        .into()
    })
}

/// Parse the textual tip log (`git log -1 -p --date=unix` output).
///
/// Header phase: `Author:` and `Date:` are captured; any other
/// non-blank line after the author line is treated as an author
/// continuation. A blank line starts the message phase. Message lines
/// are indented four spaces and may themselves be blank; a line
/// starting with `diff` ends the parse.
pub fn parse_tip(text: &str) -> Option<Watermark> {
    let mut phase = Phase::Header;
    let mut author: Option<String> = None;
    let mut unixtime: Option<i64> = None;
    let mut message_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        match phase {
            Phase::Header => {
                if line.trim().is_empty() {
                    phase = Phase::Message;
                } else if let Some(rest) = line.strip_prefix("Author:") {
                    author = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("Date:") {
                    unixtime = rest.trim().parse().ok();
                } else if line.starts_with("commit ") || line.starts_with("Merge:") {
                    // Other known header fields, not needed.
                } else if let Some(existing) = author.as_mut() {
                    // Wrapped author field.
                    existing.push(' ');
                    existing.push_str(line.trim());
                }
            }
            Phase::Message => {
                if line.starts_with("diff") {
                    phase = Phase::Changes;
                } else {
                    message_lines.push(line.strip_prefix("    ").unwrap_or(line));
                }
            }
            Phase::Changes => break,
        }
    }

    let message = message_lines.join("\n").trim_end().to_string();
    Some(Watermark {
        unixtime: unixtime?,
        author: author?,
        message,
    })
}
