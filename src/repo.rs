mod git;
mod traits;

pub use git::{rfc822_utc, GitRepo};
pub use traits::{CommitMeta, DestinationRepo};
