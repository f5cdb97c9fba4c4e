//! Built-in action handlers.

pub mod complete_phase;
pub mod end_task;
pub mod fetch_url;
pub mod git_diff;
pub mod move_file;
pub mod read_file;
pub mod relative_path_lookup;
pub mod search_string;
pub mod write_file;

pub use complete_phase::CompletePhaseHandler;
pub use end_task::EndTaskHandler;
pub use fetch_url::FetchUrlHandler;
pub use git_diff::GitDiffHandler;
pub use move_file::MoveFileHandler;
pub use read_file::ReadFileHandler;
pub use relative_path_lookup::RelativePathLookupHandler;
pub use search_string::SearchStringHandler;
pub use write_file::WriteFileHandler;
