pub mod archive;

pub use archive::{ArchiveManager, ArchiveScheduler, DbArchiver, SweepStats, TaskArchiver};
