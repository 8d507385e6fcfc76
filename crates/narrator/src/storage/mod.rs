pub mod job_store;
pub mod object_sink;

pub use job_store::{GameEvent, JobStore, SqliteJobStore};
pub use object_sink::{FileSystemSink, ObjectSink};
