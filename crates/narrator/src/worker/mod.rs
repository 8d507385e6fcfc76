pub mod job;
pub mod processor;
pub mod queue;

pub use job::{JobError, JobRecord, JobStatus};
pub use processor::{Processor, ProcessorHandle};
pub use queue::{Admission, FifoQueue, InFlight, JobQueue};
