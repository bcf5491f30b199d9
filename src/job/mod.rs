pub mod lifecycle;
pub mod model;
pub mod repository;
pub mod service;

pub use model::{JobPriority, JobProgress, JobStatus, LogEntry, LogLevel, RemediationJob};
pub use repository::{
    InMemoryJobRepository, JobFilter, JobRepository, JobStatistics, ListOptions, SortField,
    SortOrder,
};
pub use service::{CreateJobRequest, JobService};
