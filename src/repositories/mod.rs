//! Repository layer for data access operations.

mod job_repo;

pub use job_repo::JobRepository;
