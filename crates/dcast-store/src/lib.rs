//! Persistence seams for the DiffCast pipeline: job/commit/repo document
//! stores with in-memory implementations, and the artifact object-storage
//! adapter backed by R2.

pub mod error;
pub mod job_store;
pub mod repos;
pub mod storage;

pub use error::{StoreError, StoreResult};
pub use job_store::{JobStore, MemoryJobStore};
pub use repos::{CommitStore, MemoryCommitStore, MemoryRepoStore, RepoStore};
pub use storage::{MemoryObjectStorage, ObjectStorage, R2Config, R2Storage};
