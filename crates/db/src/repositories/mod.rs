//! Repository layer: one zero-sized struct per table with async query
//! functions taking a `&PgPool`.

pub mod task_repo;

pub use task_repo::TaskRepo;
