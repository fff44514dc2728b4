//! One-off data migrations run from the command line.

mod spam;

pub use spam::{SpamMigration, SpamMigrationReport};
