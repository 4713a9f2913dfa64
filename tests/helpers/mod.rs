pub mod builders;
pub mod keys;

pub use builders::{PolicyDirBuilder, TokenBuilder};
pub use keys::TestKeys;
