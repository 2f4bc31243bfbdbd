//! CLI subcommand modules.

pub(crate) mod factor;
pub(crate) mod factors;
pub(crate) mod fetch;
pub(crate) mod ic;
pub(crate) mod load;
pub(crate) mod schema;
pub(crate) mod sync;
pub(crate) mod update;
