//! Standard APIs used everywhere in this crate.

pub use std::path::{Path, PathBuf};

pub use anyhow::{Context as _, Result, anyhow};
pub use async_trait::async_trait;
#[allow(unused_imports)]
pub use tracing::{debug, error, info, instrument, trace, warn};
