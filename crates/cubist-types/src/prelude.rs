pub use crate::error::{CuResult, Error};

pub use tracing::{debug, error, info, warn};

// vim: ts=4
