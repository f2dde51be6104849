pub use cubist_types::error::{CuResult, Error};

pub use tracing::{debug, debug_span, error, info, info_span, warn};

// vim: ts=4
