//! Per-feature log capture for in-crate tests.
//!
//! `logtest` can install its logger only once per test binary, so every
//! test shares one instance and callers run under `#[serial(logs)]`. Worker
//! threads of unrelated tests keep logging in the background; a capture only
//! keeps records whose message names its feature.

use std::sync::OnceLock;

use log::Level;
use logtest::Logger;
use parking_lot::Mutex;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

fn logger() -> &'static Mutex<Logger> {
    LOGGER.get_or_init(|| Mutex::new(Logger::start()))
}

/// Log records emitted on behalf of one telemetry feature.
pub(crate) struct FeatureLogs {
    prefix: String,
}

impl FeatureLogs {
    /// Start capturing for `feature`, discarding everything logged so far.
    pub(crate) fn start(feature: &str) -> Self {
        let mut logger = logger().lock();
        while logger.pop().is_some() {}
        Self {
            prefix: format!("{feature} "),
        }
    }

    /// Drain the records of this feature logged since the last call.
    pub(crate) fn take(&self) -> Vec<(Level, String)> {
        let mut logger = logger().lock();
        std::iter::from_fn(|| logger.pop())
            .filter(|record| record.args().starts_with(&self.prefix))
            .map(|record| (record.level(), record.args().to_owned()))
            .collect()
    }

    /// Drain and keep only the messages logged at `level`.
    pub(crate) fn take_at(&self, level: Level) -> Vec<String> {
        self.take()
            .into_iter()
            .filter(|(logged, _)| *logged == level)
            .map(|(_, message)| message)
            .collect()
    }
}
