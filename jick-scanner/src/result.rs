use crate::endpoint::Endpoint;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    TimeLimit,
    ResultLimit,
    /// Every frontier entry was visited.
    Exhausted,
    /// Seeding left the frontier empty, so nothing was visited.
    NothingFound,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::TimeLimit => "maximum run-time reached",
            TerminationReason::ResultLimit => "maximum discovered URLs reached",
            TerminationReason::Exhausted => "finished crawling",
            TerminationReason::NothingFound => "did not find any new URLs",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub reason: TerminationReason,
    /// Frontier entries visited during draining; seeds are not counted.
    pub visited: usize,
    #[serde(skip)]
    pub elapsed: Duration,
    pub endpoints: Vec<Endpoint>,
}

impl CrawlOutcome {
    pub fn new(
        reason: TerminationReason,
        visited: usize,
        elapsed: Duration,
        endpoints: Vec<Endpoint>,
    ) -> Self {
        Self {
            reason,
            visited,
            elapsed,
            endpoints,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
