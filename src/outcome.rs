use std::fmt;

/// Why a stage produced nothing usable for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Every fetch attempt came back with a non-success status.
    FetchExhausted { status: u16 },
    /// Payload was empty or whitespace only.
    EmptyPayload,
    ParseFailed(String),
    /// A historical file variant that only carries cumulative recovered counts.
    RecoveredOnly,
    ValidationFailed(String),
    /// Normalized table has no rows.
    EmptyTable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FetchExhausted { status } => {
                write!(f, "fetch retries exhausted (last status {})", status)
            }
            SkipReason::EmptyPayload => f.write_str("raw CSV is empty"),
            SkipReason::ParseFailed(msg) => write!(f, "CSV parse failed: {}", msg),
            SkipReason::RecoveredOnly => f.write_str("recovered-only file"),
            SkipReason::ValidationFailed(msg) => write!(f, "schema validation failed: {}", msg),
            SkipReason::EmptyTable => f.write_str("no rows to load"),
        }
    }
}

/// A stage result that is either a value or the absent marker.
///
/// Absent values flow to the next stage, which degrades to a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Present(T),
    Absent(SkipReason),
}

impl<T> Outcome<T> {
    pub fn present(self) -> Option<T> {
        match self {
            Outcome::Present(v) => Some(v),
            Outcome::Absent(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Present(_) => None,
            Outcome::Absent(r) => Some(r),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Present(v) => f(v),
            Outcome::Absent(r) => Outcome::Absent(r),
        }
    }
}
