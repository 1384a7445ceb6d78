use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Direction> {
        match s {
            "LONG" => Some(Direction::Long),
            "SHORT" => Some(Direction::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a signal row. Monotonic: once a signal leaves `Active`
/// it never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Active,
    TargetHit,
    StopHit,
    ClosedByTimeout,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "active",
            SignalStatus::TargetHit => "target_hit",
            SignalStatus::StopHit => "stop_hit",
            SignalStatus::ClosedByTimeout => "closed_by_timeout",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<SignalStatus> {
        match s {
            "active" => Some(SignalStatus::Active),
            "target_hit" => Some(SignalStatus::TargetHit),
            "stop_hit" => Some(SignalStatus::StopHit),
            "closed_by_timeout" => Some(SignalStatus::ClosedByTimeout),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != SignalStatus::Active
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which boundary of the opening range a closed bar broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakoutKind {
    BreakoutUp,
    BreakdownDown,
}

impl BreakoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakoutKind::BreakoutUp => "breakout_up",
            BreakoutKind::BreakdownDown => "breakdown_down",
        }
    }
}

impl fmt::Display for BreakoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
