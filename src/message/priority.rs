use std::{fmt, str::FromStr};

use thiserror::Error;

/// Every token accepted by [`Priority::from_str`], in documentation order.
pub const PRIORITY_TOKENS: [&str; 8] = [
    "0",
    "1",
    "2",
    "NonUrgent",
    "Normal",
    "Urgent",
    "Low",
    "High",
];

/// An unrecognised priority token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid priority '{value}', expected one of: {}", PRIORITY_TOKENS.join(", "))]
pub struct InvalidPriority {
    pub value: String,
}

/// Message priority, rendered as the RFC 2156 `Priority` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    NonUrgent,
    Normal,
    Urgent,
}

impl Priority {
    /// Value of the `Priority` header.
    #[must_use]
    pub const fn header_value(self) -> &'static str {
        match self {
            Self::NonUrgent => "non-urgent",
            Self::Normal => "normal",
            Self::Urgent => "urgent",
        }
    }

    /// Value of the legacy `X-Priority` header.
    #[must_use]
    pub const fn x_priority(self) -> &'static str {
        match self {
            Self::NonUrgent => "5 (Lowest)",
            Self::Normal => "3 (Normal)",
            Self::Urgent => "1 (Highest)",
        }
    }

    /// Value of the `Importance` header.
    #[must_use]
    pub const fn importance(self) -> &'static str {
        match self {
            Self::NonUrgent => "low",
            Self::Normal => "normal",
            Self::Urgent => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = InvalidPriority;

    /// Tokens are matched exactly; `Low` and `High` are aliases kept for
    /// scripts written against older mail tools.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "NonUrgent" | "Low" => Ok(Self::NonUrgent),
            "1" | "Normal" => Ok(Self::Normal),
            "2" | "Urgent" | "High" => Ok(Self::Urgent),
            _ => Err(InvalidPriority {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NonUrgent => "NonUrgent",
            Self::Normal => "Normal",
            Self::Urgent => "Urgent",
        })
    }
}
