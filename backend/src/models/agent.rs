//! Agent model
//!
//! An agent carries two identifiers:
//! - **Agent number**: durable, human-assigned, immutable once issued
//!   (e.g. `MPPAG20250042`). All reporting keys off this value.
//! - **Internal id**: the day-to-day lookup key. Duplicate accounts get
//!   merged, so an internal id can be retired and its commissions repointed
//!   to a surviving id.
//!
//! # Agent number format
//!
//! ```text
//! MPP  AG   2025  0042
//! │    │    │     └─ four-digit sequence, per (role, year)
//! │    │    └─ issue year (2000-2099)
//! │    └─ role code (AG, MA, HQ)
//! └─ fixed prefix
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed prefix of every agent number
pub const AGENT_NUMBER_PREFIX: &str = "MPP";

/// Largest suffix that fits the four-digit sequence
pub const MAX_AGENT_NUMBER_SUFFIX: u32 = 9_999;

/// Errors that can occur when parsing or issuing agent numbers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentNumberError {
    #[error("Agent number '{0}' must be 13 characters")]
    InvalidLength(String),

    #[error("Agent number '{0}' must start with MPP")]
    InvalidPrefix(String),

    #[error("Agent number '{0}' has an unknown role code")]
    InvalidRole(String),

    #[error("Agent number '{0}' has an invalid issue year")]
    InvalidYear(String),

    #[error("Agent number '{0}' has a non-numeric suffix")]
    InvalidSuffix(String),

    #[error("Agent number sequence exhausted for {role} {year}")]
    SequenceExhausted { role: AgentRole, year: u16 },
}

/// Role code embedded in the agent number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    /// Field agent
    Agent,
    /// Managing agent
    Manager,
    /// Home office (house account)
    House,
}

impl AgentRole {
    pub fn code(&self) -> &'static str {
        match self {
            AgentRole::Agent => "AG",
            AgentRole::Manager => "MA",
            AgentRole::House => "HQ",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AG" => Some(AgentRole::Agent),
            "MA" => Some(AgentRole::Manager),
            "HQ" => Some(AgentRole::House),
            _ => None,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Durable agent number
///
/// # Example
/// ```
/// use commission_ledger_core_rs::models::agent::{AgentNumber, AgentRole};
///
/// let number: AgentNumber = "mppag20250042".parse().unwrap();
/// assert_eq!(number.as_str(), "MPPAG20250042");
/// assert_eq!(number.role(), AgentRole::Agent);
/// assert_eq!(number.year(), 2025);
/// assert_eq!(number.suffix(), 42);
///
/// let issued = AgentNumber::new(AgentRole::Manager, 2024, 7).unwrap();
/// assert_eq!(issued.as_str(), "MPPMA20240007");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentNumber(String);

impl AgentNumber {
    /// Build a number from its parts
    pub fn new(role: AgentRole, year: u16, suffix: u32) -> Result<Self, AgentNumberError> {
        if !(2000..=2099).contains(&year) {
            return Err(AgentNumberError::InvalidYear(format!(
                "{}{}{}{:04}",
                AGENT_NUMBER_PREFIX,
                role.code(),
                year,
                suffix
            )));
        }
        if suffix > MAX_AGENT_NUMBER_SUFFIX {
            return Err(AgentNumberError::SequenceExhausted { role, year });
        }
        Ok(Self(format!(
            "{}{}{}{:04}",
            AGENT_NUMBER_PREFIX,
            role.code(),
            year,
            suffix
        )))
    }

    /// Parse and normalise to upper case
    pub fn parse(raw: &str) -> Result<Self, AgentNumberError> {
        let value = raw.trim().to_ascii_uppercase();
        if value.len() != 13 || !value.is_ascii() {
            return Err(AgentNumberError::InvalidLength(raw.to_string()));
        }
        if !value.starts_with(AGENT_NUMBER_PREFIX) {
            return Err(AgentNumberError::InvalidPrefix(raw.to_string()));
        }
        if AgentRole::from_code(&value[3..5]).is_none() {
            return Err(AgentNumberError::InvalidRole(raw.to_string()));
        }
        match value[5..9].parse::<u16>() {
            Ok(year) if (2000..=2099).contains(&year) => {}
            _ => return Err(AgentNumberError::InvalidYear(raw.to_string())),
        }
        if !value[9..].chars().all(|c| c.is_ascii_digit()) {
            return Err(AgentNumberError::InvalidSuffix(raw.to_string()));
        }
        Ok(Self(value))
    }

    /// Cheap format check used when classifying free-text agent references
    pub fn looks_like(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn role(&self) -> AgentRole {
        // Validated on construction
        AgentRole::from_code(&self.0[3..5]).unwrap_or(AgentRole::Agent)
    }

    pub fn year(&self) -> u16 {
        self.0[5..9].parse().unwrap_or_default()
    }

    pub fn suffix(&self) -> u32 {
        self.0[9..].parse().unwrap_or_default()
    }
}

impl fmt::Display for AgentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AgentNumber {
    type Err = AgentNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AgentNumber {
    type Error = AgentNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AgentNumber> for String {
    fn from(number: AgentNumber) -> Self {
        number.0
    }
}

/// An agent record in the directory
///
/// # Example
/// ```
/// use commission_ledger_core_rs::models::agent::{Agent, AgentNumber};
///
/// let agent = Agent::new(
///     "usr_0191".to_string(),
///     AgentNumber::parse("MPPAG20250042").unwrap(),
///     "Dana Reyes".to_string(),
/// )
/// .with_email("dana@example.com");
///
/// assert!(agent.is_active());
/// assert!(!agent.is_merged());
/// assert_eq!(agent.email(), Some("dana@example.com"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Mutable lookup key
    internal_id: String,

    /// Durable identity, never changes after issue
    agent_number: AgentNumber,

    display_name: String,

    /// Login email, stored lower-cased
    email: Option<String>,

    active: bool,

    /// Surviving internal id when this account was merged away
    merged_into: Option<String>,
}

impl Agent {
    pub fn new(internal_id: String, agent_number: AgentNumber, display_name: String) -> Self {
        Self {
            internal_id,
            agent_number,
            display_name,
            email: None,
            active: true,
            merged_into: None,
        }
    }

    /// Restore an agent with every field preserved
    pub fn from_snapshot(
        internal_id: String,
        agent_number: AgentNumber,
        display_name: String,
        email: Option<String>,
        active: bool,
        merged_into: Option<String>,
    ) -> Self {
        Self {
            internal_id,
            agent_number,
            display_name,
            email: email.map(|e| e.trim().to_ascii_lowercase()),
            active,
            merged_into,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.trim().to_ascii_lowercase());
        self
    }

    pub fn internal_id(&self) -> &str {
        &self.internal_id
    }

    pub fn agent_number(&self) -> &AgentNumber {
        &self.agent_number
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn merged_into(&self) -> Option<&str> {
        self.merged_into.as_deref()
    }

    pub fn is_merged(&self) -> bool {
        self.merged_into.is_some()
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Retire this identity in favour of `survivor`
    pub(crate) fn retire_into(&mut self, survivor: &str) {
        self.active = false;
        self.merged_into = Some(survivor.to_string());
    }
}
