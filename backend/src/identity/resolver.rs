//! Agent Identity Resolver
//!
//! Turns the enrolling-agent reference captured at enrollment time into the
//! agent's **current** internal id and its **immutable** agent number.
//!
//! Depending on the call site a reference may be an email, an internal id,
//! an agent number or a display name. References that do not resolve fall
//! back to the house identity via [`AgentDirectory::resolve_or_house`].

use crate::identity::directory::{AgentDirectory, DirectoryError};
use crate::models::agent::{Agent, AgentNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a reference cannot be attributed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No enrolling agent on record")]
    Missing,

    #[error("Agent reference '{0}' does not match any agent")]
    Unknown(String),

    #[error("Agent reference '{reference}' matches {candidates} agents")]
    Ambiguous { reference: String, candidates: usize },

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Classified agent reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRef {
    Email(String),
    Number(AgentNumber),
    /// Internal id or display name; tried in that order
    Other(String),
}

impl AgentRef {
    /// Classify a raw reference, `None` when blank
    ///
    /// # Example
    /// ```
    /// use commission_ledger_core_rs::identity::AgentRef;
    ///
    /// assert!(matches!(AgentRef::classify("Dana@Example.com"), Some(AgentRef::Email(_))));
    /// assert!(matches!(AgentRef::classify("MPPAG20250042"), Some(AgentRef::Number(_))));
    /// assert!(matches!(AgentRef::classify("usr_0191"), Some(AgentRef::Other(_))));
    /// assert_eq!(AgentRef::classify("   "), None);
    /// ```
    pub fn classify(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.contains('@') {
            return Some(AgentRef::Email(trimmed.to_ascii_lowercase()));
        }
        if let Ok(number) = AgentNumber::parse(trimmed) {
            return Some(AgentRef::Number(number));
        }
        Some(AgentRef::Other(trimmed.to_string()))
    }
}

/// Resolved attribution for a commission row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAgent {
    /// Current internal id (after following merges)
    pub internal_id: String,

    /// Agent number of the canonical record
    pub agent_number: AgentNumber,

    /// Attribution fell back to the house identity
    pub house: bool,
}

impl ResolvedAgent {
    fn from_agent(agent: &Agent, house: bool) -> Self {
        Self {
            internal_id: agent.internal_id().to_string(),
            agent_number: agent.agent_number().clone(),
            house,
        }
    }
}

impl AgentDirectory {
    /// Resolve a reference to its canonical agent
    ///
    /// Merged identities resolve to their survivor, so references captured
    /// before a merge keep working.
    pub fn resolve_agent(&self, reference: Option<&str>) -> Result<ResolvedAgent, ResolveError> {
        let raw = reference.unwrap_or_default();
        let classified = AgentRef::classify(raw).ok_or(ResolveError::Missing)?;

        let found = match &classified {
            AgentRef::Email(email) => self.by_email(email),
            AgentRef::Number(number) => self.by_number(number),
            AgentRef::Other(value) => match self.get(value) {
                Some(agent) => Some(agent),
                None => {
                    let named = self.by_display_name(value);
                    // Merged duplicates share a name with their survivor
                    let mut canonical: Vec<&str> = named
                        .iter()
                        .filter_map(|a| self.canonical_id(a.internal_id()).ok())
                        .collect();
                    canonical.sort_unstable();
                    canonical.dedup();
                    match canonical.len() {
                        0 => None,
                        1 => self.get(canonical[0]),
                        n => {
                            return Err(ResolveError::Ambiguous {
                                reference: value.clone(),
                                candidates: n,
                            })
                        }
                    }
                }
            },
        };

        let agent = found.ok_or_else(|| ResolveError::Unknown(raw.trim().to_string()))?;
        let canonical = self.canonical(agent.internal_id())?;
        let house = canonical.internal_id() == self.house_id();
        Ok(ResolvedAgent::from_agent(canonical, house))
    }

    /// Resolve a reference, attributing to house when it does not resolve
    ///
    /// Returns the resolution error alongside so callers can log it.
    pub fn resolve_or_house(
        &self,
        reference: Option<&str>,
    ) -> (ResolvedAgent, Option<ResolveError>) {
        match self.resolve_agent(reference) {
            Ok(resolved) => (resolved, None),
            Err(err) => (self.house_attribution(), Some(err)),
        }
    }

    /// Attribution to the house identity
    pub fn house_attribution(&self) -> ResolvedAgent {
        ResolvedAgent::from_agent(self.house(), true)
    }
}
