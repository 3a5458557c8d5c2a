//! Agent directory
//!
//! Backing store for agent identities. Indexes agents by internal id, agent
//! number and email, issues new agent numbers, and records merges.
//!
//! # Critical Invariants
//!
//! 1. **Unique numbers**: an agent number belongs to exactly one record
//! 2. **No reissue**: the issue sequence only moves forward
//! 3. **No dangling merges**: `merged_into` always names a registered agent
//! 4. **House is permanent**: the house identity cannot be merged away

use crate::models::agent::{Agent, AgentNumber, AgentNumberError, AgentRole};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by directory mutations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Internal id {0} is already registered")]
    DuplicateInternalId(String),

    #[error("Agent number {0} is already issued")]
    DuplicateAgentNumber(String),

    #[error("Email {0} is already registered")]
    DuplicateEmail(String),

    #[error("Cannot merge agent {0} into itself")]
    SelfMerge(String),

    #[error("Agent {0} was already merged into {1}")]
    AlreadyMerged(String, String),

    #[error("The house identity cannot be merged")]
    HouseMerge,

    #[error("Merge chain from {0} is broken")]
    BrokenMergeChain(String),

    #[error("Agent number error: {0}")]
    AgentNumber(#[from] AgentNumberError),
}

/// In-memory agent directory
///
/// # Example
/// ```
/// use commission_ledger_core_rs::identity::AgentDirectory;
/// use commission_ledger_core_rs::models::agent::{Agent, AgentNumber, AgentRole};
///
/// let house = Agent::new(
///     "house".to_string(),
///     AgentNumber::parse("MPPHQ20000001").unwrap(),
///     "Home Office".to_string(),
/// );
/// let mut directory = AgentDirectory::new(house);
///
/// let number = directory.issue_agent_number(AgentRole::Agent, 2025).unwrap();
/// assert_eq!(number.as_str(), "MPPAG20250001");
///
/// directory
///     .register(Agent::new("usr_0191".to_string(), number, "Dana Reyes".to_string()))
///     .unwrap();
/// assert_eq!(directory.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct AgentDirectory {
    agents: HashMap<String, Agent>,
    by_number: HashMap<AgentNumber, String>,
    by_email: HashMap<String, String>,
    /// Highest suffix seen per (role, year)
    sequences: HashMap<(AgentRole, u16), u32>,
    house_id: String,
}

impl AgentDirectory {
    /// Create a directory containing only the house identity
    pub fn new(house: Agent) -> Self {
        let house_id = house.internal_id().to_string();
        let mut directory = Self {
            agents: HashMap::new(),
            by_number: HashMap::new(),
            by_email: HashMap::new(),
            sequences: HashMap::new(),
            house_id,
        };
        directory.index(house);
        directory
    }

    /// Rebuild a directory from stored agents
    ///
    /// The house agent must be among `agents`.
    pub fn from_agents(house_id: &str, agents: Vec<Agent>) -> Result<Self, DirectoryError> {
        let mut rest = Vec::with_capacity(agents.len());
        let mut house = None;
        for agent in agents {
            if agent.internal_id() == house_id {
                house = Some(agent);
            } else {
                rest.push(agent);
            }
        }
        let house = house.ok_or_else(|| DirectoryError::AgentNotFound(house_id.to_string()))?;
        let mut directory = Self::new(house);
        for agent in rest {
            directory.register(agent)?;
        }
        // Every merge chain must end at a live record once all agents are loaded
        for agent in directory.agents.values() {
            if let Some(target) = agent.merged_into() {
                if !directory.agents.contains_key(target) {
                    return Err(DirectoryError::BrokenMergeChain(
                        agent.internal_id().to_string(),
                    ));
                }
                directory.canonical(agent.internal_id())?;
            }
        }
        Ok(directory)
    }

    fn index(&mut self, agent: Agent) {
        let id = agent.internal_id().to_string();
        let number = agent.agent_number().clone();
        let key = (number.role(), number.year());
        let seen = self.sequences.entry(key).or_insert(0);
        *seen = (*seen).max(number.suffix());

        if let Some(email) = agent.email() {
            self.by_email.insert(email.to_string(), id.clone());
        }
        self.by_number.insert(number, id.clone());
        self.agents.insert(id, agent);
    }

    /// Register an agent
    pub fn register(&mut self, agent: Agent) -> Result<(), DirectoryError> {
        if self.agents.contains_key(agent.internal_id()) {
            return Err(DirectoryError::DuplicateInternalId(
                agent.internal_id().to_string(),
            ));
        }
        if self.by_number.contains_key(agent.agent_number()) {
            return Err(DirectoryError::DuplicateAgentNumber(
                agent.agent_number().to_string(),
            ));
        }
        if let Some(email) = agent.email() {
            if self.by_email.contains_key(email) {
                return Err(DirectoryError::DuplicateEmail(email.to_string()));
            }
        }
        self.index(agent);
        Ok(())
    }

    /// Issue the next unused agent number for (role, year)
    ///
    /// Issued numbers are reserved immediately, so two calls never return the
    /// same number even if the first is never registered.
    pub fn issue_agent_number(
        &mut self,
        role: AgentRole,
        year: u16,
    ) -> Result<AgentNumber, DirectoryError> {
        let seen = self.sequences.get(&(role, year)).copied().unwrap_or(0);
        let number = AgentNumber::new(role, year, seen + 1)?;
        self.sequences.insert((role, year), seen + 1);
        Ok(number)
    }

    /// Highest issued suffix per (role, year), ordered
    pub fn issued_sequences(&self) -> Vec<(AgentRole, u16, u32)> {
        let mut sequences: Vec<(AgentRole, u16, u32)> = self
            .sequences
            .iter()
            .map(|((role, year), seen)| (*role, *year, *seen))
            .collect();
        sequences.sort_unstable();
        sequences
    }

    /// Restore an issue sequence; never moves a sequence backwards
    pub fn reserve_sequence(&mut self, role: AgentRole, year: u16, suffix: u32) {
        let seen = self.sequences.entry((role, year)).or_insert(0);
        *seen = (*seen).max(suffix);
    }

    pub fn get(&self, internal_id: &str) -> Option<&Agent> {
        self.agents.get(internal_id)
    }

    pub fn by_number(&self, number: &AgentNumber) -> Option<&Agent> {
        self.by_number.get(number).and_then(|id| self.agents.get(id))
    }

    pub fn by_email(&self, email: &str) -> Option<&Agent> {
        self.by_email
            .get(&email.trim().to_ascii_lowercase())
            .and_then(|id| self.agents.get(id))
    }

    /// Agents whose display name matches, ignoring case and surrounding space
    pub fn by_display_name(&self, name: &str) -> Vec<&Agent> {
        let wanted = name.trim().to_lowercase();
        let mut matches: Vec<&Agent> = self
            .agents
            .values()
            .filter(|a| a.display_name().trim().to_lowercase() == wanted)
            .collect();
        matches.sort_by(|a, b| a.internal_id().cmp(b.internal_id()));
        matches
    }

    pub fn house(&self) -> &Agent {
        // Inserted in new() and never removed
        &self.agents[&self.house_id]
    }

    pub fn house_id(&self) -> &str {
        &self.house_id
    }

    pub fn contains(&self, internal_id: &str) -> bool {
        self.agents.contains_key(internal_id)
    }

    /// All agents, ordered by internal id
    pub fn agents(&self) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self.agents.values().collect();
        agents.sort_by(|a, b| a.internal_id().cmp(b.internal_id()));
        agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Mark an agent inactive; it still resolves for attribution
    pub fn deactivate(&mut self, internal_id: &str) -> Result<(), DirectoryError> {
        let agent = self
            .agents
            .get_mut(internal_id)
            .ok_or_else(|| DirectoryError::AgentNotFound(internal_id.to_string()))?;
        agent.deactivate();
        Ok(())
    }

    /// Follow merge links to the surviving record
    pub fn canonical(&self, internal_id: &str) -> Result<&Agent, DirectoryError> {
        let mut current = self
            .agents
            .get(internal_id)
            .ok_or_else(|| DirectoryError::AgentNotFound(internal_id.to_string()))?;

        // A chain longer than the directory means a cycle
        for _ in 0..self.agents.len() {
            match current.merged_into() {
                None => return Ok(current),
                Some(next) => {
                    current = self
                        .agents
                        .get(next)
                        .ok_or_else(|| DirectoryError::BrokenMergeChain(internal_id.to_string()))?;
                }
            }
        }
        Err(DirectoryError::BrokenMergeChain(internal_id.to_string()))
    }

    pub fn canonical_id(&self, internal_id: &str) -> Result<&str, DirectoryError> {
        self.canonical(internal_id).map(|a| a.internal_id())
    }

    /// Check a merge without applying it
    ///
    /// Returns the canonical survivor id the retired identity will point to.
    pub fn validate_merge(
        &self,
        retired_id: &str,
        survivor_id: &str,
    ) -> Result<String, DirectoryError> {
        if retired_id == survivor_id {
            return Err(DirectoryError::SelfMerge(retired_id.to_string()));
        }
        if retired_id == self.house_id {
            return Err(DirectoryError::HouseMerge);
        }
        let retired = self
            .agents
            .get(retired_id)
            .ok_or_else(|| DirectoryError::AgentNotFound(retired_id.to_string()))?;
        if let Some(target) = retired.merged_into() {
            return Err(DirectoryError::AlreadyMerged(
                retired_id.to_string(),
                target.to_string(),
            ));
        }
        let survivor = self.canonical_id(survivor_id)?;
        if survivor == retired_id {
            return Err(DirectoryError::SelfMerge(retired_id.to_string()));
        }
        Ok(survivor.to_string())
    }

    /// Retire `retired_id` in favour of `survivor_id`
    ///
    /// The survivor's agent number is untouched. The retired record stays in
    /// the directory so historical references still resolve.
    pub fn merge(&mut self, retired_id: &str, survivor_id: &str) -> Result<String, DirectoryError> {
        let survivor = self.validate_merge(retired_id, survivor_id)?;
        if let Some(retired) = self.agents.get_mut(retired_id) {
            retired.retire_into(&survivor);
        }
        Ok(survivor)
    }
}
