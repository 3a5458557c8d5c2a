//! Domain models for the commission ledger

pub mod agent;
pub mod commission;
pub mod event;
pub mod member;
pub mod plan;
pub mod review;

// Re-exports
pub use agent::{Agent, AgentNumber, AgentNumberError, AgentRole};
pub use commission::{Commission, CommissionStatus, PaymentStatus, TransitionError};
pub use event::{Event, EventLog};
pub use member::{EnrollmentEvent, Member, MemberId, MemberStatus};
pub use plan::{AddOn, CoverageType, PlanSelection, PlanSnapshot, PlanTier};
pub use review::{ReviewFlag, ReviewReason};
