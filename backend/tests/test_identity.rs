//! Agent Identity Tests
//!
//! Critical invariants tested:
//! - Agent numbers are issued sequentially and never reissued
//! - References of every kind resolve to the current internal id
//! - Merged identities resolve to the survivor, whose number is unchanged
//! - Unknown references fall back to the house identity

use commission_ledger_core_rs::identity::{AgentDirectory, DirectoryError, ResolveError};
use commission_ledger_core_rs::models::agent::{Agent, AgentNumber, AgentNumberError, AgentRole};

fn house() -> Agent {
    Agent::new(
        "house".to_string(),
        AgentNumber::parse("MPPHQ20000001").unwrap(),
        "Home Office".to_string(),
    )
}

fn directory_with(agents: &[(&str, &str, &str)]) -> AgentDirectory {
    let mut dir = AgentDirectory::new(house());
    for (id, name, email) in agents {
        let number = dir.issue_agent_number(AgentRole::Agent, 2025).unwrap();
        dir.register(Agent::new(id.to_string(), number, name.to_string()).with_email(email))
            .unwrap();
    }
    dir
}

#[test]
fn test_numbers_issue_in_sequence_per_role_and_year() {
    let mut dir = AgentDirectory::new(house());
    let a1 = dir.issue_agent_number(AgentRole::Agent, 2025).unwrap();
    let a2 = dir.issue_agent_number(AgentRole::Agent, 2025).unwrap();
    let m1 = dir.issue_agent_number(AgentRole::Manager, 2025).unwrap();
    let a_next_year = dir.issue_agent_number(AgentRole::Agent, 2026).unwrap();
    let hq = dir.issue_agent_number(AgentRole::House, 2000).unwrap();

    assert_eq!(a1.as_str(), "MPPAG20250001");
    assert_eq!(a2.as_str(), "MPPAG20250002");
    assert_eq!(m1.as_str(), "MPPMA20250001");
    assert_eq!(a_next_year.as_str(), "MPPAG20260001");
    // House number 0001 is already taken by the house identity
    assert_eq!(hq.as_str(), "MPPHQ20000002");
}

#[test]
fn test_registering_a_number_advances_the_sequence() {
    let mut dir = AgentDirectory::new(house());
    dir.register(Agent::new(
        "imported".to_string(),
        AgentNumber::parse("MPPAG20250040").unwrap(),
        "Imported".to_string(),
    ))
    .unwrap();
    assert_eq!(
        dir.issue_agent_number(AgentRole::Agent, 2025).unwrap().as_str(),
        "MPPAG20250041"
    );
}

#[test]
fn test_sequence_exhaustion() {
    let mut dir = AgentDirectory::new(house());
    dir.register(Agent::new(
        "last".to_string(),
        AgentNumber::parse("MPPAG20259999").unwrap(),
        "Last".to_string(),
    ))
    .unwrap();
    assert!(matches!(
        dir.issue_agent_number(AgentRole::Agent, 2025),
        Err(DirectoryError::AgentNumber(AgentNumberError::SequenceExhausted { .. }))
    ));
}

#[test]
fn test_duplicate_number_rejected() {
    let mut dir = directory_with(&[("usr_a", "Dana Reyes", "dana@example.com")]);
    let err = dir
        .register(Agent::new(
            "usr_z".to_string(),
            AgentNumber::parse("MPPAG20250001").unwrap(),
            "Someone".to_string(),
        ))
        .unwrap_err();
    assert_eq!(
        err,
        DirectoryError::DuplicateAgentNumber("MPPAG20250001".to_string())
    );
}

#[test]
fn test_reference_kinds_resolve() {
    let dir = directory_with(&[
        ("usr_a", "Dana Reyes", "dana@example.com"),
        ("usr_b", "Sam Ortiz", "sam@example.com"),
    ]);

    for reference in ["sam@example.com", "MPPAG20250002", "usr_b", "Sam Ortiz"] {
        let resolved = dir.resolve_agent(Some(reference)).unwrap();
        assert_eq!(resolved.internal_id, "usr_b", "{}", reference);
        assert_eq!(resolved.agent_number.as_str(), "MPPAG20250002");
        assert!(!resolved.house);
    }
}

#[test]
fn test_merge_keeps_survivor_number_and_redirects_history() {
    let mut dir = directory_with(&[
        ("usr_old", "Dana Reyes", "dana.old@example.com"),
        ("usr_new", "Dana Reyes", "dana@example.com"),
    ]);

    assert_eq!(dir.merge("usr_old", "usr_new").unwrap(), "usr_new");

    let survivor = dir.get("usr_new").unwrap();
    assert_eq!(survivor.agent_number().as_str(), "MPPAG20250002");

    let retired = dir.get("usr_old").unwrap();
    assert_eq!(retired.merged_into(), Some("usr_new"));
    assert!(!retired.is_active());

    // Every historical reference to the retired identity lands on the survivor
    for reference in ["usr_old", "dana.old@example.com", "MPPAG20250001"] {
        let resolved = dir.resolve_agent(Some(reference)).unwrap();
        assert_eq!(resolved.internal_id, "usr_new", "{}", reference);
        assert_eq!(resolved.agent_number.as_str(), "MPPAG20250002");
    }
}

#[test]
fn test_merge_chains_follow_to_final_survivor() {
    let mut dir = directory_with(&[
        ("a", "A", "a@example.com"),
        ("b", "B", "b@example.com"),
        ("c", "C", "c@example.com"),
    ]);
    dir.merge("a", "b").unwrap();
    dir.merge("b", "c").unwrap();

    assert_eq!(dir.canonical_id("a").unwrap(), "c");
    assert_eq!(dir.resolve_agent(Some("a@example.com")).unwrap().internal_id, "c");
}

#[test]
fn test_merge_into_retired_identity_targets_its_survivor() {
    let mut dir = directory_with(&[
        ("a", "A", "a@example.com"),
        ("b", "B", "b@example.com"),
        ("c", "C", "c@example.com"),
    ]);
    dir.merge("b", "c").unwrap();
    assert_eq!(dir.merge("a", "b").unwrap(), "c");
    assert_eq!(dir.get("a").unwrap().merged_into(), Some("c"));
}

#[test]
fn test_invalid_merges() {
    let mut dir = directory_with(&[("a", "A", "a@example.com"), ("b", "B", "b@example.com")]);

    assert_eq!(dir.merge("a", "a"), Err(DirectoryError::SelfMerge("a".to_string())));
    assert_eq!(dir.merge("house", "a"), Err(DirectoryError::HouseMerge));
    assert_eq!(
        dir.merge("ghost", "a"),
        Err(DirectoryError::AgentNotFound("ghost".to_string()))
    );

    dir.merge("a", "b").unwrap();
    assert_eq!(
        dir.merge("a", "b"),
        Err(DirectoryError::AlreadyMerged("a".to_string(), "b".to_string()))
    );
    // b -> a would close a cycle through a's survivor
    assert_eq!(dir.merge("b", "a"), Err(DirectoryError::SelfMerge("b".to_string())));
}

#[test]
fn test_unknown_reference_falls_back_to_house() {
    let dir = directory_with(&[("usr_a", "Dana Reyes", "dana@example.com")]);

    for reference in [None, Some(""), Some("ghost@example.com"), Some("MPPAG20259999")] {
        let (resolved, err) = dir.resolve_or_house(reference);
        assert!(resolved.house);
        assert_eq!(resolved.internal_id, "house");
        assert_eq!(resolved.agent_number.as_str(), "MPPHQ20000001");
        assert!(err.is_some());
    }
    assert_eq!(dir.resolve_agent(None), Err(ResolveError::Missing));
}

#[test]
fn test_deactivated_agent_still_resolves() {
    let mut dir = directory_with(&[("usr_a", "Dana Reyes", "dana@example.com")]);
    dir.deactivate("usr_a").unwrap();

    let resolved = dir.resolve_agent(Some("dana@example.com")).unwrap();
    assert_eq!(resolved.internal_id, "usr_a");
    assert!(!dir.get("usr_a").unwrap().is_active());
}
