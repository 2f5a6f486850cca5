//! End-to-end tests of the conviction-voting engine: create, stake, decay,
//! execute, expire, and the admin kill-switch, driven by a manual clock.

use std::sync::Arc;

use agora_core::{Amount, ManualClock, MemberId, RoleSet};
use agora_economic::TokenLedger;
use agora_governance::{
    Governance, GovernanceError, GovernanceManager, GovernanceParams, LoggingRelay, ParameterKey,
    ProposalAction, ProposalClass, ProposalStatus, ProposalSubmission,
};

struct Harness {
    manager: GovernanceManager,
    ledger: Arc<TokenLedger>,
    relay: Arc<LoggingRelay>,
    clock: Arc<ManualClock>,
}

fn harness(params: GovernanceParams) -> Harness {
    let ledger = Arc::new(TokenLedger::new());
    let relay = Arc::new(LoggingRelay::new());
    let clock = Arc::new(ManualClock::new(100));
    let admins = RoleSet::with_members(vec![MemberId::new("admin")]);

    let manager = GovernanceManager::new(
        ledger.clone(),
        relay.clone(),
        clock.clone(),
        params,
        admins,
    )
    .unwrap();

    Harness {
        manager,
        ledger,
        relay,
        clock,
    }
}

fn submission(class: ProposalClass, action: Option<ProposalAction>) -> ProposalSubmission {
    ProposalSubmission {
        title: "Test proposal".to_string(),
        description: "Integration test".to_string(),
        link: String::new(),
        class,
        action,
    }
}

async fn fund(harness: &Harness, member: &MemberId, amount: u64) {
    harness
        .ledger
        .mint(member, Amount::new(amount))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_decay_prevents_premature_execution() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    let id = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();

    h.manager
        .add_conviction(&alice, id, Amount::new(500_000))
        .await
        .unwrap();

    // 500_000 decays to 299_350 over ten idle units
    h.clock.advance(10);
    assert_eq!(h.manager.sweep(&[id]).await.unwrap(), 1);

    let proposal = h.manager.get_proposal(id).await.unwrap().unwrap();
    assert_eq!(proposal.current_conviction, 299_350);
    assert_eq!(proposal.max_conviction, 500_000);

    let result = h.manager.execute_proposal(id).await;
    assert!(matches!(
        result,
        Err(GovernanceError::ConvictionBelowThreshold {
            current: 299_350,
            required: 1_000_000,
            ..
        })
    ));
    assert_eq!(
        h.manager.get_proposal(id).await.unwrap().unwrap().status,
        ProposalStatus::Active
    );
}

#[tokio::test]
async fn test_funding_proposal_executes_once() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    let builder = MemberId::new("builder");
    fund(&h, &alice, 2_000_000).await;

    let id = h
        .manager
        .create_proposal(
            &alice,
            submission(
                ProposalClass::Funding,
                Some(ProposalAction::Funding {
                    recipient: builder.clone(),
                    amount: Amount::new(750_000),
                }),
            ),
        )
        .await
        .unwrap();

    // Funding threshold is 1.5x the base
    let proposal = h.manager.get_proposal(id).await.unwrap().unwrap();
    assert_eq!(proposal.required_conviction, 1_500_000);

    h.manager
        .add_conviction(&alice, id, Amount::new(1_600_000))
        .await
        .unwrap();
    h.manager.execute_proposal(id).await.unwrap();

    let proposal = h.manager.get_proposal(id).await.unwrap().unwrap();
    assert_eq!(proposal.status, ProposalStatus::Executed);
    assert_eq!(proposal.executed_at, Some(100));

    let grants = h.relay.grants().await;
    assert_eq!(grants, vec![(builder, Amount::new(750_000), id)]);

    // Second execution is refused and dispatches nothing
    let result = h.manager.execute_proposal(id).await;
    assert!(matches!(result, Err(GovernanceError::AlreadyExecuted(_))));
    assert_eq!(h.relay.grants().await.len(), 1);

    // Terminal proposals accept no further stake mutation
    let result = h.manager.add_conviction(&alice, id, Amount::new(1)).await;
    assert!(matches!(
        result,
        Err(GovernanceError::ProposalNotActive(_, ProposalStatus::Executed))
    ));
}

#[tokio::test]
async fn test_inactive_proposal_expires() {
    let params = GovernanceParams {
        max_inactive_blocks: 50,
        ..Default::default()
    };
    let h = harness(params);
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    let id = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();

    // Exactly at the window: still not expirable
    h.clock.set(150);
    assert!(h.manager.expire_inactive(&[id]).await.unwrap().is_empty());

    // One unit past the window
    h.clock.set(151);
    assert_eq!(h.manager.expire_inactive(&[id]).await.unwrap(), vec![id]);
    assert_eq!(
        h.manager.get_proposal(id).await.unwrap().unwrap().status,
        ProposalStatus::Expired
    );

    let result = h.manager.add_conviction(&alice, id, Amount::new(100)).await;
    assert!(matches!(
        result,
        Err(GovernanceError::ProposalNotActive(_, ProposalStatus::Expired))
    ));

    // Expiry is idempotent
    assert!(h.manager.expire_inactive(&[id]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sweep_keeps_touched_proposal_alive() {
    let params = GovernanceParams {
        max_inactive_blocks: 50,
        ..Default::default()
    };
    let h = harness(params);
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    let id = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();
    h.manager
        .add_conviction(&alice, id, Amount::new(10_000))
        .await
        .unwrap();

    // A sweep counts as a touch, resetting the inactivity window
    h.clock.set(140);
    h.manager.sweep(&[id]).await.unwrap();
    h.clock.set(151);
    assert!(h.manager.expire_inactive(&[id]).await.unwrap().is_empty());
    assert!(h.manager.get_proposal(id).await.unwrap().unwrap().is_active());
}

#[tokio::test]
async fn test_stake_is_shared_across_proposals() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 100_000).await;

    let first = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();
    let second = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();

    h.manager
        .add_conviction(&alice, first, Amount::new(70_000))
        .await
        .unwrap();

    // Only 30_000 remains unlocked for every other proposal
    let result = h
        .manager
        .add_conviction(&alice, second, Amount::new(40_000))
        .await;
    assert!(matches!(
        result,
        Err(GovernanceError::InsufficientBalance {
            available,
            requested,
        }) if available == Amount::new(30_000) && requested == Amount::new(40_000)
    ));

    let summary = h.manager.get_voter_aggregate(&alice).await.unwrap();
    assert_eq!(summary.total_stake, Amount::new(70_000));
    assert_eq!(summary.available_tokens, Amount::new(30_000));

    // Withdrawing from the first proposal frees the stake again
    let released = h.manager.remove_conviction(&alice, first).await.unwrap();
    assert_eq!(released, Amount::new(70_000));

    h.manager
        .add_conviction(&alice, second, Amount::new(40_000))
        .await
        .unwrap();

    let summary = h.manager.get_voter_aggregate(&alice).await.unwrap();
    assert_eq!(summary.total_stake, Amount::new(40_000));
    assert_eq!(summary.available_tokens, Amount::new(60_000));
}

#[tokio::test]
async fn test_withdrawal_subtracts_decayed_conviction() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    let bob = MemberId::new("bob");
    fund(&h, &alice, 1_000_000).await;
    fund(&h, &bob, 1_000_000).await;

    let id = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();

    h.manager
        .add_conviction(&alice, id, Amount::new(500_000))
        .await
        .unwrap();
    h.manager
        .add_conviction(&bob, id, Amount::new(200_000))
        .await
        .unwrap();

    let proposal = h.manager.get_proposal(id).await.unwrap().unwrap();
    assert_eq!(proposal.current_conviction, 700_000);
    assert_eq!(proposal.total_stake, Amount::new(700_000));

    // Ten units later Alice pulls out; her decayed share leaves with her
    h.clock.advance(10);
    h.manager.remove_conviction(&alice, id).await.unwrap();

    let proposal = h.manager.get_proposal(id).await.unwrap().unwrap();
    // Aggregate 700_000 decays to 419_090; Alice's decayed 299_350 leaves
    assert_eq!(proposal.current_conviction, 419_090 - 299_350);
    assert_eq!(proposal.total_stake, Amount::new(200_000));
    assert!(h.manager.get_vote(id, &alice).await.unwrap().is_none());
    assert!(h.manager.get_vote(id, &bob).await.unwrap().is_some());
}

#[tokio::test]
async fn test_parameter_proposal_updates_config() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 3_000_000).await;

    let id = h
        .manager
        .create_proposal(
            &alice,
            submission(
                ProposalClass::Parameter,
                Some(ProposalAction::Parameter {
                    key: ParameterKey::BaseThreshold,
                    value: 5_000_000,
                }),
            ),
        )
        .await
        .unwrap();

    // Parameter threshold is 2x the base
    h.manager
        .add_conviction(&alice, id, Amount::new(2_000_000))
        .await
        .unwrap();
    h.manager.execute_proposal(id).await.unwrap();

    let params = h.manager.get_parameters().await.unwrap();
    assert_eq!(params.base_threshold, 5_000_000);
    // The new threshold only affects proposals created afterwards
    let next = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();
    assert_eq!(
        h.manager
            .get_proposal(next)
            .await
            .unwrap()
            .unwrap()
            .required_conviction,
        5_000_000
    );
}

#[tokio::test]
async fn test_out_of_range_parameter_value_rejected_at_creation() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 3_000_000).await;

    // A decay rate at or above the fixed-point scale is refused up front,
    // so no proposal can reach execution carrying a value that would fail
    // there after the status flip.
    let result = h
        .manager
        .create_proposal(
            &alice,
            submission(
                ProposalClass::Parameter,
                Some(ProposalAction::Parameter {
                    key: ParameterKey::DecayRate,
                    value: 12_000,
                }),
            ),
        )
        .await;
    assert!(matches!(result, Err(GovernanceError::InvalidProposal(_))));
    assert!(h.manager.list_proposals().await.unwrap().is_empty());
    assert_eq!(h.manager.get_parameters().await.unwrap().decay_rate, 9_500);
}

#[tokio::test]
async fn test_contract_proposal_is_relayed() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 3_000_000).await;

    let id = h
        .manager
        .create_proposal(
            &alice,
            submission(
                ProposalClass::Contract,
                Some(ProposalAction::Contract {
                    target: "registry.upgrade".to_string(),
                    payload: vec![1, 2, 3],
                }),
            ),
        )
        .await
        .unwrap();

    // Contract threshold is 2.5x the base
    h.manager
        .add_conviction(&alice, id, Amount::new(2_500_000))
        .await
        .unwrap();
    h.manager.execute_proposal(id).await.unwrap();

    let actions = h.relay.actions().await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].proposal_id, id);
    assert_eq!(actions[0].target, "registry.upgrade");
    assert_eq!(actions[0].payload, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_kill_switch_blocks_mutations() {
    let h = harness(GovernanceParams::default());
    let admin = MemberId::new("admin");
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    let id = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();
    h.manager
        .add_conviction(&alice, id, Amount::new(100_000))
        .await
        .unwrap();

    h.manager.toggle_enabled(&admin, false).await.unwrap();

    // Every mutating call is refused while disabled
    assert!(matches!(
        h.manager
            .create_proposal(&alice, submission(ProposalClass::General, None))
            .await,
        Err(GovernanceError::SystemDisabled)
    ));
    assert!(matches!(
        h.manager.add_conviction(&alice, id, Amount::new(1)).await,
        Err(GovernanceError::SystemDisabled)
    ));
    assert!(matches!(
        h.manager.remove_conviction(&alice, id).await,
        Err(GovernanceError::SystemDisabled)
    ));
    assert!(matches!(
        h.manager.execute_proposal(id).await,
        Err(GovernanceError::SystemDisabled)
    ));
    assert!(matches!(
        h.manager.sweep(&[id]).await,
        Err(GovernanceError::SystemDisabled)
    ));

    // Reads still work
    assert!(h.manager.get_proposal(id).await.unwrap().is_some());
    assert_eq!(h.manager.list_proposals().await.unwrap().len(), 1);

    // Re-enabling restores the mutating surface
    h.manager.toggle_enabled(&admin, true).await.unwrap();
    h.manager
        .add_conviction(&alice, id, Amount::new(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_zero_stake_is_rejected() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    let id = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::General, None))
        .await
        .unwrap();

    let result = h.manager.add_conviction(&alice, id, Amount::ZERO).await;
    assert!(matches!(result, Err(GovernanceError::ZeroStake)));
}

#[tokio::test]
async fn test_unknown_proposal_is_reported() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    assert!(matches!(
        h.manager.add_conviction(&alice, 42, Amount::new(1)).await,
        Err(GovernanceError::ProposalNotFound(42))
    ));
    assert!(matches!(
        h.manager.execute_proposal(42).await,
        Err(GovernanceError::ProposalNotFound(42))
    ));
    assert!(h.manager.get_proposal(42).await.unwrap().is_none());

    // Unknown ids in a batch sweep are skipped, not fatal
    assert_eq!(h.manager.sweep(&[42]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_submission_is_rejected() {
    let h = harness(GovernanceParams::default());
    let alice = MemberId::new("alice");
    fund(&h, &alice, 1_000_000).await;

    // Funding class without a payload
    let result = h
        .manager
        .create_proposal(&alice, submission(ProposalClass::Funding, None))
        .await;
    assert!(matches!(result, Err(GovernanceError::InvalidProposal(_))));

    // General class with a payload
    let result = h
        .manager
        .create_proposal(
            &alice,
            submission(
                ProposalClass::General,
                Some(ProposalAction::Parameter {
                    key: ParameterKey::MinStake,
                    value: 1,
                }),
            ),
        )
        .await;
    assert!(matches!(result, Err(GovernanceError::InvalidProposal(_))));
    assert!(h.manager.list_proposals().await.unwrap().is_empty());
}
