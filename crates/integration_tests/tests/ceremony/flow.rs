use anyhow::{Context, Result};
use coldsig_ceremony::{NodeRpc, Output, Role, Step};
use std::sync::Arc;

use crate::test_utils::{init_tracing, MemoryNode, Party, ACCOUNT, FEE};

fn outputs() -> Vec<Output> {
    vec![
        Output {
            public_address: "a1".repeat(32),
            amount: 100,
            memo: "rent".to_string(),
            asset_id: None,
        },
        Output {
            public_address: "b2".repeat(32),
            amount: 7,
            memo: String::new(),
            asset_id: None,
        },
    ]
}

/// Coordinator and two participants sign and broadcast a
/// transaction, which the node then reports with the requested
/// outputs.
#[tokio::test]
async fn integration_ceremony_three_parties() -> Result<()> {
    init_tracing();

    let node = Arc::new(MemoryNode::default());
    let mut coordinator = Party::new(1, node.clone())?;
    let mut participants = vec![
        Party::new(2, node.clone())?,
        Party::new(3, node.clone())?,
    ];

    // transaction
    coordinator.ceremony.select_role(Role::Coordinator)?;
    let unsigned = coordinator
        .ceremony
        .build_unsigned_transaction(ACCOUNT, &outputs())
        .await?;
    assert_eq!(Step::CollectIdentities, coordinator.ceremony.step());
    for party in participants.iter_mut() {
        party.ceremony.select_role(Role::Participant)?;
        party
            .ceremony
            .set_unsigned_transaction(ACCOUNT, &unsigned.to_hex())?;
    }

    // identities
    coordinator.ceremony.derive_identity(0).await?;
    for party in participants.iter_mut() {
        let identity = party.ceremony.derive_identity(0).await?;
        assert_eq!(party.device.emulator.identity(0)?, identity);
        let exported =
            party.ceremony.export().context("no identity to relay")?;
        coordinator.ceremony.add_draft(&exported)?;
    }
    assert_eq!(2, coordinator.ceremony.submit_drafts()?);
    coordinator.ceremony.complete_collection()?;
    assert_eq!(Step::ReviewTransaction, coordinator.ceremony.step());

    // review
    coordinator.ceremony.review_transaction().await?;
    for party in participants.iter_mut() {
        party.ceremony.review_transaction().await?;
    }
    let tx_hash = coordinator
        .ceremony
        .state()
        .tx_hash()
        .cloned()
        .context("no transaction hash")?;
    for party in participants.iter() {
        assert_eq!(Some(&tx_hash), party.ceremony.state().tx_hash());
    }

    // commitments
    let own = coordinator.ceremony.create_signing_commitment().await?;
    assert_eq!(tx_hash, own.tx_hash);
    assert_eq!(
        Step::CreateSigningCommitment,
        coordinator.ceremony.step()
    );
    for party in participants.iter_mut() {
        party.ceremony.create_signing_commitment().await?;
        assert_eq!(Step::CreateSigningPackage, party.ceremony.step());
        let exported =
            party.ceremony.export().context("no commitment to relay")?;
        coordinator.ceremony.add_draft(&exported)?;
    }
    coordinator.ceremony.submit_drafts()?;
    coordinator.ceremony.complete_collection()?;

    // signing package
    let package = coordinator.ceremony.create_signing_package().await?;
    assert_eq!(Some(package.to_hex()), coordinator.ceremony.export());
    for party in participants.iter_mut() {
        party.ceremony.set_signing_package(&package.to_hex())?;
    }

    // shares
    coordinator.ceremony.create_signature_share().await?;
    for party in participants.iter_mut() {
        let share = party.ceremony.create_signature_share().await?;
        assert_eq!(Step::Done, party.ceremony.step());
        assert_eq!(Some(share.encode()), party.ceremony.export());
        coordinator.ceremony.add_draft(&share.encode())?;
    }
    coordinator.ceremony.submit_drafts()?;
    coordinator.ceremony.complete_collection()?;
    assert_eq!(
        Step::AggregateAndBroadcast,
        coordinator.ceremony.step()
    );

    // broadcast
    let result =
        coordinator.ceremony.aggregate_and_broadcast(true).await?;
    assert!(result.accepted);
    assert_eq!(tx_hash.to_hex(), result.hash);
    assert_eq!(Step::Done, coordinator.ceremony.step());
    assert!(coordinator.ceremony.last_failure().is_none());

    let summary = node
        .get_transaction(ACCOUNT, &result.hash)
        .await?
        .context("transaction not posted")?;
    assert_eq!(ACCOUNT, summary.account);
    assert_eq!(FEE, summary.fee);
    assert_eq!(outputs(), summary.outputs);

    Ok(())
}

/// A participant restarting after relaying its commitment begins
/// again from role selection with nothing left over.
#[tokio::test]
async fn integration_ceremony_participant_restart() -> Result<()> {
    init_tracing();

    let node = Arc::new(MemoryNode::default());
    let unsigned =
        node.build_unsigned_transaction(ACCOUNT, &outputs()).await?;
    let mut party = Party::new(2, node.clone())?;

    party.ceremony.select_role(Role::Participant)?;
    party
        .ceremony
        .set_unsigned_transaction(ACCOUNT, &unsigned.to_hex())?;
    party.ceremony.derive_identity(0).await?;
    party.ceremony.review_transaction().await?;
    party.ceremony.create_signing_commitment().await?;
    assert_eq!(Step::CreateSigningPackage, party.ceremony.step());

    party.ceremony.restart();
    assert_eq!(Step::SelectRole, party.ceremony.step());
    assert!(party.ceremony.export().is_none());
    assert!(party.ceremony.state().tx_hash().is_none());

    // the transaction must be supplied again
    party.ceremony.select_role(Role::Participant)?;
    assert!(party.ceremony.review_transaction().await.is_err());
    assert_eq!(
        Some("INVALID_STEP"),
        party.ceremony.last_failure().map(|f| f.code)
    );
    party
        .ceremony
        .set_unsigned_transaction(ACCOUNT, &unsigned.to_hex())?;
    assert_eq!(Step::CollectIdentities, party.ceremony.step());
    Ok(())
}
