use anyhow::{Context, Result};
use coldsig_ceremony::{NodeRpc, Output, Role, Step};
use std::sync::Arc;

use crate::test_utils::{init_tracing, MemoryNode, Party, ACCOUNT};

fn output(amount: u64) -> Vec<Output> {
    vec![Output {
        public_address: "c3".repeat(32),
        amount,
        memo: String::new(),
        asset_id: None,
    }]
}

/// Run a coordinator and one participant up to the collection of
/// commitments; the participant signs `participant_tx`.
async fn up_to_commitments(
    node: Arc<MemoryNode>,
    participant_tx: Option<u64>,
) -> Result<(Party, Party)> {
    let unsigned =
        node.build_unsigned_transaction(ACCOUNT, &output(10)).await?;
    let other = match participant_tx {
        Some(amount) => {
            node.build_unsigned_transaction(ACCOUNT, &output(amount))
                .await?
        }
        None => unsigned.clone(),
    };

    let mut coordinator = Party::new(1, node.clone())?;
    let mut participant = Party::new(2, node.clone())?;
    coordinator.ceremony.select_role(Role::Coordinator)?;
    coordinator
        .ceremony
        .set_unsigned_transaction(ACCOUNT, &unsigned.to_hex())?;
    participant.ceremony.select_role(Role::Participant)?;
    participant
        .ceremony
        .set_unsigned_transaction(ACCOUNT, &other.to_hex())?;

    coordinator.ceremony.derive_identity(0).await?;
    let identity = participant.ceremony.derive_identity(0).await?;
    coordinator.ceremony.add_draft(&identity.to_hex())?;
    coordinator.ceremony.submit_drafts()?;
    coordinator.ceremony.complete_collection()?;

    coordinator.ceremony.review_transaction().await?;
    participant.ceremony.review_transaction().await?;
    coordinator.ceremony.create_signing_commitment().await?;
    participant.ceremony.create_signing_commitment().await?;
    Ok((coordinator, participant))
}

/// A commitment made for a different transaction is rejected and
/// nothing is collected.
#[tokio::test]
async fn integration_ceremony_tx_hash_mismatch() -> Result<()> {
    init_tracing();

    let node = Arc::new(MemoryNode::default());
    let (mut coordinator, participant) =
        up_to_commitments(node, Some(11)).await?;

    let commitment = participant
        .ceremony
        .export()
        .context("no commitment to relay")?;
    coordinator.ceremony.add_draft(&commitment)?;
    let error = coordinator
        .ceremony
        .submit_drafts()
        .err()
        .context("mismatched commitment accepted")?;
    assert_eq!("TX_HASH_MISMATCH", error.code());
    assert!(!error.retryable());

    let failure = coordinator
        .ceremony
        .last_failure()
        .context("failure not recorded")?;
    assert_eq!("TX_HASH_MISMATCH", failure.code);
    assert_eq!(
        Step::CreateSigningCommitment,
        coordinator.ceremony.step()
    );
    assert_eq!(1, coordinator.ceremony.drafts().len());
    assert!(coordinator.ceremony.complete_collection().is_err());
    Ok(())
}

/// A share created after the device reviewed another transaction
/// fails aggregation and nothing is posted.
#[tokio::test]
async fn integration_ceremony_share_over_other_review() -> Result<()> {
    init_tracing();

    let node = Arc::new(MemoryNode::default());
    let (mut coordinator, mut participant) =
        up_to_commitments(node.clone(), None).await?;

    let commitment = participant
        .ceremony
        .export()
        .context("no commitment to relay")?;
    coordinator.ceremony.add_draft(&commitment)?;
    coordinator.ceremony.submit_drafts()?;
    coordinator.ceremony.complete_collection()?;
    let package = coordinator.ceremony.create_signing_package().await?;
    participant.ceremony.set_signing_package(&package.to_hex())?;

    // the participant device approves something else meanwhile
    let other =
        node.build_unsigned_transaction(ACCOUNT, &output(99)).await?;
    participant.device.signer.review_transaction(&other).await?;

    coordinator.ceremony.create_signature_share().await?;
    let share = participant.ceremony.create_signature_share().await?;
    coordinator.ceremony.add_draft(&share.encode())?;
    coordinator.ceremony.submit_drafts()?;
    coordinator.ceremony.complete_collection()?;

    let error = coordinator
        .ceremony
        .aggregate_and_broadcast(true)
        .await
        .err()
        .context("invalid share aggregated")?;
    assert_eq!("BROADCAST_OUTCOME_UNKNOWN", error.code());
    assert!(!error.retryable());
    assert_eq!(
        Step::AggregateAndBroadcast,
        coordinator.ceremony.step()
    );
    assert_eq!(0, node.posted());
    Ok(())
}
