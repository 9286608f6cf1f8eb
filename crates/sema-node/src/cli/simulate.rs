use super::commands::OutputFormat;
use super::utils::{heading, print_json};
use anyhow::{bail, Context};
use sema_crypto::{external_nullifier, Identity};
use sema_node::{BroadcastMode, CancellationToken, NodeConfig, SignalingService};
use sema_types::SemaError;
use std::time::Instant;
use tracing::info;

const REPLAY_ATTEMPTS: usize = 4;

/// Leaf index of the signaling member, after checking the group fits the tree.
fn group_layout(members: u64, prove_index: Option<u64>, capacity: u64) -> anyhow::Result<u64> {
    if members == 0 {
        bail!("need at least one member");
    }
    if members > capacity {
        bail!("{} members do not fit in a tree of capacity {}", members, capacity);
    }
    let index = prove_index.unwrap_or(members - 1);
    if index >= members {
        bail!("prove index {} is outside the {} registered members", index, members);
    }
    Ok(index)
}

pub async fn run_simulation(
    config: &NodeConfig,
    members: u64,
    prove_index: Option<u64>,
    signal: &str,
    context: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let service = SignalingService::from_config(config).context("Failed to start signaling service")?;
    let index = group_layout(members, prove_index, service.registry().capacity().await)?;
    if !service.can_prove() {
        bail!("no proving key available in {}", config.artifacts_dir().display());
    }
    let mut events = service.subscribe();
    let hasher = service.registry().hasher().clone();

    let mut identities = Vec::new();
    for _ in 0..members {
        let identity = Identity::generate()?;
        service.register(&identity.commitment(hasher.as_ref())).await?;
        identities.push(identity);
    }
    info!(members, root = %service.current_root().await.short(), "Registered identities");

    let (cancel_tx, cancel) = CancellationToken::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let context_hash = external_nullifier(context);
    let started = Instant::now();
    let full = service
        .prove_signal(&identities[index as usize], index, signal.as_bytes(), &context_hash, &cancel)
        .await?;
    let proving_ms = started.elapsed().as_millis() as u64;
    let s = full.public_signals;

    service.verify_proof(&s, &full.proof).await?;
    if !service
        .pre_broadcast_check(&s.root, &s.nullifier_hash, &s.external_nullifier)
        .await
    {
        bail!("pre-broadcast check rejected a fresh signal");
    }

    let proof = match config.gate.broadcast_mode {
        BroadcastMode::ProofRequired => Some(&full.proof),
        BroadcastMode::PreVerified => None,
    };
    let receipt = service
        .broadcast_signal(signal.as_bytes(), proof, &s.root, &s.nullifier_hash, &s.external_nullifier)
        .await?;
    let event = events.recv().await.context("Accepted signal was not published")?;

    let replays = futures::future::join_all((0..REPLAY_ATTEMPTS).map(|_| {
        service.broadcast_signal(
            signal.as_bytes(),
            Some(&full.proof),
            &s.root,
            &s.nullifier_hash,
            &s.external_nullifier,
        )
    }))
    .await;
    let replays_rejected = replays
        .iter()
        .filter(|r| matches!(r, Err(SemaError::NullifierAlreadyUsed { .. })))
        .count();
    if replays_rejected != REPLAY_ATTEMPTS {
        bail!(
            "only {} of {} replayed broadcasts were rejected",
            replays_rejected,
            REPLAY_ATTEMPTS
        );
    }

    let stats = service.stats().await;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "public_signals": s,
            "proof_bytes": full.proof.as_bytes().len(),
            "proving_ms": proving_ms,
            "receipt": receipt,
            "event_sequence": event.receipt.sequence,
            "replays_rejected": replays_rejected,
            "stats": stats,
        }))?,
        OutputFormat::Text => {
            heading("Simulation");
            println!("  Tree:              {}", stats.params);
            println!("  Members:           {}", stats.members);
            println!("  Signaling leaf:    {}", index);
            println!("  Context:           {} ({})", context, s.external_nullifier.short());
            println!("  Root:              {}", s.root.to_hex());
            println!("  Nullifier hash:    {}", s.nullifier_hash.to_hex());
            println!("  Signal hash:       {}", s.signal_hash.to_hex());
            println!("  Proof:             {} bytes in {} ms", full.proof.as_bytes().len(), proving_ms);
            println!("  Broadcast mode:    {}", config.gate.broadcast_mode);
            println!(
                "  Accepted:          \x1b[38;5;46mseq {}\x1b[0m at {}",
                receipt.sequence,
                receipt.accepted_at.to_rfc3339()
            );
            println!(
                "  Replays rejected:  \x1b[38;5;46m{}/{}\x1b[0m",
                replays_rejected, REPLAY_ATTEMPTS
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_layout() {
        assert_eq!(group_layout(5, None, 27).unwrap(), 4);
        assert_eq!(group_layout(5, Some(0), 27).unwrap(), 0);
        assert_eq!(group_layout(27, None, 27).unwrap(), 26);
    }

    #[test]
    fn test_group_layout_rejects_oversized_group() {
        let err = group_layout(u64::MAX, None, 27).unwrap_err();
        assert!(err.to_string().contains("capacity 27"));
        assert!(group_layout(28, None, 27).is_err());
    }

    #[test]
    fn test_group_layout_rejects_bad_index() {
        assert!(group_layout(0, None, 27).is_err());
        assert!(group_layout(5, Some(5), 27).is_err());
    }
}
