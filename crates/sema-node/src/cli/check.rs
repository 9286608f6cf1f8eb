use super::utils::{fail, heading, ok, warn_line};
use sema_crypto::read_metadata;
use sema_node::{NodeConfig, ProverBackend, SignalingService};
use sema_types::SemaResult;
use std::path::Path;

pub fn run_checks(config_path: &Path, loaded: SemaResult<NodeConfig>) -> anyhow::Result<()> {
    heading("SEMA Node Diagnostics");

    let mut failed = 0;
    let mut warnings = 0;

    let config = match loaded {
        Ok(config) => {
            if config_path.exists() {
                ok("Configuration", config_path.display());
            } else {
                warn_line("Configuration", "not found, using defaults");
                warnings += 1;
            }
            config
        }
        Err(e) => {
            fail("Configuration", e);
            anyhow::bail!("configuration is invalid");
        }
    };

    ok("Tree", config.circuit_params());
    ok("Broadcast mode", config.gate.broadcast_mode);

    if config.data_dir.is_dir() {
        ok("Data directory", config.data_dir.display());
    } else {
        warn_line("Data directory", "missing (run: sema init)");
        warnings += 1;
    }

    let identities = std::fs::read_dir(config.identities_dir())
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0);
    if identities > 0 {
        ok("Identities", format!("{} found", identities));
    } else {
        warn_line("Identities", "none (run: sema identity generate)");
        warnings += 1;
    }

    if config.prover.backend == ProverBackend::Groth16 {
        let dir = config.artifacts_dir();
        match read_metadata(&dir) {
            Ok(meta) => ok(
                "Artifact metadata",
                format!("{} v{} {}", meta.circuit, meta.version, meta.params()),
            ),
            Err(e) => {
                fail("Artifact metadata", e);
                failed += 1;
            }
        }
    }

    match SignalingService::from_config(&config) {
        Ok(service) if service.can_prove() => ok("Backends", "prover and verifier loaded"),
        Ok(_) => {
            warn_line("Backends", "verifier only, no proving key");
            warnings += 1;
        }
        Err(e) => {
            fail("Backends", e);
            failed += 1;
        }
    }

    println!();
    println!("  {} failed, {} warnings", failed, warnings);
    if failed > 0 {
        anyhow::bail!("{} check(s) failed", failed);
    }
    Ok(())
}
