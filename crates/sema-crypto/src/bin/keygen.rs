//! Circuit key generation tool for SEMA.
//!
//! Generates Groth16 proving and verifying keys for the signaling circuit.
//!
//! Usage:
//!   sema-keygen generate --depth 20 --arity 5 --output ./sema-keys
//!   sema-keygen verify --vk ./sema-keys/semaphore.vk.bin

use ark_bn254::Bn254;
use ark_serialize::CanonicalDeserialize;
use clap::{Parser, Subcommand};
use sema_crypto::backend::{vk_hash, META_FILE};
use sema_crypto::{read_metadata, write_artifacts, Groth16Backend};
use sema_types::{CircuitParams, HashScheme, CIRCUIT_VERSION, DEFAULT_TREE_ARITY, DEFAULT_TREE_DEPTH};
use std::fs;
use std::path::PathBuf;

/// Key generation tool for SEMA signaling proofs.
#[derive(Parser)]
#[command(name = "sema-keygen")]
#[command(about = "Generate Groth16 proving and verifying keys for the SEMA signaling circuit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate new proving and verifying keys.
    Generate {
        /// Output directory for keys.
        #[arg(short, long, default_value = "./sema-keys")]
        output: PathBuf,

        /// Membership tree depth.
        #[arg(short, long, default_value_t = DEFAULT_TREE_DEPTH)]
        depth: usize,

        /// Membership tree arity.
        #[arg(short, long, default_value_t = DEFAULT_TREE_ARITY)]
        arity: usize,
    },

    /// Verify that a verifying key matches expected hash.
    Verify {
        /// Path to verifying key file.
        #[arg(short, long)]
        vk: PathBuf,

        /// Expected VK hash (hex).
        #[arg(short, long)]
        expected_hash: Option<String>,
    },

    /// Show information about existing keys.
    Info {
        /// Directory containing keys.
        #[arg(short, long, default_value = "./sema-keys")]
        keys_dir: PathBuf,
    },
}

fn generate_keys(output_dir: &PathBuf, depth: usize, arity: usize) -> anyhow::Result<()> {
    let params = CircuitParams::new(depth, arity, HashScheme::Poseidon);
    if params.capacity().is_none() {
        anyhow::bail!("capacity {}^{} does not fit in 64 bits", arity, depth);
    }

    println!("SEMA Key Generator v{}", CIRCUIT_VERSION);
    println!("==============================");
    println!("Circuit: {}", params);
    println!();
    println!("Running trusted setup (circuit-specific)...");
    println!("This may take several minutes.");

    let backend = Groth16Backend::setup(params)?;
    let metadata = write_artifacts(output_dir, &backend)?;

    println!("Setup complete.");
    println!();
    if let Some(size) = metadata.pk_size {
        println!("Proving key: {} bytes", size);
    }
    println!("Verifying key: {} bytes", metadata.vk_size);
    println!("VK hash: {}", metadata.vk_hash);
    println!("Metadata: {}", output_dir.join(META_FILE).display());
    println!();
    println!("To use these keys:");
    println!("  1. Point [prover] artifacts_dir at {}", output_dir.display());
    println!("  2. Verifier-only nodes need every file except the .pk.bin");
    println!("  3. Verify the VK hash matches: {}", metadata.vk_hash);

    Ok(())
}

fn verify_key(vk_path: &PathBuf, expected_hash: Option<String>) -> anyhow::Result<()> {
    println!("Verifying key: {}", vk_path.display());

    let vk_bytes = fs::read(vk_path)?;
    let actual_hash = vk_hash(&vk_bytes);
    println!("VK hash: {}", actual_hash);
    println!("Size: {} bytes", vk_bytes.len());

    ark_groth16::VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])?;
    println!("Deserialization: OK");

    if let Some(expected) = expected_hash {
        if actual_hash != expected.trim().to_lowercase() {
            anyhow::bail!("hash mismatch: expected {}, actual {}", expected, actual_hash);
        }
        println!("Hash match: OK");
    }

    Ok(())
}

fn show_info(keys_dir: &PathBuf) -> anyhow::Result<()> {
    println!("SEMA Keys Info");
    println!("==============");
    println!("Directory: {}", keys_dir.display());
    println!();

    if !keys_dir.join(META_FILE).exists() {
        println!("No keys found. Run 'sema-keygen generate' first.");
        return Ok(());
    }

    let metadata = read_metadata(keys_dir)?;
    println!("Circuit: {}", metadata.circuit);
    println!("  Version: {}", metadata.version);
    println!("  Depth: {}", metadata.depth);
    println!("  Arity: {}", metadata.arity);
    println!("  Hash scheme: {}", metadata.hash_scheme);
    println!("  VK hash: {}", metadata.vk_hash);
    match metadata.pk_size {
        Some(size) => println!("  PK size: {} bytes", size),
        None => println!("  PK size: (verifier only)"),
    }
    println!("  VK size: {} bytes", metadata.vk_size);
    println!("  Generated: {}", metadata.generated_at.to_rfc3339());

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output, depth, arity } => generate_keys(&output, depth, arity)?,
        Commands::Verify { vk, expected_hash } => verify_key(&vk, expected_hash)?,
        Commands::Info { keys_dir } => show_info(&keys_dir)?,
    }

    Ok(())
}
