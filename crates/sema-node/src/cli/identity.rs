use super::commands::{IdentityAction, OutputFormat};
use super::utils::{ensure_dir, heading, print_json};
use anyhow::{anyhow, bail, Context};
use sema_crypto::{hasher_for, Identity, IdentityFile};
use sema_node::NodeConfig;
use std::path::{Path, PathBuf};

pub fn handle_identity(
    action: IdentityAction,
    config: &NodeConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let identities_dir = config.identities_dir();
    ensure_dir(&identities_dir)?;

    match action {
        IdentityAction::Generate { label } => generate_identity(&identities_dir, config, label, format),
        IdentityAction::List => list_identities(&identities_dir, format),
        IdentityAction::Show { id } => show_identity(&identities_dir, &id, format),
    }
}

fn generate_identity(
    identities_dir: &Path,
    config: &NodeConfig,
    label: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let hasher = hasher_for(config.tree.hash_scheme);
    let identity = Identity::generate()?;
    let file = identity.export(hasher.as_ref(), label);
    let path = write_identity_file(identities_dir, &file)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "id": file.id,
            "label": file.label,
            "hash_scheme": file.hash_scheme,
            "commitment": file.commitment,
            "file": path.to_string_lossy(),
        }))?,
        OutputFormat::Text => {
            heading("Identity generated");
            println!("  ID:          \x1b[38;5;226m{}\x1b[0m", file.id);
            if let Some(label) = &file.label {
                println!("  Label:       \x1b[38;5;51m{}\x1b[0m", label);
            }
            println!("  Hash:        {}", file.hash_scheme);
            println!("  Commitment:  {}", file.commitment);
            println!("  File:        {}", path.display());
            println!();
            println!("\x1b[38;5;245mThe file holds your secrets. Share only the commitment.\x1b[0m");
        }
    }
    Ok(())
}

fn write_identity_file(identities_dir: &Path, file: &IdentityFile) -> anyhow::Result<PathBuf> {
    use std::io::Write;

    let path = identities_dir.join(format!("{}.json", file.id));
    let content = serde_json::to_string_pretty(file).context("Failed to serialize identity")?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut out = options
        .open(&path)
        .with_context(|| format!("Failed to create identity file {}", path.display()))?;
    out.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write identity to {}", path.display()))?;
    Ok(path)
}

fn read_identity_files(identities_dir: &Path) -> anyhow::Result<Vec<IdentityFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(identities_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<IdentityFile>(&content) {
            Ok(file) => files.push(file),
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable identity file"),
        }
    }
    files.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(files)
}

/// Find an identity by ID, ID prefix or label.
pub fn find_identity(identities_dir: &Path, query: &str) -> anyhow::Result<IdentityFile> {
    let mut matches: Vec<IdentityFile> = read_identity_files(identities_dir)?
        .into_iter()
        .filter(|f| f.id.starts_with(query) || f.label.as_deref() == Some(query))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No identity matches '{}'", query)),
        1 => Ok(matches.remove(0)),
        n => bail!("'{}' matches {} identities, use a longer ID", query, n),
    }
}

fn list_identities(identities_dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let files = read_identity_files(identities_dir)?;

    match format {
        OutputFormat::Json => {
            let list: Vec<_> = files
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "id": f.id,
                        "label": f.label,
                        "hash_scheme": f.hash_scheme,
                        "commitment": f.commitment,
                        "created_at": f.created_at,
                    })
                })
                .collect();
            print_json(&list)?;
        }
        OutputFormat::Text => {
            heading("Identities");
            if files.is_empty() {
                println!("  None (run: sema identity generate)");
            }
            for f in &files {
                println!(
                    "  {}  {:<20} {}",
                    f.id,
                    f.label.as_deref().unwrap_or("-"),
                    f.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

fn show_identity(identities_dir: &Path, query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let file = find_identity(identities_dir, query)?;
    let identity = file.restore(hasher_for(file.hash_scheme).as_ref())?;
    let verifying_key = hex::encode(identity.verifying_key().as_bytes());

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "id": file.id,
            "label": file.label,
            "hash_scheme": file.hash_scheme,
            "commitment": file.commitment,
            "verifying_key": verifying_key,
            "created_at": file.created_at,
        }))?,
        OutputFormat::Text => {
            heading("Identity");
            println!("  ID:             {}", file.id);
            println!("  Label:          {}", file.label.as_deref().unwrap_or("-"));
            println!("  Hash:           {}", file.hash_scheme);
            println!("  Commitment:     {}", file.commitment);
            println!("  Verifying key:  {}", verifying_key);
            println!("  Created:        {}", file.created_at.to_rfc3339());
        }
    }
    Ok(())
}
