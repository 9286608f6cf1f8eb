use super::utils::ensure_dir;
use sema_node::NodeConfig;
use std::path::Path;

pub fn init_node(config_path: &Path, data_dir: &Path, force: bool) -> anyhow::Result<()> {
    println!("\x1b[38;5;46mInitializing SEMA node...\x1b[0m");
    println!();

    if config_path.exists() && !force {
        println!("\x1b[38;5;226mConfiguration already exists at {}\x1b[0m", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    ensure_dir(data_dir)?;

    let config = NodeConfig {
        data_dir: data_dir.to_path_buf(),
        ..NodeConfig::default()
    };
    config.save(config_path)?;
    ensure_dir(&config.identities_dir())?;
    ensure_dir(&config.artifacts_dir())?;

    println!("\x1b[38;5;46m[+]\x1b[0m Configuration written to {}", config_path.display());
    println!("\x1b[38;5;46m[+]\x1b[0m Data directory: {}", data_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Generate circuit keys:  sema-keygen generate --output {} --depth {} --arity {}",
        config.artifacts_dir().display(),
        config.tree.depth,
        config.tree.arity
    );
    println!("  2. Create an identity:     sema identity generate --label me");
    println!("  3. Validate the setup:     sema check");
    Ok(())
}
