mod check;
mod commands;
mod identity;
mod init;
mod simulate;
mod utils;

pub use check::run_checks;
pub use commands::{Cli, Commands};
pub use identity::handle_identity;
pub use init::init_node;
pub use simulate::run_simulation;
pub use utils::{default_data_dir, init_logging, BUILD_VERSION};

pub fn show_version() {
    println!("\x1b[38;5;46mSEMA Node\x1b[0m v{}", BUILD_VERSION);
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));
    println!("  Circuit:   \x1b[38;5;51m{} v{}\x1b[0m", sema_types::CIRCUIT_NAME, sema_types::CIRCUIT_VERSION);
    println!("  Proofs:    \x1b[38;5;51mGroth16\x1b[0m (BN254)");
    println!("  Hashes:    \x1b[38;5;51mPoseidon, BLAKE3\x1b[0m");
    println!(
        "  Profile:   \x1b[38;5;245m{}\x1b[0m",
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    println!(
        "  Mock:      \x1b[38;5;245m{}\x1b[0m",
        if cfg!(feature = "mock") { "enabled" } else { "disabled" }
    );
}
