mod logging;
mod node;
mod sections;
mod types;

pub use logging::LoggingConfig;
pub use node::NodeConfig;
pub use sections::{GateConfig, ProverConfig, TreeConfig};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use sema_types::{FieldElement, HashScheme};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_validation() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tree.depth, 20);
        assert_eq!(config.tree.arity, 5);
        assert_eq!(config.gate.broadcast_mode, BroadcastMode::ProofRequired);
    }

    #[test]
    fn test_invalid_depth() {
        let mut config = NodeConfig::default();
        config.tree.depth = 0;
        assert!(config.validate().is_err());
        config.tree.depth = 33;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_arity() {
        let mut config = NodeConfig::default();
        config.tree.arity = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capacity_overflow() {
        let mut config = NodeConfig::default();
        config.tree.depth = 32;
        config.tree.arity = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_canonical_zero_value() {
        let mut config = NodeConfig::default();
        config.tree.zero_value = Some(FieldElement([0xff; 32]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = NodeConfig::default();
        config.prover.max_concurrent_proofs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_context_label() {
        let mut config = NodeConfig::default();
        config.gate.external_nullifiers = vec!["voting-1".into(), " ".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broadcast_mode_parse() {
        assert_eq!("pre-verified".parse::<BroadcastMode>().unwrap(), BroadcastMode::PreVerified);
        assert_eq!("PROOF_REQUIRED".parse::<BroadcastMode>().unwrap(), BroadcastMode::ProofRequired);
        assert!("optimistic".parse::<BroadcastMode>().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = NodeConfig::default();
        config.tree.hash_scheme = HashScheme::Blake3;
        config.tree.zero_value = Some(FieldElement::from_u64(7));
        config.gate.broadcast_mode = BroadcastMode::PreVerified;
        config.gate.external_nullifiers = vec!["voting-1".into()];

        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");
        let parsed: NodeConfig = toml::from_str(&toml_str).expect("Failed to parse");
        assert_eq!(parsed.tree.hash_scheme, HashScheme::Blake3);
        assert_eq!(parsed.zero_value(), FieldElement::from_u64(7));
        assert_eq!(parsed.gate.broadcast_mode, BroadcastMode::PreVerified);
        assert_eq!(parsed.gate.external_nullifiers, vec!["voting-1".to_string()]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: NodeConfig = toml::from_str(
            r#"
            [tree]
            depth = 10

            [gate]
            broadcast_mode = "pre_verified"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.tree.depth, 10);
        assert_eq!(parsed.tree.arity, 5);
        assert_eq!(parsed.gate.broadcast_mode, BroadcastMode::PreVerified);
        assert_eq!(parsed.prover.max_concurrent_proofs, 2);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = NodeConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.tree.depth = 12;
        config.save(&path).unwrap();

        let loaded = NodeConfig::load_with(&path, |_| None).unwrap();
        assert_eq!(loaded.tree.depth, 12);
        assert_eq!(loaded.artifacts_dir(), dir.path().join("keys"));
    }

    #[test]
    fn test_proof_timeout() {
        let mut config = NodeConfig::default();
        assert_eq!(config.proof_timeout(), Some(std::time::Duration::from_secs(300)));
        config.prover.proof_timeout_secs = 0;
        assert_eq!(config.proof_timeout(), None);
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = NodeConfig::default();
        config.apply_overrides(vars(&[
            ("SEMA_DATA_DIR", "/srv/sema"),
            ("SEMA_TREE_DEPTH", "16"),
            ("SEMA_TREE_ARITY", "3"),
            ("SEMA_HASH_SCHEME", "blake3"),
            ("SEMA_BROADCAST_MODE", "pre-verified"),
            ("SEMA_ARTIFACTS_DIR", "/srv/keys"),
            ("SEMA_LOG_LEVEL", "DEBUG"),
            ("SEMA_LOG_JSON", "true"),
        ]));

        assert_eq!(config.data_dir, PathBuf::from("/srv/sema"));
        assert_eq!(config.tree.depth, 16);
        assert_eq!(config.tree.arity, 3);
        assert_eq!(config.tree.hash_scheme, HashScheme::Blake3);
        assert_eq!(config.gate.broadcast_mode, BroadcastMode::PreVerified);
        assert_eq!(config.artifacts_dir(), PathBuf::from("/srv/keys"));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = NodeConfig::default();
        config.logging.level = LogLevel::Warn;
        config.apply_overrides(vars(&[
            ("SEMA_TREE_DEPTH", "deep"),
            ("SEMA_TREE_ARITY", "-2"),
            ("SEMA_HASH_SCHEME", "sha1"),
            ("SEMA_BROADCAST_MODE", "optimistic"),
            ("SEMA_LOG_LEVEL", "verbose"),
            ("SEMA_LOG_JSON", "maybe"),
        ]));

        let defaults = NodeConfig::default();
        assert_eq!(config.tree.depth, defaults.tree.depth);
        assert_eq!(config.tree.arity, defaults.tree.arity);
        assert_eq!(config.tree.hash_scheme, defaults.tree.hash_scheme);
        assert_eq!(config.gate.broadcast_mode, BroadcastMode::ProofRequired);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_log_json_flag_values() {
        for off in ["0", "false", "off", "no"] {
            let mut config = NodeConfig::default();
            config.logging.json = true;
            config.apply_overrides(vars(&[("SEMA_LOG_JSON", off)]));
            assert!(!config.logging.json, "{} should disable JSON logging", off);
        }
        for on in ["1", "TRUE", "yes", "on"] {
            let mut config = NodeConfig::default();
            config.apply_overrides(vars(&[("SEMA_LOG_JSON", on)]));
            assert!(config.logging.json, "{} should enable JSON logging", on);
        }
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_load_applies_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        NodeConfig::default().save(&path).unwrap();

        let loaded = NodeConfig::load_with(&path, vars(&[("SEMA_TREE_DEPTH", "8")])).unwrap();
        assert_eq!(loaded.tree.depth, 8);

        let invalid = NodeConfig::load_with(&path, vars(&[("SEMA_TREE_DEPTH", "0")]));
        assert!(invalid.is_err());
    }
}
