use std::path::PathBuf;

use clap::Parser;

use crate::{
    config::{SandcoreConfig, StoreKind},
    SandcoreResult,
};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// sandcore - A service that orchestrates the lifecycle of ephemeral sandboxes
#[derive(Debug, Default, Parser)]
#[command(name = "sandcore", author, about, version, styles = styles::styles())]
pub struct SandcoreArgs {
    /// Path to a TOML config file. Defaults to $SANDCORE_HOME/sandcore.toml if it exists
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// SQLite database to store sandboxes in, or `memory` for the in-memory store
    #[arg(long, env = "DATABASE_URL", value_name = "URL")]
    pub database: Option<String>,

    /// Keep sandboxes in memory only
    #[arg(long)]
    pub in_memory: bool,

    /// Lifetime of sandboxes created without an expiration, in seconds
    #[arg(long, value_name = "SECS")]
    pub default_expiration_secs: Option<u64>,

    /// Delay of the simulated provisioning backend, in milliseconds
    #[arg(long, value_name = "MS")]
    pub provision_delay_ms: Option<u64>,

    /// Make provisioning fail for sandbox names with this prefix
    #[arg(long, value_name = "PREFIX")]
    pub fail_name_prefix: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl SandcoreArgs {
    /// Overrides `config` with every value given on the command line or in the environment.
    ///
    /// Fails if the database URL names an unsupported store.
    pub fn apply_to(&self, config: &mut SandcoreConfig) -> SandcoreResult<()> {
        if let Some(port) = self.port {
            config.set_port(port);
        }

        if self.in_memory {
            config.set_store(StoreKind::Memory);
        } else if let Some(url) = &self.database {
            config.set_store(StoreKind::from_url(url)?);
        }

        if let Some(secs) = self.default_expiration_secs {
            config.set_default_expiration_secs(secs);
        }

        if let Some(delay) = self.provision_delay_ms {
            config.set_provision_delay_ms(delay);
        }

        if let Some(prefix) = &self.fail_name_prefix {
            config.set_fail_name_prefix(Some(prefix.clone()));
        }

        Ok(())
    }
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() -> anyhow::Result<()> {
        let args = SandcoreArgs::try_parse_from([
            "sandcore",
            "--port",
            "9000",
            "--database",
            "sqlite:///tmp/sandcore.db",
            "--provision-delay-ms",
            "10",
            "--fail-name-prefix",
            "fail-",
        ])?;

        let mut config = SandcoreConfig::default();
        args.apply_to(&mut config)?;

        assert_eq!(*config.get_port(), 9000);
        assert_eq!(
            config.get_store(),
            &StoreKind::Sqlite {
                path: Some(PathBuf::from("/tmp/sandcore.db"))
            }
        );
        assert_eq!(*config.get_provision_delay_ms(), 10);
        assert_eq!(config.get_fail_name_prefix().as_deref(), Some("fail-"));
        Ok(())
    }

    #[test]
    fn test_in_memory_wins_over_database() -> anyhow::Result<()> {
        let args = SandcoreArgs {
            database: Some("sandbox.db".to_string()),
            in_memory: true,
            ..Default::default()
        };

        let mut config = SandcoreConfig::default();
        args.apply_to(&mut config)?;
        assert_eq!(config.get_store(), &StoreKind::Memory);
        Ok(())
    }

    #[test]
    fn test_postgres_database_url_is_rejected() {
        let args = SandcoreArgs {
            database: Some("postgres://localhost:5432/sandboxes".to_string()),
            ..Default::default()
        };

        let mut config = SandcoreConfig::default();
        assert!(matches!(
            args.apply_to(&mut config),
            Err(crate::SandcoreError::Validation(_))
        ));
        assert_eq!(config.get_store(), &StoreKind::default());
    }

    #[test]
    fn test_absent_flags_leave_config_untouched() -> anyhow::Result<()> {
        let mut config = SandcoreConfig::builder().port(7000).build();
        SandcoreArgs::default().apply_to(&mut config)?;
        assert_eq!(*config.get_port(), 7000);
        Ok(())
    }
}
