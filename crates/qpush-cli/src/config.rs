//! Run configuration.
//!
//! Each setting is taken from, in order: the command-line flag or its
//! process environment variable, the env file, the built-in default. The
//! env file is read without touching the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, warn};

use qpush_adapter_ibm::{Channel, DEFAULT_INSTANCE, Endpoints, IbmConfig};
use qpush_hal::DEFAULT_SHOTS;

use crate::pipeline::StageError;

/// Backend targeted when nothing else is configured.
pub const BACKEND_NAME: &str = "ibm_brisbane";

/// Transpiler optimization level when nothing else is configured.
pub const OPTIMIZATION_LEVEL: u8 = 3;

const TOKEN_VAR: &str = "IBM_API_TOKEN";

/// Connection and compilation flags.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Env file holding IBM_API_TOKEN
    #[arg(long, env = "QPUSH_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// IBM Quantum backend [default: ibm_brisbane]
    #[arg(short, long, env = "IBM_BACKEND")]
    pub backend: Option<String>,

    /// Service channel (ibm_quantum, ibm_cloud) [default: ibm_quantum]
    #[arg(long, env = "IBM_CHANNEL")]
    pub channel: Option<Channel>,

    /// Hub/group/project [default: ibm-q/open/main]
    #[arg(long, env = "IBM_INSTANCE")]
    pub instance: Option<String>,

    /// Service CRN, required on the ibm_cloud channel
    #[arg(long, env = "IBM_SERVICE_CRN")]
    pub service_crn: Option<String>,

    /// Number of shots [default: 4096]
    #[arg(short, long, env = "QPUSH_SHOTS")]
    pub shots: Option<u32>,

    /// Optimization level (0-3) [default: 3]
    #[arg(
        short = 'O',
        long,
        env = "QPUSH_OPTIMIZATION_LEVEL",
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub optimization_level: Option<u8>,

    /// Authentication endpoint
    #[arg(long, env = "IBM_QUANTUM_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Runtime API endpoint
    #[arg(long, env = "IBM_QUANTUM_API_URL")]
    pub api_url: Option<String>,

    /// IAM endpoint (ibm_cloud channel)
    #[arg(long, env = "IBM_IAM_URL")]
    pub iam_url: Option<String>,

    /// Print the transpiled OpenQASM instead of submitting it
    #[arg(long)]
    pub dry_run: bool,
}

/// Variables read from an env file.
#[derive(Debug, Default)]
pub struct EnvFile {
    path: PathBuf,
    vars: HashMap<String, String>,
}

impl EnvFile {
    /// Read `path`. A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                debug!("No env file at {}", path.display());
                return Ok(Self {
                    path: path.to_path_buf(),
                    vars: HashMap::new(),
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let mut vars = HashMap::new();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    vars.insert(key, value);
                }
                Err(e @ dotenvy::Error::LineParse(..)) => {
                    warn!("Skipping line in {}: {e}", path.display());
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", path.display()));
                }
            }
        }
        debug!("Loaded {} variables from {}", vars.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            vars,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(key)
            .map(str::parse)
            .transpose()
            .with_context(|| format!("Invalid {key} in {}", self.path.display()))
    }
}

/// The API token: process environment first, then the env file.
pub fn credential(file: &EnvFile) -> Result<String, StageError> {
    credential_from(std::env::var(TOKEN_VAR).ok(), file)
}

fn credential_from(process: Option<String>, file: &EnvFile) -> Result<String, StageError> {
    process
        .or_else(|| file.get(TOKEN_VAR).map(str::to_string))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(StageError::MissingCredential)
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ibm: IbmConfig,
    pub shots: u32,
    pub optimization_level: u8,
    pub dry_run: bool,
}

impl Settings {
    /// Combine flags, env file and defaults around an already loaded token.
    pub fn resolve(args: &RunArgs, file: &EnvFile, token: String) -> Result<Self> {
        let channel = match args.channel {
            Some(channel) => channel,
            None => file.parse("IBM_CHANNEL")?.unwrap_or_default(),
        };

        let pick = |flag: &Option<String>, key: &str| {
            flag.clone().or_else(|| file.get(key).map(str::to_string))
        };

        let mut endpoints = Endpoints::for_channel(channel);
        if let Some(url) = pick(&args.auth_url, "IBM_QUANTUM_AUTH_URL") {
            endpoints.auth_url = url;
        }
        if let Some(url) = pick(&args.api_url, "IBM_QUANTUM_API_URL") {
            endpoints.runtime_url = url;
        }
        if let Some(url) = pick(&args.iam_url, "IBM_IAM_URL") {
            endpoints.iam_url = url;
        }

        let mut ibm = IbmConfig::new(token)
            .with_channel(channel)
            .with_backend(pick(&args.backend, "IBM_BACKEND").unwrap_or_else(|| BACKEND_NAME.into()))
            .with_instance(
                pick(&args.instance, "IBM_INSTANCE").unwrap_or_else(|| DEFAULT_INSTANCE.into()),
            )
            .with_endpoints(endpoints);
        if let Some(crn) = pick(&args.service_crn, "IBM_SERVICE_CRN") {
            ibm = ibm.with_service_crn(crn);
        }

        let shots = match args.shots {
            Some(shots) => shots,
            None => file.parse("QPUSH_SHOTS")?.unwrap_or(DEFAULT_SHOTS),
        };
        let optimization_level = match args.optimization_level {
            Some(level) => level,
            None => file
                .parse("QPUSH_OPTIMIZATION_LEVEL")?
                .unwrap_or(OPTIMIZATION_LEVEL),
        };
        if optimization_level > OPTIMIZATION_LEVEL {
            anyhow::bail!("Invalid optimization level {optimization_level} (expected 0-3)");
        }

        Ok(Self {
            ibm,
            shots,
            optimization_level,
            dry_run: args.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn env_file(contents: &str) -> (tempfile::NamedTempFile, EnvFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let loaded = EnvFile::load(file.path()).unwrap();
        (file, loaded)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = EnvFile::load(&dir.path().join(".env")).unwrap();
        assert!(file.get(TOKEN_VAR).is_none());
        assert!(matches!(
            credential_from(None, &file),
            Err(StageError::MissingCredential)
        ));
    }

    #[test]
    fn test_token_from_file() {
        let (_guard, file) = env_file("# account\nIBM_API_TOKEN=abc123\n");
        assert_eq!(credential_from(None, &file).unwrap(), "abc123");
    }

    #[test]
    fn test_unparsable_lines_are_skipped() {
        let (_guard, file) = env_file("not valid line\nIBM_API_TOKEN=abc123\nalso not valid\n");
        assert_eq!(credential_from(None, &file).unwrap(), "abc123");

        let (_guard, file) = env_file("not valid line\n");
        assert!(matches!(
            credential_from(None, &file),
            Err(StageError::MissingCredential)
        ));
    }

    #[test]
    fn test_process_env_wins_over_file() {
        let (_guard, file) = env_file("IBM_API_TOKEN=from-file\n");
        assert_eq!(
            credential_from(Some("from-env".into()), &file).unwrap(),
            "from-env"
        );
    }

    #[test]
    fn test_blank_token_is_missing() {
        let (_guard, file) = env_file("IBM_API_TOKEN=\"  \"\n");
        assert!(matches!(
            credential_from(None, &file),
            Err(StageError::MissingCredential)
        ));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&RunArgs::default(), &EnvFile::default(), "t".into()).unwrap();
        assert_eq!(settings.ibm.backend, BACKEND_NAME);
        assert_eq!(settings.ibm.channel, Channel::IbmQuantum);
        assert_eq!(settings.ibm.instance, DEFAULT_INSTANCE);
        assert_eq!(settings.shots, 4096);
        assert_eq!(settings.optimization_level, 3);
        assert_eq!(settings.ibm.endpoints, Endpoints::for_channel(Channel::IbmQuantum));
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_file_values_and_flag_precedence() {
        let (_guard, file) = env_file(
            "IBM_BACKEND=ibm_kyiv\nQPUSH_SHOTS=1000\nIBM_QUANTUM_API_URL=http://localhost:9/runtime\n",
        );
        let args = RunArgs {
            shots: Some(2000),
            ..RunArgs::default()
        };
        let settings = Settings::resolve(&args, &file, "t".into()).unwrap();
        assert_eq!(settings.ibm.backend, "ibm_kyiv");
        assert_eq!(settings.shots, 2000);
        assert_eq!(settings.ibm.endpoints.runtime_url, "http://localhost:9/runtime");
    }

    #[test]
    fn test_cloud_channel_from_file() {
        let (_guard, file) = env_file("IBM_CHANNEL=ibm_cloud\nIBM_SERVICE_CRN=crn:v1:x\n");
        let settings = Settings::resolve(&RunArgs::default(), &file, "t".into()).unwrap();
        assert_eq!(settings.ibm.channel, Channel::IbmCloud);
        assert_eq!(settings.ibm.service_crn.as_deref(), Some("crn:v1:x"));
        assert_eq!(settings.ibm.endpoints, Endpoints::for_channel(Channel::IbmCloud));
    }

    #[test]
    fn test_invalid_file_values() {
        let (_guard, file) = env_file("QPUSH_SHOTS=many\n");
        assert!(Settings::resolve(&RunArgs::default(), &file, "t".into()).is_err());

        let (_guard, file) = env_file("QPUSH_OPTIMIZATION_LEVEL=7\n");
        assert!(Settings::resolve(&RunArgs::default(), &file, "t".into()).is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let settings =
            Settings::resolve(&RunArgs::default(), &EnvFile::default(), "hunter2".into()).unwrap();
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
