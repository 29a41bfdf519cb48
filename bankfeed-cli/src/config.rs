use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use bankfeed_ingest::KNOWN_BANKS;

use crate::discord::DEFAULT_API_BASE;
use crate::state::ensure_bankfeed_home;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordSection,
    pub actual: ActualSection,
    pub bank: BankSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordSection {
    /// Bot token. Prefer `DISCORD_TOKEN` over writing it here.
    #[serde(default)]
    pub token: String,
    /// Name of the channel bank notifications are forwarded to.
    pub channel: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// actual-http-api connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualSection {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    pub budget_sync_id: String,
    pub encryption_password: Option<String>,
}

/// Which notification grammar the channel carries and the ledger account it books into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSection {
    pub name: String,
    pub account: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord: DiscordSection {
                token: String::new(),
                channel: "bank-notifications".to_string(),
                api_base: default_api_base(),
                poll_interval_secs: default_poll_interval(),
            },
            actual: ActualSection {
                url: "http://localhost:5007".to_string(),
                api_key: String::new(),
                budget_sync_id: String::new(),
                encryption_password: None,
            },
            bank: BankSection {
                name: "pekao".to_string(),
                account: "Pekao".to_string(),
            },
        }
    }
}

impl Config {
    /// Environment wins over the file for secrets and deployment-specific values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };
        set(&mut self.discord.token, "DISCORD_TOKEN");
        set(&mut self.discord.channel, "BANK_NOTIFICATION_CHANNEL");
        set(&mut self.actual.url, "ACTUAL_URL");
        set(&mut self.actual.api_key, "ACTUAL_API_KEY");
        set(&mut self.actual.budget_sync_id, "ACTUAL_BUDGET_SYNC_ID");
        if let Some(v) = lookup("ACTUAL_ENCRYPTION_PASSWORD").filter(|v| !v.is_empty()) {
            self.actual.encryption_password = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            bail!("discord.token is empty (set DISCORD_TOKEN)");
        }
        if self.discord.channel.trim().is_empty() {
            bail!("discord.channel is empty");
        }
        if self.discord.poll_interval_secs == 0 {
            bail!("discord.poll_interval_secs must be at least 1");
        }
        if self.actual.api_key.trim().is_empty() {
            bail!("actual.api_key is empty (set ACTUAL_API_KEY)");
        }
        if self.actual.budget_sync_id.trim().is_empty() {
            bail!("actual.budget_sync_id is empty (set ACTUAL_BUDGET_SYNC_ID)");
        }
        let bank = self.bank.name.to_ascii_lowercase();
        if !KNOWN_BANKS.contains(&bank.as_str()) {
            bail!(
                "bank.name {:?} is not supported (known: {})",
                self.bank.name,
                KNOWN_BANKS.join(", ")
            );
        }
        if self.bank.account.trim().is_empty() {
            bail!("bank.account is empty");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_bankfeed_home()?.join("config.toml"))
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => config_path(),
    }
}

/// Read the config file (defaults when absent), overlay the environment, validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let p = resolve_path(path)?;
    let mut cfg = if p.exists() {
        let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?
    } else {
        Config::default()
    };
    cfg.apply_env(|k| std::env::var(k).ok());
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf> {
    let p = resolve_path(path)?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = resolve_path(path)?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let written = save_config(&Config::default(), Some(&p))?;
    println!("Wrote {}", written.display());
    Ok(())
}
