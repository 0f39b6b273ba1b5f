use std::{
    collections::HashSet,
    env,
    sync::{Arc, RwLock},
    time::Duration,
};

use log::*;

use crate::ledger_types::AccountId;

/// The first ledger with full history on public nodes; used as the backfill floor when no
/// watermark exists and no explicit starting ledger is configured.
pub const DEFAULT_FROM_LEDGER: u32 = 32_570;
const DEFAULT_CONFIG_REFRESH: Duration = Duration::from_secs(300);

//--------------------------------------  WatchedAccounts  -----------------------------------------------------------
/// The set of accounts the engine reconciles. Immutable: a reconciliation run holds one snapshot
/// for its whole duration and never observes concurrent configuration changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchedAccounts(HashSet<AccountId>);

impl WatchedAccounts {
    pub fn new<I, A>(accounts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AccountId>,
    {
        Self(accounts.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.0.contains(account)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.0.iter()
    }
}

impl<A: Into<AccountId>> FromIterator<A> for WatchedAccounts {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self::new(iter)
    }
}

//--------------------------------------   ConfigHandle    -----------------------------------------------------------
/// Holds the current watched-account snapshot and swaps it atomically on refresh. Readers take an
/// `Arc` of the whole set, so an in-flight reconciliation run keeps working against the snapshot
/// it started with even while the configuration is being replaced.
#[derive(Debug, Default)]
pub struct ConfigHandle {
    current: RwLock<Arc<WatchedAccounts>>,
}

impl ConfigHandle {
    pub fn new(accounts: WatchedAccounts) -> Self {
        Self { current: RwLock::new(Arc::new(accounts)) }
    }

    pub fn snapshot(&self) -> Arc<WatchedAccounts> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, accounts: WatchedAccounts) {
        let accounts = Arc::new(accounts);
        match self.current.write() {
            Ok(mut guard) => *guard = accounts,
            Err(poisoned) => *poisoned.into_inner() = accounts,
        }
        debug!("🪛️ Watched-account snapshot replaced");
    }
}

//--------------------------------------  ReconcilerConfig  ----------------------------------------------------------
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    pub database_url: String,
    pub watched_accounts: WatchedAccounts,
    /// When set, only transactions carrying this tag (source/destination tag or memo) are
    /// reconciled.
    pub source_tag: Option<String>,
    /// Backfill floor for accounts that have no stored watermark yet.
    pub from_ledger: u32,
    /// How often the watched-account snapshot is refreshed from its source of truth.
    pub config_refresh_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            watched_accounts: WatchedAccounts::default(),
            source_tag: None,
            from_ledger: DEFAULT_FROM_LEDGER,
            config_refresh_interval: DEFAULT_CONFIG_REFRESH,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("XRE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ XRE_DATABASE_URL is not set. Please set it to the URL for the reconciliation store.");
            String::default()
        });
        let watched_accounts = match env::var("XRE_WATCHED_ACCOUNTS") {
            Ok(s) => parse_account_list(&s),
            Err(_) => {
                warn!("🪛️ XRE_WATCHED_ACCOUNTS is not set. No accounts will be reconciled until it is.");
                WatchedAccounts::default()
            },
        };
        let source_tag = env::var("XRE_SOURCE_TAG").ok().filter(|s| !s.trim().is_empty());
        let from_ledger = env::var("XRE_FROM_LEDGER")
            .map(|s| {
                s.parse::<u32>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid ledger index for XRE_FROM_LEDGER. {e} Using the default, \
                         {DEFAULT_FROM_LEDGER}, instead."
                    );
                    DEFAULT_FROM_LEDGER
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FROM_LEDGER);
        let config_refresh_interval = env::var("XRE_CONFIG_REFRESH_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for XRE_CONFIG_REFRESH_SECS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_CONFIG_REFRESH);
        Self { database_url, watched_accounts, source_tag, from_ledger, config_refresh_interval }
    }
}

fn parse_account_list(raw: &str) -> WatchedAccounts {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn account_list_parses_and_trims() {
        let accounts = parse_account_list(" rOne , rTwo,,rThree ");
        assert_eq!(accounts.len(), 3);
        assert!(accounts.contains(&AccountId::from("rTwo")));
    }

    #[test]
    fn snapshot_is_stable_across_replace() {
        let handle = ConfigHandle::new(WatchedAccounts::new(["rOne"]));
        let before = handle.snapshot();
        handle.replace(WatchedAccounts::new(["rTwo", "rThree"]));
        assert!(before.contains(&AccountId::from("rOne")));
        assert!(!before.contains(&AccountId::from("rTwo")));
        let after = handle.snapshot();
        assert_eq!(after.len(), 2);
        assert!(after.contains(&AccountId::from("rTwo")));
    }
}
