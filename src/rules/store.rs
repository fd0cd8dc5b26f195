//! Rule configuration store.
//!
//! The store owns the editable rule list and publishes an immutable
//! [`RuleSet`] snapshot over a `watch` channel whenever it changes. Consumers
//! hold a receiver and read the latest snapshot when they need it; nobody
//! reaches into the editable list directly.
//!
//! Edits are serialized: each one is written to the rule file before its
//! snapshot is published, so a failed write leaves both untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Rule, RuleSet};
use crate::constants::NOTIFICATION_SOURCE;
use crate::errors::RuleError;
use crate::notify::SharedNotificationSink;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFileContents {
    #[serde(default)]
    items: Vec<Rule>,
}

/// JSON file holding the configured rules.
#[derive(Debug, Clone)]
pub struct RuleFile {
    path: PathBuf,
}

impl RuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load rules from disk. A missing file yields an empty rule list.
    pub async fn load(&self) -> Result<Vec<Rule>, RuleError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Rule file not found, starting with no rules");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(RuleError::FileIo {
                    path: self.path.display().to_string(),
                    source: e,
                });
            }
        };

        let contents: RuleFileContents =
            serde_json::from_slice(&data).map_err(|e| RuleError::FileFormat {
                path: self.path.display().to_string(),
                source: e,
            })?;
        Ok(contents.items)
    }

    /// Write rules to disk, replacing the file atomically.
    ///
    /// Each call writes through its own temporary file next to the target.
    pub async fn save(&self, rules: &[Rule]) -> Result<(), RuleError> {
        let contents = RuleFileContents {
            items: rules.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&contents).map_err(|e| RuleError::FileFormat {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let tmp_path = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        let io_err = |source| RuleError::FileIo {
            path: self.path.display().to_string(),
            source,
        };
        tokio::fs::write(&tmp_path, data).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(e));
        }
        Ok(())
    }
}

struct StoreState {
    version: u64,
    rules: Vec<Rule>,
    /// Invalid rules that have already been reported, keyed by (list, pattern)
    reported: HashSet<(String, String)>,
}

/// Read-mostly store of match rules publishing versioned snapshots.
pub struct RuleStore {
    /// Held across an edit and its file write; reloads take it too
    edits: AsyncMutex<()>,
    state: Mutex<StoreState>,
    sender: watch::Sender<Arc<RuleSet>>,
    notifier: SharedNotificationSink,
    file: Option<RuleFile>,
}

impl RuleStore {
    pub fn new(rules: Vec<Rule>, notifier: SharedNotificationSink) -> Self {
        let (sender, _) = watch::channel(Arc::new(RuleSet::empty()));
        let store = Self {
            edits: AsyncMutex::new(()),
            state: Mutex::new(StoreState {
                version: 0,
                rules: Vec::new(),
                reported: HashSet::new(),
            }),
            sender,
            notifier,
            file: None,
        };

        {
            let mut state = store.state.lock();
            state.rules = rules;
            store.publish(&mut state);
        }
        store
    }

    /// Open a store backed by a rule file; later edits are written back to it.
    pub async fn open(file: RuleFile, notifier: SharedNotificationSink) -> Result<Self, RuleError> {
        let rules = file.load().await?;
        info!(
            path = %file.path().display(),
            rule_count = rules.len(),
            "Loaded rule configuration"
        );
        Ok(Self::new(rules, notifier).with_file(file))
    }

    pub fn with_file(mut self, file: RuleFile) -> Self {
        self.file = Some(file);
        self
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RuleSet>> {
        self.sender.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.sender.borrow().clone()
    }

    /// The editable rule list, in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.state.lock().rules.clone()
    }

    pub async fn replace(&self, rules: Vec<Rule>) -> Result<Arc<RuleSet>, RuleError> {
        let ((), snapshot) = self
            .mutate(|current| {
                *current = rules;
                Ok(())
            })
            .await?;
        Ok(snapshot)
    }

    pub async fn add(&self, rule: Rule) -> Result<Arc<RuleSet>, RuleError> {
        let ((), snapshot) = self
            .mutate(|current| {
                current.push(rule);
                Ok(())
            })
            .await?;
        Ok(snapshot)
    }

    /// Replace the rule at `index`, returning the previous rule.
    pub async fn update(&self, index: usize, rule: Rule) -> Result<Rule, RuleError> {
        let (previous, _) = self
            .mutate(|current| {
                let slot = checked_index(current, index)?;
                Ok(std::mem::replace(&mut current[slot], rule))
            })
            .await?;
        Ok(previous)
    }

    /// Remove the rule at `index`, returning it.
    pub async fn remove(&self, index: usize) -> Result<Rule, RuleError> {
        let (removed, _) = self
            .mutate(|current| {
                let slot = checked_index(current, index)?;
                Ok(current.remove(slot))
            })
            .await?;
        Ok(removed)
    }

    /// Enable or disable the rule at `index`, returning the updated rule.
    pub async fn set_enabled(&self, index: usize, enabled: bool) -> Result<Rule, RuleError> {
        let (updated, _) = self
            .mutate(|current| {
                let slot = checked_index(current, index)?;
                current[slot].enabled = enabled;
                Ok(current[slot].clone())
            })
            .await?;
        Ok(updated)
    }

    /// Re-read the attached rule file and publish a snapshot if it changed.
    ///
    /// Returns `true` when a new snapshot was published.
    pub async fn reload(&self) -> Result<bool, RuleError> {
        let Some(file) = &self.file else {
            return Ok(false);
        };

        let _edits = self.edits.lock().await;
        let loaded = file.load().await?;
        let mut state = self.state.lock();
        if state.rules == loaded {
            return Ok(false);
        }

        state.rules = loaded;
        let snapshot = self.publish(&mut state);
        info!(
            version = snapshot.version(),
            rule_count = snapshot.len(),
            "Rule configuration reloaded from file"
        );
        Ok(true)
    }

    /// Re-read the rule file every `interval` until cancelled.
    ///
    /// Read or parse failures keep the current snapshot and are retried on
    /// the next tick.
    pub async fn run_reload(
        self: Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<()> {
        let Some(file) = &self.file else {
            info!("No rule file attached, reload disabled");
            cancel_token.cancelled().await;
            return Ok(());
        };
        info!(
            path = %file.path().display(),
            interval_secs = interval.as_secs(),
            "Rule file reload started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and the file was just loaded
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Rule file reload stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reload().await {
                        warn!(error = %e, "Rule file reload failed, keeping current rules");
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply an edit to a copy of the rules, write it out, then publish it.
    ///
    /// Edits must validate before changing anything. An edit or a file write
    /// that fails leaves the rules and the published snapshot untouched.
    async fn mutate<T, F>(&self, edit: F) -> Result<(T, Arc<RuleSet>), RuleError>
    where
        F: FnOnce(&mut Vec<Rule>) -> Result<T, RuleError>,
    {
        let _edits = self.edits.lock().await;
        let mut rules = self.rules();
        let value = edit(&mut rules)?;

        if let Some(file) = &self.file {
            file.save(&rules).await?;
        }

        let mut state = self.state.lock();
        state.rules = rules;
        let snapshot = self.publish(&mut state);
        Ok((value, snapshot))
    }

    /// Compile and publish the current rules under a new version.
    fn publish(&self, state: &mut StoreState) -> Arc<RuleSet> {
        state.version += 1;
        let (rule_set, errors) = RuleSet::compile(state.version, &state.rules);

        // Errors come back in the same order as the inert entries.
        let inert_rules = rule_set
            .iter()
            .filter(|compiled| compiled.is_inert())
            .map(|compiled| compiled.rule());
        for (rule, error) in inert_rules.zip(errors.iter()) {
            let key = (rule.list_id.clone(), rule.pattern.clone());
            if state.reported.insert(key) {
                warn!(error = %error, "Rule will never match");
                self.notifier.notify(NOTIFICATION_SOURCE, &error.to_string());
            }
        }

        let snapshot = Arc::new(rule_set);
        self.sender.send_replace(snapshot.clone());
        debug!(version = state.version, "Published rule snapshot");
        snapshot
    }
}

fn checked_index(rules: &[Rule], index: usize) -> Result<usize, RuleError> {
    if index < rules.len() {
        Ok(index)
    } else {
        Err(RuleError::IndexOutOfRange {
            index,
            len: rules.len(),
        })
    }
}
