// schema-vault/src/batch.rs
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use std::future::Future;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::backup::BackupDriver;
use crate::errors::{AppError, Result};
use crate::registry::{PairRegistry, SchemaTarget};
use crate::restore::RestoreDriver;
use crate::storage::BackupKey;

pub const BACKUP_DATE_FORMAT: &str = "%Y-%m-%d";

/// What to do with the remaining pairs once one pair fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed pair.
    #[default]
    FailFast,
    /// Attempt every pair and report all failures at the end.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Backup,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    InvalidInput(String),
    PairFailed(SchemaTarget),
}

/// `NotStarted → ValidatingInput → {Aborted(InvalidInput) | Running} → {Completed | Aborted(PairFailed)}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    NotStarted,
    ValidatingInput,
    Running,
    Completed,
    Aborted(AbortReason),
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Aborted(_))
    }

    fn can_advance_to(&self, next: &BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (NotStarted, ValidatingInput)
                | (ValidatingInput, Running)
                | (ValidatingInput, Aborted(AbortReason::InvalidInput(_)))
                | (Running, Completed)
                | (Running, Aborted(AbortReason::PairFailed(_)))
        )
    }
}

/// Parameters of a restore run, as supplied by the trigger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestoreRequest {
    pub backup_date: Option<String>,
    pub pairs: Option<Vec<SchemaTarget>>,
}

#[derive(Debug)]
pub enum PairStatus {
    Succeeded { key: BackupKey },
    Failed { error: AppError },
}

#[derive(Debug)]
pub struct PairOutcome {
    pub target: SchemaTarget,
    pub status: PairStatus,
}

impl PairOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, PairStatus::Failed { .. })
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub mode: BatchMode,
    pub state: BatchState,
    pub outcomes: Vec<PairOutcome>,
    pub skipped: Vec<SchemaTarget>,
}

impl BatchReport {
    fn new(mode: BatchMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            state: BatchState::NotStarted,
            outcomes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn advance(&mut self, next: BatchState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "invalid batch transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("[{}] {:?} -> {:?}", self.run_id, self.state, next);
        self.state = next;
    }

    pub fn attempted(&self) -> Vec<&SchemaTarget> {
        self.outcomes.iter().map(|o| &o.target).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.state == BatchState::Completed && self.failures().next().is_none()
    }

    /// One line per attempted pair with its key or error, followed by the
    /// skipped pairs.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.outcomes.len() + self.skipped.len());
        for outcome in &self.outcomes {
            match &outcome.status {
                PairStatus::Succeeded { key } => {
                    lines.push(format!("✓ {} -> {}", outcome.target, key))
                }
                PairStatus::Failed { error } => {
                    lines.push(format!("✗ {}: {}", outcome.target, error))
                }
            }
        }
        for target in &self.skipped {
            lines.push(format!("- {} skipped: not a configured pair", target));
        }
        lines
    }

    pub fn log_summary(&self) {
        let label = match self.mode {
            BatchMode::Backup => "Backup",
            BatchMode::Restore => "Restore",
        };
        if !self.state.is_terminal() {
            log::warn!("{} run {} has not finished ({:?})", label, self.run_id, self.state);
        }

        let attempted = self.attempted().len();
        if self.is_success() {
            log::info!(
                "{} run {} finished: {} pair(s) succeeded, {} skipped",
                label,
                self.run_id,
                attempted,
                self.skipped.len()
            );
        } else {
            log::error!(
                "{} run {} ended {:?}: {} of {} attempted pair(s) failed, {} skipped",
                label,
                self.run_id,
                self.state,
                self.failures().count(),
                attempted,
                self.skipped.len()
            );
        }
        for line in self.summary_lines() {
            log::info!("  {}", line);
        }
    }

    /// Collapses the report into the batch-level result: `Ok` only when the batch
    /// completed with every attempted pair succeeding.
    pub fn into_result(self) -> Result<BatchSummary> {
        if let BatchState::Aborted(AbortReason::InvalidInput(reason)) = &self.state {
            return Err(AppError::Validation(reason.clone()));
        }

        let failed = self.failures().count();
        let succeeded = self.outcomes.len() - failed;
        let skipped = self.skipped.len();
        let first_failure = self.outcomes.into_iter().find_map(|o| match o.status {
            PairStatus::Failed { error } => Some((o.target, error)),
            PairStatus::Succeeded { .. } => None,
        });

        match first_failure {
            Some((target, error)) => Err(AppError::BatchFailed {
                target: target.to_string(),
                failed,
                source: Box::new(error),
            }),
            None => Ok(BatchSummary {
                succeeded,
                skipped,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
}

fn date_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"))
}

/// Checks that `backup_date` is present, zero-padded `YYYY-MM-DD` and a real
/// calendar date.
pub fn validate_backup_date(backup_date: Option<&str>) -> Result<String> {
    let raw = backup_date
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Validation("backup_date parameter is required".to_string()))?;

    if !date_shape().is_match(raw) || NaiveDate::parse_from_str(raw, BACKUP_DATE_FORMAT).is_err() {
        return Err(AppError::Validation(format!(
            "backup_date must be in YYYY-MM-DD format, got '{}'",
            raw
        )));
    }
    Ok(raw.to_string())
}

/// Drives a backup or restore over a set of pairs, one pair at a time.
pub struct BatchRunner {
    registry: PairRegistry,
    credential_id: String,
    policy: FailurePolicy,
}

impl BatchRunner {
    pub fn new(registry: PairRegistry, credential_id: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            registry,
            credential_id: credential_id.into(),
            policy,
        }
    }

    /// Backs up every registered pair, in registry order, under one run timestamp.
    pub async fn run_backup(&self, driver: &BackupDriver, run_timestamp: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport::new(BatchMode::Backup);
        report.advance(BatchState::ValidatingInput);

        let targets = self.registry.targets().to_vec();
        log::info!(
            "🚀 Backup run {} started: {} pair(s), run date {}",
            report.run_id,
            self.registry.len(),
            run_timestamp.date_naive().format(BACKUP_DATE_FORMAT)
        );

        let credential_id = self.credential_id.as_str();
        self.execute(&mut report, targets, |target| async move {
            driver
                .backup_one(credential_id, &target.database, &target.schema, run_timestamp)
                .await
        })
        .await;
        report
    }

    /// Restores the requested pairs (default: the whole registry) from the backup
    /// taken on `request.backup_date`. An absent or malformed date aborts the
    /// batch before any pair is touched. Pairs missing from the registry are
    /// skipped with a warning.
    pub async fn run_restore(&self, driver: &RestoreDriver, request: &RestoreRequest) -> BatchReport {
        let mut report = BatchReport::new(BatchMode::Restore);
        report.advance(BatchState::ValidatingInput);

        let backup_date = match validate_backup_date(request.backup_date.as_deref()) {
            Ok(date) => date,
            Err(e) => {
                log::error!("Restore run {} rejected: {}", report.run_id, e);
                report.advance(BatchState::Aborted(AbortReason::InvalidInput(e.to_string())));
                return report;
            }
        };

        let requested = request
            .pairs
            .clone()
            .unwrap_or_else(|| self.registry.targets().to_vec());
        let mut targets = Vec::with_capacity(requested.len());
        for pair in requested {
            if self.registry.contains(&pair) {
                targets.push(pair);
            } else {
                log::warn!("Skipping unknown pair: {}", pair);
                report.skipped.push(pair);
            }
        }

        log::info!(
            "🔄 Restore run {} started: {} pair(s) from backup date {}",
            report.run_id,
            targets.len(),
            backup_date
        );

        let credential_id = self.credential_id.as_str();
        let backup_date = backup_date.as_str();
        self.execute(&mut report, targets, |target| async move {
            driver
                .restore_one(credential_id, &target.database, &target.schema, backup_date)
                .await
        })
        .await;
        report
    }

    async fn execute<F, Fut>(&self, report: &mut BatchReport, targets: Vec<SchemaTarget>, mut op: F)
    where
        F: FnMut(SchemaTarget) -> Fut,
        Fut: Future<Output = Result<BackupKey>>,
    {
        report.advance(BatchState::Running);
        let total = targets.len();

        for (index, target) in targets.into_iter().enumerate() {
            log::info!("[{}/{}] Processing {}", index + 1, total, target);
            match op(target.clone()).await {
                Ok(key) => report.outcomes.push(PairOutcome {
                    target,
                    status: PairStatus::Succeeded { key },
                }),
                Err(error) => {
                    report.outcomes.push(PairOutcome {
                        target: target.clone(),
                        status: PairStatus::Failed { error },
                    });
                    if self.policy == FailurePolicy::FailFast {
                        let remaining = total - index - 1;
                        if remaining > 0 {
                            log::warn!(
                                "Aborting run {} after failure of {}; {} remaining pair(s) not attempted",
                                report.run_id,
                                target,
                                remaining
                            );
                        }
                        report.advance(BatchState::Aborted(AbortReason::PairFailed(target)));
                        return;
                    }
                }
            }
        }

        report.advance(BatchState::Completed);
    }
}
