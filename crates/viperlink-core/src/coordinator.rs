// ── Polling coordinator ──
//
// Owns the refresh loop for one account: the cadence state machine,
// per-vehicle error isolation with carry-forward, transparent
// re-authentication, and the published snapshot that presentation
// adapters read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use viperlink_api::{Error as ApiError, StatusReads, TransportConfig, ViperClient};

use crate::cadence::{ACTION_REFRESH_DELAY, Cadence};
use crate::config::AccountConfig;
use crate::error::CoreError;
use crate::merge::merge_status_reads;
use crate::model::{Snapshot, Vehicle, VehicleStatus};

/// The polling coordinator for one account.
///
/// Cheaply cloneable via `Arc`. Adapters read the published snapshot,
/// identity cache, and cadence state synchronously; all mutation runs
/// through the single cycle-locked refresh path, and the snapshot is
/// replaced whole -- never mutated in place.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    api: ViperClient,
    vehicle_ids: Vec<String>,
    /// Identity cache, built once during `connect()`.
    vehicles: ArcSwap<HashMap<String, Vehicle>>,
    /// Published state. `None` until the first successful cycle; once a
    /// vehicle appears it is only superseded or carried forward.
    snapshot: ArcSwapOption<Snapshot>,
    cadence: watch::Sender<Cadence>,
    last_updated: watch::Sender<Option<DateTime<Utc>>>,
    /// Manual refresh signal. Requests arriving mid-cycle coalesce into
    /// at most one follow-up cycle.
    refresh_requested: Notify,
    /// Cadence-changed signal: re-arm the poll timer without refreshing.
    rearm: Notify,
    /// One cycle at a time; the timer and explicit requests share this.
    cycle_lock: Mutex<()>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// One vehicle's fetch outcome: the merged status plus any per-read
/// failure messages that should land in the cycle's aggregate report.
struct VehicleFetch {
    status: VehicleStatus,
    failures: Vec<String>,
}

impl Coordinator {
    /// Create a coordinator from account configuration. Does NOT touch
    /// the network -- call [`connect()`](Self::connect).
    pub fn new(config: &AccountConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
        };
        let api = ViperClient::new(
            config.base_url.clone(),
            config.username.clone(),
            config.password.clone(),
            &transport,
        )
        .map_err(|e| CoreError::Config {
            message: e.to_string(),
        })?;

        Ok(Self::with_client(api, config))
    }

    /// Create a coordinator around an existing client.
    pub fn with_client(api: ViperClient, config: &AccountConfig) -> Self {
        let (cadence, _) = watch::channel(Cadence::new(config.normal_interval()));
        let (last_updated, _) = watch::channel(None);

        Self {
            inner: Arc::new(CoordinatorInner {
                api,
                vehicle_ids: config.vehicle_ids.clone(),
                vehicles: ArcSwap::from_pointee(HashMap::new()),
                snapshot: ArcSwapOption::empty(),
                cadence,
                last_updated,
                refresh_requested: Notify::new(),
                rearm: Notify::new(),
                cycle_lock: Mutex::new(()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The underlying API client (for command-issuing adapters).
    pub fn api(&self) -> &ViperClient {
        &self.inner.api
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect: authenticate, build the vehicle identity cache, run the
    /// first refresh cycle, and start the poll task.
    ///
    /// An authentication failure here requires the user to re-enter
    /// credentials; any other failure is retryable.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.api.authenticate().await.map_err(CoreError::from)?;

        self.load_vehicles().await?;
        self.refresh().await?;

        let mut handles = self.inner.task_handles.lock().await;
        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(poll_task(coordinator, cancel)));

        info!(vehicles = self.inner.vehicle_ids.len(), "coordinator connected");
        Ok(())
    }

    /// Stop the poll task and any pending post-action refresh.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        debug!("coordinator shut down");
    }

    /// Fetch the account's vehicle list and cache identity for the
    /// tracked ids.
    async fn load_vehicles(&self) -> Result<(), CoreError> {
        let records = self.inner.api.get_vehicles().await.map_err(|err| {
            if err.is_auth_error() {
                CoreError::AuthenticationRequired {
                    message: err.to_string(),
                }
            } else {
                CoreError::UpdateFailed {
                    message: format!("Error fetching vehicles: {err}"),
                }
            }
        })?;

        let vehicles: HashMap<String, Vehicle> = records
            .into_iter()
            .filter(|record| self.inner.vehicle_ids.contains(&record.id))
            .map(|record| (record.id.clone(), Vehicle::from(record)))
            .collect();

        debug!(tracked = vehicles.len(), "vehicle identity cache loaded");
        self.inner.vehicles.store(Arc::new(vehicles));
        Ok(())
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Run one refresh cycle now and wait for it to finish.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let _cycle = self.inner.cycle_lock.lock().await;
        self.update_cycle().await
    }

    /// Request a refresh without waiting for it.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    /// Schedule exactly one refresh after a short delay, giving the
    /// backend time to reflect a just-issued command. Fire-and-forget;
    /// cancelled by [`shutdown()`](Self::shutdown).
    pub fn request_refresh_after_action(&self) {
        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();

        debug!(delay = ?ACTION_REFRESH_DELAY, "scheduling post-action refresh");
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(ACTION_REFRESH_DELAY) => coordinator.request_refresh(),
            }
        });
    }

    /// Switch to boosted polling (typically right after a remote-start
    /// command) and re-arm the poll timer immediately. Idempotent.
    pub fn start_boosted_polling(&self) {
        self.inner.cadence.send_modify(|c| c.boost(Utc::now()));
        self.inner.rearm.notify_one();
    }

    // ── Read-only accessors ──────────────────────────────────────────

    /// The tracked vehicle ids, in configured order.
    pub fn vehicle_ids(&self) -> &[String] {
        &self.inner.vehicle_ids
    }

    /// Identity metadata for one tracked vehicle.
    pub fn vehicle(&self, vehicle_id: &str) -> Option<Vehicle> {
        self.inner.vehicles.load().get(vehicle_id).cloned()
    }

    /// The current snapshot, `None` before the first successful cycle.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.load_full()
    }

    /// The current status for one vehicle.
    pub fn vehicle_status(&self, vehicle_id: &str) -> Option<VehicleStatus> {
        self.inner
            .snapshot
            .load()
            .as_ref()
            .and_then(|snapshot| snapshot.get(vehicle_id).cloned())
    }

    /// Wall-clock time of the most recent successful cycle.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_updated.borrow()
    }

    pub fn is_boosted(&self) -> bool {
        self.inner.cadence.borrow().is_boosted()
    }

    fn current_interval(&self) -> Option<Duration> {
        self.inner.cadence.borrow().current_interval()
    }

    // ── Cycle internals ──────────────────────────────────────────────

    async fn update_cycle(&self) -> Result<(), CoreError> {
        // Ensure we're authenticated. Failures here are the cycle-level
        // path: auth-class means credential re-entry, API-class falls
        // back to the previous snapshot when one exists.
        if !self.inner.api.is_authenticated() {
            if let Err(err) = self.inner.api.authenticate().await {
                return self.handle_cycle_error(err);
            }
        }

        let previous = self.inner.snapshot.load_full();
        let mut data = Snapshot::new();
        let mut errors: Vec<String> = Vec::new();

        for vehicle_id in &self.inner.vehicle_ids {
            match self.fetch_vehicle(vehicle_id).await {
                Ok(fetch) => {
                    for failure in fetch.failures {
                        errors.push(format!("Vehicle {vehicle_id}: {failure}"));
                    }
                    data.insert(vehicle_id.clone(), fetch.status);
                }
                Err(err) => {
                    errors.push(format!("Vehicle {vehicle_id}: {err}"));
                    if let Some(prev) = previous.as_ref().and_then(|s| s.get(vehicle_id)) {
                        warn!(
                            vehicle = %vehicle_id,
                            error = %err,
                            "failed to update vehicle, keeping previous data"
                        );
                        data.insert(vehicle_id.clone(), prev.clone());
                    }
                }
            }
        }

        // No data at all and nothing to fall back on: a real failure.
        if data.is_empty() {
            let message = if errors.is_empty() {
                "No data received from API".into()
            } else {
                format!("Error communicating with API: {}", errors.join("; "))
            };
            return Err(CoreError::UpdateFailed { message });
        }

        let now = Utc::now();
        let any_remote_active = data
            .values()
            .any(|status| status.remote_starter_active == Some(true));
        self.inner.cadence.send_modify(|cadence| {
            cadence.downgrade_if_due(now, any_remote_active);
        });

        let _ = self.inner.last_updated.send(Some(now));

        if !errors.is_empty() {
            warn!(errors = %errors.join("; "), "partial update failure");
        }

        self.inner.snapshot.store(Some(Arc::new(data)));
        Ok(())
    }

    /// Cycle-level error disposition.
    fn handle_cycle_error(&self, err: ApiError) -> Result<(), CoreError> {
        if err.is_auth_error() {
            return Err(CoreError::AuthenticationRequired {
                message: err.to_string(),
            });
        }

        if self.inner.snapshot.load().is_some() {
            warn!(error = %err, "API error during update, keeping previous data");
            return Ok(());
        }

        Err(CoreError::UpdateFailed {
            message: format!("Error communicating with API: {err}"),
        })
    }

    /// Fetch and merge one vehicle's status. On an expired session,
    /// re-authenticate once and retry once; a failure of that retry
    /// (including the re-authentication itself) is the per-vehicle
    /// failure the caller isolates.
    async fn fetch_vehicle(&self, vehicle_id: &str) -> Result<VehicleFetch, ApiError> {
        match self.try_fetch_vehicle(vehicle_id).await {
            Err(err) if err.is_auth_error() => {
                debug!(vehicle = %vehicle_id, "session expired, re-authenticating");
                self.inner.api.authenticate().await?;
                self.try_fetch_vehicle(vehicle_id).await
            }
            other => other,
        }
    }

    /// One fetch attempt: both reads concurrently, then merge.
    ///
    /// An auth-class failure in either read aborts the attempt so the
    /// caller can re-authenticate. Other read failures are kept partial:
    /// the surviving read's fields are still merged, and the failure is
    /// reported upward.
    async fn try_fetch_vehicle(&self, vehicle_id: &str) -> Result<VehicleFetch, ApiError> {
        let StatusReads { active, current } = self.inner.api.vehicle_status_reads(vehicle_id).await;

        let active = match active {
            Err(err) if err.is_auth_error() => return Err(err),
            other => other,
        };
        let current = match current {
            Err(err) if err.is_auth_error() => return Err(err),
            other => other,
        };

        // Both reads gone: nothing usable this cycle.
        let (active, current) = match (active, current) {
            (Err(active_err), Err(current_err)) => {
                debug!(vehicle = %vehicle_id, error = %current_err, "both status reads failed");
                return Err(active_err);
            }
            pair => pair,
        };

        let mut failures = Vec::new();
        if let Err(err) = &active {
            failures.push(format!("active status read failed: {err}"));
        }
        if let Err(err) = &current {
            failures.push(format!("current status read failed: {err}"));
        }

        let reads = StatusReads { active, current };
        Ok(VehicleFetch {
            status: merge_status_reads(vehicle_id, &reads),
            failures,
        })
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Drive automatic refreshes. This task is the sole owner of the timer;
/// manual requests and cadence changes arrive as signals, so requests
/// landing mid-cycle coalesce instead of stacking.
async fn poll_task(coordinator: Coordinator, cancel: CancellationToken) {
    loop {
        let interval = coordinator.current_interval();
        let sleep_for = interval.unwrap_or(Duration::ZERO);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = coordinator.inner.rearm.notified() => {
                // Cadence changed; recompute the timer without refreshing.
            }
            () = coordinator.inner.refresh_requested.notified() => {
                if let Err(err) = coordinator.refresh().await {
                    warn!(error = %err, "requested refresh failed");
                }
            }
            () = tokio::time::sleep(sleep_for), if interval.is_some() => {
                if let Err(err) = coordinator.refresh().await {
                    warn!(error = %err, "periodic refresh failed");
                }
            }
        }
    }
}
