//! Batched name resolution under a concurrency cap.
//!
//! Identifiers are resolved in fixed-size groups: everything in a group runs
//! concurrently, and the scheduler pauses between groups so the device link
//! never sees more than `concurrency` interleaved strategy chains at once.
//!
//! Each finished resolution lands in a shared map right away, so a caller
//! that gives up on a batch still keeps whatever was resolved before it did.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::resolver::{fallback_name, NameResolver};
use super::ResolvedName;

/// Default number of identifiers resolved concurrently.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default pause between groups.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Names resolved so far, shared between the scheduler and its caller.
pub type ResolvedMap = Arc<Mutex<HashMap<String, ResolvedName>>>;

/// Fans resolution out over groups of identifiers.
#[derive(Clone)]
pub struct BatchScheduler {
    resolver: NameResolver,
}

impl BatchScheduler {
    pub fn new(resolver: NameResolver) -> Self {
        Self { resolver }
    }

    /// Resolve every identifier in `ids`.
    ///
    /// Every input id gets an entry. A resolution task that dies (panics) is
    /// replaced by the synthesized name for that id; its siblings and later
    /// groups are unaffected. Repeated ids are resolved once.
    pub async fn resolve_all(
        &self,
        ids: &[String],
        concurrency: usize,
        pacing: Duration,
    ) -> HashMap<String, ResolvedName> {
        let resolved = ResolvedMap::default();
        self.resolve_into(ids, concurrency, pacing, &resolved).await;

        let resolved = std::mem::take(&mut *resolved.lock().await);
        debug_assert!(ids.iter().all(|id| resolved.contains_key(id)));
        resolved
    }

    /// Resolve `ids` group by group, inserting each name into `resolved` as
    /// soon as it is known.
    ///
    /// Dropping the returned future aborts the group in flight; entries
    /// already inserted stay in `resolved`.
    pub async fn resolve_into(
        &self,
        ids: &[String],
        concurrency: usize,
        pacing: Duration,
        resolved: &ResolvedMap,
    ) {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

        let group_size = concurrency.max(1);
        let group_count = unique.len().div_ceil(group_size);

        for (index, group) in unique.chunks(group_size).enumerate() {
            if index > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            debug!(group = index + 1, of = group_count, size = group.len(), "Resolving group");

            let mut tasks = JoinSet::new();
            for id in group {
                let resolver = self.resolver.clone();
                let resolved = resolved.clone();
                let id = (*id).clone();
                tasks.spawn(async move {
                    let name = resolver.resolve(&id).await;
                    resolved.lock().await.insert(id, name);
                });
            }

            while let Some(outcome) = tasks.join_next().await {
                if let Err(e) = outcome {
                    warn!("Resolution task failed: {e}");
                }
            }

            // Tasks that died never inserted their entry.
            let mut resolved = resolved.lock().await;
            for id in group {
                if !resolved.contains_key(id.as_str()) {
                    warn!(package_id = %id, "No name resolved, using synthesized name");
                    resolved.insert((*id).clone(), fallback_name(id));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::{FailingChannel, ScriptedChannel};
    use crate::channel::{ChannelError, CommandOutput, DeviceChannel};
    use crate::packages::Strategy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    /// Tracks how many commands are in flight at once.
    #[derive(Default)]
    struct SlowChannel {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DeviceChannel for SlowChannel {
        async fn execute(&self, _args: &[&str]) -> Result<CommandOutput, ChannelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(CommandOutput::failed("slow and useless"))
        }
    }

    /// Panics while resolving one specific identifier.
    struct PanickingChannel;

    #[async_trait]
    impl DeviceChannel for PanickingChannel {
        async fn execute(&self, args: &[&str]) -> Result<CommandOutput, ChannelError> {
            if args.contains(&"org.example.Broken") {
                panic!("channel state corrupted");
            }
            Ok(CommandOutput::failed("nothing here"))
        }
    }

    /// Never answers for `org.example.slow`; counts abandoned commands.
    #[derive(Default)]
    struct StallingChannel {
        abandoned: Arc<AtomicUsize>,
    }

    struct AbandonGuard(Arc<AtomicUsize>);

    impl Drop for AbandonGuard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DeviceChannel for StallingChannel {
        async fn execute(&self, args: &[&str]) -> Result<CommandOutput, ChannelError> {
            if args.contains(&"org.example.slow") {
                let _guard = AbandonGuard(self.abandoned.clone());
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if args == ["shell", "dumpsys", "package", "org.example.notes"] {
                return Ok(CommandOutput::ok("label=\"Field Notes\"\n"));
            }
            Ok(CommandOutput::failed("nothing here"))
        }
    }

    #[tokio::test]
    async fn test_failing_channel_yields_entry_per_id() {
        let scheduler = BatchScheduler::new(NameResolver::new(Arc::new(FailingChannel::default())));
        let input = ids(&[
            "com.example.foo.MusicPlayer",
            "org.example.notes",
            "com.whatsapp",
            "net.example.Radio2Go",
            "io.example.tracker.android",
        ]);

        let resolved = scheduler.resolve_all(&input, 3, Duration::ZERO).await;

        assert_eq!(resolved.len(), input.len());
        for id in &input {
            let name = &resolved[id];
            assert!(!name.display_name.is_empty(), "{id} has empty name");
            assert_eq!(&name.package_id, id);
        }
        assert_eq!(resolved["com.example.foo.MusicPlayer"].display_name, "Music Player");
        assert_eq!(resolved["com.whatsapp"].source, Strategy::KnownAlias);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let channel = Arc::new(SlowChannel::default());
        let scheduler = BatchScheduler::new(NameResolver::new(channel.clone()));
        let input: Vec<String> = (0..7).map(|i| format!("org.example.pkg{i}")).collect();

        let resolved = scheduler.resolve_all(&input, 3, Duration::ZERO).await;

        assert_eq!(resolved.len(), 7);
        let peak = channel.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {peak}");
        assert!(peak >= 2, "groups should run concurrently, peak was {peak}");
    }

    #[tokio::test]
    async fn test_pacing_between_groups() {
        let scheduler = BatchScheduler::new(NameResolver::new(Arc::new(ScriptedChannel::new())));
        let input: Vec<String> = (0..5).map(|i| format!("org.example.app{i}")).collect();

        let started = Instant::now();
        let resolved = scheduler
            .resolve_all(&input, 2, Duration::from_millis(40))
            .await;

        // Three groups -> two pauses.
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(resolved.len(), 5);
    }

    #[tokio::test]
    async fn test_panicking_resolution_does_not_abort_batch() {
        let scheduler = BatchScheduler::new(NameResolver::new(Arc::new(PanickingChannel)));
        let input = ids(&["org.example.Healthy", "org.example.Broken", "org.example.AlsoFine"]);

        let resolved = scheduler.resolve_all(&input, 3, Duration::ZERO).await;

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved["org.example.Broken"].display_name, "Broken");
        assert_eq!(resolved["org.example.Broken"].source, Strategy::Synthesized);
        assert_eq!(resolved["org.example.AlsoFine"].display_name, "Also Fine");
    }

    #[tokio::test]
    async fn test_duplicate_ids_resolved_once() {
        let channel = Arc::new(
            ScriptedChannel::new().with("shell dumpsys package org.example.notes", "label=\"Field Notes\"\n"),
        );
        let scheduler = BatchScheduler::new(NameResolver::new(channel.clone()));
        let input = ids(&["org.example.notes", "org.example.notes"]);

        let resolved = scheduler.resolve_all(&input, 3, Duration::ZERO).await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["org.example.notes"].display_name, "Field Notes");
        assert_eq!(channel.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_concurrency_treated_as_one() {
        let scheduler = BatchScheduler::new(NameResolver::new(Arc::new(FailingChannel::default())));
        let resolved = scheduler
            .resolve_all(&ids(&["a.b.One", "a.b.Two"]), 0, Duration::ZERO)
            .await;
        assert_eq!(resolved.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_batch_keeps_finished_names_and_aborts_the_rest() {
        let channel = Arc::new(StallingChannel::default());
        let abandoned = channel.abandoned.clone();
        let scheduler = BatchScheduler::new(NameResolver::new(channel));
        let input = ids(&["org.example.notes", "org.example.slow"]);
        let resolved = ResolvedMap::default();

        let outcome = tokio::time::timeout(
            Duration::from_millis(200),
            scheduler.resolve_into(&input, 1, Duration::ZERO, &resolved),
        )
        .await;
        assert!(outcome.is_err(), "the stalled id should not finish");

        let resolved = resolved.lock().await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["org.example.notes"].display_name, "Field Notes");
        assert_eq!(resolved["org.example.notes"].source, Strategy::DumpsysLabel);

        // The spawned task is aborted, not left running against the device.
        for _ in 0..50 {
            if abandoned.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    }
}
