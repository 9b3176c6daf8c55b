//! Render manager - the outstanding render jobs of one validator.
//!
//! Jobs are keyed by region so there is at most one per region. A single
//! poll timer serves all of them; it exists only while jobs do.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use markup_overlay_render::{JobStatus, RenderConfig, RenderJob, RenderRequest};

use crate::perf::RenderStats;
use crate::region::RegionId;
use crate::scheduler::PollTimer;

/// Spawns, polls and tears down render jobs.
#[derive(Debug)]
pub struct RenderManager {
    jobs: BTreeMap<RegionId, RenderJob>,
    timer: Option<PollTimer>,
    poll_interval: Duration,
    timeout: Option<Duration>,
    stats: RenderStats,
}

impl RenderManager {
    /// Creates a manager using the poll interval and timeout from `config`.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            jobs: BTreeMap::new(),
            timer: None,
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
            stats: RenderStats::default(),
        }
    }

    /// Starts a render for a region.
    ///
    /// A job already running for the region is killed first, and its files
    /// are gone before the new process starts.
    pub fn start(
        &mut self,
        region: RegionId,
        request: &RenderRequest,
        config: &RenderConfig,
        now: Instant,
    ) -> markup_overlay_render::Result<()> {
        self.cancel(region);

        let job = match RenderJob::spawn(request, config) {
            Ok(job) => job,
            Err(e) => {
                self.stats.failed += 1;
                return Err(e);
            }
        };
        log::debug!("Render for region {} started (pid {:?})", region.0, job.pid());

        self.jobs.insert(region, job);
        self.stats.started += 1;
        if self.timer.is_none() {
            self.timer = Some(PollTimer::start(self.poll_interval, now));
        }
        Ok(())
    }

    /// Kills the job for a region, if any. Returns true if one was running.
    pub fn cancel(&mut self, region: RegionId) -> bool {
        let Some(job) = self.jobs.remove(&region) else {
            return false;
        };
        job.cancel();
        self.stats.killed += 1;
        log::debug!("Render for region {} cancelled", region.0);

        if self.jobs.is_empty() {
            self.timer = None;
        }
        true
    }

    /// Kills every job.
    pub fn cancel_all(&mut self) {
        let regions: Vec<RegionId> = self.jobs.keys().copied().collect();
        for region in regions {
            self.cancel(region);
        }
    }

    /// Returns true if a job is running for `region`.
    pub fn is_running(&self, region: RegionId) -> bool {
        self.jobs.contains_key(&region)
    }

    /// Returns the number of running jobs.
    pub fn running(&self) -> usize {
        self.jobs.len()
    }

    /// Returns when the poll timer next fires, if it exists.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.deadline())
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Polls every job if the timer is due.
    ///
    /// Returns the finished jobs in region order. Jobs past the timeout are
    /// killed and reported as failed.
    pub fn poll(&mut self, now: Instant) -> Vec<(RegionId, JobStatus)> {
        match self.timer {
            Some(timer) if timer.is_due(now) => {}
            _ => return Vec::new(),
        }

        let mut finished = Vec::new();
        for (region, job) in self.jobs.iter_mut() {
            let status = match job.poll() {
                JobStatus::Running => match self.timeout {
                    Some(limit) if now.saturating_duration_since(job.started()) >= limit => {
                        JobStatus::Failed(format!("timed out after {} ms", limit.as_millis()))
                    }
                    _ => continue,
                },
                status => status,
            };
            finished.push((*region, status));
        }

        for (region, status) in &finished {
            // Dropping the job kills a timed-out process and removes its files
            self.jobs.remove(region);
            match status {
                JobStatus::Succeeded(_) => self.stats.succeeded += 1,
                _ => self.stats.failed += 1,
            }
        }

        if self.jobs.is_empty() {
            self.timer = None;
        } else if let Some(timer) = self.timer.as_mut() {
            timer.rearm(now);
        }
        finished
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::thread;

    fn config_with(command: &str) -> RenderConfig {
        RenderConfig {
            command: command.to_string(),
            document: "#expression".to_string(),
            poll_interval_ms: 10,
            ..RenderConfig::default()
        }
    }

    fn request(config: &RenderConfig) -> RenderRequest {
        RenderRequest::new("x", config, None).unwrap()
    }

    fn poll_until_done(manager: &mut RenderManager) -> Vec<(RegionId, JobStatus)> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            thread::sleep(Duration::from_millis(20));
            let done = manager.poll(Instant::now());
            if !done.is_empty() || Instant::now() > deadline {
                return done;
            }
        }
    }

    #[test]
    fn test_timer_is_lazy() {
        let config = config_with("sleep 30");
        let mut manager = RenderManager::new(&config);
        assert!(manager.deadline().is_none());

        manager
            .start(RegionId(1), &request(&config), &config, Instant::now())
            .unwrap();
        assert!(manager.deadline().is_some());
        assert!(manager.is_running(RegionId(1)));

        assert!(manager.cancel(RegionId(1)));
        assert!(!manager.is_running(RegionId(1)));
        assert!(manager.deadline().is_none());
        assert_eq!(manager.stats().killed, 1);
    }

    #[test]
    fn test_restart_kills_previous_job() {
        let config = config_with("sleep 30");
        let mut manager = RenderManager::new(&config);
        let now = Instant::now();

        manager.start(RegionId(1), &request(&config), &config, now).unwrap();
        let first_dir = manager.jobs[&RegionId(1)].workdir().unwrap().to_path_buf();
        manager.start(RegionId(1), &request(&config), &config, now).unwrap();

        assert!(!first_dir.exists());
        assert_eq!(manager.running(), 1);
        assert_eq!(manager.stats().started, 2);
        assert_eq!(manager.stats().killed, 1);
        manager.cancel_all();
        assert_eq!(manager.running(), 0);
    }

    #[test]
    fn test_poll_reports_success() {
        let config = config_with("cp #input #output");
        let mut manager = RenderManager::new(&config);
        manager
            .start(RegionId(4), &request(&config), &config, Instant::now())
            .unwrap();

        let done = poll_until_done(&mut manager);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].0, RegionId(4));
        assert!(matches!(done[0].1, JobStatus::Succeeded(_)));
        assert!(!manager.is_running(RegionId(4)));
        assert!(manager.deadline().is_none());
        assert_eq!(manager.stats().succeeded, 1);
    }

    #[test]
    fn test_poll_waits_for_timer() {
        let config = config_with("true");
        let mut manager = RenderManager::new(&RenderConfig {
            poll_interval_ms: 60_000,
            ..config.clone()
        });
        let now = Instant::now();
        manager.start(RegionId(1), &request(&config), &config, now).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(manager.poll(Instant::now()).is_empty());
        assert_eq!(manager.running(), 1);
    }

    #[test]
    fn test_timeout_kills_job() {
        let config = RenderConfig {
            timeout_ms: 50,
            ..config_with("sleep 30")
        };
        let mut manager = RenderManager::new(&config);
        manager
            .start(RegionId(2), &request(&config), &config, Instant::now())
            .unwrap();

        let done = poll_until_done(&mut manager);
        assert_eq!(done.len(), 1);
        assert!(matches!(done[0].1, JobStatus::Failed(_)));
        assert_eq!(manager.running(), 0);
        assert_eq!(manager.stats().failed, 1);
    }
}
