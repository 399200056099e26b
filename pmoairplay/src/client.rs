//! Outbound control of a receiver: push an image, play a video URL, stop.
//!
//! Commands are queued and executed by a single worker thread, strictly in
//! submission order. A receiver is a single-session device, so two commands
//! are never in flight at the same time, whatever their target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};
use ureq::Agent;
use uuid::Uuid;

use crate::errors::CommandError;
use crate::model::{Command, DeviceTarget, Outcome, Transition};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
pub const CLIENT_USER_AGENT: &str = "MediaControl/1.0";

/// Receives the outcome of every submitted command, exactly once, from the
/// worker thread.
pub trait OutcomeSink: Send + 'static {
    fn deliver(&self, outcome: Outcome);
}

impl<F> OutcomeSink for F
where
    F: Fn(Outcome) + Send + 'static,
{
    fn deliver(&self, outcome: Outcome) {
        self(outcome)
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            user_agent: CLIENT_USER_AGENT.to_string(),
        }
    }
}

struct Job {
    command: Command,
    target: DeviceTarget,
}

pub struct DeviceCommandClient {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl DeviceCommandClient {
    pub fn new(sink: impl OutcomeSink) -> io::Result<Self> {
        Self::with_config(sink, ClientConfig::default())
    }

    pub fn with_config(sink: impl OutcomeSink, config: ClientConfig) -> io::Result<Self> {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let worker = CommandWorker::new(config, sink);
        let handle = thread::Builder::new()
            .name("airplay-command-worker".into())
            .spawn(move || worker.run(jobs_rx))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            worker: Some(handle),
        })
    }

    /// Client whose outcomes are delivered on a channel.
    pub fn with_channel(config: ClientConfig) -> io::Result<(Self, Receiver<Outcome>)> {
        let (outcome_tx, outcome_rx) = unbounded::<Outcome>();
        let client = Self::with_config(
            move |outcome: Outcome| {
                if outcome_tx.send(outcome).is_err() {
                    debug!("Outcome receiver dropped, discarding outcome");
                }
            },
            config,
        )?;
        Ok((client, outcome_rx))
    }

    /// Queue `command` for `target` and return immediately.
    pub fn submit(&self, command: Command, target: &DeviceTarget) -> Result<(), CommandError> {
        let jobs = self.jobs.as_ref().ok_or(CommandError::WorkerStopped)?;
        debug!(command = command.name(), target = %target, "Queueing command");
        jobs.send(Job {
            command,
            target: target.clone(),
        })
        .map_err(|_| CommandError::WorkerStopped)
    }

    pub fn put_image(
        &self,
        path: impl Into<PathBuf>,
        transition: Transition,
        target: &DeviceTarget,
    ) -> Result<(), CommandError> {
        self.submit(
            Command::PutImage {
                path: path.into(),
                transition,
            },
            target,
        )
    }

    pub fn play_video(
        &self,
        content_url: impl Into<String>,
        target: &DeviceTarget,
    ) -> Result<(), CommandError> {
        self.submit(
            Command::PlayVideo {
                content_url: content_url.into(),
            },
            target,
        )
    }

    pub fn stop_video(&self, target: &DeviceTarget) -> Result<(), CommandError> {
        self.submit(Command::StopVideo, target)
    }

    /// Refuse further commands, let the queued ones run, then join the worker.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Command worker panicked");
            }
        }
    }
}

impl Drop for DeviceCommandClient {
    fn drop(&mut self) {
        self.close();
    }
}

struct CommandWorker<S> {
    agent: Agent,
    user_agent: String,
    sink: S,
}

impl<S: OutcomeSink> CommandWorker<S> {
    fn new(config: ClientConfig, sink: S) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout))
            .timeout_recv_response(Some(config.read_timeout))
            .timeout_recv_body(Some(config.read_timeout))
            .build()
            .into();
        Self {
            agent,
            user_agent: config.user_agent,
            sink,
        }
    }

    fn run(self, jobs: Receiver<Job>) {
        for job in jobs.iter() {
            let outcome = match self.execute(&job) {
                Ok(()) => {
                    info!(command = job.command.name(), target = %job.target, "Command succeeded");
                    Outcome::Success {
                        command: job.command,
                    }
                }
                Err(err) => {
                    warn!(command = job.command.name(), target = %job.target, "Command failed: {}", err);
                    Outcome::Failure {
                        command: job.command,
                        message: err.to_string(),
                    }
                }
            };
            self.sink.deliver(outcome);
        }
        debug!("Command queue closed, worker exiting");
    }

    fn execute(&self, job: &Job) -> Result<(), CommandError> {
        match &job.command {
            Command::PutImage { path, transition } => {
                self.put_image(path, *transition, &job.target)
            }
            Command::PlayVideo { content_url } => self.play_video(content_url, &job.target),
            Command::StopVideo => self.stop_video(&job.target),
        }
    }

    fn put_image(
        &self,
        path: &Path,
        transition: Transition,
        target: &DeviceTarget,
    ) -> Result<(), CommandError> {
        let data =
            fs::read(path).map_err(|e| CommandError::File(path.display().to_string(), e))?;
        let url = target.endpoint("photo");
        debug!(url = url.as_str(), bytes = data.len(), "PUT photo");

        let response = self
            .agent
            .put(&url)
            .header("X-Apple-AssetKey", Uuid::new_v4().to_string())
            .header("X-Apple-Session-ID", Uuid::new_v4().to_string())
            .header("X-Apple-Transition", transition.code())
            .header("User-Agent", self.user_agent.as_str())
            .send(&data[..])
            .map_err(|e| CommandError::Transport(url.clone(), e.to_string()))?;

        expect_ok(response.status().as_u16())
    }

    fn play_video(&self, content_url: &str, target: &DeviceTarget) -> Result<(), CommandError> {
        let body = play_body(content_url);
        let url = target.endpoint("play");
        debug!(url = url.as_str(), location = content_url, "POST play");

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/parameters")
            .header("X-Apple-AssetKey", Uuid::new_v4().to_string())
            .header("X-Apple-Session-ID", Uuid::new_v4().to_string())
            .header("User-Agent", self.user_agent.as_str())
            .send(body)
            .map_err(|e| CommandError::Transport(url.clone(), e.to_string()))?;

        expect_ok(response.status().as_u16())
    }

    fn stop_video(&self, target: &DeviceTarget) -> Result<(), CommandError> {
        let url = target.endpoint("stop");
        debug!(url = url.as_str(), "POST stop");

        let response = self
            .agent
            .post(&url)
            .header("User-Agent", self.user_agent.as_str())
            .send_empty()
            .map_err(|e| CommandError::Transport(url.clone(), e.to_string()))?;

        expect_ok(response.status().as_u16())
    }
}

/// `text/parameters` body of a play request.
pub fn play_body(content_url: &str) -> String {
    format!("Content-Location: {}\nStart-Position: 0\n", content_url)
}

fn expect_ok(status: u16) -> Result<(), CommandError> {
    if status == 200 {
        Ok(())
    } else {
        Err(CommandError::Status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_body() {
        assert_eq!(
            play_body("http://10.0.0.2:9999/L21lZGlh"),
            "Content-Location: http://10.0.0.2:9999/L21lZGlh\nStart-Position: 0\n"
        );
    }

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok(200).is_ok());
        let err = expect_ok(500).unwrap_err();
        assert_eq!(err.to_string(), "AirPlay service responded HTTP 500");
        assert!(expect_ok(204).is_err());
    }

    #[test]
    fn test_submit_after_shutdown_path() {
        let (mut client, _rx) = DeviceCommandClient::with_channel(ClientConfig::default()).unwrap();
        client.close();
        let err = client
            .stop_video(&DeviceTarget::new("http://127.0.0.1:1"))
            .unwrap_err();
        assert!(matches!(err, CommandError::WorkerStopped));
    }
}
