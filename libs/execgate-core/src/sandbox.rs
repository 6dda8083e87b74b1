//! Container-backed execution for languages the external judge does not
//! handle on our terms.
//!
//! Every run gets a throwaway, uniquely-named container built from the
//! language's fixed base image, a bind-mounted temp directory holding only
//! the submitted source, hard resource ceilings applied at creation time,
//! and a wall-clock watchdog. Teardown is a single idempotent finalize step
//! that every code path -- success, stream error, watchdog -- goes through,
//! backed by a Drop guard for panic and cancellation safety.

use crate::error::GatewayError;
use crate::orchestrator::SandboxBackend;
use crate::registry::SandboxProfile;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, ResourcesUlimits};
use bollard::Docker;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Non-negotiable defaults. A submission cannot request more.
const MEMORY_LIMIT_BYTES: i64 = 512 * 1024 * 1024;
const CPU_PERIOD_US: i64 = 100_000;
const CPU_QUOTA_US: i64 = 50_000; // 50% of one core
const NOFILE_LIMIT: i64 = 1024;
const HARD_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_GRACE_SECONDS: i64 = 10;

/// Keep-alive so the build+run command executes through an attached exec
/// session rather than the container entrypoint.
const KEEPALIVE_CMD: [&str; 2] = ["sleep", "300"];

#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub output: String,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

pub struct SandboxRunner {
    docker: Docker,
    temp_root: PathBuf,
    hard_timeout: Duration,
}

fn unique_container_name() -> String {
    format!("sandbox-exec-{}", Uuid::new_v4())
}

/// Classify one demultiplexed chunk by its framing channel and append it to
/// the matching buffer.
fn append_chunk(chunk: LogOutput, stdout: &mut String, stderr: &mut String) {
    match chunk {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            stdout.push_str(&String::from_utf8_lossy(&message));
        }
        LogOutput::StdErr { message } => {
            stderr.push_str(&String::from_utf8_lossy(&message));
        }
        LogOutput::StdIn { .. } => {}
    }
}

impl SandboxRunner {
    pub fn new() -> Result<Self, GatewayError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(SandboxRunner {
            docker,
            temp_root: std::env::temp_dir(),
            hard_timeout: HARD_TIMEOUT,
        })
    }

    pub fn with_hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = timeout;
        self
    }

    pub fn with_temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = root;
        self
    }

    async fn ensure_image(&self, image: &str) -> Result<(), GatewayError> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image, "Image cache hit");
            return Ok(());
        }

        warn!(image, "Image cache miss, pulling");
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }

        info!(image, "Image pulled");
        Ok(())
    }

    /// Run one submission against one test input. One container per call;
    /// the container never outlives the call.
    pub async fn run(
        &self,
        profile: &SandboxProfile,
        source: &str,
        input: &str,
    ) -> Result<SandboxOutput, GatewayError> {
        let container_name = unique_container_name();

        let workdir = tempfile::Builder::new()
            .prefix(&container_name)
            .tempdir_in(&self.temp_root)?;
        tokio::fs::write(workdir.path().join(&profile.source_file), source).await?;

        self.ensure_image(&profile.image).await?;

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:/app", workdir.path().display())]),
            memory: Some(MEMORY_LIMIT_BYTES),
            // memory_swap == memory disables swap entirely.
            memory_swap: Some(MEMORY_LIMIT_BYTES),
            cpu_period: Some(CPU_PERIOD_US),
            cpu_quota: Some(CPU_QUOTA_US),
            network_mode: Some("none".to_string()),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ulimits: Some(vec![ResourcesUlimits {
                name: Some("nofile".to_string()),
                soft: Some(NOFILE_LIMIT),
                hard: Some(NOFILE_LIMIT),
            }]),
            ..Default::default()
        };

        let config = Config {
            image: Some(profile.image.clone()),
            cmd: Some(KEEPALIVE_CMD.iter().map(|s| s.to_string()).collect()),
            working_dir: Some("/app".to_string()),
            network_disabled: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };
        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await?;

        // From here on the guard owns teardown: any early return, panic or
        // cancellation still removes the container.
        let guard = ContainerGuard::new(self.docker.clone(), container.id.clone());

        let start = Instant::now();
        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await?;

        let exec = self
            .docker
            .create_exec(
                &container.id,
                CreateExecOptions {
                    cmd: Some(profile.run_cmd.clone()),
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let stream_future = async {
            let started = self
                .docker
                .start_exec(&exec.id, Some(StartExecOptions::default()))
                .await?;

            let mut stdout = String::new();
            let mut stderr = String::new();

            if let StartExecResults::Attached {
                mut output,
                input: mut stdin_pipe,
            } = started
            {
                // The program may exit without draining stdin; write errors
                // are expected in that case and not a run failure.
                if stdin_pipe.write_all(input.as_bytes()).await.is_ok() {
                    let _ = stdin_pipe.shutdown().await;
                }
                drop(stdin_pipe);

                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(log_output) => append_chunk(log_output, &mut stdout, &mut stderr),
                        Err(e) => {
                            stderr.push_str(&format!("\n[stream error: {e}]"));
                            break;
                        }
                    }
                }
            }

            let inspect = self.docker.inspect_exec(&exec.id).await?;
            Ok::<(String, String, Option<i64>), GatewayError>((stdout, stderr, inspect.exit_code))
        };

        // The watchdog and the stream race; tokio::time::timeout decides the
        // winner and finalize below is safe either way.
        let raced = tokio::time::timeout(self.hard_timeout, stream_future).await;

        let (grace_seconds, outcome) = match raced {
            Ok(Ok(parts)) => (STOP_GRACE_SECONDS, Ok(parts)),
            Ok(Err(e)) => (0, Err(e)),
            Err(_) => {
                warn!(
                    container = %container_name,
                    timeout_s = self.hard_timeout.as_secs(),
                    "Sandbox watchdog fired, force-stopping container"
                );
                (0, Err(GatewayError::ExecutionTimeout(self.hard_timeout.as_secs())))
            }
        };

        guard.finalize(grace_seconds).await;
        if let Err(e) = workdir.close() {
            warn!(error = %e, "Failed to remove sandbox work directory");
        }

        let (stdout, stderr, exit_code) = outcome?;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let stderr = stderr.trim().to_string();
        let error = if !stderr.is_empty() {
            Some(stderr)
        } else {
            match exit_code {
                Some(code) if code != 0 => Some(format!("Process exited with status {code}")),
                _ => None,
            }
        };

        debug!(
            container = %container_name,
            execution_time_ms,
            has_error = error.is_some(),
            "Sandbox run finished"
        );

        Ok(SandboxOutput {
            output: stdout.trim().to_string(),
            error,
            execution_time_ms,
        })
    }
}

#[async_trait]
impl SandboxBackend for SandboxRunner {
    async fn run(
        &self,
        profile: &SandboxProfile,
        source: &str,
        input: &str,
    ) -> Result<SandboxOutput, GatewayError> {
        SandboxRunner::run(self, profile, source, input).await
    }
}

/// Owns container teardown. `finalize` runs at most once no matter how many
/// competing paths attempt it; if nothing ever calls it (panic, task
/// cancellation), Drop force-removes the container in the background.
struct ContainerGuard {
    docker: Docker,
    container_id: String,
    finalized: AtomicBool,
}

impl ContainerGuard {
    fn new(docker: Docker, container_id: String) -> Self {
        ContainerGuard {
            docker,
            container_id,
            finalized: AtomicBool::new(false),
        }
    }

    /// Graceful stop (grace 0 on the watchdog path) followed by forced
    /// removal. All failures are logged and swallowed; teardown must never
    /// mask the primary result.
    async fn finalize(&self, grace_seconds: i64) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self
            .docker
            .stop_container(&self.container_id, Some(StopContainerOptions { t: grace_seconds }))
            .await
        {
            debug!(container = %self.container_id, error = %e, "Stop during teardown failed");
        }

        if let Err(e) = self
            .docker
            .remove_container(
                &self.container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!(container = %self.container_id, error = %e, "Failed to remove container");
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        let docker = self.docker.clone();
        let container_id = self.container_id.clone();
        tokio::spawn(async move {
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&container_id, Some(options)).await {
                warn!(container = %container_id, error = %e, "Failed to remove container on drop");
            }
        });
    }
}
