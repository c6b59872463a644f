use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{Request, Response};
use registry::ActivityDescriptor;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::proxy::{ProxyClient, build_client, forward};
use crate::runtime::{ActivityRuntime, Body, BootstrapError, RuntimeError, RuntimeLauncher};

const LOOPBACK: &str = "127.0.0.1";
const READY_POLL: Duration = Duration::from_millis(200);
const READY_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextMode {
    /// `next dev`: compiles on demand, no build step needed.
    #[default]
    Dev,
    /// `next start`: serves an existing `.next` production build.
    Start,
}

impl NextMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextMode::Dev => "dev",
            NextMode::Start => "start",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NextjsOptions {
    /// Program and leading arguments used instead of the auto-detected
    /// `next` binary, e.g. `["npx", "next"]`.
    pub command: Option<Vec<String>>,
    pub mode: NextMode,
    /// `node_modules` shared by every activity, appended to `NODE_PATH`.
    pub shared_node_modules: Option<PathBuf>,
    pub bootstrap_timeout: Duration,
}

impl Default for NextjsOptions {
    fn default() -> Self {
        Self {
            command: None,
            mode: NextMode::Dev,
            shared_node_modules: None,
            bootstrap_timeout: Duration::from_secs(120),
        }
    }
}

/// Starts one `next` server per activity as a child process bound to a
/// private loopback port, with the activity directory as its working
/// directory. The host process never changes its own cwd.
pub struct NextjsLauncher {
    options: NextjsOptions,
    client: ProxyClient,
}

impl NextjsLauncher {
    pub fn new(options: NextjsOptions) -> Self {
        Self {
            options,
            client: build_client(),
        }
    }
}

#[async_trait]
impl RuntimeLauncher for NextjsLauncher {
    async fn bootstrap(
        &self,
        activity: Arc<ActivityDescriptor>,
    ) -> Result<Arc<dyn ActivityRuntime>, BootstrapError> {
        let started = Instant::now();
        tracing::info!(
            name = %activity.name,
            path = %activity.path.display(),
            mode = self.options.mode.as_str(),
            event = "nextjs_init_start",
            "initializing Next.js runtime"
        );

        let outcome = spawn_runtime(&self.options, &activity).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok((child, port)) => {
                tracing::info!(
                    name = %activity.name,
                    port,
                    success = true,
                    duration_ms,
                    event = "nextjs_init_complete",
                    "Next.js runtime ready"
                );
                Ok(Arc::new(NextjsRuntime {
                    activity,
                    port,
                    child: Mutex::new(Some(child)),
                    client: self.client.clone(),
                }))
            }
            Err(err) => {
                tracing::warn!(
                    name = %activity.name,
                    success = false,
                    duration_ms,
                    error = %err,
                    event = "nextjs_init_complete",
                    "Next.js runtime failed to start"
                );
                Err(err)
            }
        }
    }
}

async fn spawn_runtime(
    options: &NextjsOptions,
    activity: &ActivityDescriptor,
) -> Result<(Child, u16), BootstrapError> {
    let spawn_error = |message: String| BootstrapError::Spawn {
        activity: activity.name.clone(),
        message,
    };

    let port = reserve_port().map_err(|err| spawn_error(format!("no free port: {}", err)))?;
    let (program, args) = command_for(options, &activity.path);

    let mut command = Command::new(&program);
    command
        .args(&args)
        .arg(options.mode.as_str())
        .arg("-p")
        .arg(port.to_string())
        .arg("-H")
        .arg(LOOPBACK)
        .current_dir(&activity.path)
        .env("PORT", port.to_string())
        .env("NODE_PATH", node_path(options, &activity.path))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|err| spawn_error(format!("{}: {}", program.to_string_lossy(), err)))?;

    if let Some(stdout) = child.stdout.take() {
        pipe_output(activity.name.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        pipe_output(activity.name.clone(), "stderr", stderr);
    }

    wait_until_ready(&mut child, port, options.bootstrap_timeout, &activity.name).await?;
    Ok((child, port))
}

/// Poll until the child accepts connections on `port`.
///
/// The port is free between `reserve_port` and the child binding it, so a
/// connect alone could reach another process. A connect only counts while
/// the child is still running; a child that lost the port to someone else
/// exits with `EADDRINUSE` and is reported as `Exited`.
async fn wait_until_ready(
    child: &mut Child,
    port: u16,
    timeout: Duration,
    name: &str,
) -> Result<(), BootstrapError> {
    let deadline = Instant::now() + timeout;
    loop {
        ensure_running(child, name)?;

        if TcpStream::connect((LOOPBACK, port)).await.is_ok() {
            tokio::time::sleep(READY_SETTLE).await;
            ensure_running(child, name)?;
            return Ok(());
        }

        if Instant::now() >= deadline {
            let _ = child.start_kill();
            return Err(BootstrapError::Timeout {
                activity: name.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        tokio::time::sleep(READY_POLL).await;
    }
}

fn ensure_running(child: &mut Child, name: &str) -> Result<(), BootstrapError> {
    match child.try_wait() {
        Ok(None) => Ok(()),
        Ok(Some(status)) => Err(BootstrapError::Exited {
            activity: name.to_string(),
            status: status.to_string(),
        }),
        Err(err) => Err(BootstrapError::Spawn {
            activity: name.to_string(),
            message: err.to_string(),
        }),
    }
}

fn pipe_output<R>(name: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(activity = %name, stream, "{}", line);
        }
    });
}

/// Ask the OS for a free loopback port. The listener is dropped before the
/// child binds it, see [`wait_until_ready`].
pub fn reserve_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind((LOOPBACK, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Program and leading arguments that start `next` for an activity: the
/// configured command, else the activity's own `node_modules/.bin/next`,
/// else the shared one, else `npx next`.
pub fn command_for(options: &NextjsOptions, activity_dir: &Path) -> (OsString, Vec<OsString>) {
    if let Some((program, args)) = options
        .command
        .as_ref()
        .and_then(|command| command.split_first())
    {
        return (program.into(), args.iter().map(OsString::from).collect());
    }

    let local = activity_dir.join("node_modules").join(".bin").join("next");
    if local.is_file() {
        return (local.into_os_string(), Vec::new());
    }

    if let Some(shared) = &options.shared_node_modules {
        let shared = shared.join(".bin").join("next");
        if shared.is_file() {
            return (shared.into_os_string(), Vec::new());
        }
    }

    ("npx".into(), vec!["next".into()])
}

fn node_path(options: &NextjsOptions, activity_dir: &Path) -> OsString {
    let mut paths = vec![activity_dir.join("node_modules")];
    if let Some(shared) = &options.shared_node_modules {
        paths.push(shared.clone());
    }
    std::env::join_paths(paths).unwrap_or_default()
}

/// A ready `next` child process and the port it listens on.
pub struct NextjsRuntime {
    activity: Arc<ActivityDescriptor>,
    port: u16,
    child: Mutex<Option<Child>>,
    client: ProxyClient,
}

impl NextjsRuntime {
    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl ActivityRuntime for NextjsRuntime {
    async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, RuntimeError> {
        forward(&self.client, self.port, &self.activity.route, request).await
    }

    async fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                tracing::warn!(name = %self.activity.name, error = %err, "failed to stop Next.js runtime");
            } else {
                tracing::info!(name = %self.activity.name, "Next.js runtime stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::FrameworkType;
    use std::fs;
    use tempfile::TempDir;

    fn activity(dir: &Path) -> Arc<ActivityDescriptor> {
        Arc::new(ActivityDescriptor::new(
            "one",
            dir,
            "a",
            FrameworkType::Nextjs,
            None,
        ))
    }

    #[test]
    fn command_prefers_configured_then_local_then_shared() {
        let dir = TempDir::new().expect("tempdir");
        let shared = TempDir::new().expect("shared");
        let options = NextjsOptions {
            shared_node_modules: Some(shared.path().to_path_buf()),
            ..NextjsOptions::default()
        };

        let (program, args) = command_for(&options, dir.path());
        assert_eq!(program, "npx");
        assert_eq!(args, vec![OsString::from("next")]);

        fs::create_dir_all(shared.path().join(".bin")).expect("mkdir");
        fs::write(shared.path().join(".bin/next"), "").expect("write");
        let (program, _) = command_for(&options, dir.path());
        assert_eq!(PathBuf::from(program), shared.path().join(".bin/next"));

        fs::create_dir_all(dir.path().join("node_modules/.bin")).expect("mkdir");
        fs::write(dir.path().join("node_modules/.bin/next"), "").expect("write");
        let (program, args) = command_for(&options, dir.path());
        assert_eq!(PathBuf::from(program), dir.path().join("node_modules/.bin/next"));
        assert!(args.is_empty());

        let configured = NextjsOptions {
            command: Some(vec!["pnpm".to_string(), "exec".to_string(), "next".to_string()]),
            ..options
        };
        let (program, args) = command_for(&configured, dir.path());
        assert_eq!(program, "pnpm");
        assert_eq!(args, vec![OsString::from("exec"), OsString::from("next")]);
    }

    #[test]
    fn reserved_ports_are_nonzero() {
        assert_ne!(reserve_port().expect("port"), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_that_exits_fails_bootstrap() {
        let dir = TempDir::new().expect("tempdir");
        let launcher = NextjsLauncher::new(NextjsOptions {
            command: Some(vec!["sh".into(), "-c".into(), "exit 3".into()]),
            bootstrap_timeout: Duration::from_secs(5),
            ..NextjsOptions::default()
        });

        let outcome = launcher.bootstrap(activity(dir.path())).await;
        assert!(matches!(outcome, Err(BootstrapError::Exited { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_that_never_listens_times_out() {
        let dir = TempDir::new().expect("tempdir");
        let launcher = NextjsLauncher::new(NextjsOptions {
            command: Some(vec!["sh".into(), "-c".into(), "sleep 30".into()]),
            bootstrap_timeout: Duration::from_millis(300),
            ..NextjsOptions::default()
        });

        let outcome = launcher.bootstrap(activity(dir.path())).await;
        assert!(matches!(outcome, Err(BootstrapError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn foreign_listener_does_not_count_as_ready() {
        let foreign = std::net::TcpListener::bind((LOOPBACK, 0)).expect("bind");
        let port = foreign.local_addr().expect("addr").port();

        let mut child = Command::new("sh")
            .args(["-c", "exit 98"])
            .spawn()
            .expect("spawn");
        child.wait().await.expect("wait");

        let outcome = wait_until_ready(&mut child, port, Duration::from_secs(5), "one").await;
        assert!(matches!(outcome, Err(BootstrapError::Exited { .. })));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = TempDir::new().expect("tempdir");
        let launcher = NextjsLauncher::new(NextjsOptions {
            command: Some(vec!["definitely-not-a-real-next-binary".into()]),
            ..NextjsOptions::default()
        });

        let outcome = launcher.bootstrap(activity(dir.path())).await;
        assert!(matches!(outcome, Err(BootstrapError::Spawn { .. })));
    }
}
