// ─── Launcher Part Launch ───
// Starts the launcher part JVM, feeds it the launch script over stdin and follows the
// game process until it exits.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, warn};

use crate::core::instance::{AuthSession, MinecraftInstance, ServerTarget};
use crate::core::java::find_executable;
use crate::core::launch::message::MessageLevel;
use crate::core::launch::process::{format_command_for_logs, forward_output};
use crate::core::launch::script::split_args;
use crate::core::launch::step::{LaunchStep, StepContext, StepOutcome};

const ENTRY_POINT: &str = "org.multimc.EntryPoint";
const ABORT_GRACE: Duration = Duration::from_secs(10);

pub struct LauncherPartLaunch {
    instance: Arc<MinecraftInstance>,
    session: AuthSession,
    server: Arc<Mutex<Option<ServerTarget>>>,
}

impl LauncherPartLaunch {
    pub fn new(
        instance: Arc<MinecraftInstance>,
        session: AuthSession,
        server: Arc<Mutex<Option<ServerTarget>>>,
    ) -> Self {
        Self {
            instance,
            session,
            server,
        }
    }

    fn server(&self) -> Option<ServerTarget> {
        match self.server.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Program and arguments, with the wrapper command in front when one is set.
    fn command_line(&self, ctx: &StepContext, launcher_jar: String) -> Result<(String, Vec<String>), String> {
        let settings = self.instance.settings();
        let mut args = self
            .instance
            .java_arguments()
            .map_err(|e| format!("Couldn't compute the Java arguments: {}", e))?;
        ctx.log(
            format!("Java Arguments:\n[{}]\n\n", ctx.censor(&args.join(", "))),
            MessageLevel::Launcher,
        );

        let java_setting = settings.get_string("JavaPath").unwrap_or_default();
        let java_path = find_executable(java_setting.trim())
            .map(|p| p.display().to_string())
            .unwrap_or(java_setting);

        args.push(format!("-Djava.library.path={}", self.instance.natives_dir().display()));
        args.push("-cp".to_string());
        args.push(launcher_jar);
        args.push(ENTRY_POINT.to_string());

        let wrapper = settings.get_string("WrapperCommand").unwrap_or_default();
        let wrapper = wrapper.trim();
        if wrapper.is_empty() {
            return Ok((java_path, args));
        }

        let mut wrapper_args = split_args(wrapper);
        if wrapper_args.is_empty() {
            return Ok((java_path, args));
        }
        let wrapper_command = wrapper_args.remove(0);
        let Some(real_wrapper) = find_executable(&wrapper_command) else {
            let reason = format!("The wrapper command \"{}\" couldn't be found.", wrapper_command);
            ctx.log(reason.clone(), MessageLevel::Fatal);
            return Err(reason);
        };
        ctx.log(format!("Wrapper command is:\n{}\n\n", wrapper), MessageLevel::Launcher);
        wrapper_args.push(java_path);
        wrapper_args.extend(args);
        Ok((real_wrapper.display().to_string(), wrapper_args))
    }
}

fn configure_native_library_env(cmd: &mut Command, natives_dir: &Path) {
    let native_path = natives_dir.display().to_string();
    let var_name = if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    };
    cmd.env(var_name, append_env_path(var_name, &native_path));
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") { ";" } else { ":" };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => format!("{}{}{}", value, separator, existing),
        _ => value.to_string(),
    }
}

async fn send(stdin: &mut ChildStdin, text: &str) -> std::io::Result<()> {
    stdin.write_all(text.as_bytes()).await?;
    stdin.flush().await
}

#[async_trait]
impl LaunchStep for LauncherPartLaunch {
    fn name(&self) -> &str {
        "LauncherPartLaunch"
    }

    fn can_abort(&self) -> bool {
        true
    }

    async fn execute(&mut self, ctx: &StepContext) -> StepOutcome {
        let launcher_jar = self
            .instance
            .global_settings()
            .get_string("LauncherJarPath")
            .unwrap_or_default();
        if launcher_jar.trim().is_empty() || !Path::new(&launcher_jar).is_file() {
            let reason = "Launcher library could not be found. Please check your installation.";
            ctx.log(reason, MessageLevel::Fatal);
            return StepOutcome::failed(reason);
        }

        let server = self.server();
        let script = match self.instance.create_launch_script(&self.session, server.as_ref()) {
            Ok(script) => script,
            Err(e) => return StepOutcome::failed(format!("Couldn't create the launch script: {}", e)),
        };
        let (program, args) = match self.command_line(ctx, launcher_jar) {
            Ok(command_line) => command_line,
            Err(reason) => return StepOutcome::Failed(reason),
        };
        debug!("Launching: {}", format_command_for_logs(&program, &args));

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(self.instance.game_root())
            .envs(self.instance.get_variables().unwrap_or_default())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        configure_native_library_env(&mut command, &self.instance.natives_dir());

        // Not killed on drop: the game outlives whoever started it.
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", program, e);
                ctx.log("Could not launch Minecraft!", MessageLevel::Fatal);
                return StepOutcome::failed("Could not launch Minecraft!");
            }
        };

        let pid = child.id();
        if let Some(pid) = pid {
            ctx.log(format!("Minecraft process ID: {}\n\n", pid), MessageLevel::Launcher);
        }
        ctx.set_pid(pid);
        if let Err(e) = self.instance.set_last_launch() {
            warn!("Couldn't record the launch time: {}", e);
        }

        let readers = forward_output(&mut child, ctx);
        let Some(mut stdin) = child.stdin.take() else {
            let _ = child.kill().await;
            ctx.set_pid(None);
            return StepOutcome::failed("Could not launch Minecraft!");
        };
        if let Err(e) = send(&mut stdin, &script).await {
            warn!("Couldn't send the launch script: {}", e);
        }
        ctx.ready_for_launch();

        let status = tokio::select! {
            _ = ctx.proceeded() => {
                if let Err(e) = send(&mut stdin, "launch\n").await {
                    warn!("Couldn't tell the launcher part to launch: {}", e);
                }
                // Past this point an abort can only kill the game.
                tokio::select! {
                    status = child.wait() => status,
                    _ = ctx.aborted() => {
                        let _ = child.kill().await;
                        ctx.set_pid(None);
                        return StepOutcome::Aborted;
                    }
                }
            }
            _ = ctx.aborted() => {
                let _ = send(&mut stdin, "abort\n").await;
                if tokio::time::timeout(ABORT_GRACE, child.wait()).await.is_err() {
                    let _ = child.kill().await;
                }
                ctx.set_pid(None);
                return StepOutcome::Aborted;
            }
            status = child.wait() => status,
        };
        drop(stdin);
        for reader in readers {
            let _ = reader.await;
        }
        ctx.set_pid(None);

        match status {
            Ok(status) if status.success() => {
                info!("Minecraft exited normally");
                StepOutcome::Succeeded
            }
            Ok(status) => {
                ctx.log(
                    format!("Process exited with code {}.", status.code().unwrap_or(-1)),
                    MessageLevel::Launcher,
                );
                StepOutcome::failed("Game crashed.")
            }
            Err(e) => {
                warn!("Lost track of the game process: {}", e);
                StepOutcome::failed("Game crashed.")
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::instance::model::tests::temp_instance;
    use crate::core::launch::task::{LaunchEvent, LaunchTask, TaskOutcome};

    const FAKE_LAUNCHER: &str = r#"
while read line; do
  case "$line" in
    launch) echo "launched"; exit ${EXIT_CODE:-0} ;;
    abort) exit 1 ;;
  esac
done
exit 2
"#;

    fn prepare(tag: &str, exit_code: i32) -> (std::path::PathBuf, Arc<MinecraftInstance>) {
        let (base, instance) = temp_instance(tag);
        let script = base.join("fake-launcher.sh");
        std::fs::write(&script, FAKE_LAUNCHER.replace("${EXIT_CODE:-0}", &exit_code.to_string())).unwrap();
        let jar = base.join("NewLaunch.jar");
        std::fs::write(&jar, b"jar").unwrap();
        std::fs::create_dir_all(instance.game_root()).unwrap();

        instance
            .global_settings()
            .set("LauncherJarPath", jar.display().to_string())
            .unwrap();
        instance.settings().set("OverrideCommands", true).unwrap();
        instance
            .settings()
            .set("WrapperCommand", format!("sh {}", script.display()))
            .unwrap();
        (base, instance)
    }

    async fn run(instance: Arc<MinecraftInstance>, abort: bool) -> (TaskOutcome, Vec<String>) {
        let (mut task, mut rx) = LaunchTask::new();
        task.append_step(Box::new(LauncherPartLaunch::new(
            instance,
            AuthSession::offline("Steve"),
            Arc::new(Mutex::new(None)),
        )));
        let handle = task.handle();
        let running = tokio::spawn(task.run());

        let mut lines = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                LaunchEvent::ReadyForLaunch if abort => assert!(handle.abort()),
                LaunchEvent::ReadyForLaunch => assert!(handle.proceed()),
                LaunchEvent::Log { line, .. } => lines.push(line),
                LaunchEvent::Succeeded | LaunchEvent::Failed { .. } | LaunchEvent::Aborted => break,
                _ => {}
            }
        }
        (running.await.unwrap(), lines)
    }

    #[tokio::test]
    async fn proceed_launches_and_clean_exit_succeeds() {
        let (base, instance) = prepare("launch_ok", 0);
        let (outcome, lines) = run(instance.clone(), false).await;
        assert_eq!(outcome, TaskOutcome::Succeeded);
        assert!(lines.iter().any(|l| l == "launched"));
        assert!(instance.settings().get_int("LastLaunchTime").unwrap() > 0);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_crash() {
        let (base, instance) = prepare("launch_crash", 3);
        let (outcome, _) = run(instance, false).await;
        assert_eq!(
            outcome,
            TaskOutcome::Failed {
                reason: "Game crashed.".to_string(),
                fatal: true
            }
        );
        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn abort_before_proceed_is_negotiated() {
        let (base, instance) = prepare("launch_abort", 0);
        let (outcome, lines) = run(instance, true).await;
        assert_eq!(outcome, TaskOutcome::Aborted);
        assert!(!lines.iter().any(|l| l == "launched"));
        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn missing_launcher_jar_fails() {
        let (base, instance) = temp_instance("launch_nojar");
        let (outcome, _) = run(instance, false).await;
        assert!(matches!(outcome, TaskOutcome::Failed { reason, .. } if reason.starts_with("Launcher library")));
        let _ = std::fs::remove_dir_all(&base);
    }
}
