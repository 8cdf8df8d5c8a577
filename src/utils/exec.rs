use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use tracing::debug;

/// Account details needed to hand files back to a non-root user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// Trait for everything the bootstrapper does to the host.
///
/// The bootstrapper only talks to the machine through this seam, so a run can
/// be replayed against a scripted executor.
pub trait CommandExecutor {
    /// Execute a command and capture its output
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Execute a command with extra environment and `input` piped to stdin
    fn execute_with_input(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        input: &[u8],
    ) -> Result<Output>;

    /// Execute a command with the terminal attached (long-running, user-visible output)
    fn execute_interactive(&self, program: &str, args: &[&str]) -> Result<ExitStatus>;

    /// Check if a command exists on PATH
    fn check_command_exists(&self, command: &str) -> bool;

    /// Whether the process runs with root privileges
    fn is_privileged(&self) -> bool;

    /// Look up a local account by name
    fn lookup_user(&self, name: &str) -> Result<Option<UserInfo>>;

    fn read_file(&self, path: &Path) -> Result<String>;

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Create directory recursively
    fn mkdir_p(&self, path: &Path) -> Result<()>;

    fn file_exists(&self, path: &Path) -> bool;

    /// Change ownership of a path
    fn chown(&self, path: &Path, uid: u32, gid: u32) -> Result<()>;
}

/// Executes everything on the local machine
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalExecutor;

impl CommandExecutor for LocalExecutor {
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output> {
        debug!(program, ?args, "exec");
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdout(Stdio::piped()); // Capture stdout for parsing
        cmd.stderr(Stdio::piped()); // Capture stderr for error messages
        cmd.stdin(Stdio::null());
        cmd.output()
            .with_context(|| format!("Failed to execute command: {}", program))
    }

    fn execute_with_input(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        input: &[u8],
    ) -> Result<Output> {
        debug!(program, ?args, input_bytes = input.len(), "exec with stdin");
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.envs(env.iter().copied());
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn command: {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .with_context(|| format!("Failed to write stdin of {}", program))?;
            // Dropping stdin closes the pipe so the child sees EOF
        }

        child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for command: {}", program))
    }

    fn execute_interactive(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        debug!(program, ?args, "exec interactive");
        Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute interactive command: {}", program))
    }

    /// Check if a command exists using native Rust (which crate)
    fn check_command_exists(&self, command: &str) -> bool {
        which::which(command).is_ok()
    }

    fn is_privileged(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn lookup_user(&self, name: &str) -> Result<Option<UserInfo>> {
        let user = nix::unistd::User::from_name(name)
            .with_context(|| format!("Failed to look up user: {}", name))?;
        Ok(user.map(|u| UserInfo {
            name: u.name,
            uid: u.uid.as_raw(),
            gid: u.gid.as_raw(),
            home: u.dir,
        }))
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }

    fn mkdir_p(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn chown(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        nix::unistd::chown(
            path,
            Some(nix::unistd::Uid::from_raw(uid)),
            Some(nix::unistd::Gid::from_raw(gid)),
        )
        .with_context(|| format!("Failed to chown {} to {}:{}", path.display(), uid, gid))
    }
}

/// Trimmed, lossy stdout of a finished command
pub fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Best available error text of a failed command
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = stdout_string(output);
    if !stdout.is_empty() {
        return stdout;
    }
    match output.status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
