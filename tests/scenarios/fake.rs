//! Scripted host for driving whole bootstrap runs without touching the machine

use anyhow::{Result, bail};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use uiforge_cluster::utils::{CommandExecutor, ManifestSource, UserInfo};

/// Canned result of one command
#[derive(Debug, Clone)]
pub struct Reply {
    code: i32,
    stdout: String,
    stderr: String,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stdout: &str) -> Self {
        Self {
            code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn output(&self) -> Output {
        Output {
            status: ExitStatus::from_raw(self.code << 8),
            stdout: self.stdout.clone().into_bytes(),
            stderr: self.stderr.clone().into_bytes(),
        }
    }
}

/// Replies for every command line containing `pattern`; the last reply repeats
struct Rule {
    pattern: String,
    replies: Vec<Reply>,
    served: usize,
}

/// What a piped command received
#[derive(Debug, Clone)]
pub struct Piped {
    pub line: String,
    pub env: Vec<(String, String)>,
    pub input: String,
}

#[derive(Default)]
pub struct FakeExecutor {
    tools: HashSet<String>,
    privileged: bool,
    users: HashMap<String, UserInfo>,
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<String>>,
    piped: RefCell<Vec<Piped>>,
    files: RefCell<HashMap<PathBuf, String>>,
    dirs: RefCell<Vec<PathBuf>>,
    chowns: RefCell<Vec<(PathBuf, u32, u32)>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools.extend(tools.iter().map(|t| t.to_string()));
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn with_user(mut self, name: &str, uid: u32, home: &str) -> Self {
        self.users.insert(
            name.to_string(),
            UserInfo {
                name: name.to_string(),
                uid,
                gid: uid,
                home: PathBuf::from(home),
            },
        );
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .borrow_mut()
            .insert(PathBuf::from(path), content.to_string());
        self
    }

    /// First matching rule wins, so register specific patterns before general ones
    pub fn on(self, pattern: &str, replies: Vec<Reply>) -> Self {
        self.rules.borrow_mut().push(Rule {
            pattern: pattern.to_string(),
            replies,
            served: 0,
        });
        self
    }

    fn reply(&self, line: &str) -> Reply {
        self.calls.borrow_mut().push(line.to_string());
        let mut rules = self.rules.borrow_mut();
        match rules.iter_mut().find(|r| line.contains(&r.pattern)) {
            Some(rule) if !rule.replies.is_empty() => {
                let index = rule.served.min(rule.replies.len() - 1);
                rule.served += 1;
                rule.replies[index].clone()
            }
            _ => Reply::ok(""),
        }
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.contains(pattern)).count()
    }

    pub fn first(&self, pattern: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| c.contains(pattern))
    }

    pub fn last(&self, pattern: &str) -> Option<usize> {
        self.calls.borrow().iter().rposition(|c| c.contains(pattern))
    }

    pub fn piped(&self) -> Vec<Piped> {
        self.piped.borrow().clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(Path::new(path)).cloned()
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.borrow().clone()
    }

    pub fn chowns(&self) -> Vec<(PathBuf, u32, u32)> {
        self.chowns.borrow().clone()
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandExecutor for FakeExecutor {
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output> {
        Ok(self.reply(&command_line(program, args)).output())
    }

    fn execute_with_input(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        input: &[u8],
    ) -> Result<Output> {
        let line = command_line(program, args);
        self.piped.borrow_mut().push(Piped {
            line: line.clone(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            input: String::from_utf8_lossy(input).to_string(),
        });
        Ok(self.reply(&line).output())
    }

    fn execute_interactive(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        Ok(self.reply(&command_line(program, args)).output().status)
    }

    fn check_command_exists(&self, command: &str) -> bool {
        self.tools.contains(command)
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn lookup_user(&self, name: &str) -> Result<Option<UserInfo>> {
        Ok(self.users.get(name).cloned())
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        match self.files.borrow().get(path) {
            Some(content) => Ok(content.clone()),
            None => bail!("Failed to read file: {}", path.display()),
        }
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.files.borrow_mut().insert(
            path.to_path_buf(),
            String::from_utf8_lossy(content).to_string(),
        );
        Ok(())
    }

    fn mkdir_p(&self, path: &Path) -> Result<()> {
        self.dirs.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn chown(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        self.chowns.borrow_mut().push((path.to_path_buf(), uid, gid));
        Ok(())
    }
}

/// Serves fixed bodies and records every URL asked for
#[derive(Default)]
pub struct FakeSource {
    bodies: HashMap<String, String>,
    fetched: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl ManifestSource for FakeSource {
    fn fetch(&self, url: &str) -> Result<String> {
        self.fetched.borrow_mut().push(url.to_string());
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => bail!("HTTP 404 for {}", url),
        }
    }
}

pub fn nodes_json(ready: bool) -> String {
    let status = if ready { "True" } else { "False" };
    format!(
        r#"{{"items": [{{"metadata": {{"name": "devbox"}}, "status": {{"conditions": [{{"type": "Ready", "status": "{}"}}]}}}}]}}"#,
        status
    )
}

pub fn pods_json(ready: bool) -> String {
    let status = if ready { "True" } else { "False" };
    format!(
        r#"{{"items": [{{"metadata": {{"name": "controller-0"}}, "status": {{"phase": "Running", "conditions": [{{"type": "Ready", "status": "{}"}}]}}}}]}}"#,
        status
    )
}

pub const K3S_YAML: &str = "apiVersion: v1
clusters:
- cluster:
    server: https://127.0.0.1:6443
  name: default
contexts:
- context:
    cluster: default
    user: default
  name: default
current-context: default
kind: Config
users:
- name: default
  user:
    token: secret
";
