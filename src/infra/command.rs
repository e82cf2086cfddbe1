//! # Command Execution Module / 命令执行模块
//!
//! Rendering of step command templates and spawning of external tools with
//! their output captured. Every tool runs as the root of its own process tree
//! (a process group on Unix, a Job Object on Windows) and the whole tree is
//! killed when the step ends or is abandoned.
//!
//! 渲染步骤命令模板，并在捕获输出的情况下派生外部工具。
//! 每个工具都作为其自身进程树的根运行（Unix 上为进程组，Windows 上为 Job Object），
//! 当步骤结束或被放弃时，整个进程树都会被终止。

use anyhow::{Context, Result, anyhow};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use crate::infra::t;

/// Renders a command template into a program and its arguments.
///
/// Environment variables and `~` in the template are expanded and the result
/// is split the way a POSIX shell would split words. `{name}` placeholders are
/// substituted afterwards, inside each word, so a value containing spaces or
/// backslashes (a Windows path, say) always stays one intact argument. No
/// shell is involved when the command runs.
///
/// 将命令模板渲染为程序及其参数。
/// 先展开模板中的环境变量和 `~`，再按 POSIX shell 的方式拆分单词。
/// `{name}` 占位符随后在每个单词内部替换，因此包含空格或反斜杠的值（例如 Windows 路径）始终保持为一个完整参数。
/// 命令运行时不经过 shell。
pub fn render_command(template: &str, vars: &[(&str, &str)]) -> Result<Vec<String>> {
    let expanded = shellexpand::full(template)
        .with_context(|| t!("command.expand_failed", command = template).to_string())?
        .to_string();

    let words = shlex::split(&expanded)
        .ok_or_else(|| anyhow!("{}", t!("command.parse_failed", command = expanded)))?;

    if words.is_empty() {
        return Err(anyhow!("{}", t!("command.empty", command = template)));
    }

    Ok(words
        .into_iter()
        .map(|word| {
            vars.iter().fold(word, |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        })
        .collect())
}

/// Builds a `tokio::process::Command` from rendered parts.
/// The child is killed if the returned command (or its child) is dropped, and
/// on Unix it leads a new process group so its descendants can be killed too.
pub fn build_command(parts: &[String]) -> Command {
    let mut cmd = Command::new(&parts[0]);
    cmd.args(&parts[1..]).kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Owns the process tree of a spawned step. Dropping it kills every process
/// still in the tree, including ones the direct child left behind.
///
/// 拥有已派生步骤的进程树。丢弃它会终止树中仍存在的所有进程，包括直接子进程遗留的进程。
pub struct ProcessTree {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
    #[cfg(windows)]
    job: Option<job_object::JobObject>,
}

impl ProcessTree {
    /// Takes ownership of the tree rooted at `child`. The child must have
    /// been built by [`build_command`].
    #[cfg(unix)]
    pub fn attach(child: &Child) -> Self {
        Self {
            pgid: child
                .id()
                .and_then(|id| i32::try_from(id).ok())
                .map(nix::unistd::Pid::from_raw),
        }
    }

    #[cfg(windows)]
    pub fn attach(child: &Child) -> Self {
        Self {
            job: child.raw_handle().and_then(job_object::JobObject::assign),
        }
    }

    #[cfg(not(any(unix, windows)))]
    pub fn attach(_child: &Child) -> Self {
        Self {}
    }
}

impl Drop for ProcessTree {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // ESRCH just means the group is already gone.
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
        }
        #[cfg(windows)]
        drop(self.job.take());
    }
}

#[cfg(windows)]
mod job_object {
    use std::ffi::c_void;
    use std::mem::{size_of, zeroed};
    use std::ptr::null;
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
        JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
        SetInformationJobObject,
    };

    /// A Job Object that kills its processes when its last handle closes.
    pub struct JobObject(HANDLE);

    // The handle is only used to close the job.
    unsafe impl Send for JobObject {}
    unsafe impl Sync for JobObject {}

    impl JobObject {
        pub fn assign(process: std::os::windows::io::RawHandle) -> Option<Self> {
            // SAFETY: plain Win32 calls on handles owned by this function or
            // by the live child; every failure path closes the job handle.
            unsafe {
                let job = CreateJobObjectW(null(), null());
                if job.is_null() {
                    return None;
                }
                let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = zeroed();
                info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
                let configured = SetInformationJobObject(
                    job,
                    JobObjectExtendedLimitInformation,
                    &info as *const _ as *const c_void,
                    size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
                );
                if configured == 0 || AssignProcessToJobObject(job, process as HANDLE) == 0 {
                    CloseHandle(job);
                    return None;
                }
                Some(Self(job))
            }
        }
    }

    impl Drop for JobObject {
        fn drop(&mut self) {
            // SAFETY: the handle came from CreateJobObjectW and is closed once.
            unsafe {
                CloseHandle(self.0);
            }
        }
    }
}

/// Spawns a command and captures its stdout and stderr.
/// Both streams are read concurrently and interleaved line by line into a
/// single string.
///
/// When the direct child exits, whatever it left running in its process tree
/// is killed so the pipes close and the step cannot hang on a stray
/// descendant. Dropping the returned future kills the whole tree as well.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 两个流被并发读取，并逐行交错合并到一个字符串中。
/// 直接子进程退出后，其进程树中遗留的进程会被终止，使管道关闭，步骤不会因残留的后代进程而挂起。
/// 丢弃返回的 future 同样会终止整个进程树。
pub async fn spawn_and_capture(mut cmd: Command) -> (std::io::Result<ExitStatus>, String) {
    let mut child = match cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };
    let tree = ProcessTree::attach(&child);

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(std::io::Error::other(t!("command.capture_failed").to_string())),
            String::new(),
        );
    };

    let mut lines = LinesStream::new(BufReader::new(stdout).lines())
        .merge(LinesStream::new(BufReader::new(stderr).lines()));

    let reader = tokio::spawn(async move {
        let mut output = String::new();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    output.push_str(&line);
                    output.push('\n');
                }
                // Lines that are not valid UTF-8 are dropped.
                Err(_) => continue,
            }
        }
        output
    });

    let status = child.wait().await;
    drop(tree);
    let output = reader.await.unwrap_or_default();

    (status, output)
}
