/// Reading files the current user has no permission for.
///
/// The privileged command's stdout is redirected into a temp file that is
/// removed when it drops, whether the read succeeded, failed or was
/// interrupted.
use std::io::Read;
use std::path::Path;
use std::process::Stdio;

use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::error::SessionError;

/// Run `<prefix...> cat -- <path>` with the terminal's stdin and stderr so a
/// password prompt can be answered, then return the captured bytes as text.
///
/// An empty prefix runs plain `cat`.
pub async fn read_elevated(prefix: &[String], path: &str) -> Result<String, SessionError> {
    read_elevated_in(&std::env::temp_dir(), prefix, path).await
}

/// Same as [`read_elevated`], with the temp file created under `tmp_dir`.
async fn read_elevated_in(
    tmp_dir: &Path,
    prefix: &[String],
    path: &str,
) -> Result<String, SessionError> {
    let mut tmp = NamedTempFile::new_in(tmp_dir)
        .map_err(|e| SessionError::ElevatedReadFailed(format!("temp file: {e}")))?;
    let stdout = tmp
        .reopen()
        .map_err(|e| SessionError::ElevatedReadFailed(format!("temp file: {e}")))?;

    let (program, args) = match prefix.split_first() {
        Some((first, rest)) => (first.as_str(), rest),
        None => ("cat", &[][..]),
    };
    let mut cmd = Command::new(program);
    cmd.args(args);
    if !prefix.is_empty() {
        cmd.arg("cat");
    }
    cmd.arg("--")
        .arg(path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    // Raw mode is off while the read runs, so ctrl+c arrives as SIGINT.
    // The listener must exist before the child can prompt.
    let mut interrupt = Interrupt::listen()
        .map_err(|e| SessionError::ElevatedReadFailed(format!("signal handler: {e}")))?;

    tracing::info!(%program, %path, "elevated read");
    let mut child = cmd
        .spawn()
        .map_err(|e| SessionError::ElevatedReadFailed(format!("{program}: {e}")))?;

    let status = tokio::select! {
        status = child.wait() => {
            status.map_err(|e| SessionError::ElevatedReadFailed(format!("{program}: {e}")))?
        }
        _ = interrupt.recv() => {
            tracing::warn!(%path, "elevated read interrupted");
            if child.kill().await.is_err() {
                let _ = child.wait().await;
            }
            return Err(SessionError::ElevatedReadFailed("interrupted".to_string()));
        }
    };
    if !status.success() {
        return Err(SessionError::ElevatedReadFailed(format!(
            "{program} exited with {status}"
        )));
    }

    let mut bytes = Vec::new();
    tmp.as_file_mut()
        .read_to_end(&mut bytes)
        .map_err(|e| SessionError::ElevatedReadFailed(format!("reading temp file: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// SIGINT listener, registered eagerly.
struct Interrupt {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl Interrupt {
    fn listen() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            signal: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            self.signal.recv().await;
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // SIGINT is process-wide; reads must not overlap with the interrupt test.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_plain_read_without_prefix() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("secret.conf");
        std::fs::write(&file, "key = value\n").unwrap();

        let got = read_elevated(&[], file.to_str().unwrap()).await.unwrap();
        assert_eq!(got, "key = value\n");
    }

    #[tokio::test]
    async fn test_prefix_runs_before_cat() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();

        let prefix = vec!["env".to_string()];
        let got = read_elevated(&prefix, file.to_str().unwrap()).await.unwrap();
        assert_eq!(got, "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let _guard = serial();
        let err = read_elevated(&[], "/definitely/not/here").await.unwrap_err();
        assert!(matches!(err, SessionError::ElevatedReadFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_escalation_program_is_failure() {
        let _guard = serial();
        let prefix = vec!["huh-no-such-sudo".to_string()];
        let err = read_elevated(&prefix, "/etc/hostname").await.unwrap_err();
        assert!(matches!(err, SessionError::ElevatedReadFailed(_)));
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_every_outcome() {
        let _guard = serial();
        let data = tempfile::tempdir().unwrap();
        let file = data.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let got = read_elevated_in(tmp.path(), &[], file.to_str().unwrap()).await;
        assert_eq!(got.unwrap(), "hello");
        assert!(is_empty_dir(tmp.path()));

        let missing = read_elevated_in(tmp.path(), &[], "/definitely/not/here").await;
        assert!(missing.is_err());
        assert!(is_empty_dir(tmp.path()));

        let prefix = vec!["huh-no-such-sudo".to_string()];
        let unspawnable = read_elevated_in(tmp.path(), &prefix, file.to_str().unwrap()).await;
        assert!(unspawnable.is_err());
        assert!(is_empty_dir(tmp.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_fails_read_and_cleans_up() {
        let _guard = serial();
        let data = tempfile::tempdir().unwrap();
        let file = data.path().join("secret");
        std::fs::write(&file, "secret").unwrap();
        let tmp = tempfile::tempdir().unwrap();

        // Interrupt ourselves the way a ctrl+c at the password prompt would.
        let prefix: Vec<String> = ["sh", "-c", "kill -INT $PPID; sleep 5; exec \"$@\"", "sh"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = read_elevated_in(tmp.path(), &prefix, file.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::ElevatedReadFailed("interrupted".to_string()));
        assert!(is_empty_dir(tmp.path()));
    }
}
