//! `signal-cli` as a subprocess.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::future::BoxFuture,
    serde::Deserialize,
    tokio::{
        io::{AsyncBufReadExt, BufReader, Lines},
        process::{Child, ChildStderr, ChildStdout, Command},
    },
    tracing::{debug, info},
};

use crate::{Error, Result};

/// How long `start_link` waits for signal-cli to print the device-link URI.
pub const LINK_URI_TIMEOUT: Duration = Duration::from_secs(300);

const LINK_URI_PREFIX: &str = "sgnl://linkdevice";

/// The account signal-cli is linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// E.164 phone number.
    pub number: String,
    pub uuid: Option<String>,
}

/// A device link in progress.
///
/// `uri` is ready as soon as signal-cli prints it; `completion` resolves once
/// the primary device has scanned it (or the process fails).
pub struct LinkSession {
    pub uri: String,
    pub completion: BoxFuture<'static, Result<()>>,
}

/// Operations the relay needs from a Signal client.
#[async_trait]
pub trait SignalClient: Send + Sync {
    /// Whether the client can run at all (binary present).
    fn is_available(&self) -> bool {
        true
    }

    /// The linked account, or `None` when unlinked or the link was revoked.
    async fn linked_account(&self) -> Result<Option<Account>>;

    /// Create a group owned by `account` and return its id.
    async fn create_group(&self, account: &str, name: &str) -> Result<String>;

    async fn send_group_message(&self, account: &str, group_id: &str, message: &str)
    -> Result<()>;

    /// Begin linking this host as a secondary device named `device_name`.
    async fn start_link(&self, device_name: &str) -> Result<LinkSession>;
}

/// Default signal-cli data directory (`~/.local/share/signal-cli` on Linux).
pub fn default_config_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("signal-cli"))
        .unwrap_or_else(|| PathBuf::from(".signal-cli"))
}

/// [`SignalClient`] that shells out to `signal-cli` with JSON output.
pub struct SignalCli {
    cli_path: PathBuf,
    binary: Option<PathBuf>,
    config_dir: PathBuf,
}

impl SignalCli {
    pub fn new(cli_path: impl Into<PathBuf>, config_dir: Option<PathBuf>) -> Self {
        let cli_path = cli_path.into();
        let binary = which::which(&cli_path).ok();
        Self {
            cli_path,
            binary,
            config_dir: config_dir.unwrap_or_else(default_config_dir),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn command(&self) -> Result<Command> {
        let binary = self.binary.as_ref().ok_or_else(|| Error::NotInstalled {
            path: self.cli_path.clone(),
        })?;
        let mut cmd = Command::new(binary);
        cmd.arg("--config").arg(&self.config_dir);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    async fn exec(&self, args: &[&str]) -> Result<Vec<u8>> {
        let mut cmd = self.command()?;
        cmd.arg("--output=json").args(args);
        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::cli(message));
        }
        Ok(output.stdout)
    }

    /// Ask the server whether the stored account is still authorised.
    async fn account_is_registered(&self, number: &str) -> Result<bool> {
        let mut cmd = self.command()?;
        cmd.args(["-a", number, "receive", "--timeout", "0"]);
        let output = cmd.output().await?;
        if output.status.success() {
            return Ok(true);
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).to_lowercase();
        combined.push_str(&String::from_utf8_lossy(&output.stderr).to_lowercase());
        Ok(!(combined.contains("not registered") || combined.contains("authorization failed")))
    }

    /// Remove account state left over from a previous link.
    async fn clear_previous_link(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;

        let mut entries = tokio::fs::read_dir(&self.config_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() && entry.file_name().to_string_lossy().starts_with('+')
            {
                tokio::fs::remove_dir_all(entry.path()).await?;
            }
        }

        match tokio::fs::remove_dir_all(self.config_dir.join("data")).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Deserialize)]
struct AccountEntry {
    number: String,
    #[serde(default)]
    uuid: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupCreated {
    group_id: String,
}

/// First account listed in signal-cli's `data/accounts.json`.
pub(crate) fn parse_accounts_file(data: &[u8]) -> Result<Option<Account>> {
    let file: AccountsFile = serde_json::from_slice(data)?;
    Ok(file.accounts.into_iter().next().map(|a| Account {
        number: a.number,
        uuid: a.uuid,
    }))
}

/// Group id from `updateGroup` JSON output (one object per line).
pub(crate) fn parse_group_id(output: &[u8]) -> Option<String> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<GroupCreated>(line).ok())
        .map(|created| created.group_id)
        .find(|id| !id.is_empty())
}

/// The `sgnl://linkdevice?...` token in a line of link output.
pub(crate) fn extract_link_uri(line: &str) -> Option<String> {
    let start = line.find(LINK_URI_PREFIX)?;
    let rest = &line[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

async fn read_link_uri(
    stdout: &mut Lines<BufReader<ChildStdout>>,
    stderr: &mut Lines<BufReader<ChildStderr>>,
) -> Result<String> {
    let (mut stdout_open, mut stderr_open) = (true, true);
    while stdout_open || stderr_open {
        let line = tokio::select! {
            line = stdout.next_line(), if stdout_open => match line? {
                Some(line) => line,
                None => {
                    stdout_open = false;
                    continue;
                },
            },
            line = stderr.next_line(), if stderr_open => match line? {
                Some(line) => line,
                None => {
                    stderr_open = false;
                    continue;
                },
            },
        };
        if let Some(uri) = extract_link_uri(&line) {
            return Ok(uri);
        }
        debug!(line = %line, "signal-cli link output");
    }
    Err(Error::cli("link exited without printing a device URI"))
}

/// Drain both pipes and wait for the link process to exit.
async fn wait_for_link(
    mut child: Child,
    mut stdout: Lines<BufReader<ChildStdout>>,
    mut stderr: Lines<BufReader<ChildStderr>>,
) -> Result<()> {
    let drain_stdout = async { while let Ok(Some(_)) = stdout.next_line().await {} };
    let last_stderr = async {
        let mut last = String::new();
        while let Ok(Some(line)) = stderr.next_line().await {
            if !line.trim().is_empty() {
                last = line;
            }
        }
        last
    };
    let ((), last) = tokio::join!(drain_stdout, last_stderr);

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else if last.is_empty() {
        Err(Error::cli(format!("link exited with {status}")))
    } else {
        Err(Error::cli(last))
    }
}

#[async_trait]
impl SignalClient for SignalCli {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    async fn linked_account(&self) -> Result<Option<Account>> {
        if self.binary.is_none() {
            return Ok(None);
        }

        let path = self.config_dir.join("data").join("accounts.json");
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(account) = parse_accounts_file(&data)? else {
            return Ok(None);
        };

        if !self.account_is_registered(&account.number).await? {
            return Ok(None);
        }
        Ok(Some(account))
    }

    async fn create_group(&self, account: &str, name: &str) -> Result<String> {
        let output = self.exec(&["-a", account, "updateGroup", "-n", name]).await?;
        parse_group_id(&output)
            .ok_or_else(|| Error::cli("could not parse group id from updateGroup output"))
    }

    async fn send_group_message(
        &self,
        account: &str,
        group_id: &str,
        message: &str,
    ) -> Result<()> {
        self.exec(&[
            "-a",
            account,
            "send",
            "-g",
            group_id,
            "--notify-self",
            "-m",
            message,
        ])
        .await?;
        Ok(())
    }

    async fn start_link(&self, device_name: &str) -> Result<LinkSession> {
        self.clear_previous_link().await?;

        let mut cmd = self.command()?;
        cmd.args(["link", "-n", device_name]);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let mut child = cmd.spawn()?;

        let mut stdout = BufReader::new(
            child
                .stdout
                .take()
                .ok_or_else(|| Error::cli("link stdout unavailable"))?,
        )
        .lines();
        let mut stderr = BufReader::new(
            child
                .stderr
                .take()
                .ok_or_else(|| Error::cli("link stderr unavailable"))?,
        )
        .lines();

        let uri = tokio::time::timeout(LINK_URI_TIMEOUT, read_link_uri(&mut stdout, &mut stderr))
            .await
            .map_err(|_| Error::cli("timed out waiting for the device link URI"))??;

        info!(device_name, "signal device link started");
        Ok(LinkSession {
            uri,
            completion: Box::pin(wait_for_link(child, stdout, stderr)),
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_link_uri_from_output() {
        let line = "Link using: sgnl://linkdevice?uuid=abc&pub_key=xyz  (scan)";
        assert_eq!(
            extract_link_uri(line).as_deref(),
            Some("sgnl://linkdevice?uuid=abc&pub_key=xyz")
        );
        assert_eq!(
            extract_link_uri("sgnl://linkdevice?uuid=1").as_deref(),
            Some("sgnl://linkdevice?uuid=1")
        );
        assert!(extract_link_uri("INFO starting").is_none());
    }

    #[test]
    fn parses_first_account() {
        let data = br#"{"accounts":[{"number":"+15551234567","uuid":"u-1","path":"x"},{"number":"+2"}]}"#;
        let account = parse_accounts_file(data).unwrap().unwrap();
        assert_eq!(account.number, "+15551234567");
        assert_eq!(account.uuid.as_deref(), Some("u-1"));

        assert!(parse_accounts_file(br#"{"accounts":[]}"#).unwrap().is_none());
        assert!(parse_accounts_file(b"not json").is_err());
    }

    #[test]
    fn parses_group_id_from_json_lines() {
        let output = b"\n{\"type\":\"progress\"}\n{\"groupId\":\"Zm9vYmFy\",\"timestamp\":1}\n";
        assert_eq!(parse_group_id(output).as_deref(), Some("Zm9vYmFy"));
        assert!(parse_group_id(b"{\"groupId\":\"\"}").is_none());
        assert!(parse_group_id(b"").is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let client = SignalCli::new(
            "definitely-not-signal-cli-on-path",
            Some(dir.path().to_path_buf()),
        );
        assert!(!client.is_available());
        assert!(client.linked_account().await.unwrap().is_none());
        assert!(matches!(
            client.create_group("+1", "app").await,
            Err(Error::NotInstalled { .. })
        ));
    }
}
