//! Gateway reboot over the admin telnet interface.
//!
//! EW11-class serial gateways expose a line-based admin shell on TCP.
//! Recovery logs in with the configured credentials and issues the
//! restart command; the gateway drops the connection while rebooting, so
//! no reply is awaited.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use crate::config::GatewaySettings;
use crate::watchdog::RecoveryAction;

const LOGIN_PROMPT: &[u8] = b"login:";
const PASSWORD_PROMPT: &[u8] = b"password:";
const RESTART_COMMAND: &[u8] = b"Restart\n";

/// Per-step timeout for the admin dialogue.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Reboots the serial gateway through its admin shell.
pub struct GatewayRebooter {
    settings: GatewaySettings,
}

impl GatewayRebooter {
    /// New rebooter for the configured gateway.
    pub fn new(settings: GatewaySettings) -> Self {
        GatewayRebooter { settings }
    }

    async fn read_until(stream: &mut TcpStream, marker: &[u8]) -> anyhow::Result<()> {
        let mut seen = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = tokio::time::timeout(STEP_TIMEOUT, stream.read(&mut buf))
                .await
                .context("timed out waiting for gateway prompt")??;
            if n == 0 {
                anyhow::bail!("gateway closed the admin connection");
            }
            seen.extend_from_slice(&buf[..n]);
            if contains(&seen, marker) {
                return Ok(());
            }
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[async_trait]
impl RecoveryAction for GatewayRebooter {
    async fn recover(&self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        info!(addr = %addr, "rebooting serial gateway");
        let mut stream = tokio::time::timeout(STEP_TIMEOUT, TcpStream::connect(&addr))
            .await
            .context("timed out connecting to gateway admin port")?
            .with_context(|| format!("cannot connect to gateway at {addr}"))?;

        Self::read_until(&mut stream, LOGIN_PROMPT).await?;
        stream
            .write_all(format!("{}\n", self.settings.username).as_bytes())
            .await
            .context("cannot send gateway username")?;
        Self::read_until(&mut stream, PASSWORD_PROMPT).await?;
        stream
            .write_all(format!("{}\n", self.settings.password).as_bytes())
            .await
            .context("cannot send gateway password")?;
        stream
            .write_all(RESTART_COMMAND)
            .await
            .context("cannot send gateway restart command")?;
        stream.flush().await.ok();
        Ok(())
    }

    fn describe(&self) -> &str {
        "gateway-reboot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_admin_dialogue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            write_half.write_all(b"gateway login: ").await.unwrap();
            let user = lines.next_line().await.unwrap().unwrap();
            write_half.write_all(b"password: ").await.unwrap();
            let pass = lines.next_line().await.unwrap().unwrap();
            let cmd = lines.next_line().await.unwrap().unwrap();
            (user, pass, cmd)
        });

        let rebooter = GatewayRebooter::new(GatewaySettings {
            host: addr.ip().to_string(),
            port: addr.port(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        });
        rebooter.recover().await.unwrap();

        let (user, pass, cmd) = server.await.unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "secret");
        assert_eq!(cmd, "Restart");
    }

    #[tokio::test]
    async fn test_connect_refused_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let rebooter = GatewayRebooter::new(GatewaySettings {
            host: addr.ip().to_string(),
            port: addr.port(),
            username: "admin".to_string(),
            password: "admin".to_string(),
        });
        assert!(rebooter.recover().await.is_err());
    }
}
