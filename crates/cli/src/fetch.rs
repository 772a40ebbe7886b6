// ABOUTME: Retrieval of listing pages: plain HTTP, a headless browser, or a local file.
// ABOUTME: All fetchers share the Fetcher trait so the runner does not care where markup comes from.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use sitefeeds_scrape::FetchMode;

/// Desktop browser user agent; some sources refuse unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Returns the markup for a page.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP GET with a fixed user agent and timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "fetching over HTTP");
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("fetching {url}"))?;
        resp.text().with_context(|| format!("reading body of {url}"))
    }
}

/// Renders the page in headless Chromium and returns the serialized DOM.
pub struct BrowserFetcher {
    binary: String,
    user_agent: String,
    timeout: Duration,
}

impl BrowserFetcher {
    pub fn new(binary: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    fn args(&self, url: &str) -> Vec<String> {
        // Most of the budget goes to client-side rendering
        let budget_ms = self.timeout.as_millis() * 2 / 3;
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--window-size=1920,1080".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!("--virtual-time-budget={budget_ms}"),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }
}

impl Fetcher for BrowserFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!(url, browser = %self.binary, "fetching with headless browser");
        let mut child = Command::new(&self.binary)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("launching {}", self.binary))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("browser stdout was not captured"))?;
        // Drain on a thread so a large DOM cannot fill the pipe and stall the child
        let reader = thread::spawn(move || {
            let mut dom = String::new();
            stdout.read_to_string(&mut dom).map(|_| dom)
        });

        let deadline = Instant::now() + self.timeout;
        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = reader.join();
                bail!("{} timed out after {:?} on {url}", self.binary, self.timeout);
            }
            Err(e) => {
                let _ = reader.join();
                return Err(e.context(format!("waiting on {}", self.binary)));
            }
        };

        let dom = reader
            .join()
            .map_err(|_| anyhow!("browser output reader panicked"))?
            .context("reading browser output")?;
        if !status.success() {
            bail!("{} exited with {status} on {url}", self.binary);
        }
        Ok(dom)
    }
}

/// Polls `child` until it exits or `deadline` passes. On timeout or a
/// failed poll the child is killed and reaped before returning.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                stop(child);
                return Err(e.into());
            }
        }
        if Instant::now() >= deadline {
            stop(child);
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(100));
    }
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Reads a saved page from disk, ignoring the URL.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, _url: &str) -> Result<String> {
        if !self.path.exists() {
            bail!("file not found: {}", self.path.display());
        }
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))
    }
}

/// Fetchers for both modes, picked per source.
pub struct Fetchers {
    pub http: HttpFetcher,
    pub browser: BrowserFetcher,
}

impl Fetchers {
    pub fn for_mode(&self, mode: FetchMode) -> &dyn Fetcher {
        match mode {
            FetchMode::Http => &self.http,
            FetchMode::Browser => &self.browser,
        }
    }
}
