// src/services/browser.rs

//! Headless Chrome page source for script-rendered pages.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use url::Url;

use crate::error::{AppError, Result};
use crate::services::{PageSource, RawPage};

struct Session {
    // Dropping the browser closes Chrome; keep it next to its tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

struct Inner {
    headless: bool,
    session: Mutex<Option<Session>>,
}

/// Renders pages in a browser tab.
///
/// The browser starts lazily. A tab that fails to navigate is treated as
/// stale: the session is dropped and a new one is launched on the next
/// request. The browser exposes no HTTP status, so rendered pages report
/// 200.
pub struct BrowserSource {
    inner: Arc<Inner>,
}

impl BrowserSource {
    pub fn new(headless: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                headless,
                session: Mutex::new(None),
            }),
        }
    }
}

impl Inner {
    fn launch(&self) -> Result<Session> {
        log::info!("Launching browser (headless: {})", self.headless);
        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .build()
            .map_err(|e| AppError::config(format!("browser launch options: {e}")))?;
        let browser = Browser::new(options).map_err(|e| AppError::Transport(e.to_string()))?;
        let tab = browser.new_tab().map_err(|e| AppError::Transport(e.to_string()))?;
        Ok(Session {
            _browser: browser,
            tab,
        })
    }

    fn render(&self, url: &str) -> Result<String> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Transport("browser session lock poisoned".into()))?;

        let tab = match session.as_ref() {
            Some(existing) => Arc::clone(&existing.tab),
            None => {
                let fresh = self.launch()?;
                let tab = Arc::clone(&fresh.tab);
                *session = Some(fresh);
                tab
            }
        };

        let rendered = tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .and_then(|tab| tab.get_content());

        rendered.map_err(|e| {
            log::warn!("Browser session failed on {url}; it will be recreated: {e}");
            *session = None;
            AppError::Transport(format!("{url}: {e}"))
        })
    }
}

#[async_trait]
impl PageSource for BrowserSource {
    async fn get(&self, url: &Url) -> Result<RawPage> {
        let inner = Arc::clone(&self.inner);
        let target = url.to_string();
        let body = tokio::task::spawn_blocking(move || inner.render(&target))
            .await
            .map_err(|e| AppError::Transport(format!("browser task failed: {e}")))??;

        Ok(RawPage {
            url: url.clone(),
            status: 200,
            body,
        })
    }
}
