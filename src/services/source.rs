// src/services/source.rs

//! Page retrieval backends.
//!
//! A `PageSource` performs exactly one request and reports what came back.
//! Retries, politeness and status interpretation live in the `Fetcher`.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// A retrieved page.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl RawPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Statuses that say the page does not exist (end of a listing).
    pub fn is_gone(&self) -> bool {
        matches!(self.status, 404 | 410)
    }

    /// Statuses worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

/// One-shot page retrieval.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawPage>;
}

/// Plain HTTP retrieval for statically rendered pages.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn get(&self, url: &Url) -> Result<RawPage> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawPage {
            url: url.clone(),
            status,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory page source for unit tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::error::AppError;

    /// Serves canned responses; unknown URLs answer 404.
    #[derive(Default)]
    pub struct CannedSource {
        pages: Mutex<HashMap<String, Vec<Result<(u16, String)>>>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl CannedSource {
        /// Always answer `url` with `status` and `body`.
        pub fn page(self, url: &str, status: u16, body: &str) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), vec![Ok((status, body.to_string()))]);
            self
        }

        /// Answer `url` with each response in turn; the last one repeats.
        pub fn sequence(self, url: &str, responses: Vec<Result<(u16, String)>>) -> Self {
            self.pages.lock().unwrap().insert(url.to_string(), responses);
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageSource for CannedSource {
        async fn get(&self, url: &Url) -> Result<RawPage> {
            self.requests.lock().unwrap().push(url.to_string());
            let mut pages = self.pages.lock().unwrap();
            let response = match pages.get_mut(url.as_str()) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) => match queue.first() {
                    Some(Ok(ok)) => Ok(ok.clone()),
                    Some(Err(e)) => Err(AppError::Transport(e.to_string())),
                    None => Ok((404, String::new())),
                },
                None => Ok((404, String::new())),
            };
            response.map(|(status, body)| RawPage {
                url: url.clone(),
                status,
                body,
            })
        }
    }
}
