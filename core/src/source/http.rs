use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use super::{build_transform, default_connection_timeout, default_name_pattern, default_retry_count, default_retry_delay_seconds};
use crate::error::FetchError;
use crate::fetch::fetch_file;
use crate::reporter::ResultHandler;
use crate::transform::TransformConfig;

fn filename_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn client_for(connection_timeout_secs: u64) -> Result<Client, FetchError> {
    Ok(Client::builder().timeout(Duration::from_secs(connection_timeout_secs)).build()?)
}

///
/// Shared retry/fetch loop used by all three HTTP-family sources: try the fetch, and on
/// failure retry up to `retry_count` times with a linearly increasing delay.
///
fn fetch_urls(
    client: &Client,
    urls_names: &[(String, String)],
    reporter: &dyn ResultHandler,
    target_dir: &std::path::Path,
    transform: &Option<TransformConfig>,
    override_existing: bool,
    retry_count: u32,
    retry_delay_seconds: f64,
) -> Result<(), FetchError> {
    let transform = build_transform(transform)?;

    for (url, target_name) in urls_names {
        let mut attempt_count = 0u32;

        loop {
            let succeeded = fetch_file(
                url,
                |tmp| {
                    match client.get(url).send() {
                        Ok(response) if response.status().is_success() => {
                            let mut response = response;
                            match std::fs::File::create(tmp) {
                                Ok(mut file) => {
                                    let mut buf = [0u8; 4096];
                                    let mut ok = true;
                                    loop {
                                        use std::io::Read;
                                        match response.read(&mut buf) {
                                            Ok(0) => break,
                                            Ok(n) => {
                                                if file.write_all(&buf[..n]).is_err() {
                                                    ok = false;
                                                    break;
                                                }
                                            }
                                            Err(_) => { ok = false; break; }
                                        }
                                    }
                                    ok
                                }
                                Err(_) => false,
                            }
                        }
                        Ok(response) => {
                            let status = response.status();
                            let body = response.text().unwrap_or_default();
                            reporter.file_error(url, &format!("Status code {}", status), &body);
                            false
                        }
                        Err(err) => {
                            reporter.file_error(url, "Connection error", &err.to_string());
                            false
                        }
                    }
                },
                reporter,
                target_name,
                target_dir,
                transform.as_deref(),
                override_existing,
            );

            if succeeded || attempt_count >= retry_count {
                break;
            }

            attempt_count += 1;
            thread::sleep(Duration::from_secs_f64(retry_delay_seconds * attempt_count as f64));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpFilesSource {
    pub target_dir: PathBuf,
    pub url: Option<String>,
    pub urls: Option<Vec<String>>,
    pub filename_transform: Option<TransformConfig>,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
}

impl HttpFilesSource {
    fn all_urls(&self) -> Vec<String> {
        let mut urls = self.urls.clone().unwrap_or_default();
        if let Some(url) = &self.url {
            urls.push(url.clone());
        }
        urls
    }

    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        let all_urls = self.all_urls();
        if all_urls.is_empty() {
            return Err(FetchError::Remote { uri: "<http-files>".into(), reason: "requires either 'url' or 'urls'".into() });
        }

        let client = client_for(self.connection_timeout)?;
        let urls_names: Vec<(String, String)> = all_urls.iter()
            .map(|u| (u.clone(), filename_from_url(u).to_string()))
            .collect();

        fetch_urls(&client, &urls_names, reporter, &self.target_dir, &self.filename_transform, true, self.retry_count, self.retry_delay_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpListingSource {
    pub target_dir: PathBuf,
    pub url: Option<String>,
    pub urls: Option<Vec<String>>,
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
    pub filename_transform: Option<TransformConfig>,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
}

impl HttpListingSource {
    fn all_urls(&self) -> Vec<String> {
        let mut urls = self.urls.clone().unwrap_or_default();
        if let Some(url) = &self.url {
            urls.push(url.clone());
        }
        urls
    }

    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        let all_urls = self.all_urls();
        if all_urls.is_empty() {
            return Err(FetchError::Remote { uri: "<http-directory>".into(), reason: "requires either 'url' or 'urls'".into() });
        }

        let client = client_for(self.connection_timeout)?;
        let name_pattern = Regex::new(&self.name_pattern)
            .map_err(|e| FetchError::Remote { uri: "<http-directory>".into(), reason: e.to_string() })?;

        for url in &all_urls {
            let response = client.get(url).send()?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                log::debug!("Listing page {} doesn't exist yet, skipping", url);
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                return Err(FetchError::Remote { uri: url.clone(), reason: format!("Status code {}\n\n{}", status, body) });
            }

            let final_url = response.url().to_string();
            let body = response.text()?;
            let document = Html::parse_document(&body);
            let anchor_selector = Selector::parse("a").expect("static selector");

            let mut urls_names = Vec::new();
            for anchor in document.select(&anchor_selector) {
                let href = match anchor.value().attr("href") {
                    Some(href) => href,
                    None => continue,
                };

                let name: String = anchor.text().collect();
                if name.is_empty() {
                    log::info!("Skipping empty anchor for {}", href);
                    continue;
                }

                if !href.ends_with(name.as_str()) {
                    log::info!("Not a filename {:?}, skipping", name);
                    continue;
                }

                if !name_pattern.is_match(&name) {
                    log::info!("Filename {:?} doesn't match pattern, skipping", name);
                    continue;
                }

                let source_url = match reqwest::Url::parse(&final_url).and_then(|base| base.join(href)) {
                    Ok(joined) => joined.to_string(),
                    Err(_) => continue,
                };

                urls_names.push((source_url, name));
            }

            fetch_urls(&client, &urls_names, reporter, &self.target_dir, &self.filename_transform, false, self.retry_count, self.retry_delay_seconds)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssSource {
    pub target_dir: PathBuf,
    pub url: Option<String>,
    pub urls: Option<Vec<String>>,
    pub filename_transform: Option<TransformConfig>,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
}

impl RssSource {
    fn all_urls(&self) -> Vec<String> {
        let mut urls = self.urls.clone().unwrap_or_default();
        if let Some(url) = &self.url {
            urls.push(url.clone());
        }
        urls
    }

    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        let all_urls = self.all_urls();
        if all_urls.is_empty() {
            return Err(FetchError::Remote { uri: "<rss>".into(), reason: "requires either 'url' or 'urls'".into() });
        }

        let client = client_for(self.connection_timeout)?;

        for url in &all_urls {
            let response = client.get(url).send()?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                return Err(FetchError::Remote { uri: url.clone(), reason: format!("Status code {}\n\n{}", status, body) });
            }

            let body = response.bytes()?;
            let channel = rss::Channel::read_from(&body[..])
                .map_err(|e| FetchError::Remote { uri: url.clone(), reason: e.to_string() })?;

            let urls_names: Vec<(String, String)> = channel.items().iter()
                .filter_map(|item| match (item.link(), item.title()) {
                    (Some(link), Some(title)) => Some((link.to_string(), title.to_string())),
                    _ => None,
                })
                .collect();

            fetch_urls(&client, &urls_names, reporter, &self.target_dir, &self.filename_transform, false, self.retry_count, self.retry_delay_seconds)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_filename_from_url() {
        assert_eq!(filename_from_url("http://example.com/somefile.zip"), "somefile.zip");
        assert_eq!(filename_from_url("http://oceandata.sci.gsfc.nasa.gov/Ancillary/LUTs/modis/utcpole.dat"), "utcpole.dat");
    }
}
