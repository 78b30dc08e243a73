//! Stock-photo scraper
//!
//! Fetches search result pages, extracts every `<img>` source, and downloads
//! the deduplicated set into a freshly recreated folder. Purely best-effort:
//! individual page or image failures are skipped and the run continues; there
//! is no retry, no rate limiting and no robots.txt handling.

use crate::config::ScrapeConfig;
use crate::error::{Result, ShoecutError};
use futures_util::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

/// Domains that accept a mechanically appended page-number parameter
const PAGINATED_DOMAINS: &[(&str, &str)] = &[
    ("shutterstock.com", "&page="),
    ("freepik.com", "&page="),
    ("dreamstime.com", "?pg="),
];

/// Counters reported at the end of a scraping run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeSummary {
    /// Pages visited (including failed fetches)
    pub pages_visited: usize,
    /// Unique image sources collected across all pages
    pub unique_sources: usize,
    /// Images written to the destination folder
    pub downloaded: usize,
    /// Sources skipped for their `.webp` extension
    pub skipped_webp: usize,
}

/// Progress bar abstraction that works with and without CLI features
enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn for_phase(len: u64, message: &'static str, enabled: bool) -> Self {
        #[cfg(feature = "cli")]
        {
            if enabled {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb.set_message(message);
                return Self::Indicatif(pb);
            }
        }
        let _ = (len, message, enabled);
        Self::NoOp
    }

    fn inc(&self) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.inc(1),
            Self::NoOp => {},
        }
    }

    fn finish(&self) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish(),
            Self::NoOp => {},
        }
    }
}

/// Best-effort image scraper over a fixed list of search pages
pub struct ImageScraper {
    client: Client,
    config: ScrapeConfig,
}

impl ImageScraper {
    /// Create a new scraper
    ///
    /// # Errors
    /// - Failed to construct the HTTP client
    pub fn new(config: ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ShoecutError::network("create HTTP client", &e))?;
        Ok(Self { client, config })
    }

    /// Run the full scrape: recreate the folder, collect sources, download
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError::Io` when the destination folder cannot be
    /// recreated. Per-page and per-image failures are skipped, not surfaced.
    pub async fn run(&self) -> Result<ScrapeSummary> {
        self.reset_output_dir()?;

        let pages = self.page_urls();
        info!(pages = pages.len(), "starting page fetch phase");

        let bar = ProgressIndicator::for_phase(
            pages.len() as u64,
            "Fetching pages",
            self.config.show_progress,
        );
        let mut sources = Vec::new();
        for url in &pages {
            match self.fetch_page(url).await {
                Ok(html) => sources.extend(extract_image_sources(&html)),
                Err(e) => debug!(url = %url, error = %e, "page fetch failed, skipping"),
            }
            bar.inc();
        }
        bar.finish();

        let unique: Vec<String> = sources
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        info!(sources = unique.len(), "starting image download phase");

        let bar = ProgressIndicator::for_phase(
            unique.len() as u64,
            "Downloading images",
            self.config.show_progress,
        );
        let mut summary = ScrapeSummary {
            pages_visited: pages.len(),
            unique_sources: unique.len(),
            ..ScrapeSummary::default()
        };
        for src in &unique {
            let extension = source_extension(src);
            if extension == ".webp" {
                summary.skipped_webp += 1;
                bar.inc();
                continue;
            }

            let file_name = format!("{}{}", summary.downloaded, extension);
            let destination = self.config.output_dir.join(file_name);
            match self.download_image(src, &destination).await {
                Ok(()) => summary.downloaded += 1,
                Err(e) => debug!(src = %src, error = %e, "image download failed, skipping"),
            }
            bar.inc();
        }
        bar.finish();

        info!(
            downloaded = summary.downloaded,
            skipped_webp = summary.skipped_webp,
            "scrape complete"
        );
        Ok(summary)
    }

    /// Seed URLs followed by their mechanically paginated variants
    #[must_use]
    pub fn page_urls(&self) -> Vec<String> {
        let mut urls = self.config.seed_urls.clone();
        for seed in &self.config.seed_urls {
            for (domain, parameter) in PAGINATED_DOMAINS {
                if seed.contains(domain) {
                    for page in self.config.page_range.clone() {
                        urls.push(format!("{seed}{parameter}{page}"));
                    }
                    break;
                }
            }
        }
        urls
    }

    /// Delete and recreate the destination folder
    fn reset_output_dir(&self) -> Result<()> {
        let dir = &self.config.output_dir;
        if dir.exists() {
            fs::remove_dir_all(dir)
                .map_err(|e| ShoecutError::file_io_error("clear destination folder", dir, e))?;
        }
        fs::create_dir_all(dir)
            .map_err(|e| ShoecutError::file_io_error("create destination folder", dir, e))?;
        Ok(())
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ShoecutError::network(format!("fetch page '{url}'"), &e))?;
        response
            .text()
            .await
            .map_err(|e| ShoecutError::network(format!("read page body '{url}'"), &e))
    }

    /// Stream one image to disk
    async fn download_image(&self, src: &str, destination: &Path) -> Result<()> {
        let response = self
            .client
            .get(src)
            .send()
            .await
            .map_err(|e| ShoecutError::network(format!("fetch image '{src}'"), &e))?
            .error_for_status()
            .map_err(|e| ShoecutError::network(format!("fetch image '{src}'"), &e))?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| ShoecutError::file_io_error("create image file", destination, e))?;
        tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| ShoecutError::file_io_error("write image file", destination, e))?;
        Ok(())
    }
}

/// Extract the `src` attribute of every `<img>` tag in the document
#[must_use]
pub fn extract_image_sources(html: &str) -> Vec<String> {
    let document = scraper::Html::parse_document(html);
    let Ok(selector) = scraper::Selector::parse("img") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .map(ToString::to_string)
        .collect()
}

/// File extension of a source URL including the leading dot, or empty
///
/// Query string and fragment are ignored; the extension is whatever follows
/// the last dot of the path's final segment.
#[must_use]
pub fn source_extension(url: &str) -> String {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let basename = path.rsplit('/').next().unwrap_or_default();
    match basename.rfind('.') {
        Some(position) if position > 0 => basename
            .get(position..)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_page_urls_pagination() {
        let config = ScrapeConfig::default();
        let scraper = ImageScraper::new(config.clone()).unwrap();
        let urls = scraper.page_urls();

        // 4 seeds; 3 of them paginate over 23 pages each
        assert_eq!(urls.len(), 4 + 3 * 23);
        assert!(urls.contains(&format!("{}&page=2", config.seed_urls[0])));
        assert!(urls.contains(&format!("{}?pg=24", config.seed_urls[2])));
        // pexels does not paginate
        assert!(!urls.iter().any(|u| u.contains("pexels") && u.contains("page")));
    }

    #[test]
    fn test_extract_image_sources() {
        let html = r#"
            <html><body>
              <img src="https://cdn.example.com/a.jpg">
              <img alt="no source">
              <div><img src="/relative/b.png"/></div>
            </body></html>
        "#;
        let sources = extract_image_sources(html);
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&"https://cdn.example.com/a.jpg".to_string()));
        assert!(sources.contains(&"/relative/b.png".to_string()));
    }

    #[test]
    fn test_source_dedup_is_set_based() {
        let sources = vec![
            "a.jpg".to_string(),
            "a.jpg".to_string(),
            "b.png".to_string(),
        ];
        let unique: HashSet<String> = sources.into_iter().collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension("https://cdn.example.com/img/photo.jpg"), ".jpg");
        assert_eq!(source_extension("https://cdn.example.com/photo.png?w=640"), ".png");
        assert_eq!(source_extension("https://cdn.example.com/photo.webp"), ".webp");
        assert_eq!(source_extension("https://cdn.example.com/photo"), "");
        assert_eq!(source_extension("https://cdn.example.com/archive.tar.gz"), ".gz");
    }

    #[test]
    fn test_webp_sources_are_skipped() {
        let sources = ["a.jpg", "b.webp", "c.png", "d.webp?size=2"];
        let kept: Vec<&&str> = sources
            .iter()
            .filter(|s| source_extension(s) != ".webp")
            .collect();
        assert_eq!(kept.len(), 2);
    }
}
