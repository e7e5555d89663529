//! Image resolution: topic → search → first result → local file.
//!
//! The stored filename is derived from the topic, not from the remote URL,
//! so repeated runs on the same topic overwrite the same file:
//!
//! ```text
//! "Docker & Kubernetes!"  +  https://x.example/k8s.PNG?w=800
//!        └─ first 5 words, [A-Za-z0-9_] only, lower-cased ─┘   └─ ext allow-list ─┘
//!                        images/docker_kubernetes.png
//! ```
//!
//! Every failure here is an [`ImageIssue`]; the caller degrades to a
//! text-only document.

use crate::config::NotesConfig;
use crate::error::ImageIssue;
use crate::pipeline::search;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extensions kept from the source URL; anything else is stored as `jpg`.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

const MAX_NAME_WORDS: usize = 5;
const FALLBACK_STEM: &str = "image";

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());

/// A downloaded image on local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Filesystem-safe stem from the first five words of the topic.
pub fn image_stem(topic: &str) -> String {
    let words: Vec<String> = topic
        .split_whitespace()
        .take(MAX_NAME_WORDS)
        .map(|w| RE_UNSAFE.replace_all(w, "").to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        words.join("_")
    }
}

/// Extension of the URL's last path segment, restricted to [`ALLOWED_EXTENSIONS`].
pub fn image_extension(url: &str) -> &'static str {
    let ext = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .and_then(|last| {
            Path::new(&last)
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
        });

    ext.and_then(|e| ALLOWED_EXTENSIONS.iter().copied().find(|a| *a == e))
        .unwrap_or("jpg")
}

/// Full filename (`<stem>.<ext>`) for a topic and source URL.
pub fn image_file_name(topic: &str, url: &str) -> String {
    format!("{}.{}", image_stem(topic), image_extension(url))
}

/// Searches for, downloads and stores the illustrative image for a topic.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    images_dir: PathBuf,
    api_key: Option<String>,
    endpoint: String,
    shared_permissions: bool,
    search_timeout_secs: u64,
    download_timeout_secs: u64,
}

impl ImageResolver {
    pub fn new(config: &NotesConfig) -> Self {
        Self {
            images_dir: config.images_dir.clone(),
            api_key: config.serpapi_api_key.clone(),
            endpoint: config.search_endpoint.clone(),
            shared_permissions: config.shared_permissions,
            search_timeout_secs: config.search_timeout_secs,
            download_timeout_secs: config.download_timeout_secs,
        }
    }

    /// Resolve the image for `topic`, returning `None` when nothing was found.
    pub async fn resolve(&self, topic: &str) -> Result<Option<LocalImage>, ImageIssue> {
        let Some(ref api_key) = self.api_key else {
            return Err(ImageIssue::SearchUnavailable {
                query: topic.to_string(),
                detail: "no SerpApi key configured (set SERPAPI_API_KEY)".into(),
            });
        };

        let Some(result) =
            search::first_image(&self.endpoint, api_key, topic, self.search_timeout_secs).await?
        else {
            return Ok(None);
        };

        let file_name = image_file_name(topic, &result.original);
        let path = self.images_dir.join(file_name);

        self.ensure_images_dir()?;
        let bytes = download(&result.original, self.download_timeout_secs).await?;

        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ImageIssue::Filesystem {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        apply_permissions(&path, if self.shared_permissions { 0o666 } else { 0o644 })?;

        info!("Image downloaded: {} ({} bytes)", path.display(), bytes.len());
        Ok(Some(LocalImage {
            path,
            bytes: bytes.len() as u64,
        }))
    }

    /// Like [`resolve`](Self::resolve) but logs any issue and returns it
    /// alongside the (absent) image instead of failing.
    pub async fn resolve_or_skip(&self, topic: &str) -> (Option<LocalImage>, Option<ImageIssue>) {
        match self.resolve(topic).await {
            Ok(Some(img)) => (Some(img), None),
            Ok(None) => {
                let issue = ImageIssue::SearchUnavailable {
                    query: topic.to_string(),
                    detail: "the search returned no image results".into(),
                };
                warn!("{}", issue);
                (None, Some(issue))
            }
            Err(issue) => {
                warn!("{}", issue);
                (None, Some(issue))
            }
        }
    }

    fn ensure_images_dir(&self) -> Result<(), ImageIssue> {
        if self.images_dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.images_dir).map_err(|e| ImageIssue::Filesystem {
            path: self.images_dir.clone(),
            detail: e.to_string(),
        })?;
        debug!("Created images directory {}", self.images_dir.display());
        apply_permissions(
            &self.images_dir,
            if self.shared_permissions { 0o777 } else { 0o755 },
        )
    }
}

/// GET the image bytes; any non-success status is a download failure.
async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ImageIssue> {
    let failed = |reason: String| ImageIssue::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) -> Result<(), ImageIssue> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        ImageIssue::Filesystem {
            path: path.to_path_buf(),
            detail: format!("chmod {mode:o}: {e}"),
        }
    })
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) -> Result<(), ImageIssue> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_characters_are_stripped() {
        assert_eq!(
            image_file_name("Docker & Kubernetes!", "https://x.example/a.jpg"),
            "docker_kubernetes.jpg"
        );
    }

    #[test]
    fn only_first_five_words_are_used() {
        assert_eq!(
            image_stem("one two three four five six seven"),
            "one_two_three_four_five"
        );
    }

    #[test]
    fn short_topics_use_all_words() {
        assert_eq!(image_stem("Rust"), "rust");
        assert_eq!(image_stem("  Linear   Algebra "), "linear_algebra");
    }

    #[test]
    fn underscores_survive_and_case_is_lowered() {
        assert_eq!(image_stem("TCP_IP Basics"), "tcp_ip_basics");
    }

    #[test]
    fn unusable_topics_fall_back() {
        assert_eq!(image_stem("!!! ???"), FALLBACK_STEM);
        assert_eq!(image_stem(""), FALLBACK_STEM);
    }

    #[test]
    fn stem_is_filesystem_safe() {
        let stem = image_stem("../../etc/passwd  C:\\windows <script>");
        assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert!(!stem.is_empty());
    }

    #[test]
    fn extension_allow_list() {
        assert_eq!(image_extension("https://x.example/pic.PNG"), "png");
        assert_eq!(image_extension("https://x.example/pic.jpeg?w=800#top"), "jpeg");
        assert_eq!(image_extension("https://x.example/anim.gif"), "gif");
        assert_eq!(image_extension("https://x.example/pic.webp"), "jpg");
        assert_eq!(image_extension("https://x.example/no-extension"), "jpg");
        assert_eq!(image_extension("https://x.example/"), "jpg");
        assert_eq!(image_extension("not a url"), "jpg");
    }

    #[tokio::test]
    async fn missing_api_key_is_search_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = NotesConfig::builder()
            .images_dir(dir.path().join("images"))
            .build()
            .unwrap();
        let resolver = ImageResolver::new(&config);

        let (img, issue) = resolver.resolve_or_skip("docker").await;
        assert!(img.is_none());
        assert!(matches!(issue, Some(ImageIssue::SearchUnavailable { .. })));
        assert!(!dir.path().join("images").exists(), "no directory without a search hit");
    }
}
