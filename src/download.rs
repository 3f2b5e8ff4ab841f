use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tracks::Track;

/// Filename for a track: every non-alphanumeric character becomes `_`.
pub fn file_stem(track: &Track) -> String {
    track
        .title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `dir/{stem}.mp3`, or `dir/{stem}_2.mp3`, `_3`, … if that already exists.
pub fn destination_for(dir: &Path, track: &Track) -> PathBuf {
    let stem = file_stem(track);
    let mut path = dir.join(format!("{stem}.mp3"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.mp3"));
        n += 1;
    }
    path
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest gap allowed between two chunks of a download.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for track downloads. No overall deadline, since tracks can be
/// large, but a stalled connection is dropped after the read timeout.
pub fn download_client() -> reqwest::Result<reqwest::Client> {
    client_with_timeouts(CONNECT_TIMEOUT, READ_TIMEOUT)
}

fn client_with_timeouts(connect: Duration, read: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect)
        .read_timeout(read)
        .build()
}

/// Where a download is written until it completes.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream a track's audio into `dest`, reporting progress via the callback.
/// `on_progress(bytes_downloaded, total_bytes)`; total is 0 when the server sends no length.
///
/// `dest` only appears once the whole body has arrived. On failure nothing is
/// left behind.
pub async fn download_track<F>(
    client: &reqwest::Client,
    track: &Track,
    dest: &Path,
    on_progress: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Fn(u64, u64) + Send + 'static,
{
    let url = track
        .audio_url
        .as_deref()
        .ok_or("Audio URL not available")?;

    if let Some(dir) = dest.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let part = partial_path(dest);
    let result = stream_to(client, url, &part, on_progress).await;
    if let Err(e) = result {
        if let Err(rm) = tokio::fs::remove_file(&part).await {
            if rm.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {rm}", part.display());
            }
        }
        return Err(e);
    }

    tokio::fs::rename(&part, dest).await?;
    log::info!("Track {:?} saved to {}", track.title, dest.display());
    Ok(())
}

async fn stream_to<F>(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    on_progress: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Fn(u64, u64),
{
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client.get(url).send().await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush().await?;
    Ok(())
}
