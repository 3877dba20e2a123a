//! Incremental synchronization of the local cover mirror.
//!
//! For one category the engine keeps two directories in step with the
//! freshly scraped cover list:
//!
//! ```text
//! mirror_root/
//! ├── covers/<category>/<name>_<date>.jpg      # full resolution
//! └── thumbnails/<category>/<name>_<date>.jpg  # thumbnails
//! ```
//!
//! Work is split in two phases per directory. First a pure [`plan`] is
//! computed from the desired file set and the current directory listing;
//! then the plan is executed: each desired file is checked with
//! [`should_download`] and fetched if stale, and every leftover `.jpg` is
//! deleted. Failures on a single file are logged and never stop the rest.

use crate::models::{CoverRecord, IMAGE_EXTENSION, ImageKind};
use crate::remote::RemoteClient;
use crate::staleness::should_download;
use crate::utils::ensure_dir;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// A file the mirror should contain, and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredFile {
    pub filename: String,
    pub url: String,
}

/// What to do with one directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    /// Candidates for download, subject to the staleness check.
    pub fetch: Vec<DesiredFile>,
    /// Existing files no longer desired.
    pub delete: Vec<String>,
}

/// Outcome counters for one directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub downloaded: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Desired files of `kind`, in cover order.
///
/// Covers without a URL for `kind` contribute nothing. When two covers map
/// to the same filename the later one wins and takes the later position.
///
/// # Arguments
///
/// * `covers` - The records scraped for one category
/// * `kind` - Which image URL of each record to use
///
/// # Returns
///
/// One [`DesiredFile`] per distinct canonical filename.
///
/// # Examples
///
/// ```ignore
/// // "Jornal X" / "01_01_2024" with a thumbnail URL and no full image:
/// assert!(desired_files(&covers, ImageKind::Full).is_empty());
/// assert_eq!(desired_files(&covers, ImageKind::Thumbnail)[0].filename, "Jornal_X_01_01_2024.jpg");
/// ```
pub fn desired_files(covers: &[CoverRecord], kind: ImageKind) -> Vec<DesiredFile> {
    let mut files = covers
        .iter()
        .rev()
        .filter_map(|cover| {
            cover.url_for(kind).map(|url| DesiredFile {
                filename: cover.filename(),
                url: url.to_string(),
            })
        })
        .unique_by(|f| f.filename.clone())
        .collect::<Vec<_>>();
    files.reverse();
    files
}

/// Diff the desired files against what is already on disk.
///
/// # Arguments
///
/// * `desired` - Output of [`desired_files`] for one directory
/// * `existing` - Image filenames currently in that directory
///
/// # Returns
///
/// A [`Plan`] whose `fetch` list is `desired` unchanged and whose `delete`
/// list holds every existing name that is not desired, in sorted order.
///
/// # Examples
///
/// ```ignore
/// let plan = plan(vec![a_d], &["A_d.jpg", "Gone_d.jpg"].map(String::from).into());
/// assert_eq!(plan.delete, vec!["Gone_d.jpg"]);
/// ```
pub fn plan(desired: Vec<DesiredFile>, existing: &BTreeSet<String>) -> Plan {
    let wanted = desired
        .iter()
        .map(|f| f.filename.as_str())
        .collect::<BTreeSet<_>>();
    let delete = existing
        .iter()
        .filter(|name| !wanted.contains(name.as_str()))
        .cloned()
        .collect();
    Plan {
        fetch: desired,
        delete,
    }
}

/// Names of the mirrored image files currently in `dir`.
pub async fn list_mirror(dir: &Path) -> Result<BTreeSet<String>, Box<dyn Error>> {
    let suffix = format!(".{IMAGE_EXTENSION}");
    let mut names = BTreeSet::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(&suffix) {
                names.insert(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Reconcile both mirror directories of `category` with `covers`.
///
/// Only the creation of the two directories can fail this call; everything
/// after that is logged per file.
#[instrument(level = "info", skip(remote, covers, mirror_root), fields(count = covers.len()))]
pub async fn sync(
    remote: &RemoteClient,
    covers: &[CoverRecord],
    category: &str,
    mirror_root: &Path,
) -> Result<(), Box<dyn Error>> {
    for kind in ImageKind::ALL {
        ensure_dir(&kind.category_dir(mirror_root, category)).await?;
    }

    for kind in ImageKind::ALL {
        let dir = kind.category_dir(mirror_root, category);
        let tally = sync_dir(remote, covers, kind, &dir).await;
        info!(
            %kind,
            downloaded = tally.downloaded,
            skipped = tally.skipped,
            deleted = tally.deleted,
            failed = tally.failed,
            "Directory synchronized"
        );
    }
    Ok(())
}

async fn sync_dir(remote: &RemoteClient, covers: &[CoverRecord], kind: ImageKind, dir: &Path) -> Tally {
    let existing = match list_mirror(dir).await {
        Ok(names) => names,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot list mirror directory; nothing will be deleted");
            BTreeSet::new()
        }
    };
    let plan = plan(desired_files(covers, kind), &existing);
    let mut tally = Tally::default();

    for file in &plan.fetch {
        let path = dir.join(&file.filename);
        if !should_download(remote, &file.url, &path).await {
            info!(%kind, path = %path.display(), "Skipped");
            tally.skipped += 1;
            continue;
        }
        match download(remote, &file.url, &path).await {
            Ok(()) => {
                info!(%kind, path = %path.display(), "Downloaded");
                tally.downloaded += 1;
            }
            Err(e) => {
                error!(%kind, url = %file.url, error = %e, "Error downloading");
                tally.failed += 1;
            }
        }
    }

    delete_outdated(kind, dir, &plan.delete, &mut tally).await;
    tally
}

/// Remove `names` from `dir`, carrying on past any file that cannot be removed.
async fn delete_outdated(kind: ImageKind, dir: &Path, names: &[String], tally: &mut Tally) {
    for name in names {
        let path = dir.join(name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(%kind, path = %path.display(), "Deleted outdated");
                tally.deleted += 1;
            }
            Err(e) => {
                error!(%kind, path = %path.display(), error = %e, "Error deleting");
                tally.failed += 1;
            }
        }
    }
}

/// Fetch `url` into `path`. The body lands in a `.part` sibling first and is
/// renamed into place, so `path` is either the old file or the complete new one.
async fn download(remote: &RemoteClient, url: &str, path: &Path) -> Result<(), Box<dyn Error>> {
    let body = remote.get_bytes(url).await?;
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = Path::new(&part);

    let written = match fs::write(part, &body).await {
        Ok(()) => fs::rename(part, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        discard_part(part).await;
        return Err(e.into());
    }
    Ok(())
}

async fn discard_part(part: &Path) {
    if let Err(e) = fs::remove_file(part).await {
        debug!(path = %part.display(), error = %e, "Could not remove partial download");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Direct;
    use crate::remote::DEFAULT_PROBE_TIMEOUT;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OLD_DATE: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

    fn cover(name: &str, date: &str, thumb: Option<String>, image: Option<String>) -> CoverRecord {
        CoverRecord {
            category: "JornaisNacionais".to_string(),
            name: name.to_string(),
            date: date.to_string(),
            thumb_url: thumb,
            image_url: image,
        }
    }

    fn client() -> RemoteClient {
        RemoteClient::new(Box::new(Direct), DEFAULT_PROBE_TIMEOUT)
    }

    fn files_in(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn dirs(root: &Path) -> (PathBuf, PathBuf) {
        (
            ImageKind::Full.category_dir(root, "JornaisNacionais"),
            ImageKind::Thumbnail.category_dir(root, "JornaisNacionais"),
        )
    }

    async fn mount_image(server: &MockServer, route: &str, body: &'static [u8], gets: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(gets)
            .mount(server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).insert_header("Last-Modified", OLD_DATE))
            .mount(server)
            .await;
    }

    #[test]
    fn test_desired_files_skips_missing_urls() {
        let covers = vec![
            cover("A", "d", Some("t/a".into()), Some("f/a".into())),
            cover("B", "d", Some("t/b".into()), None),
        ];
        let full = desired_files(&covers, ImageKind::Full);
        assert_eq!(
            full,
            vec![DesiredFile {
                filename: "A_d.jpg".into(),
                url: "f/a".into()
            }]
        );
        assert_eq!(desired_files(&covers, ImageKind::Thumbnail).len(), 2);
    }

    #[test]
    fn test_desired_files_collision_last_wins() {
        let covers = vec![
            cover("Jornal X", "d", Some("t/1".into()), None),
            cover("Other", "d", Some("t/2".into()), None),
            cover("Jornal\tX", "d", Some("t/3".into()), None),
        ];
        let thumbs = desired_files(&covers, ImageKind::Thumbnail);
        assert_eq!(
            thumbs,
            vec![
                DesiredFile {
                    filename: "Other_d.jpg".into(),
                    url: "t/2".into()
                },
                DesiredFile {
                    filename: "Jornal_X_d.jpg".into(),
                    url: "t/3".into()
                },
            ]
        );
    }

    #[test]
    fn test_plan_deletes_only_unwanted() {
        let desired = vec![
            DesiredFile {
                filename: "A_d.jpg".into(),
                url: "u/a".into(),
            },
            DesiredFile {
                filename: "B_d.jpg".into(),
                url: "u/b".into(),
            },
        ];
        let existing = set(&["A_d.jpg", "Gone_d.jpg", "Old_x.jpg"]);
        let plan = plan(desired.clone(), &existing);
        assert_eq!(plan.fetch, desired);
        assert_eq!(plan.delete, vec!["Gone_d.jpg".to_string(), "Old_x.jpg".to_string()]);
    }

    #[test]
    fn test_plan_empty_desired_deletes_everything() {
        let plan = plan(Vec::new(), &set(&["A.jpg"]));
        assert!(plan.fetch.is_empty());
        assert_eq!(plan.delete, vec!["A.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_list_mirror_only_jpg_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.jpg"), b"").unwrap();
        std::fs::write(tmp.path().join("b.png"), b"").unwrap();
        std::fs::write(tmp.path().join("c.jpg.part"), b"").unwrap();
        std::fs::create_dir(tmp.path().join("d.jpg")).unwrap();
        assert_eq!(list_mirror(tmp.path()).await.unwrap(), set(&["a.jpg"]));
    }

    #[tokio::test]
    async fn test_sync_example_then_idempotent() {
        let server = MockServer::start().await;
        mount_image(&server, "/thumb/x.jpg", b"thumb", 1).await;
        mount_image(&server, "/full/x.jpg", b"full", 1).await;

        let covers = vec![cover(
            "Jornal X",
            "01_01_2024",
            Some(format!("{}/thumb/x.jpg", server.uri())),
            Some(format!("{}/full/x.jpg", server.uri())),
        )];
        let tmp = tempfile::tempdir().unwrap();
        let (full_dir, thumb_dir) = dirs(tmp.path());
        let remote = client();

        sync(&remote, &covers, "JornaisNacionais", tmp.path()).await.unwrap();
        assert_eq!(files_in(&full_dir), set(&["Jornal_X_01_01_2024.jpg"]));
        assert_eq!(files_in(&thumb_dir), set(&["Jornal_X_01_01_2024.jpg"]));
        assert_eq!(std::fs::read(full_dir.join("Jornal_X_01_01_2024.jpg")).unwrap(), b"full");
        assert_eq!(std::fs::read(thumb_dir.join("Jornal_X_01_01_2024.jpg")).unwrap(), b"thumb");

        // Second run: files exist, remote is older, so no GET happens.
        sync(&remote, &covers, "JornaisNacionais", tmp.path()).await.unwrap();
        assert_eq!(files_in(&full_dir), set(&["Jornal_X_01_01_2024.jpg"]));
        assert_eq!(files_in(&thumb_dir), set(&["Jornal_X_01_01_2024.jpg"]));
    }

    #[tokio::test]
    async fn test_sync_without_last_modified_skips_existing() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".as_slice()))
            .expect(0)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (full_dir, thumb_dir) = dirs(tmp.path());
        std::fs::create_dir_all(&full_dir).unwrap();
        std::fs::create_dir_all(&thumb_dir).unwrap();
        std::fs::write(full_dir.join("A_d.jpg"), b"old").unwrap();
        std::fs::write(thumb_dir.join("A_d.jpg"), b"old").unwrap();

        let covers = vec![cover(
            "A",
            "d",
            Some(format!("{}/t/a.jpg", server.uri())),
            Some(format!("{}/f/a.jpg", server.uri())),
        )];
        sync(&client(), &covers, "JornaisNacionais", tmp.path()).await.unwrap();
        assert_eq!(std::fs::read(full_dir.join("A_d.jpg")).unwrap(), b"old");
        assert_eq!(std::fs::read(thumb_dir.join("A_d.jpg")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_sync_replaces_stale_file() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/t/a.jpg"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Last-Modified", "Fri, 31 Dec 2100 00:00:00 GMT"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/t/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".as_slice()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (_, thumb_dir) = dirs(tmp.path());
        std::fs::create_dir_all(&thumb_dir).unwrap();
        std::fs::write(thumb_dir.join("A_d.jpg"), b"old").unwrap();

        let covers = vec![cover("A", "d", Some(format!("{}/t/a.jpg", server.uri())), None)];
        sync(&client(), &covers, "JornaisNacionais", tmp.path()).await.unwrap();
        assert_eq!(std::fs::read(thumb_dir.join("A_d.jpg")).unwrap(), b"new");
        assert_eq!(files_in(&thumb_dir), set(&["A_d.jpg"]));
    }

    #[tokio::test]
    async fn test_sync_self_heals_removed_and_unresolved_covers() {
        let server = MockServer::start().await;
        mount_image(&server, "/t/a.jpg", b"thumb", 0).await;

        let tmp = tempfile::tempdir().unwrap();
        let (full_dir, thumb_dir) = dirs(tmp.path());
        std::fs::create_dir_all(&full_dir).unwrap();
        std::fs::create_dir_all(&thumb_dir).unwrap();
        // A lost its full image upstream; Gone is no longer listed at all.
        for name in ["A_d.jpg", "Gone_d.jpg"] {
            std::fs::write(full_dir.join(name), b"old").unwrap();
            std::fs::write(thumb_dir.join(name), b"old").unwrap();
        }
        std::fs::write(full_dir.join("notes.txt"), b"keep").unwrap();

        let covers = vec![cover("A", "d", Some(format!("{}/t/a.jpg", server.uri())), None)];
        sync(&client(), &covers, "JornaisNacionais", tmp.path()).await.unwrap();

        assert_eq!(files_in(&full_dir), set(&["notes.txt"]));
        assert_eq!(files_in(&thumb_dir), set(&["A_d.jpg"]));
    }

    #[tokio::test]
    async fn test_sync_isolates_failed_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f/a.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        mount_image(&server, "/t/a.jpg", b"ta", 1).await;
        mount_image(&server, "/f/b.jpg", b"fb", 1).await;
        mount_image(&server, "/t/b.jpg", b"tb", 1).await;

        let uri = server.uri();
        let covers = vec![
            cover("A", "d", Some(format!("{uri}/t/a.jpg")), Some(format!("{uri}/f/a.jpg"))),
            cover("B", "d", Some(format!("{uri}/t/b.jpg")), Some(format!("{uri}/f/b.jpg"))),
        ];
        let tmp = tempfile::tempdir().unwrap();
        let (full_dir, thumb_dir) = dirs(tmp.path());

        sync(&client(), &covers, "JornaisNacionais", tmp.path()).await.unwrap();

        assert_eq!(files_in(&full_dir), set(&["B_d.jpg"]));
        assert_eq!(files_in(&thumb_dir), set(&["A_d.jpg", "B_d.jpg"]));
    }

    #[tokio::test]
    async fn test_sync_continues_after_write_failure() {
        let server = MockServer::start().await;
        mount_image(&server, "/t/a.jpg", b"ta", 1).await;
        mount_image(&server, "/t/b.jpg", b"tb", 1).await;

        let tmp = tempfile::tempdir().unwrap();
        let (_, thumb_dir) = dirs(tmp.path());
        // A directory in the way of A's temporary file makes its write fail.
        std::fs::create_dir_all(thumb_dir.join("A_d.jpg.part")).unwrap();

        let uri = server.uri();
        let covers = vec![
            cover("A", "d", Some(format!("{uri}/t/a.jpg")), None),
            cover("B", "d", Some(format!("{uri}/t/b.jpg")), None),
        ];
        let res = sync(&client(), &covers, "JornaisNacionais", tmp.path()).await;

        assert!(res.is_ok());
        assert_eq!(files_in(&thumb_dir), set(&["A_d.jpg.part", "B_d.jpg"]));
        assert_eq!(std::fs::read(thumb_dir.join("B_d.jpg")).unwrap(), b"tb");
    }

    #[tokio::test]
    async fn test_download_removes_part_when_rename_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/t/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".as_slice()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("A_d.jpg");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("inside"), b"x").unwrap();

        let res = download(&client(), &format!("{}/t/a.jpg", server.uri()), &target).await;

        assert!(res.is_err());
        assert!(target.is_dir());
        assert_eq!(files_in(tmp.path()), set(&["A_d.jpg"]));
    }

    #[tokio::test]
    async fn test_delete_outdated_continues_after_failure() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Old_d.jpg"), b"old").unwrap();
        std::fs::write(tmp.path().join("keep.jpg"), b"keep").unwrap();

        let names = vec!["Missing_d.jpg".to_string(), "Old_d.jpg".to_string()];
        let mut tally = Tally::default();
        delete_outdated(ImageKind::Thumbnail, tmp.path(), &names, &mut tally).await;

        assert_eq!(tally.deleted, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(files_in(tmp.path()), set(&["keep.jpg"]));
    }

    #[tokio::test]
    async fn test_sync_fails_when_directory_cannot_be_created() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::write(&root, b"not a directory").unwrap();

        let res = sync(&client(), &[], "JornaisNacionais", &root).await;
        assert!(res.is_err());
    }
}
