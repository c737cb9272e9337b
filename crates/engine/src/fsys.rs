#![forbid(unsafe_code)]

use crate::domain::Attr;
use crate::error::Error;
use chrono::{DateTime, Utc};
use nix::errno::Errno;
use rand::Rng;
use std::fs::{self, DirBuilder, Metadata, Permissions};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

/// Component-wise prefix test, so `/var/www2` is not within `/var/www`.
pub fn is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// `base` shrunk by a random factor in `[0.8, 1.0)`.
pub fn block_size(base: usize) -> usize {
    let factor: f64 = rand::thread_rng().gen_range(0.8..1.0);
    ((base as f64 * factor) as usize).max(1)
}

/// A file is expired when both its ctime and mtime precede `expiry`.
pub fn is_expired(expiry: SystemTime, meta: &Metadata) -> bool {
    let ctime = epoch(meta.ctime());
    let mtime = epoch(meta.mtime());
    ctime < expiry && mtime < expiry
}

fn epoch(secs: i64) -> SystemTime {
    match u64::try_from(secs) {
        Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs),
        Err(_) => UNIX_EPOCH,
    }
}

/// Last component of `path` as a string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn check_path(path: &Path) -> Result<(), Error> {
    let is_root = path.components().all(|c| c == Component::RootDir);
    if !path.is_absolute() || is_root {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

/// Restore ownership and permission bits.
pub fn apply_attr(path: &Path, attr: &Attr) -> Result<(), Error> {
    std::os::unix::fs::chown(path, Some(attr.uid), Some(attr.gid))
        .map_err(|err| Error::file(path, err))?;
    fs::set_permissions(path, Permissions::from_mode(attr.mode))
        .map_err(|err| Error::file(path, err))
}

/// Move `src` to `dst` and give it `attr`'s ownership and mode. Parent
/// directories of `dst` are created as needed.
pub fn move_file(src: &Path, dst: &Path, attr: &Attr) -> Result<(), Error> {
    check_path(src)?;
    check_path(dst)?;

    let meta = fs::metadata(src).map_err(|err| Error::file(src, err))?;
    if meta.is_dir() {
        return Err(Error::IsDirectory(src.to_path_buf()));
    }

    if let Some(parent) = dst.parent() {
        DirBuilder::new()
            .recursive(true)
            .mode(0o750)
            .create(parent)
            .map_err(|err| Error::file(parent, err))?;
    }

    match fs::rename(src, dst) {
        Ok(()) => {}
        Err(err) if err.raw_os_error() == Some(Errno::EXDEV as i32) => {
            fs::copy(src, dst).map_err(|err| Error::file(dst, err))?;
            fs::remove_file(src).map_err(|err| Error::file(src, err))?;
        }
        Err(err) => return Err(Error::file(src, err)),
    }
    apply_attr(dst, attr)?;

    info!(src = %src.display(), dst = %dst.display(), "moved file");
    Ok(())
}

fn quarantine_dir_for(dir: &Path, original: &Path) -> PathBuf {
    let parent = original.parent().unwrap_or(Path::new("/"));
    dir.join(parent.strip_prefix("/").unwrap_or(parent))
}

/// Where a file quarantined under `name` lives, mirroring the original
/// directory layout below `dir`.
pub fn quarantine_location(dir: &Path, original: &Path, name: &str) -> PathBuf {
    quarantine_dir_for(dir, original).join(name)
}

/// A fresh quarantine destination for `original`, suffixed with `now` as a
/// unix timestamp.
pub fn quarantine_path(dir: &Path, original: &Path, now: DateTime<Utc>) -> PathBuf {
    let base = quarantine_dir_for(dir, original);
    let name = format!("{}-{}", file_name(original), now.timestamp());
    let mut candidate = base.join(&name);
    let mut n = 1;
    while candidate.exists() {
        candidate = base.join(format!("{name}-{n}"));
        n += 1;
    }
    candidate
}

/// Move `original` into quarantine and return its new location.
pub fn quarantine(dir: &Path, original: &Path, attr: &Attr) -> Result<PathBuf, Error> {
    let dst = quarantine_path(dir, original, Utc::now());
    move_file(original, &dst, attr)?;
    Ok(dst)
}

/// Mount point of the filesystem holding `path`.
pub fn mount_point(path: &Path) -> Result<PathBuf, Error> {
    let path = fs::canonicalize(path).map_err(|err| Error::file(path, err))?;
    let dev = fs::metadata(&path)
        .map_err(|err| Error::file(&path, err))?
        .dev();

    let mut current = path.as_path();
    while let Some(parent) = current.parent() {
        let parent_dev = fs::metadata(parent)
            .map_err(|err| Error::file(parent, err))?
            .dev();
        if parent_dev != dev {
            break;
        }
        current = parent;
    }
    Ok(current.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn attr_of(path: &Path) -> Attr {
        Attr::from(&fs::metadata(path).unwrap())
    }

    #[test]
    fn move_preserves_content_and_mode() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("index.php");
        fs::write(&src, b"<?php echo 1;").unwrap();
        fs::set_permissions(&src, Permissions::from_mode(0o604)).unwrap();
        let attr = attr_of(&src);

        let dst = dir.path().join("nested/dir/index.php");
        move_file(&src, &dst, &attr).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"<?php echo 1;");
        assert_eq!(fs::metadata(&dst).unwrap().mode() & 0o7777, 0o604);
    }

    #[test]
    fn move_rejects_relative_root_and_dirs() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a");
        fs::write(&src, b"x").unwrap();
        let attr = attr_of(&src);

        assert!(matches!(
            move_file(Path::new("a"), &dir.path().join("b"), &attr),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            move_file(&src, Path::new("/"), &attr),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            move_file(dir.path(), &dir.path().join("c"), &attr),
            Err(Error::IsDirectory(_))
        ));
    }

    #[test]
    fn quarantine_mirrors_layout() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let dst = quarantine_path(
            Path::new("/q"),
            Path::new("/var/www/site/index.php"),
            now,
        );
        assert_eq!(dst, Path::new("/q/var/www/site/index.php-1700000000"));
        assert_eq!(
            quarantine_location(
                Path::new("/q"),
                Path::new("/var/www/site/index.php"),
                "index.php-1700000000"
            ),
            dst
        );
    }

    #[test]
    fn quarantine_path_avoids_collisions() {
        let dir = tempdir().unwrap();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let original = Path::new("/var/www/site/index.php");
        let first = quarantine_path(dir.path(), original, now);
        fs::create_dir_all(first.parent().unwrap()).unwrap();
        fs::write(&first, b"x").unwrap();

        let second = quarantine_path(dir.path(), original, now);
        assert_ne!(first, second);
        assert_eq!(file_name(&second), "index.php-1700000000-1");
    }

    #[test]
    fn expiry_needs_both_timestamps_old() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        let meta = fs::metadata(&path).unwrap();

        assert!(!is_expired(SystemTime::now() - Duration::from_secs(3600), &meta));
        assert!(is_expired(SystemTime::now() + Duration::from_secs(3600), &meta));
    }

    #[test]
    fn mount_point_contains_path() {
        let dir = tempdir().unwrap();
        let mount = mount_point(dir.path()).unwrap();
        let canonical = fs::canonicalize(dir.path()).unwrap();
        assert!(is_within(&canonical, &mount));
        assert_eq!(mount_point(&mount).unwrap(), mount);
    }

    #[test]
    fn within_is_component_wise() {
        assert!(is_within(Path::new("/var/www/a"), Path::new("/var/www")));
        assert!(is_within(Path::new("/var/www"), Path::new("/var/www")));
        assert!(!is_within(Path::new("/var/www2/a"), Path::new("/var/www")));
    }

    proptest! {
        #[test]
        fn block_size_is_jittered_down(base in 1usize..1_000_000) {
            let size = block_size(base);
            prop_assert!(size <= base);
            prop_assert!(size >= ((base as f64 * 0.8) as usize).max(1));
        }
    }
}
