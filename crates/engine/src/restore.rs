#![forbid(unsafe_code)]

use crate::domain::Status;
use crate::error::Error;
use crate::fsys;
use crate::persistence::ResultStore;
use crate::remote::ObjectStore;
use std::path::Path;
use tracing::info;

/// Put the latest quarantined or exiled copy of `path` back in place with
/// the ownership and mode it had when detected.
pub async fn restore(
    store: &dyn ResultStore,
    quarantine_dir: Option<&Path>,
    remote: Option<&dyn ObjectStore>,
    path: &Path,
) -> Result<(), Error> {
    let meta = store
        .last(path)
        .await?
        .ok_or_else(|| Error::NoRecord(path.to_path_buf()))?;

    match &meta.status {
        Status::Detected => Err(Error::NothingToRestore(path.to_path_buf())),
        Status::Exiled(name) => {
            let remote = remote.ok_or(Error::RemoteDisabled)?;
            remote.download(path, path).await?;
            fsys::apply_attr(path, &meta.attr)?;
            info!(path = %path.display(), name, "restored exiled file");
            Ok(())
        }
        Status::Quarantined(name) => {
            let dir = quarantine_dir.ok_or(Error::QuarantineDisabled)?;
            let src = fsys::quarantine_location(dir, path, name);
            let dst = path.to_path_buf();
            let attr = meta.attr;
            tokio::task::spawn_blocking(move || fsys::move_file(&src, &dst, &attr)).await??;
            info!(path = %path.display(), name, "restored quarantined file");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attr, Hit, Meta, ScanResult};
    use crate::persistence::{NoopStore, SqliteStore};
    use async_trait::async_trait;
    use config::Verb;
    use std::collections::BTreeSet;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use tempfile::tempdir;

    struct StaticStore(&'static [u8]);

    #[async_trait]
    impl ObjectStore for StaticStore {
        async fn upload(&self, _path: &Path) -> Result<(), Error> {
            Ok(())
        }

        async fn download(&self, _path: &Path, dst: &Path) -> Result<(), Error> {
            tokio::fs::write(dst, self.0)
                .await
                .map_err(|err| Error::file(dst, err))
        }
    }

    async fn record(store: &SqliteStore, path: &Path, attr: Attr, status: Status) {
        let mut meta = Meta::new(BTreeSet::from(["eicar".to_owned()]), vec![Verb::Quarantine], attr);
        meta.status = status;
        let mut result = ScanResult::new("site");
        result.insert(Hit {
            path: path.to_path_buf(),
            meta,
        });
        store.save(&result).await.unwrap();
    }

    #[tokio::test]
    async fn quarantine_round_trip() {
        let site = tempdir().unwrap();
        let quarantine = tempdir().unwrap();
        let path = site.path().join("index.php");
        std::fs::write(&path, b"<?php echo 1;").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o604)).unwrap();
        let attr = Attr::from(&std::fs::metadata(&path).unwrap());

        let dst = fsys::quarantine(quarantine.path(), &path, &attr).unwrap();
        assert!(!path.exists());

        let store = SqliteStore::in_memory().await.unwrap();
        record(&store, &path, attr, Status::Quarantined(fsys::file_name(&dst))).await;

        restore(&store, Some(quarantine.path()), None, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<?php echo 1;");
        assert_eq!(std::fs::metadata(&path).unwrap().mode() & 0o7777, 0o604);
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn exiled_files_are_downloaded() {
        let site = tempdir().unwrap();
        let path = site.path().join("index.php");
        std::fs::write(&path, b"x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        let attr = Attr::from(&std::fs::metadata(&path).unwrap());
        std::fs::remove_file(&path).unwrap();

        let store = SqliteStore::in_memory().await.unwrap();
        record(&store, &path, attr, Status::Exiled("index.php".into())).await;

        let remote = StaticStore(b"<?php echo 2;");
        restore(&store, None, Some(&remote), &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<?php echo 2;");
        assert_eq!(std::fs::metadata(&path).unwrap().mode() & 0o7777, 0o600);
    }

    #[tokio::test]
    async fn nothing_to_restore() {
        let site = tempdir().unwrap();
        let path = site.path().join("index.php");
        std::fs::write(&path, b"x").unwrap();
        let attr = Attr::from(&std::fs::metadata(&path).unwrap());

        let store = SqliteStore::in_memory().await.unwrap();
        record(&store, &path, attr, Status::Detected).await;
        assert!(matches!(
            restore(&store, None, None, &path).await,
            Err(Error::NothingToRestore(_))
        ));
        assert!(matches!(
            restore(&NoopStore, None, None, &path).await,
            Err(Error::NoRecord(_))
        ));
    }
}
