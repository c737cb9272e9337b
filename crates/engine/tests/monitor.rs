#![forbid(unsafe_code)]

mod common;

use common::{Calls, EICAR, config, dispatcher, ruleset};
use engine::{ChannelSource, Error, EventSource, FileEvent, Monitor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

async fn wait_for(calls: &Calls, n: usize) {
    for _ in 0..100 {
        if calls.len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {n} pipeline runs, saw {}", calls.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn written_files_are_scanned_on_the_next_tick() {
    let dir = tempdir().unwrap();
    let site = dir.path().join("www/site");
    let other = dir.path().join("elsewhere");
    std::fs::create_dir_all(&site).unwrap();
    std::fs::create_dir_all(&other).unwrap();
    let infected = site.join("shell.php");
    let clean = site.join("index.php");
    let outside = other.join("shell.php");
    std::fs::write(&infected, EICAR).unwrap();
    std::fs::write(&clean, "<?php echo 'hi';").unwrap();
    std::fs::write(&outside, EICAR).unwrap();

    let mut config = config(dir.path());
    config.scans.monitor.interval = Duration::from_millis(100);
    let calls = Arc::new(Calls::default());
    let (events, source) = ChannelSource::new();
    let monitor = Monitor::with_source(
        &config,
        ruleset(),
        dispatcher(&config, &calls).await,
        Box::new(source),
    );

    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { monitor.run(&cancel).await }
    });

    for path in [&infected, &clean, &outside] {
        events.send(FileEvent::CloseWrite(path.clone())).unwrap();
    }
    events.send(FileEvent::Other(0x20)).unwrap();
    wait_for(&calls, 1).await;

    // A second write to the same file is picked up again.
    events.send(FileEvent::CloseWrite(infected.clone())).unwrap();
    wait_for(&calls, 2).await;

    cancel.cancel();
    assert!(matches!(running.await.unwrap(), Err(Error::Cancelled)));

    for (target, paths) in calls.take() {
        assert_eq!(target, "site");
        assert_eq!(paths, vec![infected.clone()]);
    }
}

#[tokio::test]
async fn idle_monitor_stops_on_cancel() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.scans.monitor.interval = Duration::from_millis(20);
    let calls = Arc::new(Calls::default());
    let (_events, source) = ChannelSource::new();
    let monitor = Monitor::with_source(
        &config,
        ruleset(),
        dispatcher(&config, &calls).await,
        Box::new(source),
    );

    let cancel = CancellationToken::new();
    let stop = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        }
    };
    let (result, ()) = tokio::join!(monitor.run(&cancel), stop);
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(calls.len(), 0);
}

/// Fails its first read, then reports one write.
struct FailsOnce {
    failed: bool,
    path: Option<PathBuf>,
}

impl EventSource for FailsOnce {
    fn next(&mut self) -> Result<Vec<FileEvent>, Error> {
        if !self.failed {
            self.failed = true;
            return Err(Error::Fanotify(nix::Error::EIO));
        }
        std::thread::sleep(Duration::from_millis(10));
        Ok(self.path.take().map(FileEvent::CloseWrite).into_iter().collect())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn source_errors_do_not_stop_the_listener() {
    let dir = tempdir().unwrap();
    let site = dir.path().join("www/site");
    std::fs::create_dir_all(&site).unwrap();
    let infected = site.join("shell.php");
    std::fs::write(&infected, EICAR).unwrap();

    let mut config = config(dir.path());
    config.scans.monitor.interval = Duration::from_millis(50);
    let calls = Arc::new(Calls::default());
    let source = FailsOnce {
        failed: false,
        path: Some(infected.clone()),
    };
    let monitor = Monitor::with_source(
        &config,
        ruleset(),
        dispatcher(&config, &calls).await,
        Box::new(source),
    );

    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { monitor.run(&cancel).await }
    });
    wait_for(&calls, 1).await;
    cancel.cancel();
    assert!(matches!(running.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(calls.take(), vec![("site".to_owned(), vec![infected])]);
}
