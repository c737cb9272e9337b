#![forbid(unsafe_code)]

use config::{Config, Verb};
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const EICAR: &str = "X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

fn write_config(root: &Path, default: &str) -> io::Result<std::path::PathBuf> {
    let base = root.display();
    fs::write(
        root.join("rules.toml"),
        "[[rule]]\nname = \"eicar\"\npattern = 'EICAR-STANDARD-ANTIVIRUS-TEST-FILE'\n",
    )?;
    let contents = format!(
        "identifier = \"web01\"\n\
threads = 2\n\n\
[install]\n\
dir = \"{base}/opt\"\n\
db = \"{base}/opt/db/malwatch.db\"\n\
log = \"{base}/opt/log/malwatch.log\"\n\n\
[scans]\n\
targets = ['^{base}/www/(?P<target>[^/]+)']\n\
paths = [\"{base}/www/*\"]\n\
signatures = \"{base}/rules.toml\"\n\n\
[actions]\n\
default = [{default}]\n\n\
[actions.quarantine]\n\
dir = \"{base}/quarantine\"\n\n\
[alerts]\n\
dir = \"{base}/alerts\"\n"
    );
    let path = root.join("config.toml");
    fs::write(&path, contents)?;
    Ok(path)
}

fn malwatch(config: &Path, args: &[&str]) -> io::Result<(Output, String)> {
    let output = Command::new(env!("CARGO_BIN_EXE_malwatch"))
        .arg("--config")
        .arg(config)
        .arg("-v")
        .args(args)
        .env_remove("MALWATCH_LOG")
        .output()?;
    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output, combined))
}

#[test]
fn unattended_scan_logs_detections() -> io::Result<()> {
    let dir = tempdir()?;
    let site = dir.path().join("www/site");
    fs::create_dir_all(&site)?;
    fs::write(site.join("shell.php"), EICAR)?;
    fs::write(site.join("index.php"), "<?php echo 'hi';")?;
    let config = write_config(dir.path(), "\"alert\"")?;

    let (output, combined) = malwatch(&config, &["scan", "--unattended"])?;
    assert!(output.status.success(), "{combined}");
    assert!(combined.contains("malware detected"));
    assert!(combined.contains("shell.php"));
    assert!(!combined.contains("index.php"));
    assert!(dir.path().join("opt/db/malwatch.db").exists());
    assert!(site.join("shell.php").exists());

    // Nothing was moved, so there is nothing to put back.
    let path = site.join("shell.php");
    let (output, combined) = malwatch(&config, &["restore", &path.to_string_lossy()])?;
    assert!(!output.status.success());
    assert!(combined.contains("no quarantined or exiled copy"), "{combined}");
    Ok(())
}

#[test]
fn quarantine_then_restore() -> io::Result<()> {
    let dir = tempdir()?;
    let site = dir.path().join("www/site");
    fs::create_dir_all(&site)?;
    let shell = site.join("shell.php");
    fs::write(&shell, EICAR)?;
    let config = write_config(dir.path(), "\"quarantine\"")?;

    let (output, combined) = malwatch(&config, &["scan"])?;
    assert!(output.status.success(), "{combined}");
    assert!(!shell.exists());
    let table = String::from_utf8_lossy(&output.stdout);
    assert!(table.contains("site (1 detections)"), "{table}");
    assert!(table.contains("shell.php-"), "{table}");

    let (output, combined) = malwatch(&config, &["restore", &shell.to_string_lossy()])?;
    assert!(output.status.success(), "{combined}");
    assert_eq!(fs::read_to_string(&shell)?, EICAR);
    Ok(())
}

#[test]
fn missing_scan_paths_fail() -> io::Result<()> {
    let dir = tempdir()?;
    let config = write_config(dir.path(), "\"alert\"")?;

    let (output, _) = malwatch(&config, &["scan", "-u"])?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn manual_quarantine_is_recorded_in_history() -> io::Result<()> {
    let dir = tempdir()?;
    let site = dir.path().join("www/site");
    fs::create_dir_all(&site)?;
    let notes = site.join("notes.php");
    fs::write(&notes, "<?php // suspicious")?;
    let config = write_config(dir.path(), "\"alert\"")?;
    let notes_arg = notes.to_string_lossy().into_owned();

    let (output, combined) = malwatch(&config, &["quarantine", &notes_arg])?;
    assert!(output.status.success(), "{combined}");
    assert!(!notes.exists());
    assert!(String::from_utf8_lossy(&output.stdout).contains("notes.php-"));

    let (output, combined) = malwatch(&config, &["history", "get", "site"])?;
    assert!(output.status.success(), "{combined}");
    let table = String::from_utf8_lossy(&output.stdout);
    assert!(table.contains(&notes_arg), "{table}");
    assert!(table.contains("quarantine"), "{table}");

    let (output, combined) = malwatch(&config, &["restore", &notes_arg])?;
    assert!(output.status.success(), "{combined}");
    assert_eq!(fs::read_to_string(&notes)?, "<?php // suspicious");

    let (output, combined) = malwatch(&config, &["history", "del", "site"])?;
    assert!(output.status.success(), "{combined}");
    let (output, _) = malwatch(&config, &["history", "get"])?;
    assert!(!String::from_utf8_lossy(&output.stdout).contains(&notes_arg));

    // No remote storage is configured.
    let (output, combined) = malwatch(&config, &["exile", &notes_arg])?;
    assert!(!output.status.success());
    assert!(combined.contains("Remote storage is not configured"), "{combined}");
    assert!(notes.exists());
    Ok(())
}

#[test]
fn path_actions_are_saved_and_applied() -> io::Result<()> {
    let dir = tempdir()?;
    let site = dir.path().join("www/site");
    fs::create_dir_all(&site)?;
    let shell = site.join("shell.php");
    fs::write(&shell, EICAR)?;
    let config = write_config(dir.path(), "\"alert\"")?;
    let site_arg = site.to_string_lossy().into_owned();

    let (output, combined) = malwatch(
        &config,
        &["actions", "set", &site_arg, "--rule", "eicar", "quarantine"],
    )?;
    assert!(output.status.success(), "{combined}");
    let saved = Config::load(&config).map_err(io::Error::other)?;
    assert_eq!(saved.actions.paths[site_arg.as_str()]["eicar"], [Verb::Quarantine]);
    assert_eq!(saved.actions.default, [Verb::Alert]);
    assert!(saved.actions.quarantine.dir.is_some());

    let (output, _) = malwatch(&config, &["actions", "get", &site_arg])?;
    let table = String::from_utf8_lossy(&output.stdout);
    assert!(table.contains("eicar") && table.contains("quarantine"), "{table}");

    let (output, combined) = malwatch(&config, &["scan", "-u"])?;
    assert!(output.status.success(), "{combined}");
    assert!(!shell.exists());

    let (output, combined) = malwatch(&config, &["actions", "del", &site_arg])?;
    assert!(output.status.success(), "{combined}");
    let saved = Config::load(&config).map_err(io::Error::other)?;
    assert!(saved.actions.paths.is_empty());

    let (output, combined) = malwatch(&config, &["actions", "del", &site_arg])?;
    assert!(!output.status.success());
    assert!(combined.contains("No actions configured"), "{combined}");
    Ok(())
}
