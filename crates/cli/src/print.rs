use async_trait::async_trait;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use config::Loadout;
use engine::{Error, Hit, ScanResult, Status, Task};
use std::io::Write;

/// Prints one table per result for interactive scans.
#[derive(Debug, Default)]
pub struct PrintTask;

fn styled(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

fn status(status: &Status) -> Cell {
    if status.is_detected() {
        Cell::new("detected").fg(Color::Red)
    } else {
        Cell::new(status).fg(Color::Green)
    }
}

fn joined<T: AsRef<str>>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Path, rules, actions and final status of every detection in `result`.
pub fn table(result: &ScanResult) -> Table {
    let mut table = styled(&["Path", "Rules", "Actions", "Status"]);
    for (path, meta) in &result.paths {
        table.add_row(vec![
            Cell::new(path.display()),
            Cell::new(joined(&meta.rules)),
            Cell::new(joined(meta.acts.iter().map(|verb| verb.as_str()))),
            status(&meta.status),
        ]);
    }
    table
}

/// Recorded detections, one row each.
pub fn history<'a>(hits: impl IntoIterator<Item = &'a Hit>) -> Table {
    let mut table = styled(&["Path", "Time", "Rules", "Actions", "Status"]);
    for hit in hits {
        let meta = &hit.meta;
        table.add_row(vec![
            Cell::new(hit.path.display()),
            Cell::new(meta.time.format("%Y-%m-%d %H:%M:%S UTC")),
            Cell::new(joined(&meta.rules)),
            Cell::new(joined(meta.acts.iter().map(|verb| verb.as_str()))),
            status(&meta.status),
        ]);
    }
    table
}

/// Rules and their actions. A rule without actions is whitelisted.
pub fn loadouts(loadouts: &[Loadout]) -> Table {
    let mut table = styled(&["Rule", "Actions"]);
    for loadout in loadouts {
        let actions = if loadout.actions.is_empty() {
            Cell::new("none").fg(Color::Yellow)
        } else {
            Cell::new(joined(loadout.actions.iter().map(|verb| verb.as_str())))
        };
        table.add_row(vec![Cell::new(&loadout.rule), actions]);
    }
    table
}

/// Target and detection count, plus the error count when actions failed.
pub fn heading(result: &ScanResult) -> String {
    match result.errs.len() {
        0 => format!("{} ({} detections)", result.target, result.len()),
        errs => format!("{} ({} detections, {errs} errors)", result.target, result.len()),
    }
}

#[async_trait]
impl Task for PrintTask {
    fn name(&self) -> &'static str {
        "print"
    }

    async fn run(&self, result: &ScanResult) -> Result<(), Error> {
        if result.is_empty() {
            return Ok(());
        }
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", heading(result))?;
        writeln!(out, "{}", table(result))?;
        Ok(())
    }
}
