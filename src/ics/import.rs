use anyhow::Result;
use rusqlite::Connection;
use crate::ics::IcsEvent;
use crate::models::{Origin, Quadrant, Task};
use crate::repo::{NewTask, Scope, TaskRepo};

/// Outcome of importing a batch of events
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: Vec<Task>,
    /// UIDs already present in this scope
    pub duplicates: Vec<String>,
}

/// Create one `UNI` task per event, skipping UIDs already imported
///
/// Runs in a single transaction.
pub fn import_events(conn: &Connection, scope: Scope, events: &[IcsEvent]) -> Result<ImportSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = ImportSummary::default();

    for event in events {
        if TaskRepo::exists_source_event(&tx, scope, &event.uid)? {
            log::warn!("Event {} already imported, skipping", event.uid);
            summary.duplicates.push(event.uid.clone());
            continue;
        }
        let mut new = NewTask::new(event.summary.clone(), Quadrant::Important);
        new.notes = event.description.clone();
        new.due_ts = Some(event.start);
        new.origin = Origin::Ics;
        new.source_event_id = Some(event.uid.clone());
        summary.imported.push(TaskRepo::create(&tx, scope, new)?);
    }

    tx.commit()?;
    log::info!(
        "Imported {} event(s), skipped {} duplicate(s)",
        summary.imported.len(),
        summary.duplicates.len()
    );
    Ok(summary)
}
