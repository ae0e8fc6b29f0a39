//! Bulk lead import and export as CSV with `Name`, `Phone`, `Email` headers.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pilot_storage::Store;

use crate::AppResult;

#[derive(Debug, Deserialize)]
struct ImportRow {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Phone", default)]
    phone: Option<String>,
    #[serde(rename = "Email", default)]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Phone")]
    phone: &'a str,
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Status")]
    status: &'a str,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Add every row with a name and a phone; returns how many were added.
/// Rows missing either are skipped, as are rows that fail to parse.
pub fn import_leads<R: Read>(store: &Store, reader: R) -> AppResult<usize> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let mut imported = 0;
    for (index, row) in csv.deserialize::<ImportRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(row = index + 1, error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };
        let (Some(name), Some(phone)) = (non_blank(row.name), non_blank(row.phone)) else {
            continue;
        };
        let email = non_blank(row.email);
        if store.add_lead(&name, &phone, email.as_deref())?.is_some() {
            imported += 1;
        }
    }
    info!(imported, "CSV lead import finished");
    Ok(imported)
}

/// Write every lead of the tenant; returns how many were written.
pub fn export_leads<W: Write>(store: &Store, writer: W) -> AppResult<usize> {
    let leads = store.all_leads()?;
    let mut csv = csv::Writer::from_writer(writer);
    for lead in &leads {
        csv.serialize(ExportRow {
            name: &lead.name,
            phone: &lead.phone,
            email: lead.email.as_deref().unwrap_or_default(),
            status: lead.status.as_str(),
        })?;
    }
    csv.flush()?;
    Ok(leads.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_core::types::TenantId;
    use pilot_storage::Database;
    use std::sync::Arc;

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("csv.db")).unwrap());
        (dir, Store::for_tenant(db, TenantId(1)))
    }

    #[test]
    fn test_import_skips_rows_without_name_or_phone() {
        let (_dir, store) = test_store();
        let data = "Name, Phone, Email\n\
                    Jane Doe,+15551230000,jane@example.com\n\
                    ,+15550000001,ghost@example.com\n\
                    No Phone,,\n\
                    Bob,+15551239999,\n";

        let count = import_leads(&store, data.as_bytes()).unwrap();
        assert_eq!(count, 2);

        let leads = store.all_leads().unwrap();
        let mut names: Vec<_> = leads.iter().map(|l| l.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Bob", "Jane Doe"]);
        let bob = leads.iter().find(|l| l.name == "Bob").unwrap();
        assert_eq!(bob.email, None);
    }

    #[test]
    fn test_import_without_email_column() {
        let (_dir, store) = test_store();
        let count = import_leads(&store, "Name,Phone\nAda,+15551112222\n".as_bytes()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.all_leads().unwrap()[0].phone, "+15551112222");
    }

    #[test]
    fn test_import_on_unbound_store_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("csv.db")).unwrap());
        let store = Store::new(db);
        let count = import_leads(&store, "Name,Phone\nAda,+15551112222\n".as_bytes()).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let (_dir, store) = test_store();
        store.add_lead("Jane Doe", "+15551230000", Some("jane@example.com")).unwrap();

        let mut out = Vec::new();
        assert_eq!(export_leads(&store, &mut out).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Name,Phone,Email,Status\nJane Doe,+15551230000,jane@example.com,Pending\n"
        );
    }
}
