use tabled::{Table, Tabled};

use crate::models::{ImageRecord, TestRecord};

#[derive(Tabled)]
struct TestRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Date")]
    date: String,
}

impl From<&TestRecord> for TestRow {
    fn from(t: &TestRecord) -> Self {
        Self {
            id: t.id.clone(),
            patient: t.patient_id.clone(),
            name: truncate(&t.name, 30),
            kind: t.kind.as_str().to_string(),
            result: truncate(&t.result, 30),
            date: format_date(&t.date),
        }
    }
}

pub fn format_tests(tests: &[TestRecord]) -> String {
    if tests.is_empty() {
        return "No tests found.\n".to_string();
    }
    let rows: Vec<TestRow> = tests.iter().map(TestRow::from).collect();
    format!("{}\n", Table::new(rows))
}

#[derive(Tabled)]
struct ImageRow {
    #[tabled(rename = "Test")]
    test: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&ImageRecord> for ImageRow {
    fn from(i: &ImageRecord) -> Self {
        Self {
            test: i.test_id.clone(),
            kind: i.kind.as_str().to_string(),
            path: truncate(&i.path, 60),
            created: format_date(&i.created_at),
        }
    }
}

pub fn format_images(images: &[ImageRecord]) -> String {
    if images.is_empty() {
        return "No images found.\n".to_string();
    }
    let rows: Vec<ImageRow> = images.iter().map(ImageRow::from).collect();
    format!("{}\n", Table::new(rows))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Show just the date portion of an ISO-8601 timestamp.
fn format_date(iso: &str) -> String {
    iso.split('T').next().unwrap_or(iso).to_string()
}
