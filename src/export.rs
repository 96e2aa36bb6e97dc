// 📤 Export - unregistered students as a downloadable CSV
//
// Headers are the canonical synonyms, so an exported file can be edited
// and uploaded again as a new batch.

use crate::extract::Field;
use crate::student::ExpectedStudent;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write students as CSV, in the order given. Returns the row count.
pub fn write_unregistered_csv<W: Write>(writer: W, students: &[ExpectedStudent]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(Field::ALL.iter().map(|f| f.canonical_header()))?;

    for student in students {
        csv_writer.write_record([
            student.given_name.as_str(),
            student.family_name.as_str(),
            student.national_id.as_str(),
            student.class.code(),
        ])?;
    }

    csv_writer.flush().context("Failed to flush CSV export")?;
    Ok(students.len())
}

pub fn export_unregistered(path: &Path, students: &[ExpectedStudent]) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;

    write_unregistered_csv(file, students)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ingest_rows;
    use crate::identity::IdentityNumber;
    use crate::parser::{get_parser, SheetFormat};
    use crate::student::ClassLabel;

    fn student(id: &str, given: &str, row: usize) -> ExpectedStudent {
        ExpectedStudent {
            national_id: IdentityNumber::from_digits(id),
            given_name: given.to_string(),
            family_name: "Karimi".to_string(),
            class: ClassLabel::C901,
            registered: false,
            batch_id: "B1".to_string(),
            row_number: row,
        }
    }

    #[test]
    fn test_csv_layout() {
        let mut buffer = Vec::new();
        let count = write_unregistered_csv(
            &mut buffer,
            &[student("0499370899", "Sara", 2), student("0010010017", "Ali, Jr", 3)],
        )
        .unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(count, 2);
        assert_eq!(lines[0], "given_name,family_name,national_id,class");
        assert_eq!(lines[1], "Sara,Karimi,0499370899,901");
        assert_eq!(lines[2], "\"Ali, Jr\",Karimi,0010010017,901");
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let mut buffer = Vec::new();
        assert_eq!(write_unregistered_csv(&mut buffer, &[]).unwrap(), 0);
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_export_can_be_reimported() {
        let students = vec![student("0499370899", "Sara", 2), student("0010010017", "Ali", 5)];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unregistered.csv");

        export_unregistered(&path, &students).unwrap();

        let rows = get_parser(SheetFormat::Csv).parse(&path).unwrap();
        let report = ingest_rows(&rows, "B2").unwrap();

        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.accepted[1].given_name, "Ali");
        assert_eq!(report.accepted[1].class, ClassLabel::C901);
    }
}
