use crate::data::model::{NativeMetadata, Table};

/// Descriptive attributes of one dataset column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDescription {
    pub label: Option<String>,
    pub data_type: Option<String>,
    pub length: Option<String>,
    pub format: Option<String>,
}

impl ColumnDescription {
    fn is_empty(&self) -> bool {
        self.label.is_none() && self.data_type.is_none() && self.length.is_none() && self.format.is_none()
    }
}

/// One line of the metadata view.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    /// 1-based position.
    pub number: usize,
    pub variable: String,
    pub label: String,
    pub data_type: String,
    pub length: String,
    pub format: String,
}

/// Describe `column`.
///
/// A row of the matched specification whose `Variable` equals the column
/// name takes precedence; native metadata is consulted only without one.
pub fn describe_column(
    column: &str,
    matched: Option<&Table>,
    native: Option<&NativeMetadata>,
) -> Option<ColumnDescription> {
    if let Some(desc) = matched.and_then(|spec| from_spec_row(spec, column)) {
        return Some(desc);
    }

    let native = native?;
    let desc = ColumnDescription {
        label: native.labels.get(column).cloned(),
        data_type: native.types.get(column).cloned(),
        length: native.widths.get(column).map(|w| w.to_string()),
        format: native
            .formats
            .as_ref()
            .and_then(|f| f.get(column))
            .filter(|f| !f.is_empty())
            .cloned(),
    };
    (!desc.is_empty()).then_some(desc)
}

fn from_spec_row(spec: &Table, column: &str) -> Option<ColumnDescription> {
    let variables = spec.column_ci("variable")?;
    let row = variables
        .values
        .iter()
        .position(|v| v.as_text().as_deref() == Some(column))?;
    let field = |name: &str| spec.column_ci(name).and_then(|c| c.values[row].as_text());
    Some(ColumnDescription {
        label: field("label"),
        data_type: field("type"),
        length: field("length"),
        format: field("format"),
    })
}

/// Rows for the metadata view, or `None` when there is nothing to describe
/// the dataset with.
///
/// Column order follows the native metadata when present, otherwise the
/// dataset itself.
pub fn metadata_rows(
    dataset: &Table,
    matched: Option<&Table>,
    native: Option<&NativeMetadata>,
) -> Option<Vec<MetadataRow>> {
    let columns: Vec<&str> = match (native, matched) {
        (Some(native), _) => native.column_names.iter().map(String::as_str).collect(),
        (None, Some(_)) => dataset.column_names().collect(),
        (None, None) => return None,
    };

    let rows = columns
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let desc = describe_column(name, matched, native).unwrap_or_default();
            MetadataRow {
                number: i + 1,
                variable: name.to_string(),
                label: desc.label.unwrap_or_default(),
                data_type: desc.data_type.unwrap_or_default(),
                length: desc.length.unwrap_or_default(),
                format: desc.format.unwrap_or_default(),
            }
        })
        .collect();
    Some(rows)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::model::CellValue;

    fn spec() -> Table {
        Table::from_rows(
            vec!["VARIABLE".into(), "Label".into(), "TYPE".into(), "Length".into()],
            vec![
                vec![
                    CellValue::String("AGE".into()),
                    CellValue::String("Age in years".into()),
                    CellValue::String("Num".into()),
                    CellValue::Integer(8),
                ],
                vec![CellValue::String("SEX".into())],
                vec![
                    CellValue::String("AGE".into()),
                    CellValue::String("Duplicate".into()),
                ],
            ],
        )
    }

    fn native() -> NativeMetadata {
        let mut m = NativeMetadata {
            column_names: vec!["AGE".into(), "RFSTDTC".into(), "SEX".into()],
            ..Default::default()
        };
        m.labels.insert("AGE".into(), "Native age".into());
        m.labels.insert("RFSTDTC".into(), "Reference Start".into());
        m.types.insert("RFSTDTC".into(), "double".into());
        m.widths.insert("RFSTDTC".into(), 8);
        let mut formats = BTreeMap::new();
        formats.insert("RFSTDTC".into(), "DATE9.".into());
        formats.insert("AGE".into(), String::new());
        m.formats = Some(formats);
        m
    }

    #[test]
    fn spec_row_wins_over_native_metadata() {
        let spec = spec();
        let native = native();
        let d = describe_column("AGE", Some(&spec), Some(&native)).unwrap();
        assert_eq!(d.label.as_deref(), Some("Age in years"));
        assert_eq!(d.data_type.as_deref(), Some("Num"));
        assert_eq!(d.length.as_deref(), Some("8"));
        assert_eq!(d.format, None);
    }

    #[test]
    fn spec_row_with_empty_fields_still_shadows_native() {
        let spec = spec();
        let native = native();
        let d = describe_column("SEX", Some(&spec), Some(&native)).unwrap();
        assert_eq!(d, ColumnDescription::default());
    }

    #[test]
    fn falls_back_to_native_metadata() {
        let spec = spec();
        let native = native();
        let d = describe_column("RFSTDTC", Some(&spec), Some(&native)).unwrap();
        assert_eq!(d.label.as_deref(), Some("Reference Start"));
        assert_eq!(d.data_type.as_deref(), Some("double"));
        assert_eq!(d.length.as_deref(), Some("8"));
        assert_eq!(d.format.as_deref(), Some("DATE9."));
    }

    #[test]
    fn empty_native_format_is_not_reported() {
        let native = native();
        let d = describe_column("AGE", None, Some(&native)).unwrap();
        assert_eq!(d.format, None);
        assert_eq!(d.label.as_deref(), Some("Native age"));
    }

    #[test]
    fn nothing_known_gives_none() {
        let native = native();
        assert!(describe_column("UNKNOWN", None, Some(&native)).is_none());
        assert!(describe_column("AGE", None, None).is_none());
    }

    #[test]
    fn rows_follow_native_column_order() {
        let dataset = Table::from_rows(vec!["SEX".into(), "AGE".into()], vec![]);
        let native = native();
        let rows = metadata_rows(&dataset, None, Some(&native)).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.variable.as_str()).collect();
        assert_eq!(names, vec!["AGE", "RFSTDTC", "SEX"]);
        assert_eq!(rows[1].number, 2);
        assert_eq!(rows[2].label, "");
    }

    #[test]
    fn rows_without_native_metadata_need_a_match() {
        let dataset = Table::from_rows(vec!["SEX".into(), "AGE".into()], vec![]);
        assert!(metadata_rows(&dataset, None, None).is_none());

        let spec = spec();
        let rows = metadata_rows(&dataset, Some(&spec), None).unwrap();
        assert_eq!(rows[0].variable, "SEX");
        assert_eq!(rows[1].label, "Age in years");
    }
}
