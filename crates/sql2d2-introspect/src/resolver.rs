//! Decode introspection rows into a typed schema
//!
//! Each row describes one column:
//!
//! | # | field                 | example            |
//! |---|-----------------------|--------------------|
//! | 0 | schema qualifier      | `public`           |
//! | 1 | table name            | `orders`           |
//! | 2 | column name           | `user_id`          |
//! | 3 | declared type         | `integer`          |
//! | 4 | is_nullable           | `YES` / `NO`       |
//! | 5 | default expression    | `nextval(...)`     |
//! | 6 | aggregated tags       | `{PK,FK->users.id}`|

use indexmap::IndexMap;
use sql2d2_core::{Column, Constraint, Diagnostic, DiagnosticCode, Schema, Table};
use sql2d2_sandbox::{Row, SqlValue};

/// Minimum number of fields an introspection row must carry
pub const REQUIRED_FIELDS: usize = 7;

const TABLE_NAME: usize = 1;
const COLUMN_NAME: usize = 2;
const DATA_TYPE: usize = 3;
const IS_NULLABLE: usize = 4;
const COLUMN_DEFAULT: usize = 5;
const CONSTRAINT_TAGS: usize = 6;

const PRIMARY_KEY_TAG: &str = "PK";
const UNIQUE_TAG: &str = "UNIQUE";
const FOREIGN_KEY_PREFIX: &str = "FK->";

/// Null element marker inside an array literal
const NULL_MARKER: &str = "NULL";

/// Result of resolving a batch of rows
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Tables in first-seen order
    pub schema: Schema,

    /// Skipped rows and unrecognized tags
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }
}

/// Builds a [`Schema`] from raw introspection rows
#[derive(Debug, Default)]
pub struct ConstraintResolver {
    tables: IndexMap<String, Table>,
    diagnostics: Vec<Diagnostic>,
}

impl ConstraintResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a complete result set
    pub fn resolve(rows: &[Row]) -> Resolution {
        let mut resolver = Self::new();
        for (index, row) in rows.iter().enumerate() {
            resolver.push_row(index, row);
        }
        resolver.finish()
    }

    /// Add one row; rows with too few fields are recorded and skipped
    pub fn push_row(&mut self, index: usize, row: &Row) {
        if row.len() < REQUIRED_FIELDS {
            tracing::warn!(
                row = index,
                fields = row.len(),
                "Skipping introspection row with fewer than {} fields",
                REQUIRED_FIELDS
            );
            self.diagnostics.push(
                Diagnostic::warn(
                    DiagnosticCode::IntrospectionRowSkipped,
                    format!(
                        "row has {} fields, expected at least {}",
                        row.len(),
                        REQUIRED_FIELDS
                    ),
                )
                .at_index(index),
            );
            return;
        }

        let table_name = text(&row[TABLE_NAME]);
        let column_name = text(&row[COLUMN_NAME]);
        let data_type = text(&row[DATA_TYPE]);

        let mut constraints = Vec::new();
        if text(&row[IS_NULLABLE]) == "NO" {
            constraints.push(Constraint::NotNull);
        }
        if let Some(default) = row[COLUMN_DEFAULT].as_text().filter(|d| !d.is_empty()) {
            constraints.push(Constraint::default_value(default));
        }

        let raw_tags = row[CONSTRAINT_TAGS].as_text();
        for constraint in decode_tags(raw_tags.as_deref()) {
            if let Constraint::Unknown { name } = &constraint {
                tracing::debug!(table = %table_name, column = %column_name, tag = %name, "Unrecognized constraint tag");
                self.diagnostics.push(
                    Diagnostic::info(
                        DiagnosticCode::ConstraintTagUnrecognized,
                        format!("{}.{}: kept tag '{}' as-is", table_name, column_name, name),
                    )
                    .at_index(index),
                );
            }
            constraints.push(constraint);
        }

        self.tables
            .entry(table_name.clone())
            .or_insert_with(|| Table::new(table_name))
            .columns
            .push(Column::new(column_name, data_type).with_constraints(constraints));
    }

    pub fn finish(self) -> Resolution {
        Resolution {
            schema: Schema::from_tables(self.tables.into_values().collect()),
            diagnostics: self.diagnostics,
        }
    }
}

/// Text form of a scalar; NULL becomes the empty string
fn text(value: &SqlValue) -> String {
    value.as_text().map(|t| t.into_owned()).unwrap_or_default()
}

/// Decode an aggregated tag array such as `{PK,"FK->users.id"}`
///
/// NULL, the empty array and the all-NULL array decode to nothing.
pub fn decode_tags(raw: Option<&str>) -> Vec<Constraint> {
    let Some(raw) = raw.map(str::trim) else {
        return Vec::new();
    };

    let inner = raw.strip_prefix('{').unwrap_or(raw);
    let inner = inner.strip_suffix('}').unwrap_or(inner);

    split_elements(inner)
        .into_iter()
        .filter(|(element, quoted)| !element.is_empty() && (*quoted || element != NULL_MARKER))
        .map(|(element, _)| decode_tag(&element))
        .collect()
}

/// Decode a single tag token
///
/// A foreign key tag without a `.` separator is kept as `Unknown`.
pub fn decode_tag(token: &str) -> Constraint {
    match token {
        PRIMARY_KEY_TAG => Constraint::PrimaryKey,
        UNIQUE_TAG => Constraint::Unique,
        _ => match token
            .strip_prefix(FOREIGN_KEY_PREFIX)
            .and_then(|target| target.split_once('.'))
        {
            Some((table, column)) => Constraint::foreign_key(table, column),
            None => Constraint::unknown(token),
        },
    }
}

/// Split array-literal elements on commas outside double quotes
///
/// Quotes are removed and backslash escapes resolved. Unquoted elements are
/// trimmed. Each element is paired with whether any part of it was quoted.
fn split_elements(inner: &str) -> Vec<(String, bool)> {
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                if !quoted && current.trim().is_empty() {
                    current.clear();
                }
                in_quotes = !in_quotes;
                quoted = true;
            }
            ',' if !in_quotes => {
                elements.push(finish_element(&current, quoted));
                current.clear();
                quoted = false;
            }
            c if c.is_whitespace() && !in_quotes && quoted => {}
            c => current.push(c),
        }
    }
    elements.push(finish_element(&current, quoted));
    elements
}

fn finish_element(element: &str, quoted: bool) -> (String, bool) {
    let element = if quoted { element } else { element.trim() };
    (element.to_string(), quoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(table: &str, column: &str, data_type: &str, nullable: &str, default: Option<&str>, tags: Option<&str>) -> Row {
        vec![
            "public".into(),
            table.into(),
            column.into(),
            data_type.into(),
            nullable.into(),
            default.into(),
            tags.into(),
        ]
    }

    #[test]
    fn primary_key_and_unique() {
        let resolution = ConstraintResolver::resolve(&[
            row("users", "id", "integer", "NO", None, Some("{PK}")),
            row("users", "email", "text", "NO", None, Some("{UNIQUE}")),
        ]);

        let expected = Schema::from_tables(vec![Table::from_columns(
            "users",
            vec![
                Column::new("id", "integer").with_constraints(vec![Constraint::NotNull, Constraint::PrimaryKey]),
                Column::new("email", "text").with_constraints(vec![Constraint::NotNull, Constraint::Unique]),
            ],
        )]);

        assert_eq!(resolution.schema, expected);
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn foreign_key_tag() {
        let resolution = ConstraintResolver::resolve(&[row(
            "orders",
            "user_id",
            "integer",
            "YES",
            None,
            Some("{FK->users.id}"),
        )]);

        let column = &resolution.schema.tables[0].columns[0];
        assert_eq!(column.constraints, vec![Constraint::foreign_key("users", "id")]);
    }

    #[test]
    fn foreign_key_splits_on_first_dot() {
        assert_eq!(decode_tag("FK->users.id.extra"), Constraint::foreign_key("users", "id.extra"));
    }

    #[test]
    fn malformed_foreign_key_is_unknown() {
        let resolution = ConstraintResolver::resolve(&[row(
            "orders",
            "user_id",
            "integer",
            "YES",
            None,
            Some("{FK->usersid}"),
        )]);

        let column = &resolution.schema.tables[0].columns[0];
        assert_eq!(column.constraints, vec![Constraint::unknown("FK->usersid")]);
        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(resolution.diagnostics[0].code, DiagnosticCode::ConstraintTagUnrecognized);
        assert_eq!(resolution.warnings().count(), 0);
    }

    #[test]
    fn empty_and_null_tag_arrays_add_nothing() {
        for tags in [None, Some(""), Some("{}"), Some("{NULL}"), Some("{NULL,NULL}")] {
            let resolution = ConstraintResolver::resolve(&[row("t", "c", "text", "NO", Some("'x'::text"), tags)]);
            assert_eq!(
                resolution.schema.tables[0].columns[0].constraints,
                vec![Constraint::NotNull, Constraint::default_value("'x'::text")],
                "tags: {:?}",
                tags
            );
        }
    }

    #[test]
    fn default_is_verbatim_and_ordered_before_tags() {
        let resolution = ConstraintResolver::resolve(&[row(
            "users",
            "id",
            "integer",
            "NO",
            Some("nextval('users_id_seq'::regclass)"),
            Some("{PK}"),
        )]);

        assert_eq!(
            resolution.schema.tables[0].columns[0].constraints,
            vec![
                Constraint::NotNull,
                Constraint::default_value("nextval('users_id_seq'::regclass)"),
                Constraint::PrimaryKey,
            ]
        );
    }

    #[test]
    fn empty_default_is_ignored() {
        let resolution = ConstraintResolver::resolve(&[row("t", "c", "text", "YES", Some(""), None)]);
        assert!(resolution.schema.tables[0].columns[0].constraints.is_empty());
    }

    #[test]
    fn tokens_are_trimmed_and_unquoted() {
        assert_eq!(
            decode_tags(Some("{ PK , \"FK->users.id\",CHECK}")),
            vec![
                Constraint::PrimaryKey,
                Constraint::foreign_key("users", "id"),
                Constraint::unknown("CHECK"),
            ]
        );
        assert_eq!(decode_tags(Some(r#"{"FK->my \"t\".id"}"#)), vec![Constraint::foreign_key("my \"t\"", "id")]);
    }

    #[test]
    fn quoted_commas_stay_inside_one_tag() {
        assert_eq!(
            decode_tags(Some(r#"{"FK->a,b.id",PK}"#)),
            vec![Constraint::foreign_key("a,b", "id"), Constraint::PrimaryKey]
        );
        assert_eq!(
            decode_tags(Some(r#"{ "FK->x.y" , NULL, "NULL"}"#)),
            vec![Constraint::foreign_key("x", "y"), Constraint::unknown("NULL")]
        );
    }

    #[test]
    fn short_rows_are_reported_not_silently_dropped() {
        let short: Row = vec!["public".into(), "users".into(), "id".into()];
        let resolution = ConstraintResolver::resolve(&[
            short,
            row("users", "email", "text", "YES", None, None),
        ]);

        assert_eq!(resolution.schema.tables[0].column_names(), vec!["email"]);

        let warnings: Vec<_> = resolution.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, DiagnosticCode::IntrospectionRowSkipped);
        assert_eq!(warnings[0].index, Some(0));
    }

    #[test]
    fn tables_keep_first_seen_order() {
        let rows = vec![
            row("zebra", "id", "integer", "NO", None, Some("{PK}")),
            row("apple", "id", "integer", "NO", None, Some("{PK}")),
            row("zebra", "name", "text", "YES", None, None),
            row("mango", "id", "integer", "NO", None, None),
        ];

        let first = ConstraintResolver::resolve(&rows);
        assert_eq!(first.schema.table_names(), vec!["zebra", "apple", "mango"]);
        assert_eq!(first.schema.tables[0].column_names(), vec!["id", "name"]);

        for _ in 0..10 {
            assert_eq!(ConstraintResolver::resolve(&rows), first);
        }
    }

    #[test]
    fn non_text_values_are_coerced() {
        let rows = vec![vec![
            "public".into(),
            "t".into(),
            "n".into(),
            "integer".into(),
            "NO".into(),
            SqlValue::Int(0),
            SqlValue::Bytes(b"{UNIQUE}".to_vec()),
        ]];

        let resolution = ConstraintResolver::resolve(&rows);
        assert_eq!(
            resolution.schema.tables[0].columns[0].constraints,
            vec![Constraint::NotNull, Constraint::default_value("0"), Constraint::Unique]
        );
    }
}
