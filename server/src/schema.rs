//! Synthetic INFORMATION_SCHEMA (plus a skeletal `mysql` database)
//! materialized from the backend-supplied schema mapping, and the
//! SHOW-to-SELECT translation layer.

use std::collections::HashMap;

use mimic_protocol::result::{Row, Value};

use crate::session::SchemaMapping;

/// An in-memory table the embedded evaluator can select from.
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    fn empty(columns: &[&str]) -> Self {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// The synthetic catalog: `information_schema` tables populated from the
/// user schema plus trivially-populated `mysql` tables, so standard tool
/// bootstrap queries succeed without a backend round trip.
#[derive(Debug, Clone)]
pub struct InfoSchema {
    tables: HashMap<(String, String), Table>,
}

const SCHEMATA_COLUMNS: &[&str] = &[
    "catalog_name",
    "schema_name",
    "default_character_set_name",
    "default_collation_name",
    "sql_path",
];

const TABLES_COLUMNS: &[&str] = &[
    "table_catalog",
    "table_schema",
    "table_name",
    "table_type",
    "engine",
    "version",
    "row_format",
    "table_rows",
    "avg_row_length",
    "data_length",
    "max_data_length",
    "index_length",
    "data_free",
    "auto_increment",
    "create_time",
    "update_time",
    "check_time",
    "table_collation",
    "checksum",
    "create_options",
    "table_comment",
];

const COLUMNS_COLUMNS: &[&str] = &[
    "table_catalog",
    "table_schema",
    "table_name",
    "column_name",
    "ordinal_position",
    "column_default",
    "is_nullable",
    "data_type",
    "character_maximum_length",
    "character_octet_length",
    "numeric_precision",
    "numeric_scale",
    "datetime_precision",
    "character_set_name",
    "collation_name",
    "column_type",
    "column_key",
    "extra",
    "privileges",
    "column_comment",
    "generation_expression",
    "srs_id",
];

const KEY_COLUMN_USAGE_COLUMNS: &[&str] = &[
    "constraint_catalog",
    "constraint_schema",
    "constraint_name",
    "table_catalog",
    "table_schema",
    "table_name",
    "column_name",
    "ordinal_position",
    "position_in_unique_constraint",
    "referenced_table_schema",
    "referenced_table_name",
    "referenced_column_name",
];

const REFERENTIAL_CONSTRAINTS_COLUMNS: &[&str] = &[
    "constraint_catalog",
    "constraint_schema",
    "constraint_name",
    "unique_constraint_catalog",
    "unique_constraint_schema",
    "unique_constraint_name",
    "match_option",
    "update_rule",
    "delete_rule",
    "table_name",
    "referenced_table_name",
];

const CHARACTER_SETS_COLUMNS: &[&str] = &[
    "character_set_name",
    "default_collate_name",
    "description",
    "maxlen",
];

const STATISTICS_COLUMNS: &[&str] = &[
    "table_catalog",
    "table_schema",
    "table_name",
    "non_unique",
    "index_schema",
    "index_name",
    "seq_in_index",
    "column_name",
    "collation",
    "cardinality",
    "sub_part",
    "packed",
    "nullable",
    "index_type",
    "comment",
    "index_comment",
    "is_visible",
    "expression",
];

const PARAMETERS_COLUMNS: &[&str] = &[
    "specific_catalog",
    "specific_schema",
    "specific_name",
    "ordinal_position",
    "parameter_mode",
    "parameter_name",
    "data_type",
    "character_maximum_length",
    "character_octet_length",
    "numeric_precision",
    "numeric_scale",
    "datetime_precision",
    "character_set_name",
    "collation_name",
    "dtd_identifier",
    "routine_type",
];

impl InfoSchema {
    pub fn from_mapping(mapping: &SchemaMapping) -> Self {
        let mut schema = InfoSchema {
            tables: HashMap::new(),
        };
        schema.insert("information_schema", "schemata", Table::empty(SCHEMATA_COLUMNS));
        schema.insert("information_schema", "tables", Table::empty(TABLES_COLUMNS));
        schema.insert("information_schema", "columns", Table::empty(COLUMNS_COLUMNS));
        schema.insert(
            "information_schema",
            "key_column_usage",
            Table::empty(KEY_COLUMN_USAGE_COLUMNS),
        );
        schema.insert(
            "information_schema",
            "referential_constraints",
            Table::empty(REFERENTIAL_CONSTRAINTS_COLUMNS),
        );
        schema.insert(
            "information_schema",
            "character_sets",
            Table::empty(CHARACTER_SETS_COLUMNS),
        );
        schema.insert(
            "information_schema",
            "statistics",
            Table::empty(STATISTICS_COLUMNS),
        );
        schema.insert(
            "information_schema",
            "parameters",
            Table::empty(PARAMETERS_COLUMNS),
        );
        schema.insert("mysql", "user", Table::empty(&["Host", "User"]));
        schema.insert(
            "mysql",
            "role_edges",
            Table::empty(&[
                "FROM_HOST",
                "FROM_USER",
                "TO_HOST",
                "TO_USER",
                "WITH_ADMIN_OPTION",
            ]),
        );
        schema.insert(
            "mysql",
            "procs_priv",
            Table::empty(&[
                "Host",
                "Db",
                "User",
                "Routine_name",
                "Routine_type",
                "Grantor",
                "Proc_priv",
                "Timestamp",
            ]),
        );

        schema.populate_character_sets();

        // Every (db, table, column) visible to clients: the user mapping
        // plus the synthetic tables themselves.
        let mut entries: Vec<(String, String, String, String)> = Vec::new();
        for (db, tables) in mapping {
            for (table, columns) in tables {
                for (column, sql_type) in columns {
                    entries.push((db.clone(), table.clone(), column.clone(), sql_type.clone()));
                }
            }
        }
        let mut synthetic: Vec<(String, String, String, String)> = Vec::new();
        for ((db, table), t) in &schema.tables {
            for column in &t.columns {
                synthetic.push((db.clone(), table.clone(), column.clone(), "TEXT".into()));
            }
        }
        entries.extend(synthetic);

        schema.populate_columns(&entries);
        schema.populate_tables(&entries);
        schema.populate_schemata(&entries);
        schema
    }

    fn insert(&mut self, db: &str, name: &str, table: Table) {
        self.tables
            .insert((db.to_lowercase(), name.to_lowercase()), table);
    }

    pub fn table(&self, db: &str, name: &str) -> Option<&Table> {
        self.tables.get(&(db.to_lowercase(), name.to_lowercase()))
    }

    /// Databases named here are answered internally; everything else goes
    /// to the backend.
    pub fn is_internal_db(db: &str) -> bool {
        db.eq_ignore_ascii_case("information_schema") || db.eq_ignore_ascii_case("mysql")
    }

    fn populate_character_sets(&mut self) {
        use mimic_common::charset::CharacterSet;
        let interesting = [
            (CharacterSet::Utf8mb4, "UTF-8 Unicode", 4i64),
            (CharacterSet::Utf8, "UTF-8 Unicode", 3),
            (CharacterSet::Latin1, "cp1252 West European", 1),
            (CharacterSet::Ascii, "US ASCII", 1),
            (CharacterSet::Binary, "Binary pseudo charset", 1),
        ];
        if let Some(table) = self
            .tables
            .get_mut(&("information_schema".into(), "character_sets".into()))
        {
            for (charset, description, maxlen) in interesting {
                table.rows.push(vec![
                    Value::Str(charset.name().to_string()),
                    Value::Str(charset.default_collation().name().to_string()),
                    Value::Str(description.to_string()),
                    Value::Int(maxlen),
                ]);
            }
        }
    }

    fn populate_columns(&mut self, entries: &[(String, String, String, String)]) {
        let mut ordinals: HashMap<(String, String), i64> = HashMap::new();
        let mut rows = Vec::with_capacity(entries.len());
        for (db, table, column, sql_type) in entries {
            let ordinal = ordinals.entry((db.clone(), table.clone())).or_insert(0);
            rows.push(vec![
                Value::Str("def".into()),            // table_catalog
                Value::Str(db.clone()),              // table_schema
                Value::Str(table.clone()),           // table_name
                Value::Str(column.clone()),          // column_name
                Value::Int(*ordinal),                // ordinal_position
                Value::Null,                         // column_default
                Value::Str("YES".into()),            // is_nullable
                Value::Str(sql_type.clone()),        // data_type
                Value::Null,                         // character_maximum_length
                Value::Null,                         // character_octet_length
                Value::Null,                         // numeric_precision
                Value::Null,                         // numeric_scale
                Value::Null,                         // datetime_precision
                Value::Null,                         // character_set_name
                Value::Null,                         // collation_name
                Value::Str(sql_type.clone()),        // column_type
                Value::Null,                         // column_key
                Value::Null,                         // extra
                Value::Null,                         // privileges
                Value::Null,                         // column_comment
                Value::Null,                         // generation_expression
                Value::Null,                         // srs_id
            ]);
            *ordinal += 1;
        }
        if let Some(table) = self
            .tables
            .get_mut(&("information_schema".into(), "columns".into()))
        {
            table.rows = rows;
        }
    }

    fn populate_tables(&mut self, entries: &[(String, String, String, String)]) {
        let mut seen: Vec<(String, String)> = Vec::new();
        for (db, table, _, _) in entries {
            let key = (db.clone(), table.clone());
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen.sort();

        let rows = seen
            .into_iter()
            .map(|(db, table)| {
                let table_type = if InfoSchema::is_internal_db(&db) {
                    "SYSTEM TABLE"
                } else {
                    "BASE TABLE"
                };
                let mut row = vec![
                    Value::Str("def".into()),
                    Value::Str(db),
                    Value::Str(table),
                    Value::Str(table_type.into()),
                    Value::Str("mysql-mimic".into()), // engine
                    Value::Str("1.0".into()),         // version
                ];
                row.extend(std::iter::repeat(Value::Null).take(11));
                row.push(Value::Str("utf8mb4_general_ci".into())); // table_collation
                row.extend(std::iter::repeat(Value::Null).take(3));
                row
            })
            .collect();

        if let Some(table) = self
            .tables
            .get_mut(&("information_schema".into(), "tables".into()))
        {
            table.rows = rows;
        }
    }

    fn populate_schemata(&mut self, entries: &[(String, String, String, String)]) {
        let mut dbs: Vec<String> = Vec::new();
        for (db, _, _, _) in entries {
            if !dbs.contains(db) {
                dbs.push(db.clone());
            }
        }
        dbs.sort();

        let rows = dbs
            .into_iter()
            .map(|db| {
                vec![
                    Value::Str("def".into()),
                    Value::Str(db),
                    Value::Str("utf8mb4".into()),
                    Value::Str("utf8mb4_general_ci".into()),
                    Value::Null,
                ]
            })
            .collect();

        if let Some(table) = self
            .tables
            .get_mut(&("information_schema".into(), "schemata".into()))
        {
            table.rows = rows;
        }
    }
}

fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// SHOW COLUMNS as the equivalent INFORMATION_SCHEMA select.
pub fn show_columns_query(db: &str, table: &str, like: Option<&str>, full: bool) -> String {
    let mut outputs = vec![
        "column_name AS Field",
        "data_type AS Type",
        "is_nullable AS `Null`",
        "column_key AS `Key`",
        "column_default AS `Default`",
        "extra AS Extra",
    ];
    if full {
        outputs.extend([
            "collation_name AS Collation",
            "privileges AS Privileges",
            "column_comment AS Comment",
        ]);
    }
    let mut sql = format!(
        "SELECT {} FROM information_schema.columns WHERE table_name = {} AND table_schema = {}",
        outputs.join(", "),
        quote_literal(table),
        quote_literal(db),
    );
    if let Some(like) = like {
        sql.push_str(&format!(" AND column_name LIKE {}", quote_literal(like)));
    }
    sql.push_str(" ORDER BY ordinal_position");
    sql
}

/// SHOW TABLES as the equivalent INFORMATION_SCHEMA select.
pub fn show_tables_query(db: &str, like: Option<&str>, full: bool) -> String {
    let mut outputs = vec![format!("table_name AS Tables_in_{}", db)];
    if full {
        outputs.push("table_type AS Table_type".to_string());
    }
    let mut sql = format!(
        "SELECT {} FROM information_schema.tables WHERE table_schema = {}",
        outputs.join(", "),
        quote_literal(db),
    );
    if let Some(like) = like {
        sql.push_str(&format!(" AND table_name LIKE {}", quote_literal(like)));
    }
    sql.push_str(" ORDER BY table_name");
    sql
}

/// SHOW DATABASES as the equivalent INFORMATION_SCHEMA select.
pub fn show_databases_query(like: Option<&str>) -> String {
    let mut sql =
        "SELECT schema_name AS `Database` FROM information_schema.schemata".to_string();
    if let Some(like) = like {
        sql.push_str(&format!(" WHERE schema_name LIKE {}", quote_literal(like)));
    }
    sql.push_str(" ORDER BY schema_name");
    sql
}

/// SHOW INDEX as the equivalent INFORMATION_SCHEMA select.
pub fn show_index_query(db: &str, table: &str) -> String {
    let outputs = [
        "table_name AS `Table`",
        "non_unique AS Non_unique",
        "index_name AS Key_name",
        "seq_in_index AS Seq_in_index",
        "column_name AS Column_name",
        "collation AS Collation",
        "cardinality AS Cardinality",
        "sub_part AS Sub_part",
        "packed AS Packed",
        "nullable AS `Null`",
        "index_type AS Index_type",
        "comment AS Comment",
        "index_comment AS Index_comment",
        "is_visible AS Visible",
        "expression AS Expression",
    ];
    format!(
        "SELECT {} FROM information_schema.statistics WHERE table_name = {} AND table_schema = {}",
        outputs.join(", "),
        quote_literal(table),
        quote_literal(db),
    )
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::*;

    fn mapping() -> SchemaMapping {
        let mut columns = BTreeMap::new();
        columns.insert("a".to_string(), "TEXT".to_string());
        columns.insert("b".to_string(), "TEXT".to_string());
        let mut tables = BTreeMap::new();
        tables.insert("x".to_string(), columns);
        let mut dbs = BTreeMap::new();
        dbs.insert("db".to_string(), tables);
        dbs
    }

    #[test]
    fn test_columns_populated() {
        let schema = InfoSchema::from_mapping(&mapping());
        let columns = schema.table("information_schema", "columns").unwrap();
        let user_rows: Vec<&Row> = columns
            .rows
            .iter()
            .filter(|r| r[1] == Value::Str("db".into()))
            .collect();
        assert_eq!(2, user_rows.len());
        assert_eq!(Value::Str("x".into()), user_rows[0][2]);
        assert_eq!(Value::Str("TEXT".into()), user_rows[0][7]);
    }

    #[test]
    fn test_tables_include_synthetic() {
        let schema = InfoSchema::from_mapping(&mapping());
        let tables = schema.table("information_schema", "tables").unwrap();
        assert!(tables
            .rows
            .iter()
            .any(|r| r[2] == Value::Str("columns".into())
                && r[3] == Value::Str("SYSTEM TABLE".into())));
        assert!(tables
            .rows
            .iter()
            .any(|r| r[2] == Value::Str("x".into()) && r[3] == Value::Str("BASE TABLE".into())));
    }

    #[test]
    fn test_mysql_tables_exist_and_are_empty() {
        let schema = InfoSchema::from_mapping(&SchemaMapping::new());
        assert!(schema.table("mysql", "user").unwrap().rows.is_empty());
        assert!(schema.table("mysql", "role_edges").unwrap().rows.is_empty());
        assert!(schema.table("MYSQL", "PROCS_PRIV").is_some());
    }

    #[test]
    fn test_show_translations() {
        let sql = show_columns_query("db", "x", Some("a%"), false);
        assert!(sql.contains("information_schema.columns"));
        assert!(sql.contains("table_name = 'x'"));
        assert!(sql.contains("LIKE 'a%'"));

        let sql = show_tables_query("db", None, true);
        assert!(sql.contains("Tables_in_db"));
        assert!(sql.contains("Table_type"));

        assert!(show_databases_query(None).contains("schemata"));
        assert!(show_index_query("db", "x").contains("statistics"));
    }
}
