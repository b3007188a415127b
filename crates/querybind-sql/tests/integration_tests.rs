//! Integration tests for statement parsing and query building

mod fixtures;

use fixtures::{catalog, parser};
use pretty_assertions::assert_eq;
use querybind_core::{ColumnKind, Config, ErrorKind, OrderByTarget, QuerySchema};
use querybind_sql::SqlParser;
use std::sync::Arc;
use std::thread;

fn order_targets(query: &QuerySchema) -> Vec<(OrderByTarget, bool)> {
    query
        .order_by()
        .iter()
        .map(|o| (o.target.clone(), o.ascending))
        .collect()
}

fn expanded_names(query: &QuerySchema) -> Vec<String> {
    query
        .fields_expanded()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

#[test]
fn single_table_select_star() {
    let query = parser().parse("SELECT * FROM customers").unwrap();

    assert!(query.master_table().is_some_and(|m| m.has_name("customers")));
    assert_eq!(query.columns().len(), 1);
    assert_eq!(query.columns()[0].kind, ColumnKind::Asterisk { scope: None });
    assert_eq!(expanded_names(&query), vec!["id", "name", "email"]);
    assert_eq!(query.pkey_fields_order(), vec![Some(0)]);
    assert_eq!(query.auto_increment_fields().len(), 1);
}

#[test]
fn aliased_tables_have_no_master() {
    let query = parser()
        .parse("SELECT a.x, b.* FROM tbl1 a, tbl2 b")
        .unwrap();

    assert!(query.master_table().is_none());
    assert_eq!(query.table_alias(0), Some("a"));
    assert_eq!(query.table_alias(1), Some("b"));
    assert_eq!(query.table_bound_to_column(0), Some(0));
    assert_eq!(query.columns()[1].kind, ColumnKind::Asterisk { scope: Some(1) });
    assert_eq!(expanded_names(&query), vec!["x", "y", "z"]);
}

#[test]
fn same_table_twice_reports_implicit_master() {
    let query = parser()
        .parse("SELECT t1.id FROM customers t1, customers t2 WHERE t1.id = t2.id")
        .unwrap();

    assert!(query.master_table().is_some_and(|m| m.has_name("customers")));
    assert_eq!(query.table_positions("customers"), vec![0, 1]);
}

#[test]
fn repeated_alias_is_ambiguous() {
    let err = parser()
        .parse("SELECT t.id, name AS n FROM customers t, orders t")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Ambiguity);
    assert_eq!(err.message, "Ambiguous \"t.id\" expression");
    assert_eq!(
        err.details.as_deref(),
        Some("More than one \"t\" table or alias defined containing \"id\" field")
    );
    assert_eq!(err.token, "t.id");
    assert_eq!(err.position, Some(7));
    assert_eq!(err.pointer_line().as_deref(), Some("       ^"));
}

#[test]
fn unqualified_field_binds_to_unique_owner_under_repeated_alias() {
    let query = parser()
        .parse("SELECT name AS n FROM customers t, orders t")
        .unwrap();

    assert_eq!(query.table_bound_to_column(0), Some(0));
    assert_eq!(query.column_alias(0).as_deref(), Some("n"));
    assert!(query.master_table().is_none());
}

#[test]
fn unqualified_field_in_two_tables() {
    let err = parser().parse("SELECT id FROM customers, orders").unwrap_err();

    assert_eq!(err.kind, ErrorKind::Ambiguity);
    assert_eq!(err.message, "Ambiguous field name");
    assert_eq!(err.position, Some(7));
}

#[test]
fn table_covered_by_alias() {
    let err = parser()
        .parse("SELECT customers.name FROM customers c")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "Could not access the table directly using its name");
    assert_eq!(err.position, Some(7));
}

#[test]
fn unknown_table_is_located() {
    let err = parser()
        .parse("SELECT name FROM customers, nowhere")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "Table \"nowhere\" does not exist");
    assert_eq!(err.token, "nowhere");
    assert_eq!(err.position, Some(28));
}

#[test]
fn order_by_keeps_declared_order() {
    let query = parser()
        .parse("SELECT id, name, email FROM customers ORDER BY id, name DESC, email")
        .unwrap();

    assert_eq!(
        order_targets(&query),
        vec![
            (OrderByTarget::Column(0), true),
            (OrderByTarget::Column(1), false),
            (OrderByTarget::Column(2), true),
        ]
    );
}

#[test]
fn order_by_fields_outside_the_column_list() {
    let query = parser()
        .parse("SELECT * FROM customers ORDER BY email, id DESC")
        .unwrap();

    assert_eq!(
        order_targets(&query),
        vec![
            (
                OrderByTarget::Field {
                    table_position: 0,
                    field: "email".to_string()
                },
                true
            ),
            (
                OrderByTarget::Field {
                    table_position: 0,
                    field: "id".to_string()
                },
                false
            ),
        ]
    );
}

#[test]
fn order_by_position_out_of_range() {
    let err = parser()
        .parse("SELECT name FROM customers ORDER BY 4")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "Could not define sorting - no column at position 4");
    assert_eq!(err.position, Some(36));
}

#[test]
fn asterisk_needs_tables() {
    let err = parser().parse("SELECT *").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Shape);
    assert_eq!(err.message, "\"*\" could not be used if no tables are specified");

    let query = parser().parse("SELECT 1").unwrap();
    assert!(query.tables().is_empty());
    assert!(query.master_table().is_none());
    assert!(query.columns()[0].is_expression());
    assert_eq!(query.column_alias(0).as_deref(), Some("expr1"));
}

#[test]
fn where_clause_is_bound() {
    let query = parser()
        .parse("SELECT name FROM customers c WHERE c.id > 10 AND email LIKE '%@x'")
        .unwrap();

    let where_expr = query.where_expression().unwrap();
    assert!(where_expr.variables().iter().all(|v| v.binding.is_some()));
    assert_eq!(
        query.to_sql(),
        "SELECT c.name FROM customers c WHERE (c.id > 10) AND (email LIKE '%@x')"
    );
}

#[test]
fn asterisk_in_where_is_rejected() {
    let err = parser()
        .parse("SELECT name FROM customers WHERE COALESCE(customers.*) IS NULL")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.token, "customers.*");
}

#[test]
fn primary_key_order_follows_columns() {
    let query = parser().parse("SELECT name, id FROM customers").unwrap();

    assert_eq!(query.pkey_fields_order(), vec![Some(1)]);
    assert_eq!(query.pkey_fields_count(), 1);
}

#[test]
fn to_sql_round_trip() {
    let parser = parser();
    for sql in [
        "SELECT * FROM customers",
        "SELECT a.x AS px, b.* FROM tbl1 a, tbl2 b WHERE a.x > 5 ORDER BY px DESC, b.y",
        "SELECT c.name, COUNT(*) FROM customers c",
        "SELECT id, amount * 2 AS doubled FROM orders ORDER BY 2",
        "SELECT t1.id FROM customers t1, customers t2 WHERE t1.id = t2.id",
        "SELECT \"order\" FROM t",
        "SELECT \"order\" + 1 FROM t",
        "SELECT x FROM \"select\"",
        "SELECT \"my col\" * 2 FROM t",
        "SELECT \"a.b\" AS \"group\" FROM t ORDER BY \"group\" DESC",
    ] {
        let first = parser.parse(sql).unwrap();
        let rendered = first.to_sql();
        let second = parser
            .parse(&rendered)
            .unwrap_or_else(|e| panic!("{} re-parse failed: {}", rendered, e));

        assert_eq!(first.tables(), second.tables(), "{}", sql);
        let aliases = |q: &QuerySchema| {
            (0..q.columns().len())
                .map(|i| q.column_alias(i))
                .collect::<Vec<_>>()
        };
        assert_eq!(aliases(&first), aliases(&second), "{}", sql);
        assert_eq!(rendered, second.to_sql(), "{}", sql);
    }

    assert_eq!(
        parser
            .parse("SELECT a.x AS px, b.* FROM tbl1 a, tbl2 b WHERE a.x > 5 ORDER BY px DESC, b.y")
            .unwrap()
            .to_sql(),
        "SELECT a.x AS px, b.* FROM tbl1 a, tbl2 b WHERE a.x > 5 ORDER BY px DESC, b.y"
    );

    let rendered = |sql: &str| parser.parse(sql).unwrap().to_sql();
    assert_eq!(rendered("SELECT \"order\" FROM t"), "SELECT t.\"order\" FROM t");
    assert_eq!(rendered("SELECT \"order\" + 1 FROM t"), "SELECT \"order\" + 1 FROM t");
    assert_eq!(rendered("SELECT x FROM \"select\""), "SELECT \"select\".x FROM \"select\"");
    assert_eq!(rendered("SELECT \"my col\" * 2 FROM t"), "SELECT \"my col\" * 2 FROM t");
}

#[test]
fn quoted_name_with_dot_is_one_field() {
    let query = parser()
        .parse("SELECT \"a.b\", t.\"a.b\" FROM t ORDER BY \"a.b\"")
        .unwrap();

    assert_eq!(expanded_names(&query), vec!["a.b", "a.b"]);
    assert_eq!(order_targets(&query), vec![(OrderByTarget::Column(0), true)]);
    assert_eq!(
        query.to_sql(),
        "SELECT t.\"a.b\", t.\"a.b\" FROM t ORDER BY t.\"a.b\""
    );

    let err = parser().parse("SELECT a.b FROM t").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "Table \"a\" does not exist");
}

#[test]
fn repeated_name_is_located_at_its_own_occurrence() {
    let err = parser()
        .parse("SELECT name AS zz, zz FROM customers")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "Field not found");
    assert_eq!(err.token, "zz");
    assert_eq!(err.position, Some(19));

    let err = parser()
        .parse("SELECT name\n  FROM customers\n WHERE nope = 1")
        .unwrap_err();
    assert_eq!(err.token, "nope");
    assert_eq!(err.position, Some(36));
}

#[test]
fn column_set_modifiers_are_rejected() {
    for (sql, message, position) in [
        (
            "SELECT * EXCLUDE (name) FROM customers",
            "\"*\" with EXCLUDE is not supported",
            Some(9),
        ),
        (
            "SELECT c.* REPLACE (id + 1 AS id) FROM customers c",
            "\"*\" with REPLACE is not supported",
            Some(11),
        ),
        (
            "SELECT name FROM customers ORDER BY name NULLS FIRST",
            "NULLS FIRST is not supported",
            Some(41),
        ),
    ] {
        let err = parser().parse(sql).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax, "{}", sql);
        assert_eq!(err.message, message, "{}", sql);
        assert_eq!(err.position, position, "{}", sql);
    }
}

#[test]
fn names_fold_ascii_case_only() {
    let query = parser().parse("SELECT Ä.x FROM tbl1 Ä").unwrap();
    assert_eq!(query.table_alias(0), Some("Ä"));

    let err = parser().parse("SELECT ä.x FROM tbl1 Ä").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Reference);
    assert_eq!(err.message, "Table \"ä\" does not exist");
    assert_eq!(err.position, Some(7));

    assert!(parser().parse("SELECT X FROM TBL1").is_ok());
}

#[test]
fn syntax_error_positions() {
    let sql = "SELECT name FROM customers WHERE";
    let err = parser().parse(sql).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.position, Some(sql.chars().count()));

    let err = parser().parse("SELECT name,, email FROM customers").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.message, "Syntax Error near \",\"");
    assert_eq!(err.token, ",");
    assert_eq!(err.position, Some(12));
}

#[test]
fn blank_statement() {
    let err = parser().parse("  ").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Input);
    assert_eq!(err.message, "No query specified");
}

#[test]
fn join_is_rejected() {
    let err = parser()
        .parse("SELECT name FROM customers c JOIN orders o ON o.customer = c.id")
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.message, "JOIN is not supported");
    assert_eq!(err.position, Some(29));
}

#[test]
fn configured_reserved_keyword() {
    let config = Config::from_toml("dialect = \"postgres\"\nreserved_keywords = [\"email\"]\n").unwrap();
    let parser = SqlParser::from_config(Arc::new(catalog()), &config);

    let err = parser.parse("SELECT email FROM customers").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert_eq!(err.message, "\"email\" is a reserved keyword: identifier was expected");
    assert_eq!(err.position, Some(7));

    assert!(parser.parse("SELECT \"email\" FROM customers").is_ok());
}

#[test]
fn parser_is_shared_between_threads() {
    let parser = Arc::new(parser());

    let handles: Vec<_> = ["id", "name", "email", "id, name"]
        .into_iter()
        .map(|columns| {
            let parser = Arc::clone(&parser);
            thread::spawn(move || {
                parser
                    .parse(&format!("SELECT {} FROM customers", columns))
                    .map(|q| q.columns().len())
            })
        })
        .collect();

    let counts: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert_eq!(counts, vec![1, 1, 1, 2]);
}
