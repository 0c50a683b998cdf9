// Integration tests for SQL JOIN parsing and execution
use pollydb::error::{Error, Result as PollyResult};
use pollydb::scan::MemoryTable;
use pollydb::sql::parser::Parser;
use pollydb::sql::{Comparator, JoinRole, LogicOp, Operand};
use pollydb::{Command, Connection};

fn shop() -> Connection {
    let mut conn = Connection::in_memory();
    conn.register_table(
        "users",
        MemoryTable::from_strs(
            &["id", "name", "active"],
            &[&["1", "Ann", "yes"], &["2", "Ben", "no"], &["3", "Cid", "yes"]],
        )
        .unwrap(),
    );
    conn.register_table(
        "orders",
        MemoryTable::from_strs(
            &["id", "user_id", "product_id", "status"],
            &[
                &["10", "1", "100", "active"],
                &["11", "1", "101", "void"],
                &["12", "3", "100", "active"],
                &["13", "9", "101", "active"],
            ],
        )
        .unwrap(),
    );
    conn.register_table(
        "products",
        MemoryTable::from_strs(&["id", "title"], &[&["100", "Lamp"], &["101", "Desk"]]).unwrap(),
    );
    conn
}

#[test]
fn test_parse_inner_join() -> PollyResult<()> {
    let sql = "SELECT * FROM users INNER JOIN orders ON users.id = orders.user_id";
    let query = Parser::new().parse(sql)?;

    assert_eq!(query.relations().len(), 2);
    assert_eq!(query.relations()[1].join_role, JoinRole::Inner);
    assert_eq!(query.relations()[1].name, "orders");
    assert_eq!(query.conditions().len(), 1);

    Ok(())
}

#[test]
fn test_parse_join_default_inner() -> PollyResult<()> {
    let sql = "SELECT * FROM users JOIN orders ON users.id = orders.user_id";
    let query = Parser::new().parse(sql)?;

    // plain JOIN is an inner join
    assert_eq!(query.relations()[1].join_role, JoinRole::Inner);

    Ok(())
}

#[test]
fn test_parse_outer_joins_rejected() {
    let parser = Parser::new();
    for sql in [
        "SELECT * FROM customers LEFT JOIN orders ON customers.id = orders.customer_id",
        "SELECT * FROM orders RIGHT JOIN products ON orders.product_id = products.id",
    ] {
        assert!(matches!(parser.parse(sql), Err(Error::Unsupported(_))), "{}", sql);
    }
}

#[test]
fn test_parse_join_with_table_alias() -> PollyResult<()> {
    let sql = "SELECT * FROM users u
               INNER JOIN orders o ON u.id = o.user_id";
    let query = Parser::new().parse(sql)?;

    assert_eq!(query.relations()[0].alias, "u");
    assert_eq!(query.relations()[1].alias, "o");
    assert_eq!(query.predicate().to_string(), "u.id = o.user_id");

    Ok(())
}

#[test]
fn test_parse_join_with_complex_condition() -> PollyResult<()> {
    let sql = "SELECT * FROM users
               JOIN orders ON users.id = orders.user_id AND orders.status = 'active'";
    let query = Parser::new().parse(sql)?;

    let conditions = query.conditions();
    assert_eq!(conditions.len(), 2);
    assert_eq!(conditions[1].logic_op, LogicOp::And);
    assert_eq!(conditions[1].comparator, Comparator::Eq);
    assert_eq!(conditions[1].right, Operand::Text("active".into()));

    Ok(())
}

#[test]
fn test_three_way_join() -> PollyResult<()> {
    let sql = "SELECT u.name, p.title FROM users u
               INNER JOIN orders o ON u.id = o.user_id
               INNER JOIN products p ON o.product_id = p.id
               WHERE u.active = 'yes' AND o.status = 'active'";
    let conn = shop();
    let result = Command::new(sql, &conn).execute_query()?;

    assert_eq!(result.columns, ["name", "title"]);
    assert_eq!(result.rows, vec![vec!["Ann", "Lamp"], vec!["Cid", "Lamp"]]);

    Ok(())
}

#[test]
fn test_join_row_order_follows_relation_order() -> PollyResult<()> {
    let conn = shop();
    let result = Command::new(
        "select o.id, u.name from orders o join users u on o.user_id = u.id",
        &conn,
    )
    .execute_query()?;

    // first relation drives the outer loop
    let ids: Vec<_> = result.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, ["10", "11", "12"]);

    Ok(())
}

#[test]
fn test_or_chain_is_flat() -> PollyResult<()> {
    let conn = shop();
    // ((u.id = 1 or u.id = 2) and u.active = 'yes'), evaluated left to right
    let result = Command::new(
        "select u.name from users u where u.id = 1 or u.id = 2 and u.active = 'yes'",
        &conn,
    )
    .execute_query()?;
    assert_eq!(result.rows, vec![vec!["Ann"]]);

    Ok(())
}

#[test]
fn test_numeric_comparison_errors_drop_rows() -> PollyResult<()> {
    let conn = shop();
    // names are not numbers; every combination fails to evaluate and is dropped
    let result = Command::new("select u.id from users u join products p where u.name = 1 or p.id = 100", &conn)
        .execute_query()?;
    assert!(result.is_empty());

    Ok(())
}

#[test]
fn test_missing_relation() {
    let conn = shop();
    let err = Command::new("select * from users u join invoices i", &conn)
        .execute_query()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Relation 'invoices' not found or format not supported"
    );
}
