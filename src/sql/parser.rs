// SQL Parser - turns query text into the Query model, one clause at a time
use super::ast::{ColumnRef, Comparator, Condition, LogicOp, Operand};
use super::clause::ClauseExtractor;
use super::lexer::{is_number, is_string_literal, unquote, Lexer};
use super::types::{JoinRole, Query};
use crate::error::{Error, Result};
use ahash::AHashMap;

const JOIN_TERMINATORS: &[&str] = &["inner", "left", "right", "full", "join", "where"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseKind {
    Select,
    From,
    Join(JoinRole),
    Where,
    Unsupported(&'static str),
}

struct RelationRef {
    role: JoinRole,
    name: String,
    alias: String,
}

struct SelectItem {
    column: String,
    alias: Option<String>,
}

/// Parser for the supported SELECT surface:
///
/// ```text
/// select <item> [, <item>]* | *
/// from <relation> [alias]
/// [ [inner] join <relation> [alias] [on <conditions>] ]*
/// [ full join <relation> [alias] [on <conditions>] ]
/// [ where <conditions> ]
/// ```
///
/// Clauses are located with a table of [`ClauseExtractor`]s keyed by their
/// leading keyword. Identifiers are lowercased.
pub struct Parser {
    grammar: AHashMap<&'static str, (ClauseKind, ClauseExtractor)>,
}

impl Parser {
    pub fn new() -> Self {
        let mut grammar = AHashMap::new();
        grammar.insert(
            "select",
            (ClauseKind::Select, ClauseExtractor::new(&["select"], &["from"])),
        );
        grammar.insert(
            "from",
            (ClauseKind::From, ClauseExtractor::new(&["from"], JOIN_TERMINATORS)),
        );
        grammar.insert(
            "inner",
            (
                ClauseKind::Join(JoinRole::Inner),
                ClauseExtractor::new(&["inner", "join"], JOIN_TERMINATORS),
            ),
        );
        grammar.insert(
            "join",
            (
                ClauseKind::Join(JoinRole::Inner),
                ClauseExtractor::new(&["join"], JOIN_TERMINATORS),
            ),
        );
        grammar.insert(
            "full",
            (
                ClauseKind::Join(JoinRole::Full),
                ClauseExtractor::new(&["full", "join"], JOIN_TERMINATORS),
            ),
        );
        grammar.insert(
            "left",
            (
                ClauseKind::Unsupported("left join"),
                ClauseExtractor::new(&["left", "join"], JOIN_TERMINATORS),
            ),
        );
        grammar.insert(
            "right",
            (
                ClauseKind::Unsupported("right join"),
                ClauseExtractor::new(&["right", "join"], JOIN_TERMINATORS),
            ),
        );
        grammar.insert(
            "where",
            (ClauseKind::Where, ClauseExtractor::new(&["where"], &[])),
        );
        Parser { grammar }
    }

    pub fn parse(&self, sql: &str) -> Result<Query> {
        let mut tokens = Lexer::new(sql).tokenize()?;
        while tokens.last().is_some_and(|t| t == ";") {
            tokens.pop();
        }

        let mut rest: &[String] = &tokens;
        let mut select: Option<&[String]> = None;
        let mut relations: Vec<RelationRef> = Vec::new();
        let mut condition_groups: Vec<&[String]> = Vec::new();

        while let Some(first) = rest.first() {
            let leading = first.to_lowercase();
            let (kind, extractor) = self
                .grammar
                .get(leading.as_str())
                .ok_or_else(|| Error::syntax(first.clone()))?;

            let (clause, remainder) = extractor.extract(rest)?;
            let body = &clause[extractor.start().len()..];

            match *kind {
                ClauseKind::Select if select.is_none() => select = Some(body),
                ClauseKind::From if select.is_some() && relations.is_empty() => {
                    relations.push(parse_relation(JoinRole::From, clause, body)?);
                }
                ClauseKind::Join(role) if !relations.is_empty() => {
                    let (relation, on) = split_on(body);
                    relations.push(parse_relation(role, clause, relation)?);
                    if let Some(on) = on {
                        condition_groups.push(non_empty(on, "on")?);
                    }
                }
                ClauseKind::Where if !relations.is_empty() => {
                    condition_groups.push(non_empty(body, first)?);
                }
                ClauseKind::Unsupported(what) => {
                    return Err(Error::Unsupported(what.to_string()));
                }
                _ => return Err(Error::syntax(first.clone())),
            }
            rest = remainder;
        }

        let select = select.ok_or_else(|| Error::syntax("end of input"))?;
        if relations.is_empty() {
            return Err(Error::syntax("end of input"));
        }

        let mut query = Query::new();
        for relation in &relations {
            query.add_relation_with_role(relation.role, &relation.name, &relation.alias)?;
        }

        match parse_select_items(select)? {
            None => query.set_wildcard(),
            Some(items) => {
                for item in items {
                    let column = resolve_column(&item.column, &query)?;
                    query.add_projection_column(
                        &column.relation,
                        &column.column,
                        item.alias.as_deref(),
                    )?;
                }
            }
        }

        for group in condition_groups {
            for condition in parse_conditions(group, &query)? {
                query.add_condition(condition);
            }
        }

        tracing::trace!(
            relations = query.relations().len(),
            projection = query.projection().len(),
            conditions = query.conditions().len(),
            "parsed query"
        );
        Ok(query)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `sql` with a fresh [`Parser`].
pub fn parse_query(sql: &str) -> Result<Query> {
    Parser::new().parse(sql)
}

fn non_empty<'a>(tokens: &'a [String], keyword: &str) -> Result<&'a [String]> {
    if tokens.is_empty() {
        Err(Error::syntax(keyword))
    } else {
        Ok(tokens)
    }
}

/// Split a join body at its `on` keyword.
fn split_on(body: &[String]) -> (&[String], Option<&[String]>) {
    match body.iter().position(|t| t.eq_ignore_ascii_case("on")) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    }
}

/// `name`, `name alias` or `name as alias`
fn parse_relation(role: JoinRole, clause: &[String], tokens: &[String]) -> Result<RelationRef> {
    let (name, alias) = match tokens {
        [name] => (name, None),
        [name, alias] => (name, Some(alias)),
        [name, kw, alias] if kw.eq_ignore_ascii_case("as") => (name, Some(alias)),
        [] => return Err(Error::syntax(clause.join(" "))),
        [_, kw, ..] if kw.eq_ignore_ascii_case("as") => return Err(Error::syntax(tokens[3].clone())),
        [_, _, extra, ..] => return Err(Error::syntax(extra.clone())),
    };

    if is_string_literal(name) || !name.chars().any(char::is_alphanumeric) {
        return Err(Error::syntax(name.clone()));
    }
    let name = relation_name(name);

    let alias = match alias {
        Some(alias) if is_identifier(alias) => alias.to_lowercase(),
        Some(alias) => return Err(Error::syntax(alias.clone())),
        None => name.clone(),
    };

    Ok(RelationRef { role, name, alias })
}

/// Lowercased relation name with any `.csv` suffix dropped.
fn relation_name(token: &str) -> String {
    let lower = token.trim().to_lowercase();
    match lower.strip_suffix(".csv") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => lower,
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// `None` for `*`, otherwise the comma separated items.
fn parse_select_items(tokens: &[String]) -> Result<Option<Vec<SelectItem>>> {
    if let [star] = tokens {
        if star == "*" {
            return Ok(None);
        }
    }
    if tokens.is_empty() {
        return Err(Error::syntax("select"));
    }

    tokens
        .split(|t| t == ",")
        .map(|item| match item {
            [column] if column != "*" => Ok(SelectItem {
                column: column.clone(),
                alias: None,
            }),
            [column, kw, alias] if kw.eq_ignore_ascii_case("as") && is_identifier(alias) => {
                Ok(SelectItem {
                    column: column.clone(),
                    alias: Some(alias.to_lowercase()),
                })
            }
            [] => Err(Error::syntax(",")),
            _ => Err(Error::syntax(item.join(" "))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Resolve `alias.column`, or a bare column when only one relation exists.
fn resolve_column(token: &str, query: &Query) -> Result<ColumnRef> {
    if is_string_literal(token) || is_number(token) {
        return Err(Error::syntax(token));
    }
    let lower = token.to_lowercase();

    if lower.contains('.') {
        let column = ColumnRef::parse(&lower).ok_or_else(|| Error::syntax(token))?;
        if query.relation(&column.relation).is_none() {
            return Err(Error::RelationNotFound(column.relation));
        }
        return Ok(column);
    }

    if !is_identifier(&lower) {
        return Err(Error::syntax(token));
    }
    match query.relations() {
        [only] => Ok(ColumnRef::new(only.alias.clone(), lower)),
        _ => Err(Error::ambiguous_column(lower)),
    }
}

fn parse_operand(token: &str, query: &Query) -> Result<Operand> {
    if is_string_literal(token) {
        Ok(Operand::Text(unquote(token)))
    } else if is_number(token) {
        Ok(Operand::Number(token.to_string()))
    } else {
        resolve_column(token, query).map(Operand::Column)
    }
}

/// `cond ((and|or) cond)*`; the first term is joined with AND.
fn parse_conditions(tokens: &[String], query: &Query) -> Result<Vec<Condition>> {
    let mut conditions = Vec::new();
    let mut logic_op = LogicOp::And;
    let mut rest = tokens;

    loop {
        let [left, comparator, right, tail @ ..] = rest else {
            let near = if rest.is_empty() {
                "end of input".to_string()
            } else {
                rest.join(" ")
            };
            return Err(Error::syntax(near));
        };

        let comparator = match comparator.as_str() {
            "=" => Comparator::Eq,
            "!=" | "<>" => Comparator::Ne,
            other => return Err(Error::syntax(other)),
        };
        conditions.push(Condition::new(
            logic_op,
            resolve_column(left, query)?,
            comparator,
            parse_operand(right, query)?,
        ));

        match tail {
            [] => return Ok(conditions),
            [op, next @ ..] => {
                logic_op = match op.to_lowercase().as_str() {
                    "and" => LogicOp::And,
                    "or" => LogicOp::Or,
                    _ => return Err(Error::syntax(op.clone())),
                };
                rest = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmbiguityKind;

    #[test]
    fn test_minimal_wildcard() {
        let query = parse_query("select * from orders").unwrap();
        assert!(query.is_wildcard());
        assert_eq!(query.relations().len(), 1);
        assert_eq!(query.relations()[0].alias, "orders");
        assert_eq!(query.relations()[0].join_role, JoinRole::From);
    }

    #[test]
    fn test_join_with_aliases() {
        let query = parse_query(
            "SELECT o.id, c.Name AS who FROM Orders o INNER JOIN customers c ON o.cust = c.id;",
        )
        .unwrap();

        let names: Vec<_> = query.projection().iter().map(|c| c.output_name()).collect();
        assert_eq!(names, ["id", "who"]);
        assert_eq!(query.relations()[0].name, "orders");
        assert_eq!(query.relations()[1].join_role, JoinRole::Inner);
        assert_eq!(query.predicate().to_string(), "o.cust = c.id");
        assert_eq!(query.relation("o").unwrap().column_names(), ["id", "cust"]);
        assert_eq!(query.relation("c").unwrap().column_names(), ["name", "id"]);
    }

    #[test]
    fn test_where_chain_and_literals() {
        let query = parse_query(
            "select o.id from orders o join customers c \
             where o.cust = c.id and c.name <> 'O''Neil' or o.id = 3",
        )
        .unwrap();
        let conditions = query.conditions();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[1].comparator, Comparator::Ne);
        assert_eq!(conditions[1].right, Operand::Text("O'Neil".into()));
        assert_eq!(conditions[2].logic_op, LogicOp::Or);
        assert_eq!(conditions[2].right, Operand::Number("3".into()));
    }

    #[test]
    fn test_on_and_where_combine_with_and() {
        let query = parse_query(
            "select * from a join b on a.x = b.x or a.y = b.y where a.z = 1",
        )
        .unwrap();
        let ops: Vec<_> = query.conditions().iter().map(|c| c.logic_op).collect();
        assert_eq!(ops, [LogicOp::And, LogicOp::Or, LogicOp::And]);
    }

    #[test]
    fn test_bare_columns() {
        let query = parse_query("select id, name from people where city = 'Lisbon'").unwrap();
        assert_eq!(query.projection()[0].qualified_name(), "people.id");
        assert_eq!(query.conditions()[0].left, ColumnRef::new("people", "city"));

        let err = parse_query("select id from a join b").unwrap_err();
        assert!(matches!(
            err,
            Error::Ambiguous {
                kind: AmbiguityKind::Column,
                ..
            }
        ));
    }

    #[test]
    fn test_file_name_relations() {
        let query = parse_query("select * from orders.csv join [Customers.CSV] c").unwrap();
        assert_eq!(query.relations()[0].name, "orders");
        assert_eq!(query.relations()[0].alias, "orders");
        assert_eq!(query.relations()[1].name, "customers");
    }

    #[test]
    fn test_full_join_is_modelled() {
        let query = parse_query("select * from a full join b on a.id = b.id").unwrap();
        assert_eq!(query.relations()[1].join_role, JoinRole::Full);
    }

    #[test]
    fn test_left_join_unsupported() {
        let err = parse_query("select * from a left join b on a.id = b.id").unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref what) if what == "left join"));
    }

    #[test]
    fn test_duplicate_alias() {
        let err = parse_query("select * from a x join b x").unwrap_err();
        assert!(matches!(
            err,
            Error::Ambiguous {
                kind: AmbiguityKind::Relation,
                ..
            }
        ));
        let err = parse_query("select a.id, b.id from a join b").unwrap_err();
        assert_eq!(err.to_string(), "Ambiguous definition for column id");
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            ("", "end of input"),
            ("select *", "end of input"),
            ("selec * from a", "selec"),
            ("select * from a where", "where"),
            ("select * from a where a.x =", "a.x ="),
            ("select * from a where a.x > 1", ">"),
            ("select * from a where a.x = 1 nand a.y = 2", "nand"),
            ("select * from a order by a.x", "by"),
            ("select * from", "from"),
            ("select a.id, from a", ","),
            ("join b select * from a", "join"),
        ];
        for (sql, near) in cases {
            match parse_query(sql) {
                Err(Error::Syntax { near: got }) => assert_eq!(got, near, "{}", sql),
                other => panic!("{}: expected syntax error, got {:?}", sql, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_unknown_alias() {
        let err = parse_query("select z.id from a").unwrap_err();
        assert!(matches!(err, Error::RelationNotFound(ref r) if r == "z"));
    }
}
