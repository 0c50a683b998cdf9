// Query Model - relations, projected columns and their aliasing rules
use super::ast::{Condition, ConditionChain};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a column. Values stay strings; the tag is metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    #[default]
    Text,
    Integer,
    Real,
    Boolean,
    Date,
}

impl LogicalType {
    pub fn name(&self) -> &'static str {
        match self {
            LogicalType::Text => "text",
            LogicalType::Integer => "integer",
            LogicalType::Real => "real",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "date",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for LogicalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "varchar" | "string" => Ok(LogicalType::Text),
            "integer" | "int" | "bigint" => Ok(LogicalType::Integer),
            "real" | "double" | "float" => Ok(LogicalType::Real),
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            "date" => Ok(LogicalType::Date),
            _ => Err(Error::Unsupported(format!("type {}", s))),
        }
    }
}

/// How a relation takes part in the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    From,
    Inner,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub relation_alias: String,
    pub name: String,
    pub alias: Option<String>,
    pub logical_type: LogicalType,
}

impl Column {
    pub fn new(relation_alias: impl Into<String>, name: impl Into<String>) -> Self {
        Column {
            relation_alias: relation_alias.into(),
            name: name.into(),
            alias: None,
            logical_type: LogicalType::Text,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_type(mut self, logical_type: LogicalType) -> Self {
        self.logical_type = logical_type;
        self
    }

    /// Name the column is projected under
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.relation_alias, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Relation {
    pub join_role: JoinRole,
    pub name: String,
    pub alias: String,
    columns: Vec<Column>,
}

impl Relation {
    pub fn new(join_role: JoinRole, name: impl Into<String>, alias: impl Into<String>) -> Self {
        Relation {
            join_role,
            name: name.into(),
            alias: alias.into(),
            columns: Vec::new(),
        }
    }

    /// Register a column this relation must provide. Registering the same
    /// name again is a no-op; returns whether the column was new.
    pub fn add_column(&mut self, name: &str) -> bool {
        if self.has_column(name) {
            return false;
        }
        self.columns.push(Column::new(self.alias.clone(), name));
        true
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Logical description of one SELECT.
///
/// Projection order is output order and relation order is scan order.
/// Projection output names and relation aliases are unique namespaces.
#[derive(Debug, Clone, Default)]
pub struct Query {
    projection: Vec<Column>,
    relations: Vec<Relation>,
    conditions: Vec<Condition>,
    wildcard: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `relation_alias.name [as alias]` to the projection.
    pub fn add_projection_column(
        &mut self,
        relation_alias: &str,
        name: &str,
        alias: Option<&str>,
    ) -> Result<()> {
        let mut column = Column::new(relation_alias, name);
        if let Some(alias) = alias {
            column = column.with_alias(alias);
        }
        self.add_projection(column)
    }

    /// Add a prepared column to the projection, keyed by its output name.
    pub fn add_projection(&mut self, column: Column) -> Result<()> {
        if self.projection_column(column.output_name()).is_some() {
            return Err(Error::ambiguous_column(column.output_name()));
        }
        if let Some(relation) = self.relation_mut(&column.relation_alias) {
            relation.add_column(&column.name);
        }
        self.projection.push(column);
        Ok(())
    }

    /// Add a relation; the first one is the FROM relation, later ones are
    /// inner joins.
    pub fn add_relation(&mut self, name: &str, alias: &str) -> Result<()> {
        let role = if self.relations.is_empty() {
            JoinRole::From
        } else {
            JoinRole::Inner
        };
        self.add_relation_with_role(role, name, alias)
    }

    pub fn add_relation_with_role(&mut self, role: JoinRole, name: &str, alias: &str) -> Result<()> {
        if self.relation(alias).is_some() {
            return Err(Error::ambiguous_relation(alias));
        }

        let mut relation = Relation::new(role, name, alias);
        for column in self.projection.iter().filter(|c| c.relation_alias == alias) {
            relation.add_column(&column.name);
        }
        for col in self.conditions.iter().flat_map(|c| c.references()) {
            if col.relation == alias {
                relation.add_column(&col.column);
            }
        }

        self.relations.push(relation);
        Ok(())
    }

    /// Append a term to the WHERE/ON chain.
    pub fn add_condition(&mut self, condition: Condition) {
        for col in condition.references() {
            if let Some(relation) = self.relations.iter_mut().find(|r| r.alias == col.relation) {
                relation.add_column(&col.column);
            }
        }
        self.conditions.push(condition);
    }

    /// Project every column of every relation.
    pub fn set_wildcard(&mut self) {
        self.wildcard = true;
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn projection(&self) -> &[Column] {
        &self.projection
    }

    pub fn projection_column(&self, output_name: &str) -> Option<&Column> {
        self.projection.iter().find(|c| c.output_name() == output_name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, alias: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.alias == alias)
    }

    fn relation_mut(&mut self, alias: &str) -> Option<&mut Relation> {
        self.relations.iter_mut().find(|r| r.alias == alias)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The WHERE/ON terms as one evaluable chain
    pub fn predicate(&self) -> ConditionChain {
        ConditionChain::from_conditions(self.conditions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{Comparator, LogicOp};

    #[test]
    fn test_duplicate_projection_alias_is_ambiguous() {
        let mut query = Query::new();
        query.add_projection_column("o", "id", Some("key")).unwrap();

        let err = query.add_projection_column("c", "id", Some("key")).unwrap_err();
        assert_eq!(err.to_string(), "Ambiguous definition for column key");

        // first registration stays
        let kept = query.projection_column("key").unwrap();
        assert_eq!(kept.relation_alias, "o");
        assert_eq!(query.projection().len(), 1);
    }

    #[test]
    fn test_projection_keyed_by_name_without_alias() {
        let mut query = Query::new();
        query.add_projection_column("o", "id", None).unwrap();
        assert!(query.add_projection_column("c", "id", None).is_err());
        query.add_projection_column("c", "id", Some("customer_id")).unwrap();
        let names: Vec<_> = query.projection().iter().map(|c| c.output_name()).collect();
        assert_eq!(names, ["id", "customer_id"]);
    }

    #[test]
    fn test_duplicate_relation_alias_is_ambiguous() {
        let mut query = Query::new();
        query.add_relation("orders", "o").unwrap();
        let err = query.add_relation("customers", "o").unwrap_err();
        assert!(matches!(err, Error::Ambiguous { ref name, .. } if name == "o"));
        assert_eq!(query.relations().len(), 1);
    }

    #[test]
    fn test_join_roles_follow_call_order() {
        let mut query = Query::new();
        query.add_relation("orders", "o").unwrap();
        query.add_relation("customers", "c").unwrap();
        query
            .add_relation_with_role(JoinRole::Full, "items", "i")
            .unwrap();
        let roles: Vec<_> = query.relations().iter().map(|r| r.join_role).collect();
        assert_eq!(roles, [JoinRole::From, JoinRole::Inner, JoinRole::Full]);
    }

    #[test]
    fn test_relation_add_column_idempotent() {
        let mut relation = Relation::new(JoinRole::From, "orders", "o");
        assert!(relation.add_column("id"));
        assert!(!relation.add_column("id"));
        assert_eq!(relation.columns().len(), 1);
        assert_eq!(relation.columns()[0].relation_alias, "o");
    }

    #[test]
    fn test_referenced_columns_are_registered() {
        let mut query = Query::new();
        query.add_projection_column("o", "id", None).unwrap();
        query.add_condition(Condition::columns(
            LogicOp::And,
            ("o", "cust"),
            Comparator::Eq,
            ("c", "id"),
        ));
        query.add_relation("orders", "o").unwrap();
        query.add_relation("customers", "c").unwrap();
        query.add_projection_column("c", "name", None).unwrap();

        assert_eq!(query.relation("o").unwrap().column_names(), ["id", "cust"]);
        assert_eq!(query.relation("c").unwrap().column_names(), ["id", "name"]);
        assert_eq!(query.predicate().len(), 1);
    }

    #[test]
    fn test_logical_type_names() {
        assert_eq!(LogicalType::default().name(), "text");
        assert_eq!("INT".parse::<LogicalType>().unwrap(), LogicalType::Integer);
        assert!("blob".parse::<LogicalType>().is_err());
        let col = Column::new("o", "total").with_type(LogicalType::Real);
        assert_eq!(col.logical_type.to_string(), "real");
        assert_eq!(col.qualified_name(), "o.total");
    }
}
