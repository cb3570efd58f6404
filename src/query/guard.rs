//! Static check of generated SQL before it reaches the database.
//!
//! The prompt asks for a single read-only statement over the permitted
//! tables; this module verifies it. A statement passes only if:
//!
//! - it parses as exactly one PostgreSQL statement
//! - it is a query (SELECT / set operation / VALUES), with no `SELECT INTO`,
//!   no locking clause, and no data-modifying CTE
//! - every referenced relation is a permitted table or a CTE it defines
//! - every function it calls is on [`ALLOWED_FUNCTIONS`], unqualified
//!
//! Functions are allow-listed because several built-ins read arbitrary
//! tables or server state from a string argument (`query_to_xml`,
//! `current_setting`, `pg_stat_file`, `lo_get`, ...), which no relation
//! check can see.

use crate::llm::GeneratedQuery;
use crate::types::error::{ChatError, Result};
use sqlparser::ast::{Expr, ObjectName, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::ops::ControlFlow;

/// Functions generated SQL may call.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    // aggregates and window functions
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "array_agg",
    "string_agg",
    "bool_and",
    "bool_or",
    "every",
    "row_number",
    "rank",
    "dense_rank",
    // conditionals
    "coalesce",
    "nullif",
    "greatest",
    "least",
    // strings
    "lower",
    "upper",
    "initcap",
    "length",
    "char_length",
    "character_length",
    "btrim",
    "ltrim",
    "rtrim",
    "substr",
    "replace",
    "concat",
    "concat_ws",
    "left",
    "right",
    "strpos",
    "split_part",
    "starts_with",
    // numbers
    "abs",
    "round",
    "floor",
    "ceil",
    "ceiling",
    "trunc",
    // dates
    "now",
    "current_date",
    "current_timestamp",
    "date_trunc",
    "date_part",
    "age",
    "to_char",
    "make_date",
    // arrays
    "unnest",
    "array_length",
    "cardinality",
    "array_to_string",
    "array_position",
];

/// Set-returning functions that may appear where a table is expected.
const TABLE_FUNCTIONS: &[&str] = &["unnest"];

/// Allow-list check for generated statements.
#[derive(Debug, Clone)]
pub struct QueryGuard {
    permitted: HashSet<String>,
    schema_name: String,
}

impl QueryGuard {
    pub fn new<I, S>(permitted_tables: I, schema_name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            permitted: permitted_tables
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
            schema_name: schema_name.into().to_lowercase(),
        }
    }

    /// Verify a generated statement.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::UnsafeQuery` naming the first violation found
    pub fn check(&self, query: &GeneratedQuery) -> Result<()> {
        self.check_sql(query.as_str()).map_err(|reason| {
            tracing::warn!(sql = %query, %reason, "Generated query rejected");
            ChatError::UnsafeQuery {
                query: query.to_string(),
                reason,
            }
        })
    }

    fn check_sql(&self, sql: &str) -> std::result::Result<(), String> {
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| format!("could not parse statement: {}", e))?;

        let statement = match statements.as_slice() {
            [single] => single,
            [] => return Err("no statement found".to_string()),
            many => return Err(format!("expected one statement, found {}", many.len())),
        };

        if !matches!(statement, Statement::Query(_)) {
            return Err("only SELECT queries are allowed".to_string());
        }

        let mut collector = ReferenceCollector::default();
        if let ControlFlow::Break(reason) = statement.visit(&mut collector) {
            return Err(reason);
        }

        for relation in &collector.relations {
            self.check_relation(relation, &collector.cte_names)?;
        }

        for func in &collector.functions {
            check_function(func)?;
        }

        Ok(())
    }

    fn check_relation(
        &self,
        relation: &ObjectName,
        cte_names: &HashSet<String>,
    ) -> std::result::Result<(), String> {
        let parts: Vec<String> = relation.0.iter().map(|i| i.value.to_lowercase()).collect();

        let (schema, table) = match parts.as_slice() {
            [table] => (None, table),
            [.., schema, table] => (Some(schema), table),
            [] => return Err("empty relation name".to_string()),
        };

        if schema.is_none()
            && (cte_names.contains(table) || TABLE_FUNCTIONS.contains(&table.as_str()))
        {
            return Ok(());
        }
        if let Some(schema) = schema {
            if *schema != self.schema_name {
                return Err(format!("schema {} is not allowed", schema));
            }
        }
        if !self.permitted.contains(table) {
            return Err(format!("table {} is not permitted", relation));
        }
        Ok(())
    }
}

fn check_function(name: &ObjectName) -> std::result::Result<(), String> {
    match name.0.as_slice() {
        [ident] if ALLOWED_FUNCTIONS.contains(&ident.value.to_lowercase().as_str()) => Ok(()),
        [_] => Err(format!("function {}() is not allowed", name)),
        _ => Err(format!("qualified function {}() is not allowed", name)),
    }
}

/// Walks a statement, collecting relations, CTE names and called functions,
/// and stopping at the first non-read-only query node.
#[derive(Default)]
struct ReferenceCollector {
    relations: Vec<ObjectName>,
    cte_names: HashSet<String>,
    functions: Vec<ObjectName>,
}

impl Visitor for ReferenceCollector {
    type Break = String;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_lowercase());
            }
        }
        if !query.locks.is_empty() {
            return ControlFlow::Break("locking clauses are not allowed".to_string());
        }
        match read_only_body(&query.body) {
            Ok(()) => ControlFlow::Continue(()),
            Err(reason) => ControlFlow::Break(reason),
        }
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.relations.push(relation.clone());
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if let Expr::Function(func) = expr {
            self.functions.push(func.name.clone());
        }
        ControlFlow::Continue(())
    }
}

fn read_only_body(body: &SetExpr) -> std::result::Result<(), String> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => {
            Err("SELECT INTO is not allowed".to_string())
        }
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        // Nested queries are visited on their own
        SetExpr::Query(_) => Ok(()),
        SetExpr::SetOperation { left, right, .. } => {
            read_only_body(left)?;
            read_only_body(right)
        }
        _ => Err("data-modifying statements are not allowed".to_string()),
    }
}
