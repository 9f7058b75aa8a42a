//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the backend's dialect to parse SQL and classify
//! statements by their safety level.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use crate::db::DatabaseBackend;
use crate::error::{MicroError, Result};

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL statements.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl SqlClassifier {
    /// Creates a classifier using the dialect of `backend`.
    pub fn new(backend: DatabaseBackend) -> Self {
        let dialect: Box<dyn Dialect + Send + Sync> = match backend {
            DatabaseBackend::Postgres => Box::new(PostgreSqlDialect {}),
            DatabaseBackend::Mysql => Box::new(MySqlDialect {}),
            DatabaseBackend::Sqlite => Box::new(SQLiteDialect {}),
        };
        Self { dialect }
    }

    /// Parses and classifies a SQL string.
    ///
    /// Unparsable SQL is an error carrying the parser's message. An empty
    /// input classifies as destructive/unknown.
    pub fn classify(&self, sql: &str) -> Result<ClassificationResult> {
        let statements = Parser::parse_sql(self.dialect.as_ref(), sql)
            .map_err(|e| MicroError::read_only(format!("Could not parse SQL: {e}")))?;

        match statements.as_slice() {
            [] => Ok(ClassificationResult::new(
                SafetyLevel::Destructive,
                StatementType::Unknown,
            )),
            [statement] => {
                let (level, stmt_type) = classify_statement(statement);
                Ok(ClassificationResult::new(level, stmt_type))
            }
            statements => {
                // Multiple statements: use the most dangerous classification
                let (level, stmt_type) = statements
                    .iter()
                    .map(classify_statement)
                    .fold((SafetyLevel::Safe, StatementType::Unknown), most_dangerous);
                Ok(ClassificationResult::new(
                    level,
                    StatementType::Multiple(Box::new(stmt_type)),
                ))
            }
        }
    }
}

/// Keeps whichever classification is more dangerous (the first on ties).
fn most_dangerous(
    current: (SafetyLevel, StatementType),
    candidate: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if candidate.0 > current.0 {
        candidate
    } else {
        current
    }
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE executes the statement
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => (SafetyLevel::Safe, StatementType::Show),

        // Mutating: data modification
        Statement::Insert(_) => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        // Destructive: data loss or schema changes
        Statement::Delete(_) => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Truncate),
        Statement::AlterTable { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::Grant { .. } => (SafetyLevel::Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (SafetyLevel::Destructive, StatementType::Revoke),

        // SHOW forms without a dedicated arm (SHOW DATABASES, ...)
        other if other.to_string().to_uppercase().starts_with("SHOW ") => {
            (SafetyLevel::Safe, StatementType::Show)
        }

        // Conservative default: treat unknown statements as destructive
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Query by recursively inspecting for data-modifying operations.
/// Returns the most dangerous (SafetyLevel, StatementType) found.
fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let base_type = if query.with.is_some() {
        StatementType::With
    } else {
        StatementType::Select
    };
    let mut result = (SafetyLevel::Safe, base_type);

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            result = most_dangerous(result, classify_query(&cte.query));
        }
    }

    result = most_dangerous(result, classify_set_expr(&query.body));

    // SELECT ... FOR UPDATE / FOR SHARE takes row locks
    if !query.locks.is_empty() {
        result = most_dangerous(result, (SafetyLevel::Mutating, StatementType::Select));
    }

    result
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        // Direct mutations in CTE bodies (wrapped as Statement)
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),

        SetExpr::Query(query) => classify_query(query),

        SetExpr::Select(select) => classify_select(select),

        // UNION, INTERSECT, EXCEPT
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous(classify_set_expr(left), classify_set_expr(right))
        }

        SetExpr::Values(_) | SetExpr::Table(_) => (SafetyLevel::Safe, StatementType::Select),

        #[allow(unreachable_patterns)]
        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Select by checking `INTO` and its FROM clause.
fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    // SELECT ... INTO new_table creates a table
    if select.into.is_some() {
        return (SafetyLevel::Destructive, StatementType::Create);
    }

    select
        .from
        .iter()
        .map(classify_table_with_joins)
        .fold((SafetyLevel::Safe, StatementType::Select), most_dangerous)
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    twj.joins
        .iter()
        .map(|join| classify_table_factor(&join.relation))
        .fold(classify_table_factor(&twj.relation), most_dangerous)
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        // Other variants (Table, TableFunction, etc.) are safe
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}
