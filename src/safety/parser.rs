//! Statement parsing for the read-only gate.

use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SnowflakeDialect;
use sqlparser::parser::Parser;

use super::{Access, GateDecision};

const SELECT: Access = Access::Read("SELECT");

/// Lets through only SQL whose every statement reads.
#[derive(Debug)]
pub struct ReadGate {
    dialect: SnowflakeDialect,
}

impl Default for ReadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadGate {
    pub fn new() -> Self {
        Self {
            dialect: SnowflakeDialect {},
        }
    }

    pub fn check(&self, sql: &str) -> GateDecision {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                return GateDecision::Unparsed {
                    reason: e.to_string(),
                }
            }
        };

        let Some(first) = statements.first() else {
            return GateDecision::Unparsed {
                reason: "Empty SQL statement".to_string(),
            };
        };

        let count = statements.len();
        match first_write(statements.iter().map(access)) {
            Access::Write(keyword) => GateDecision::Reject {
                keyword,
                statements: count,
            },
            Access::Read(_) => GateDecision::Allow {
                keyword: access(first).keyword(),
                statements: count,
            },
        }
    }
}

/// Checks `sql` with a fresh gate.
pub fn check_read_only(sql: &str) -> GateDecision {
    ReadGate::new().check(sql)
}

/// The first write among `accesses`, or a plain read.
fn first_write(accesses: impl IntoIterator<Item = Access>) -> Access {
    accesses
        .into_iter()
        .find(|a| !a.is_read())
        .unwrap_or(SELECT)
}

fn access(statement: &Statement) -> Access {
    match statement {
        Statement::Query(query) => query_access(query),
        // EXPLAIN ANALYZE runs the statement
        Statement::Explain {
            analyze: true,
            statement,
            ..
        } => match access(statement) {
            Access::Read(_) => Access::Read("EXPLAIN"),
            write => write,
        },
        Statement::Explain { .. } => Access::Read("EXPLAIN"),
        Statement::ExplainTable { .. } => Access::Read("DESCRIBE"),
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => Access::Read("SHOW"),

        Statement::Insert(_) => Access::Write("INSERT"),
        Statement::Update { .. } => Access::Write("UPDATE"),
        Statement::Merge { .. } => Access::Write("MERGE"),
        Statement::Delete(_) => Access::Write("DELETE"),
        Statement::Drop { .. } => Access::Write("DROP"),
        Statement::Truncate { .. } => Access::Write("TRUNCATE"),
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::AlterRole { .. } => Access::Write("ALTER"),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateSequence { .. } => Access::Write("CREATE"),
        Statement::Grant { .. } => Access::Write("GRANT"),
        Statement::Revoke { .. } => Access::Write("REVOKE"),

        // COPY, CALL, SET, USE and the rest
        _ => Access::Write("non-read"),
    }
}

/// A query writes if any CTE, nested query or derived table does.
fn query_access(query: &Query) -> Access {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| query_access(&cte.query));

    first_write(ctes.chain(std::iter::once(set_expr_access(&query.body))))
}

fn set_expr_access(set_expr: &SetExpr) -> Access {
    match set_expr {
        SetExpr::Insert(statement) | SetExpr::Update(statement) => access(statement),
        SetExpr::Query(query) => query_access(query),
        SetExpr::Select(select) => first_write(select.from.iter().map(joins_access)),
        SetExpr::SetOperation { left, right, .. } => {
            first_write([set_expr_access(left), set_expr_access(right)])
        }
        SetExpr::Values(_) | SetExpr::Table(_) => SELECT,
    }
}

fn joins_access(twj: &TableWithJoins) -> Access {
    let factors = std::iter::once(&twj.relation).chain(twj.joins.iter().map(|join| &join.relation));

    first_write(factors.map(|factor| match factor {
        TableFactor::Derived { subquery, .. } => query_access(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => joins_access(table_with_joins),
        _ => SELECT,
    }))
}
