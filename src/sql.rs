use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertHotel {
        id: Ulid,
        name: String,
        address: Option<String>,
    },
    DeleteHotel {
        id: Ulid,
    },
    InsertRoom {
        id: Ulid,
        hotel_id: Ulid,
        name: String,
        floor: i32,
        category: RoomCategory,
        rate: u32,
    },
    DeleteRoom {
        id: Ulid,
    },
    InsertReservation {
        guest_name: String,
        room_id: Ulid,
        from: Ms,
        to: Ms,
    },
    DeleteReservation {
        id: Ulid,
    },
    SelectAvailability {
        from: Ms,
        to: Ms,
    },
    SelectRooms {
        id: Option<Ulid>,
    },
    SelectReservations {
        id: Option<Ulid>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(first) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match first {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

const HOTEL_COLUMNS: &[&str] = &["id", "name", "address"];
const ROOM_COLUMNS: &[&str] = &["id", "hotel_id", "name", "floor", "category", "rate"];
const RESERVATION_COLUMNS: &[&str] = &["guest_name", "room_id", "from", "to"];

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "hotels" => {
            let row = InsertRow::new("hotels", HOTEL_COLUMNS, insert)?;
            Ok(Command::InsertHotel {
                id: parse_ulid_expr(row.required("id")?)?,
                name: parse_string_expr(row.required("name")?)?,
                address: row.optional("address").map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        "rooms" => {
            let row = InsertRow::new("rooms", ROOM_COLUMNS, insert)?;
            Ok(Command::InsertRoom {
                id: parse_ulid_expr(row.required("id")?)?,
                hotel_id: parse_ulid_expr(row.required("hotel_id")?)?,
                name: parse_string_expr(row.required("name")?)?,
                floor: parse_i32(row.required("floor")?)?,
                category: RoomCategory::parse(&parse_string_expr(row.required("category")?)?),
                rate: parse_u32(row.required("rate")?)?,
            })
        }
        "reservations" => {
            let row = InsertRow::new("reservations", RESERVATION_COLUMNS, insert)?;
            Ok(Command::InsertReservation {
                guest_name: parse_string_expr(row.required("guest_name")?)?,
                room_id: parse_ulid_expr(row.required("room_id")?)?,
                from: parse_i64_expr(row.required("from")?)?,
                to: parse_i64_expr(row.required("to")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// The single VALUES row of an INSERT, keyed by column name. Without a
/// column list, values bind to `columns` in order.
struct InsertRow<'a> {
    table: &'static str,
    values: Vec<(&'static str, &'a Expr)>,
}

impl<'a> InsertRow<'a> {
    fn new(
        table: &'static str,
        columns: &[&'static str],
        insert: &'a ast::Insert,
    ) -> Result<Self, SqlError> {
        let exprs = extract_insert_values(insert)?;
        let named: Vec<&'static str> = if insert.columns.is_empty() {
            if exprs.len() > columns.len() {
                return Err(SqlError::WrongArity(table, columns.len(), exprs.len()));
            }
            columns[..exprs.len()].to_vec()
        } else {
            if insert.columns.len() != exprs.len() {
                return Err(SqlError::WrongArity(table, insert.columns.len(), exprs.len()));
            }
            let mut named = Vec::with_capacity(insert.columns.len());
            for ident in &insert.columns {
                let name = ident.value.to_lowercase();
                let Some(column) = columns.iter().copied().find(|c| *c == name) else {
                    return Err(SqlError::UnknownColumn(table, name));
                };
                if named.contains(&column) {
                    return Err(SqlError::Parse(format!("column {column} given twice")));
                }
                named.push(column);
            }
            named
        };
        Ok(Self {
            table,
            values: named.into_iter().zip(exprs).collect(),
        })
    }

    fn optional(&self, column: &str) -> Option<&'a Expr> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, expr)| *expr)
    }

    fn required(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.optional(column)
            .ok_or(SqlError::MissingColumn(self.table, column))
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?.ok_or(SqlError::MissingFilter("id"))?;

    match table.as_str() {
        "hotels" => Ok(Command::DeleteHotel { id }),
        "rooms" => Ok(Command::DeleteRoom { id }),
        "reservations" => Ok(Command::DeleteReservation { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from_table) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from_table.relation)?;

    match table.as_str() {
        "availability" => {
            let (mut from, mut to) = (None, None);
            if let Some(selection) = &select.selection {
                extract_window_filters(selection, &mut from, &mut to)?;
            }
            Ok(Command::SelectAvailability {
                from: from.ok_or(SqlError::MissingFilter("from"))?,
                to: to.ok_or(SqlError::MissingFilter("to"))?,
            })
        }
        "rooms" => Ok(Command::SelectRooms {
            id: extract_where_id(&select.selection)?,
        }),
        "reservations" => Ok(Command::SelectReservations {
            id: extract_where_id(&select.selection)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Row layout a statement produces, worked out from its text alone so it
/// can be described before parameters are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Rooms,
    Reservations,
    Receipt,
    Empty,
}

pub fn row_shape(sql: &str) -> RowShape {
    let Ok(stmts) = Parser::parse_sql(&PostgreSqlDialect {}, sql) else {
        return RowShape::Empty;
    };
    match stmts.first() {
        Some(Statement::Insert(insert)) => match insert_table_name(insert).as_deref() {
            Ok("reservations") => RowShape::Receipt,
            _ => RowShape::Empty,
        },
        Some(Statement::Query(query)) => {
            let SetExpr::Select(select) = query.body.as_ref() else {
                return RowShape::Empty;
            };
            let table = select
                .from
                .first()
                .and_then(|t| table_factor_name(&t.relation).ok());
            match table.as_deref() {
                Some("availability" | "rooms") => RowShape::Rooms,
                Some("reservations") => RowShape::Reservations,
                _ => RowShape::Empty,
            }
        }
        _ => RowShape::Empty,
    }
}

fn extract_window_filters(
    expr: &Expr,
    from: &mut Option<Ms>,
    to: &mut Option<Ms>,
) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                extract_window_filters(left, from, to)?;
                extract_window_filters(right, from, to)?;
            }
            ast::BinaryOperator::GtEq => {
                if expr_column_name(left).as_deref() == Some("from") {
                    *from = Some(parse_i64_expr(right)?);
                }
            }
            ast::BinaryOperator::LtEq => {
                if expr_column_name(left).as_deref() == Some("to") {
                    *to = Some(parse_i64_expr(right)?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// First row of an `INSERT ... VALUES`. Extra rows are rejected rather than
/// silently dropped.
fn extract_insert_values(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

/// `WHERE id = '...'`, or `None` without a WHERE clause.
fn extract_where_id(selection: &Option<Expr>) -> Result<Option<Ulid>, SqlError> {
    let Some(sel) = selection else {
        return Ok(None);
    };
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid_expr(right).map(Some),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => {
            Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
        }
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_string_expr(expr).map(Some),
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i32(expr: &Expr) -> Result<i32, SqlError> {
    let v = parse_i64_expr(expr)?;
    i32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of i32 range")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    UnknownColumn(&'static str, String),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::UnknownColumn(t, col) => write!(f, "{t}: unknown column {col}"),
            SqlError::MissingColumn(t, col) => write!(f, "{t}: missing column {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
