use std::fmt::Debug;
use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::messages::data::DataRow;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::{InnkeepAuthSource, login_tenant};
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, RowShape, SqlError};
use crate::tenant::TenantManager;

pub struct InnkeepHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<InnkeepQueryParser>,
}

impl InnkeepHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(InnkeepQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let metadata = client.metadata();
        let db = login_tenant(
            metadata.get("database").map(String::as_str),
            metadata.get("user").map(String::as_str),
        )?;
        self.tenant_manager
            .get_or_create(&db)
            .map_err(|e| user_error("08006", format!("tenant error: {e}")))
    }

    /// Execute one command, recording its outcome and latency.
    async fn run(&self, engine: &Engine, cmd: Command) -> PgWireResult<Response> {
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = execute_command(engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }
}

async fn execute_command(engine: &Engine, cmd: Command) -> PgWireResult<Response> {
    match cmd {
        Command::InsertHotel { id, name, address } => {
            engine
                .register_hotel(id, &name, address)
                .await
                .map_err(engine_err)?;
            Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
        }
        Command::DeleteHotel { id } => {
            engine.deactivate_hotel(id).await.map_err(engine_err)?;
            Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
        }
        Command::InsertRoom {
            id,
            hotel_id,
            name,
            floor,
            category,
            rate,
        } => {
            engine
                .register_room(id, hotel_id, &name, floor, category, rate)
                .await
                .map_err(engine_err)?;
            Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
        }
        Command::DeleteRoom { id } => {
            engine.deactivate_room(id).await.map_err(engine_err)?;
            Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
        }
        Command::InsertReservation {
            guest_name,
            room_id,
            from,
            to,
        } => {
            let receipt = engine
                .book_room(&guest_name, room_id, from, to)
                .await
                .map_err(engine_err)?;
            let schema = Arc::new(receipt_schema());
            let row = encode_receipt(&schema, &receipt);
            Ok(Response::Query(QueryResponse::new(
                schema,
                stream::iter(vec![row]),
            )))
        }
        Command::DeleteReservation { id } => {
            let receipt = engine.cancel_reservation(id).await.map_err(engine_err)?;
            debug!(
                "cancelled {} for {} in {} / {}",
                receipt.reservation_id, receipt.guest_name, receipt.hotel_name, receipt.room_name
            );
            Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
        }
        Command::SelectAvailability { from, to } => {
            let rooms = engine
                .query_availability(from, to)
                .await
                .map_err(engine_err)?;
            Ok(room_response(rooms))
        }
        Command::SelectRooms { id: None } => Ok(room_response(engine.list_rooms().await)),
        Command::SelectRooms { id: Some(id) } => {
            let rooms = engine.get_room_with_hotel(id).await.into_iter().collect();
            Ok(room_response(rooms))
        }
        Command::SelectReservations { id: None } => {
            Ok(reservation_response(engine.list_reservations().await))
        }
        Command::SelectReservations { id: Some(id) } => {
            let reservations = engine.get_reservation(id).await.into_iter().collect();
            Ok(reservation_response(reservations))
        }
    }
}

// ── Row layouts ──────────────────────────────────────────────────

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn room_schema() -> Vec<FieldInfo> {
    vec![
        text_field("room_id", Type::VARCHAR),
        text_field("room_name", Type::VARCHAR),
        text_field("hotel_id", Type::VARCHAR),
        text_field("hotel_name", Type::VARCHAR),
        text_field("floor", Type::INT4),
        text_field("category", Type::VARCHAR),
        text_field("rate", Type::INT8),
    ]
}

fn reservation_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("guest_name", Type::VARCHAR),
        text_field("room_id", Type::VARCHAR),
        text_field("room_name", Type::VARCHAR),
        text_field("hotel_name", Type::VARCHAR),
        text_field("from", Type::INT8),
        text_field("to", Type::INT8),
        text_field("duration_hours", Type::INT8),
        text_field("cost", Type::INT8),
    ]
}

fn receipt_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("room_id", Type::VARCHAR),
        text_field("room_name", Type::VARCHAR),
        text_field("hotel_name", Type::VARCHAR),
        text_field("guest_name", Type::VARCHAR),
        text_field("from", Type::INT8),
        text_field("to", Type::INT8),
        text_field("duration_hours", Type::INT8),
        text_field("total_days", Type::FLOAT8),
        text_field("cost", Type::INT8),
    ]
}

fn schema_for(shape: RowShape) -> Vec<FieldInfo> {
    match shape {
        RowShape::Rooms => room_schema(),
        RowShape::Reservations => reservation_schema(),
        RowShape::Receipt => receipt_schema(),
        RowShape::Empty => vec![],
    }
}

fn encode_receipt(schema: &Arc<Vec<FieldInfo>>, r: &BookingReceipt) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&r.reservation_id.to_string())?;
    encoder.encode_field(&r.room_id.to_string())?;
    encoder.encode_field(&r.room_name)?;
    encoder.encode_field(&r.hotel_name)?;
    encoder.encode_field(&r.guest_name)?;
    encoder.encode_field(&r.from)?;
    encoder.encode_field(&r.to)?;
    encoder.encode_field(&i64::from(r.duration_hours))?;
    encoder.encode_field(&r.total_days)?;
    encoder.encode_field(&cost_i64(r.cost))?;
    Ok(encoder.take_row())
}

fn room_response(rooms: Vec<RoomSummary>) -> Response {
    let schema = Arc::new(room_schema());
    let rows: Vec<PgWireResult<DataRow>> = rooms
        .iter()
        .map(|room| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&room.room_id.to_string())?;
            encoder.encode_field(&room.room_name)?;
            encoder.encode_field(&room.hotel_id.to_string())?;
            encoder.encode_field(&room.hotel_name)?;
            encoder.encode_field(&room.floor)?;
            encoder.encode_field(&room.category.as_str().to_string())?;
            encoder.encode_field(&i64::from(room.rate))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn reservation_response(reservations: Vec<ReservationInfo>) -> Response {
    let schema = Arc::new(reservation_schema());
    let rows: Vec<PgWireResult<DataRow>> = reservations
        .iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&r.id.to_string())?;
            encoder.encode_field(&r.guest_name)?;
            encoder.encode_field(&r.room_id.to_string())?;
            encoder.encode_field(&r.room_name)?;
            encoder.encode_field(&r.hotel_name)?;
            encoder.encode_field(&r.from)?;
            encoder.encode_field(&r.to)?;
            encoder.encode_field(&i64::from(r.duration_hours))?;
            encoder.encode_field(&cost_i64(r.cost))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// INT8 is signed; costs past i64::MAX saturate.
fn cost_i64(cost: u64) -> i64 {
    i64::try_from(cost).unwrap_or(i64::MAX)
}

#[async_trait]
impl SimpleQueryHandler for InnkeepHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        Ok(vec![self.run(&engine, cmd).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct InnkeepQueryParser;

#[async_trait]
impl QueryParser for InnkeepQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for(sql::row_shape(stmt)))
    }
}

#[async_trait]
impl ExtendedQueryHandler for InnkeepHandler {
    type Statement = String;
    type QueryParser = InnkeepQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(&portal.statement.statement, portal.parameters.as_slice());
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        self.run(&engine, cmd).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for(sql::row_shape(&target.statement)),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for(sql::row_shape(
            &target.statement.statement,
        ))))
    }
}

/// `$N` placeholders outside quoted text, as `(byte range, N)`.
fn placeholders(sql: &str) -> Vec<(Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                i += 1;
            }
            None if b == b'$' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i].parse::<usize>() {
                    found.push((start..i, n));
                }
            }
            None => i += 1,
        }
    }
    found
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Inline bound text parameters as quoted literals. Only placeholders in the
/// statement itself are replaced; parameter values are never rescanned.
fn substitute_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|k| params.get(k)) else {
            continue;
        };
        out.push_str(&sql[copied..range.start]);
        match param {
            Some(bytes) => {
                out.push('\'');
                out.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                out.push('\'');
            }
            None => out.push_str("NULL"),
        }
        copied = range.end;
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct InnkeepFactory {
    handler: Arc<InnkeepHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<InnkeepAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl InnkeepFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        Self {
            handler: Arc::new(InnkeepHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                InnkeepAuthSource::new(password),
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for InnkeepFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = InnkeepFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

/// SQLSTATE for each engine failure.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_) => "22023",
        EngineError::NotFound(_) => "P0002",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::Conflict => "23P01",
        EngineError::InvalidState(_) => "55000",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
