use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

use crate::tenant;

/// Startup credentials: one cleartext password shared by every client.
///
/// The database name picks the tenant, so a name that can never become a
/// tenant file is refused here, at login, rather than on the first query.
#[derive(Debug)]
pub struct InnkeepAuthSource {
    password: Vec<u8>,
}

impl InnkeepAuthSource {
    pub fn new(password: String) -> Self {
        Self {
            password: password.into_bytes(),
        }
    }
}

/// Tenant a login resolves to. Postgres falls back to the user name when no
/// database is sent.
pub(crate) fn login_tenant(database: Option<&str>, user: Option<&str>) -> PgWireResult<String> {
    let requested = database.or(user).unwrap_or("default");
    tenant::sanitize(requested).map_err(|e| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "FATAL".into(),
            "3D000".into(),
            format!("database {requested:?} is not usable: {e}"),
        )))
    })
}

#[async_trait]
impl AuthSource for InnkeepAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let tenant = login_tenant(login.database(), login.user())?;
        tracing::debug!("login for user {:?} to tenant {tenant}", login.user());
        Ok(Password::new(None, self.password.clone()))
    }
}
