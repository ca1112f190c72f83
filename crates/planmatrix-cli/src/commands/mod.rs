pub mod archive;
pub mod auth;
pub mod status;
pub mod sync;
pub mod validate;

use planmatrix_core::auth::GoogleAuth;
use planmatrix_core::{Config, GoogleCalendarClient, MatrixDb, SyncEngine};

/// Build the engine the sync/status commands share: config, store, and a
/// Google client bound to the configured calendar.
///
/// The returned runtime must stay alive, and be entered (`runtime.enter()`),
/// for as long as the client is used -- the service and auth layers block
/// on the ambient runtime handle.
pub fn build_engine(
) -> Result<(tokio::runtime::Runtime, SyncEngine<MatrixDb, GoogleCalendarClient>), Box<dyn std::error::Error>>
{
    let config = Config::load()?;
    let calendar_id = config.require_calendar_id()?.to_string();

    let runtime = tokio::runtime::Runtime::new()?;
    let store = MatrixDb::open()?;
    let client = GoogleCalendarClient::new(GoogleAuth::new(), &calendar_id);
    Ok((runtime, SyncEngine::new(store, client, config)))
}
