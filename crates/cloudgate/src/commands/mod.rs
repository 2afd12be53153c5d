//! Subcommand handlers.

pub mod call;
pub mod config_cmd;
pub mod serve;

use cloudgate_api::OpenApiClient;
use cloudgate_config::Config;

use crate::error::AppError;

/// Build the platform client from loaded config. Does not connect.
pub(crate) fn build_client(config: &Config) -> Result<OpenApiClient, AppError> {
    let settings = cloudgate_config::cloud_settings(config)?;
    let client = OpenApiClient::new(
        settings.endpoint.as_str(),
        settings.credentials,
        &settings.transport,
    )?
    .with_lang(settings.lang);
    Ok(client)
}
