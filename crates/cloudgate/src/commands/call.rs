//! `cloudgate call <get|post> PATH`: one signed request, printed.

use serde_json::Value;

use cloudgate_api::CloudApi;
use cloudgate_config::Config;

use crate::cli::{CallArgs, HttpMethod};
use crate::commands::build_client;
use crate::error::AppError;
use crate::output;

/// What `call` sends once the arguments are checked.
#[derive(Debug, PartialEq)]
enum Outgoing {
    Get,
    Post(Value),
}

pub async fn handle(args: CallArgs, config: &Config) -> Result<(), AppError> {
    validate_path(&args.path)?;
    let outgoing = outgoing(args.method, read_body(&args)?, &args.query)?;

    let client = build_client(config)?;
    client.connect().await?;

    let response = match outgoing {
        Outgoing::Get => client.get(&args.path, &args.query).await?,
        Outgoing::Post(body) => client.post(&args.path, &body).await?,
    };

    println!("{}", output::render(args.output, &response)?);
    Ok(())
}

/// GET takes a query and no body; POST takes a body and no query.
fn outgoing(
    method: HttpMethod,
    body: Option<Value>,
    query: &[(String, String)],
) -> Result<Outgoing, AppError> {
    match (method, body) {
        (HttpMethod::Get, None) => Ok(Outgoing::Get),
        (HttpMethod::Get, Some(_)) => Err(AppError::Validation {
            field: "body".into(),
            reason: "GET requests take no body".into(),
        }),
        (HttpMethod::Post, _) if !query.is_empty() => Err(AppError::Validation {
            field: "query".into(),
            reason: "POST requests take no query parameters".into(),
        }),
        (HttpMethod::Post, Some(body)) => Ok(Outgoing::Post(body)),
        (HttpMethod::Post, None) => Err(AppError::Validation {
            field: "body".into(),
            reason: "POST requires --body or --body-file".into(),
        }),
    }
}

fn validate_path(path: &str) -> Result<(), AppError> {
    if !path.starts_with('/') {
        return Err(AppError::Validation {
            field: "path".into(),
            reason: format!("'{path}' must start with '/'"),
        });
    }
    if path.contains('?') {
        return Err(AppError::Validation {
            field: "path".into(),
            reason: "pass query parameters with --query KEY=VALUE".into(),
        });
    }
    Ok(())
}

fn read_body(args: &CallArgs) -> Result<Option<Value>, AppError> {
    let raw = match (&args.body, &args.body_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Ok(None),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn paths_must_be_absolute_without_query() {
        assert!(validate_path("/v1.0/devices/abc").is_ok());
        assert!(validate_path("v1.0/devices").is_err());
        assert!(validate_path("/v1.0/devices?x=1").is_err());
    }

    #[test]
    fn method_decides_body_and_query() {
        let query = vec![("page_size".to_owned(), "20".to_owned())];
        let body = serde_json::json!({ "commands": [] });

        assert_eq!(
            outgoing(HttpMethod::Get, None, &query).ok(),
            Some(Outgoing::Get)
        );
        assert_eq!(
            outgoing(HttpMethod::Post, Some(body.clone()), &[]).ok(),
            Some(Outgoing::Post(body.clone()))
        );

        let rejected = [
            outgoing(HttpMethod::Get, Some(body.clone()), &[]),
            outgoing(HttpMethod::Post, None, &[]),
            outgoing(HttpMethod::Post, Some(body), &query),
        ];
        for result in rejected {
            assert!(
                matches!(result, Err(AppError::Validation { .. })),
                "got: {result:?}"
            );
        }
    }

    #[test]
    fn post_with_query_names_the_query() {
        let query = vec![("a".to_owned(), "b".to_owned())];
        let err = outgoing(HttpMethod::Post, Some(Value::Null), &query).unwrap_err();
        assert!(
            matches!(err, AppError::Validation { ref field, .. } if field == "query"),
            "got: {err:?}"
        );
    }
}
