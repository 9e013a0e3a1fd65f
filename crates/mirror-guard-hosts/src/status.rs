use mirror_guard::HostError;

/// Map a non-success response to a [`HostError`], passing successes through.
/// `what` names the requested object in not-found errors.
pub(crate) async fn check(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, HostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_else(|_| "unknown".into());
    match status.as_u16() {
        404 => Err(HostError::NotFound(what.to_owned())),
        422 => Err(HostError::Unprocessable(format!("{what}: {body}"))),
        code => Err(HostError::Http {
            status: code,
            message: body,
        }),
    }
}

pub(crate) fn network(e: reqwest::Error) -> HostError {
    HostError::Network(e.to_string())
}

pub(crate) fn parse(e: reqwest::Error) -> HostError {
    HostError::Parse(e.to_string())
}
