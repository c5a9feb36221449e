use snafu::Snafu;

use super::*;

pub type Result<T, E = BackendError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    #[snafu(display("API token cannot be used as a header value"))]
    InvalidToken { source: InvalidHeaderValue },

    #[snafu(display("could not build the HTTP client: {source}"))]
    BuildClient { source: reqwest::Error },

    #[snafu(display("request to `{endpoint}` failed: {source}"))]
    Request { endpoint: Url, source: reqwest::Error },

    #[snafu(display("`{endpoint}` rejected the tracking batch with status {status}"))]
    Rejected { endpoint: Url, status: StatusCode },
}
