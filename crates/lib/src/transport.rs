//! HTTPS transport with per-host connection reuse and bounded redirects.
//!
//! Redirects are followed by hand rather than by the HTTP client so that every
//! hop goes through the same scheme check and the same per-host connection
//! cache.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::consts::MAX_REDIRECTS;

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("unsupported scheme {scheme:?} in {url}")]
  UnsupportedScheme { url: String, scheme: String },

  #[error("no host in {0}")]
  MissingHost(String),

  #[error("too many redirects (limit {limit}) while fetching {url}")]
  TooManyRedirects { url: String, limit: usize },

  #[error("{url} answered {status} without a Location header")]
  MissingLocation { url: String, status: u16 },

  #[error("invalid redirect location {location:?} from {url}: {source}")]
  InvalidLocation {
    url: String,
    location: String,
    #[source]
    source: url::ParseError,
  },

  #[error("{url} status {status} not ok")]
  Status { url: String, status: u16 },

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
}

/// Something that can GET a URL and hand back the body as a byte stream.
///
/// The returned reader owns the underlying response; dropping it releases the
/// connection.
pub trait Fetch {
  fn get(&mut self, url: &Url) -> Result<Box<dyn Read>, TransportError>;
}

impl<F: Fetch + ?Sized> Fetch for &mut F {
  fn get(&mut self, url: &Url) -> Result<Box<dyn Read>, TransportError> {
    (**self).get(url)
  }
}

/// Outcome of a single request, before redirects are applied.
#[derive(Debug)]
pub enum Hop<T> {
  Done(T),
  Redirect(String),
}

/// Maps a response status onto a [`Hop`] or an error.
pub fn classify<T>(url: &Url, status: u16, location: Option<&str>, body: T) -> Result<Hop<T>, TransportError> {
  match status {
    200..=299 => Ok(Hop::Done(body)),
    300..=399 => match location {
      Some(location) => Ok(Hop::Redirect(location.to_string())),
      None => Err(TransportError::MissingLocation {
        url: url.to_string(),
        status,
      }),
    },
    _ => Err(TransportError::Status {
      url: url.to_string(),
      status,
    }),
  }
}

/// Issues `send` against `url`, re-issuing against each redirect location.
///
/// Locations are resolved relative to the URL that produced them. At most
/// `limit` redirects are followed.
pub fn follow_redirects<T, S>(url: Url, limit: usize, mut send: S) -> Result<T, TransportError>
where
  S: FnMut(&Url) -> Result<Hop<T>, TransportError>,
{
  let mut current = url;
  let mut redirects = 0;

  loop {
    match send(&current)? {
      Hop::Done(body) => return Ok(body),
      Hop::Redirect(location) => {
        if redirects == limit {
          return Err(TransportError::TooManyRedirects {
            url: current.to_string(),
            limit,
          });
        }
        redirects += 1;

        let next = current.join(&location).map_err(|source| TransportError::InvalidLocation {
          url: current.to_string(),
          location: location.clone(),
          source,
        })?;
        debug!(from = %current, to = %next, "following redirect");
        current = next;
      }
    }
  }
}

/// Blocking HTTPS transport keeping one persistent client per `host:port`.
///
/// Clients are created on first use and live as long as the transport; each
/// keeps at most one idle connection to its host.
pub struct HttpsTransport {
  clients: HashMap<String, Client>,
  max_redirects: usize,
}

impl Default for HttpsTransport {
  fn default() -> Self {
    Self::new()
  }
}

impl HttpsTransport {
  pub fn new() -> Self {
    Self {
      clients: HashMap::new(),
      max_redirects: MAX_REDIRECTS,
    }
  }

  pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
    self.max_redirects = max_redirects;
    self
  }

  /// Number of hosts with a cached client.
  pub fn connection_count(&self) -> usize {
    self.clients.len()
  }

  fn client_for(&mut self, url: &Url) -> Result<&Client, TransportError> {
    if url.scheme() != "https" {
      return Err(TransportError::UnsupportedScheme {
        url: url.to_string(),
        scheme: url.scheme().to_string(),
      });
    }
    let host = url.host_str().ok_or_else(|| TransportError::MissingHost(url.to_string()))?;
    let key = format!("{}:{}", host, url.port_or_known_default().unwrap_or(443));

    if !self.clients.contains_key(&key) {
      debug!(host = %key, "opening connection");
      let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(1)
        .timeout(None::<Duration>)
        .build()
        .map_err(TransportError::Client)?;
      self.clients.insert(key.clone(), client);
    }

    Ok(&self.clients[&key])
  }

  /// Runs `respond` against `url` and each redirect location, each time with
  /// the client cached for that hop's host.
  fn get_with<T, R>(&mut self, url: &Url, mut respond: R) -> Result<T, TransportError>
  where
    R: FnMut(&Client, &Url) -> Result<Hop<T>, TransportError>,
  {
    let limit = self.max_redirects;
    follow_redirects(url.clone(), limit, |hop| {
      let client = self.client_for(hop)?;
      respond(client, hop)
    })
  }
}

fn send_once(client: &Client, url: &Url) -> Result<Hop<Response>, TransportError> {
  let response = client.get(url.clone()).send().map_err(|source| TransportError::Request {
    url: url.to_string(),
    source,
  })?;

  let status: StatusCode = response.status();
  let location = response
    .headers()
    .get(LOCATION)
    .and_then(|value| value.to_str().ok())
    .map(str::to_string);
  debug!(url = %url, status = status.as_u16(), "response");

  classify(url, status.as_u16(), location.as_deref(), response)
}

impl Fetch for HttpsTransport {
  fn get(&mut self, url: &Url) -> Result<Box<dyn Read>, TransportError> {
    let response = self.get_with(url, send_once)?;
    Ok(Box::new(response))
  }
}
