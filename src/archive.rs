//! A module for working with [archive.today](https://archive.today).

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::header;
use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::{
    config::{DEFAULT_ARCHIVE_DOMAIN, DEFAULT_WIP_MAX_ATTEMPTS, DEFAULT_WIP_POLL_INTERVAL},
    error::{Error, Result},
    http::{HttpRequest, HttpResponse, HttpTransport},
    parse,
    user_agent::UserAgentProvider,
};

static INVALID_URL_BODY: &str = "<h1>Invalid URL</h1>";
static WIP_SEGMENT: &str = "/wip/";

pub struct ArchiveToday<'a> {
    client: &'a dyn HttpTransport,
    user_agents: &'a dyn UserAgentProvider,
}

impl fmt::Debug for ArchiveToday<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveToday").finish_non_exhaustive()
    }
}

/// Whether to ask archive.today to archive a page again when it already has
/// a snapshot of it.
pub enum RenewPolicy {
    Never,
    Always,
    /// Renews if the predicate returns `true` for the date of the existing
    /// snapshot.
    If(Box<dyn Fn(&DateTime<Utc>) -> bool + Send + Sync>),
    /// Like [`RenewPolicy::If`], for predicates that need to wait on I/O.
    IfAsync(Box<dyn Fn(DateTime<Utc>) -> BoxFuture<'static, bool> + Send + Sync>),
}

impl RenewPolicy {
    async fn should_renew(&self, cached_date: &DateTime<Utc>) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::If(predicate) => predicate(cached_date),
            Self::IfAsync(predicate) => predicate(*cached_date).await,
        }
    }
}

impl Default for RenewPolicy {
    fn default() -> Self {
        Self::Never
    }
}

impl From<bool> for RenewPolicy {
    fn from(renew: bool) -> Self {
        if renew {
            Self::Always
        } else {
            Self::Never
        }
    }
}

impl fmt::Debug for RenewPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "Never"),
            Self::Always => write!(f, "Always"),
            Self::If(_) => write!(f, "If(..)"),
            Self::IfAsync(_) => write!(f, "IfAsync(..)"),
        }
    }
}

/// How to wait for a snapshot that is still being archived.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WipPollPolicy {
    pub interval: Duration,
    /// `None` polls until archiving finishes or the caller drops the future.
    pub max_attempts: Option<u32>,
}

impl Default for WipPollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_WIP_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_WIP_MAX_ATTEMPTS),
        }
    }
}

#[derive(Debug)]
pub struct SnapshotOptions<'a> {
    pub url: &'a str,
    /// Mirror to contact first. Defaults to [`DEFAULT_ARCHIVE_DOMAIN`].
    pub archive_domain: Option<&'a str>,
    /// Defaults to an identity from the client's [`UserAgentProvider`].
    pub user_agent: Option<&'a str>,
    pub renew: RenewPolicy,
    /// Wait for archiving to finish. If `false`, [`Snapshot::wip`] is set to
    /// a link that tracks progress and redirects upon completion.
    pub complete: bool,
    pub wip_poll: WipPollPolicy,
}

impl<'a> SnapshotOptions<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }
}

impl Default for SnapshotOptions<'_> {
    fn default() -> Self {
        Self {
            url: "",
            archive_domain: None,
            user_agent: None,
            renew: RenewPolicy::Never,
            complete: true,
            wip_poll: WipPollPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// ID of the snapshot link, e.g. `3B03B`.
    pub id: String,
    /// Mirror domain of the snapshot link, e.g. `archive.vn`.
    pub domain: String,
    pub url: String,
    /// Link to the screenshot of the snapshot.
    pub image: String,
    /// When the existing snapshot was taken. `None` if a new snapshot was
    /// created.
    pub cached_date: Option<DateTime<Utc>>,
    /// Progress link if archiving had not finished and the caller did not
    /// wait for it.
    pub wip: Option<String>,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct TimemapOptions<'a> {
    /// Matched exactly except for the scheme, including query parameters.
    pub url: &'a str,
    pub archive_domain: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

/// A past snapshot of a URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Memento {
    pub url: String,
    pub date: DateTime<Utc>,
}

/// State carried from one submission pass to the next.
#[derive(Debug)]
struct SubmitContext {
    archive_domain: String,
    user_agent: String,
    /// Set on the renewal pass, which reuses the token from the snapshot page.
    submit_id: Option<String>,
    referer: Option<String>,
}

#[derive(Debug)]
enum SubmitOutcome {
    Created {
        link: String,
        wip: Option<String>,
    },
    AlreadyArchived {
        link: String,
        cached_date: DateTime<Utc>,
        page: String,
    },
}

impl<'a> ArchiveToday<'a> {
    pub fn new(client: &'a dyn HttpTransport, user_agents: &'a dyn UserAgentProvider) -> Self {
        Self {
            client,
            user_agents,
        }
    }

    /// Asks archive.today to create or return the latest snapshot of a URL.
    ///
    /// At most one renewal pass is made: if the page is already archived and
    /// `opts.renew` asks for it, the submission is repeated once with the
    /// token from the existing snapshot page.
    ///
    /// # Errors
    ///
    /// Fails if archive.today rejects the URL, serves a page without the
    /// submission form (e.g. a CAPTCHA), answers with an unexpected status,
    /// does not finish archiving within `opts.wip_poll`, or if a network
    /// error occurs.
    pub async fn snapshot(&self, opts: &SnapshotOptions<'_>) -> Result<Snapshot> {
        if opts.url.is_empty() {
            return Err(Error::InvalidArgument("url must not be empty".into()));
        }

        // Reuse the same identity for the renewal pass
        let mut ctx = SubmitContext {
            archive_domain: opts
                .archive_domain
                .unwrap_or(DEFAULT_ARCHIVE_DOMAIN)
                .to_owned(),
            user_agent: opts
                .user_agent
                .map_or_else(|| self.user_agents.user_agent(), str::to_owned),
            submit_id: None,
            referer: None,
        };

        loop {
            let renewing = ctx.submit_id.is_some();
            let submit_id = match ctx.submit_id.take() {
                Some(submit_id) => submit_id,
                None => self.acquire_submit_id(&mut ctx).await?,
            };

            match self.submit(opts, &ctx, &submit_id, renewing).await? {
                SubmitOutcome::Created { link, wip } => {
                    return finalize(link, None /*cached_date*/, wip);
                }
                SubmitOutcome::AlreadyArchived {
                    link,
                    cached_date,
                    page,
                } => {
                    if renewing || !opts.renew.should_renew(&cached_date).await {
                        return finalize(link, Some(cached_date), None /*wip*/);
                    }
                    log::debug!("renewing snapshot {} from {}", link, cached_date);
                    ctx.submit_id = Some(parse::extract_submit_id(&page)?);
                    ctx.referer = Some(link);
                }
            }
        }
    }

    /// Retrieves all snapshots of a URL, oldest first.
    ///
    /// Returns an empty list if the URL has never been archived.
    ///
    /// # Errors
    ///
    /// Fails if a network error occurs or the listing is malformed.
    pub async fn timemap(&self, opts: &TimemapOptions<'_>) -> Result<Vec<Memento>> {
        let archive_domain = opts.archive_domain.unwrap_or(DEFAULT_ARCHIVE_DOMAIN);
        let user_agent = opts
            .user_agent
            .map_or_else(|| self.user_agents.user_agent(), str::to_owned);

        let mut req = HttpRequest::get(format!(
            "{}/timemap/{}",
            archive_domain.trim_end_matches('/'),
            opts.url
        ));
        if !user_agent.is_empty() {
            req = req.header(header::USER_AGENT, user_agent);
        }
        let resp = self.client.send(req).await?;
        log::debug!("timemap for {}: HTTP {}", opts.url, resp.status);

        parse::parse_timemap(&resp.body)
    }

    /// Loads the index page, moving to the mirror it redirects to.
    async fn acquire_submit_id(&self, ctx: &mut SubmitContext) -> Result<String> {
        let req = with_identity(HttpRequest::get(ctx.archive_domain.as_str()), ctx);
        let resp = self.client.send(req).await?;
        log::debug!("using archive.today mirror {}", resp.url);
        ctx.archive_domain = resp.url;
        parse::extract_submit_id(&resp.body)
    }

    async fn submit(
        &self,
        opts: &SnapshotOptions<'_>,
        ctx: &SubmitContext,
        submit_id: &str,
        renewing: bool,
    ) -> Result<SubmitOutcome> {
        let body = submit_form_body(opts.url, submit_id, renewing);
        let resp = self
            .post_form(&submit_url(&ctx.archive_domain), body.clone(), ctx)
            .await?;
        log::debug!("submitted {}: HTTP {}", opts.url, resp.status);

        match resp.status {
            200 => {
                if resp.body == INVALID_URL_BODY {
                    return Err(Error::InvalidUrl(opts.url.into()));
                }
                let link = refresh_link(&resp)?;
                if !link.contains(WIP_SEGMENT) {
                    return Ok(SubmitOutcome::Created { link, wip: None });
                }
                if opts.complete {
                    let link = self.wait_for_wip(&link, ctx, &opts.wip_poll).await?;
                    Ok(SubmitOutcome::Created { link, wip: None })
                } else {
                    // Archiving has not finished, so this link will only work
                    // once it has.
                    Ok(SubmitOutcome::Created {
                        link: link.replacen(WIP_SEGMENT, "/", 1),
                        wip: Some(link),
                    })
                }
            }
            302 | 307 => {
                let location = resp
                    .header(header::LOCATION.as_str())
                    .ok_or(Error::MissingHeader("location"))?;
                let link = resolve_location(&resp.url, &location)?;

                // Ask the snapshot page itself for its metadata and a fresh
                // submitid in case it is renewed.
                let page = self.post_form(&link, body, ctx).await?;
                let cached_date = page
                    .header("memento-datetime")
                    .ok_or(Error::MissingHeader("memento-datetime"))
                    .and_then(|date| parse::parse_http_date(&date))?;
                Ok(SubmitOutcome::AlreadyArchived {
                    link,
                    cached_date,
                    page: page.body,
                })
            }
            status => Err(Error::UnknownResponseCode(status)),
        }
    }

    /// Polls the work-in-progress link until it redirects to the finished
    /// snapshot.
    async fn wait_for_wip(
        &self,
        wip_link: &str,
        ctx: &SubmitContext,
        policy: &WipPollPolicy,
    ) -> Result<String> {
        let mut num_attempts = 0;
        loop {
            let req = with_identity(HttpRequest::get(wip_link).manual_redirects(), ctx);
            let resp = self.client.send(req).await?;
            num_attempts += 1;
            if let Some(location) = resp.header(header::LOCATION.as_str()) {
                log::debug!("archiving finished after {} attempts", num_attempts);
                return resolve_location(wip_link, &location);
            }

            if policy.max_attempts.map_or(false, |max| num_attempts >= max) {
                return Err(Error::WipTimeout {
                    attempts: num_attempts,
                });
            }
            log::trace!("{} still in progress (attempt {})", wip_link, num_attempts);
            tokio::time::sleep(policy.interval).await;
        }
    }

    async fn post_form(
        &self,
        url: &str,
        body: String,
        ctx: &SubmitContext,
    ) -> Result<HttpResponse> {
        let req = with_identity(HttpRequest::post_form(url, body).manual_redirects(), ctx);
        self.client.send(req).await
    }
}

fn with_identity(mut req: HttpRequest, ctx: &SubmitContext) -> HttpRequest {
    if !ctx.user_agent.is_empty() {
        req = req.header(header::USER_AGENT, ctx.user_agent.as_str());
    }
    if let Some(referer) = &ctx.referer {
        req = req.header(header::REFERER, referer.as_str());
    }
    req
}

fn submit_url(archive_domain: &str) -> String {
    if archive_domain.ends_with('/') {
        format!("{}submit/", archive_domain)
    } else {
        format!("{}/submit/", archive_domain)
    }
}

fn submit_form_body(url: &str, submit_id: &str, renewing: bool) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    if renewing {
        // Skips archive.today's check for a recent snapshot
        form.append_pair("anyway", "1");
    }
    form.append_pair("url", url);
    form.append_pair("submitid", submit_id);
    form.finish()
}

/// Reads the target of a `refresh: 0;url=<link>` header.
fn refresh_link(resp: &HttpResponse) -> Result<String> {
    let refresh = resp
        .header("refresh")
        .ok_or(Error::MissingHeader("refresh"))?;
    refresh
        .split_once("url=")
        .map(|(_, link)| link.trim().to_owned())
        .ok_or(Error::MissingHeader("refresh"))
}

fn resolve_location(base: &str, location: &str) -> Result<String> {
    Ok(Url::parse(base)?.join(location)?.to_string())
}

fn finalize(
    link: String,
    cached_date: Option<DateTime<Utc>>,
    wip: Option<String>,
) -> Result<Snapshot> {
    let parse::SnapshotLink { domain, id } = parse::parse_snapshot_link(&link)?;
    Ok(Snapshot {
        id: id.into(),
        domain: domain.into(),
        image: format!("{}/scr.png", link),
        url: link,
        cached_date,
        wip,
    })
}
