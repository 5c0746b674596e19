//! IOS and IOS XE drivers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use secrecy::{ExposeSecret, SecretString};

use super::{Driver, DriverCore, ReloadOptions, profile};
use crate::chain::Link;
use crate::channel::{Event, EventList};
use crate::error::{Error, ErrorKind, Result};
use crate::fsm::actions::{Disconnect, ExpectedPrompt, SendLine, SendPassword, SendText};
use crate::fsm::{Action, Fsm, Transition};
use crate::platform::{PatternRegistry, PlatformId};

const SAVE_CONFIG: &str = "System configuration has been modified. Save? [yes/no]: ";
const PROCEED: &str = "Proceed with reload? [confirm]";

/// Classic IOS.
#[derive(Debug)]
pub struct Ios {
    core: DriverCore,
}

impl Ios {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::IOS, registry)?,
        })
    }
}

#[async_trait]
impl Driver for Ios {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    async fn enable(&self, link: &mut Link<'_>, password: Option<&SecretString>) -> Result<()> {
        enable(self, link, password).await
    }

    async fn reload(&self, link: &mut Link<'_>, options: &ReloadOptions) -> Result<Option<Event>> {
        reload(self, link, options).await
    }
}

/// IOS XE.
///
/// XE prompts are indistinguishable from IOS ones, so a classified IOS
/// prompt keeps the XE driver.
#[derive(Debug)]
pub struct Xe {
    core: DriverCore,
}

impl Xe {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::XE, registry)?,
        })
    }
}

#[async_trait]
impl Driver for Xe {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    fn pin_platform(&self, detected: PlatformId) -> PlatformId {
        match detected {
            PlatformId::Ios => PlatformId::Xe,
            other => other,
        }
    }

    async fn enable(&self, link: &mut Link<'_>, password: Option<&SecretString>) -> Result<()> {
        enable(self, link, password).await
    }

    async fn reload(&self, link: &mut Link<'_>, options: &ReloadOptions) -> Result<Option<Event>> {
        reload(self, link, options).await
    }
}

fn privileged(prompt: &str) -> bool {
    prompt.trim_end().ends_with('#')
}

/// Enter privileged mode with `enable`.
///
/// Without an explicit secret the hop's login password is offered.
async fn enable<D: Driver + ?Sized>(
    driver: &D,
    link: &mut Link<'_>,
    password: Option<&SecretString>,
) -> Result<()> {
    if link.state.prompt.as_deref().is_some_and(privileged) {
        debug!("{}: already in privileged mode", link.hostname());
        return Ok(());
    }
    let Some(prompt) = link.state.prompt_re.clone() else {
        return Err(Error::general(link.hostname(), "Prompt not detected"));
    };

    let p = driver.patterns();
    let events: EventList = [p.password.clone(), prompt.clone(), Event::Timeout, Event::Eof]
        .into_iter()
        .collect();
    let send_password = match password {
        Some(secret) => SendPassword::new(SecretString::from(secret.expose_secret().to_owned())),
        None => SendPassword::from_hop(),
    };
    let transitions = vec![
        Transition::new(&p.password, &[0], 1, Action::invoke(send_password)).with_timeout_secs(10),
        Transition::new(
            &p.password,
            &[1],
            -1,
            Action::fail(ErrorKind::ConnectionAuthentication, "Incorrect enable password"),
        ),
        Transition::new(&prompt, &[0, 1, 2, 3], -1, Action::invoke(ExpectedPrompt)),
        Transition::new(
            &Event::Timeout,
            &[0, 1, 2],
            -1,
            Action::fail(ErrorKind::ConnectionAuthentication, "Unable to get privileged mode"),
        ),
        Transition::new(
            &Event::Eof,
            &[0, 1, 2],
            -1,
            Action::fail(ErrorKind::Connection, "Device disconnected"),
        ),
    ];

    let enable_cmd = driver.profile().enable_cmd.unwrap_or("enable");
    link.ctrl
        .send_command(enable_cmd)
        .await
        .map_err(|e| link.channel_error(e))?;

    let fsm = Fsm::new("IOS-ENABLE", events, transitions, Duration::from_secs(10)).with_max_transitions(5);
    fsm.run(&mut link.context()).await?;

    match link.state.last_prompt.as_deref().map(str::trim_end) {
        Some(prompt) if privileged(prompt) => {
            info!("{}: privileged mode set", link.hostname());
            link.state.prompt = Some(prompt.to_string());
            Ok(())
        }
        _ => Err(Error::new(
            ErrorKind::ConnectionAuthentication,
            link.hostname(),
            "Privileged mode not set",
        )),
    }
}

/// Reload, answering the save and confirm questions.
async fn reload<D: Driver + ?Sized>(
    driver: &D,
    link: &mut Link<'_>,
    options: &ReloadOptions,
) -> Result<Option<Event>> {
    let host = link.hostname().to_string();
    let save_config = Event::literal(SAVE_CONFIG).map_err(|e| Error::from_pattern(e, &host))?;
    let proceed = Event::literal(PROCEED).map_err(|e| Error::from_pattern(e, &host))?;
    let reload_cmd = driver.profile().reload_cmd.unwrap_or("reload");
    let answer = if options.save_config { "yes" } else { "no" };

    let events: EventList = [save_config.clone(), proceed.clone(), Event::Timeout, Event::Eof]
        .into_iter()
        .collect();
    let transitions = vec![
        Transition::new(&save_config, &[0], 1, Action::invoke(SendLine::new(answer))).with_timeout_secs(60),
        Transition::new(&proceed, &[0, 1], 2, Action::invoke(SendText::new("\r"))).with_timeout_secs(10),
        // the reload command is typed again when nothing happens
        Transition::new(&Event::Timeout, &[0], 0, Action::invoke(SendLine::new(reload_cmd)))
            .with_timeout_secs(10),
        Transition::new(&Event::Timeout, &[2], -1, Action::invoke(Disconnect)),
        Transition::new(&Event::Eof, &[0, 1, 2], -1, Action::invoke(Disconnect)),
    ];

    link.ctrl
        .send_command(reload_cmd)
        .await
        .map_err(|e| link.channel_error(e))?;
    let fsm = Fsm::new("IOS-RELOAD", events, transitions, Duration::from_secs(10)).with_max_transitions(5);
    fsm.run(&mut link.context()).await?;
    Ok(None)
}
