//! Machines waiting for the end of a command's output.

use std::time::Duration;

use log::debug;

use super::Driver;
use crate::chain::Link;
use crate::channel::{Event, EventList};
use crate::error::{ErrorKind, Result};
use crate::fsm::actions::{
    ConnectionClosed, ExpectedPrompt, PageMore, SendText, StaysConnected, StoreCmdResult,
    UnexpectedPrompt,
};
use crate::fsm::{Action, Fsm, Transition};

/// Wait for `expected`, or for one of the failure conditions every platform
/// shares.
pub(crate) async fn wait_for_string<D: Driver + ?Sized>(
    driver: &D,
    link: &mut Link<'_>,
    expected: &Event,
    timeout: Duration,
) -> Result<bool> {
    let p = driver.patterns();
    let previous = link.previous_prompts;

    let mut events: EventList = [
        p.syntax_error.clone(),
        p.connection_closed.clone(),
        expected.clone(),
        p.press_return.clone(),
        p.more.clone(),
        Event::Timeout,
        Event::Eof,
        p.buffer_overflow.clone(),
    ]
    .into_iter()
    .collect();
    events.extend(previous.iter().cloned());

    debug!("{}: expecting {}", link.hostname(), expected);

    let mut transitions = vec![
        Transition::new(
            &p.syntax_error,
            &[0],
            -1,
            Action::fail(ErrorKind::CommandSyntax, "Command unknown"),
        ),
        Transition::new(&p.connection_closed, &[0], 1, Action::invoke(ConnectionClosed))
            .with_timeout_secs(10),
        Transition::new(
            &Event::Timeout,
            &[0],
            -1,
            Action::fail(ErrorKind::CommandTimeout, "Timeout waiting for prompt"),
        ),
        Transition::new(
            &Event::Eof,
            &[0, 1],
            -1,
            Action::fail(ErrorKind::Connection, "Unexpected device disconnect"),
        ),
        Transition::new(&p.more, &[0], 0, Action::invoke(PageMore)).with_timeout_secs(10),
        Transition::new(expected, &[0, 1], -1, Action::invoke(ExpectedPrompt)),
        Transition::new(&p.press_return, &[0], -1, Action::invoke(StaysConnected)),
        Transition::new(
            &p.buffer_overflow,
            &[0],
            -1,
            Action::fail(ErrorKind::CommandSyntax, "Command too long"),
        ),
    ];
    transitions.extend(
        previous
            .iter()
            .map(|prompt| Transition::new(prompt, &[0, 1], 0, Action::invoke(UnexpectedPrompt))),
    );

    let fsm = Fsm::new("WAIT-4-STRING", events, transitions, timeout);
    fsm.run(&mut link.context()).await
}

/// Patterns of the 64-bit XR admin plane as seen from the XR shell.
#[derive(Debug, Clone)]
pub(crate) struct AdminPlane {
    pub prompt: Event,
    pub connect: Event,
    pub term_length: Event,
}

/// [`wait_for_string`] for 64-bit XR, where `admin` drops into the Calvados
/// shell.
///
/// Entering the admin plane prints a connect banner, the admin prompt, the
/// echo of an automatic `terminal length 0` and the prompt again before the
/// command runs. After the banner a short wait tells whether the first
/// admin prompt is already there or a carriage return must ask for it.
pub(crate) async fn wait_for_string_exr<D: Driver + ?Sized>(
    driver: &D,
    admin: &AdminPlane,
    link: &mut Link<'_>,
    expected: &Event,
    timeout: Duration,
) -> Result<bool> {
    let p = driver.patterns();
    let previous = link.previous_prompts;

    let mut events: EventList = [
        p.syntax_error.clone(),
        p.connection_closed.clone(),
        expected.clone(),
        p.press_return.clone(),
        p.more.clone(),
        Event::Timeout,
        Event::Eof,
        admin.prompt.clone(),
        admin.connect.clone(),
        admin.term_length.clone(),
    ]
    .into_iter()
    .collect();
    events.extend(previous.iter().cloned());

    debug!("{}: expecting {}", link.hostname(), expected);

    let mut transitions = vec![
        Transition::new(
            &p.syntax_error,
            &[0],
            -1,
            Action::fail(ErrorKind::CommandSyntax, "Command unknown"),
        ),
        Transition::new(&p.connection_closed, &[0], 1, Action::invoke(ConnectionClosed))
            .with_timeout_secs(10),
        Transition::new(
            &Event::Timeout,
            &[0, 2],
            -1,
            Action::fail(ErrorKind::CommandTimeout, "Timeout waiting for prompt"),
        ),
        Transition::new(
            &Event::Eof,
            &[0, 1],
            -1,
            Action::fail(ErrorKind::Connection, "Unexpected device disconnect"),
        ),
        Transition::new(&p.more, &[0], 0, Action::invoke(PageMore)).with_timeout_secs(10),
        Transition::new(expected, &[0, 1], -1, Action::invoke(ExpectedPrompt)),
        Transition::new(&admin.prompt, &[0], -1, Action::invoke(ExpectedPrompt)),
        Transition::new(&p.press_return, &[0], -1, Action::invoke(StaysConnected)),
        Transition::new(&admin.connect, &[0], 2, Action::NoOp),
        Transition::new(&admin.prompt, &[2], 3, Action::NoOp).with_timeout_secs(1),
        Transition::new(&Event::Timeout, &[3], 0, Action::invoke(SendText::new("\r"))),
        Transition::new(&admin.term_length, &[3], 4, Action::NoOp),
        Transition::new(&admin.prompt, &[4], 5, Action::NoOp),
        Transition::new(&admin.prompt, &[5], 0, Action::invoke(StoreCmdResult)),
    ];
    transitions.extend(
        previous
            .iter()
            .map(|prompt| Transition::new(prompt, &[0, 1], 0, Action::invoke(UnexpectedPrompt))),
    );

    let fsm = Fsm::new("WAIT-4-STRING", events, transitions, timeout);
    fsm.run(&mut link.context()).await
}
