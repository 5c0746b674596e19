//! Prompt autodetection.
//!
//! Press enter twice and compare the two answers. When they are close
//! enough the device is sitting at a stable prompt and the last line of the
//! answer is that prompt. Slow links get a growing time budget per attempt.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::chain::Controller;
use crate::channel::Event;
use crate::error::{ChannelError, Error, Result};

/// Prompt detection tuning.
#[derive(Debug, Clone)]
pub struct PromptDetectionConfig {
    /// Initial read time budget multiplier.
    pub sync_multiplier: f64,

    /// Number of sample pairs taken before giving up.
    pub attempts: usize,

    /// Multiplier growth per attempt.
    pub growth: f64,

    /// Largest edit distance per character for two samples to agree.
    pub acceptance_ratio: f64,

    /// How long to wait for the prompt when resynchronizing.
    pub resync_timeout: Duration,
}

impl Default for PromptDetectionConfig {
    fn default() -> Self {
        Self {
            sync_multiplier: 4.0,
            attempts: 10,
            growth: 1.2,
            acceptance_ratio: 0.3,
            resync_timeout: Duration::from_secs(30),
        }
    }
}

impl PromptDetectionConfig {
    /// Set the initial multiplier.
    pub fn with_sync_multiplier(mut self, multiplier: f64) -> Self {
        self.sync_multiplier = multiplier;
        self
    }

    /// Set the number of attempts.
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Read whatever the device prints, one byte at a time.
///
/// The first byte may take `2m` seconds, later bytes `0.4m` each and the
/// whole read `4m`, where `m` is `multiplier`. Line breaks before the first
/// visible byte do not shorten the wait. Returns the trimmed text.
pub async fn try_read_prompt(ctrl: &mut Controller, host: &str, multiplier: f64) -> Result<String> {
    let first_char_timeout = Duration::from_secs_f64(multiplier * 2.0);
    let inter_char_timeout = Duration::from_secs_f64(multiplier * 0.4);
    let total_timeout = Duration::from_secs_f64(multiplier * 4.0);

    let begin = Instant::now();
    let mut timeout = first_char_timeout;
    let mut raw = Vec::new();
    while begin.elapsed() < total_timeout {
        match ctrl.read_nonblocking(1, timeout).await {
            Ok(bytes) => {
                if bytes.iter().any(|b| *b != b'\r' && *b != b'\n') {
                    timeout = inter_char_timeout;
                }
                raw.extend_from_slice(&bytes);
            }
            Err(ChannelError::Timeout(_)) => break,
            Err(ChannelError::Closed) => return Err(Error::connection(host, "Session disconnected")),
            Err(e) => return Err(Error::from_channel(e, host)),
        }
    }
    Ok(String::from_utf8_lossy(&raw).trim().to_string())
}

/// Find the prompt of the device at the other end of the session.
///
/// Returns `None` when no stable prompt showed up within the attempts.
pub async fn detect_prompt(
    ctrl: &mut Controller,
    host: &str,
    config: &PromptDetectionConfig,
) -> Result<Option<String>> {
    let send_line = |e: ChannelError| Error::from_channel(e, host);
    let mut multiplier = config.sync_multiplier;

    ctrl.send_line("").await.map_err(send_line)?;
    try_read_prompt(ctrl, host, multiplier).await?;

    for attempt in 1..=config.attempts {
        debug!("{}: detecting prompt, attempt {}/{}", host, attempt, config.attempts);
        ctrl.send_line("").await.map_err(send_line)?;
        let a = try_read_prompt(ctrl, host, multiplier).await?;
        ctrl.send_line("").await.map_err(send_line)?;
        let b = try_read_prompt(ctrl, host, multiplier).await?;

        let distance = levenshtein(&a, &b);
        debug!("{}: LD={} MP={:.2}", host, distance, multiplier);
        multiplier *= config.growth;

        let len_a = a.chars().count();
        if len_a == 0 {
            continue;
        }
        if (distance as f64) / (len_a as f64) < config.acceptance_ratio {
            let prompt = last_line(&b).to_string();
            debug!("{}: detected prompt: '{}'", host, prompt);
            resync(ctrl, host, &prompt, config.resync_timeout).await?;
            return Ok(Some(prompt));
        }
    }
    Ok(None)
}

/// The text after the last line break.
fn last_line(text: &str) -> &str {
    match memchr::memrchr(b'\n', text.as_bytes()) {
        Some(index) => &text[index + 1..],
        None => text,
    }
}

/// Press enter and consume everything up to the prompt on a fresh line.
async fn resync(ctrl: &mut Controller, host: &str, prompt: &str, timeout: Duration) -> Result<()> {
    let anchored = Event::regex(&format!(r"(?:\r\n|\n\r){}", regex::escape(prompt)))
        .map_err(|e| Error::from_pattern(e, host))?;
    ctrl.send_line("").await.map_err(|e| Error::from_channel(e, host))?;
    match ctrl.expect(&[anchored], timeout).await {
        Ok(_) => Ok(()),
        Err(ChannelError::Timeout(_)) => {
            warn!("{}: prompt '{}' not seen while resynchronizing", host, prompt);
            Ok(())
        }
        Err(ChannelError::Closed) => Err(Error::connection(host, "Session disconnected")),
        Err(e) => Err(Error::from_channel(e, host)),
    }
}

/// Edit distance between two strings, in characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut current: Vec<usize> = (0..=short.len()).collect();
    for (i, lc) in long.iter().enumerate() {
        let previous = std::mem::replace(&mut current, vec![0; short.len() + 1]);
        current[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let add = previous[j + 1] + 1;
            let delete = current[j] + 1;
            let change = previous[j] + usize::from(sc != lc);
            current[j + 1] = add.min(delete).min(change);
        }
    }
    current[short.len()]
}
