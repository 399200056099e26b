use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Base URL of a receiver, as handed over by the discovery layer
/// (e.g. `http://192.168.1.20:7000`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceTarget(String);

impl DeviceTarget {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(base_url.into())
    }

    pub fn base_url(&self) -> &str {
        &self.0
    }

    /// Full URL of an endpoint on the receiver, e.g. `endpoint("play")`.
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.0.trim_end_matches('/'), name)
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image transition effects understood by the receiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Transition {
    #[default]
    None,
    Random,
    Dissolve,
    SlideLeft,
    SlideRight,
}

impl Transition {
    /// All transitions, in presentation order.
    pub fn all() -> &'static [Transition] {
        &[
            Transition::None,
            Transition::Random,
            Transition::Dissolve,
            Transition::SlideLeft,
            Transition::SlideRight,
        ]
    }

    /// Value sent in the `X-Apple-Transition` header.
    pub fn code(&self) -> &'static str {
        match self {
            Transition::None => "None",
            Transition::Random => "Random",
            Transition::Dissolve => "Dissolve",
            Transition::SlideLeft => "SlideLeft",
            Transition::SlideRight => "SlideRight",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Transition::SlideLeft => "Slide left",
            Transition::SlideRight => "Slide right",
            other => other.code(),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transition::all()
            .iter()
            .copied()
            .find(|t| t.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown image transition '{}'", s))
    }
}

/// One of the three device-control operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    PutImage { path: PathBuf, transition: Transition },
    PlayVideo { content_url: String },
    StopVideo,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PutImage { .. } => "put-image",
            Command::PlayVideo { .. } => "play-video",
            Command::StopVideo => "stop-video",
        }
    }
}

/// Terminal result of a submitted command, carrying the command back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success { command: Command },
    Failure { command: Command, message: String },
}

impl Outcome {
    pub fn command(&self) -> &Command {
        match self {
            Outcome::Success { command } | Outcome::Failure { command, .. } => command,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
