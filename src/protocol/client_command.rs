use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "initialize")]
    Initialize {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "shutdown")]
    Shutdown {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "home")]
    Home {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "offset")]
    Offset {
        ha: f64,
        dec: f64,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "slew_hadec")]
    SlewHadec {
        ha: f64,
        dec: f64,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "track_body")]
    TrackBody {
        body: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "set_focus")]
    SetFocus {
        position: f64,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "stop")]
    Stop {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "stop_focus")]
    StopFocus {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "set_light")]
    SetLight {
        color: String,
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "report_status")]
    ReportStatus {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        id: Option<String>,
    },
}

impl ClientCommand {
    pub fn id(&self) -> Option<&String> {
        match self {
            ClientCommand::Initialize { id, .. } => id.as_ref(),
            ClientCommand::Shutdown { id, .. } => id.as_ref(),
            ClientCommand::Home { id, .. } => id.as_ref(),
            ClientCommand::Offset { id, .. } => id.as_ref(),
            ClientCommand::SlewHadec { id, .. } => id.as_ref(),
            ClientCommand::TrackBody { id, .. } => id.as_ref(),
            ClientCommand::SetFocus { id, .. } => id.as_ref(),
            ClientCommand::Stop { id, .. } => id.as_ref(),
            ClientCommand::StopFocus { id, .. } => id.as_ref(),
            ClientCommand::SetLight { id, .. } => id.as_ref(),
            ClientCommand::ReportStatus { id, .. } => id.as_ref(),
            ClientCommand::Ping { id, .. } => id.as_ref(),
        }
    }

    /// Wire name of the command, used in log spans.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Initialize { .. } => "initialize",
            ClientCommand::Shutdown { .. } => "shutdown",
            ClientCommand::Home { .. } => "home",
            ClientCommand::Offset { .. } => "offset",
            ClientCommand::SlewHadec { .. } => "slew_hadec",
            ClientCommand::TrackBody { .. } => "track_body",
            ClientCommand::SetFocus { .. } => "set_focus",
            ClientCommand::Stop { .. } => "stop",
            ClientCommand::StopFocus { .. } => "stop_focus",
            ClientCommand::SetLight { .. } => "set_light",
            ClientCommand::ReportStatus { .. } => "report_status",
            ClientCommand::Ping { .. } => "ping",
        }
    }
}
