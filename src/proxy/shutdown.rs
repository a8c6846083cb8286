use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::Value;
use std::fmt;

/// Reply codes of `Shutdown.ConfirmShutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCode {
    /// 250
    Ready,
    /// 550, reason unknown
    NotReady,
    /// 901
    UserActive,
    /// 902
    CutterActive,
    /// 903
    RecordingActive,
    /// 904
    RecordingImminent,
    /// 905
    PluginActive,
    /// 906
    PluginWakeup,
    /// 990, the message carries SHUTDOWNCMD
    ShutdownCommand,
    /// 991, the message carries TRY_AGAIN of the shutdown hooks
    TryAgain,
    /// 992, the message carries ABORT_MESSAGE of the shutdown hooks
    Abort,
    /// 999
    HookFailed,
    Other(i32),
}

impl ShutdownCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            250 => Self::Ready,
            550 => Self::NotReady,
            901 => Self::UserActive,
            902 => Self::CutterActive,
            903 => Self::RecordingActive,
            904 => Self::RecordingImminent,
            905 => Self::PluginActive,
            906 => Self::PluginWakeup,
            990 => Self::ShutdownCommand,
            991 => Self::TryAgain,
            992 => Self::Abort,
            999 => Self::HookFailed,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Ready => 250,
            Self::NotReady => 550,
            Self::UserActive => 901,
            Self::CutterActive => 902,
            Self::RecordingActive => 903,
            Self::RecordingImminent => 904,
            Self::PluginActive => 905,
            Self::PluginWakeup => 906,
            Self::ShutdownCommand => 990,
            Self::TryAgain => 991,
            Self::Abort => 992,
            Self::HookFailed => 999,
            Self::Other(code) => *code,
        }
    }

    pub fn is_ready(&self) -> bool {
        *self == Self::Ready
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ready => "vdr is ready for shutdown",
            Self::NotReady => "vdr is not ready for shutdown",
            Self::UserActive => "user is active",
            Self::CutterActive => "cutter is active",
            Self::RecordingActive => "recording is active",
            Self::RecordingImminent => "recording is active in the near future",
            Self::PluginActive => "some plugin is active",
            Self::PluginWakeup => "some plugin will wakeup vdr in the near future",
            Self::ShutdownCommand => "shutdown command",
            Self::TryAgain => "shutdown hook asks to try again",
            Self::Abort => "shutdown hook aborted",
            Self::HookFailed => "shutdown hook returned a non-zero exit code",
            Self::Other(_) => "unknown reply code",
        }
    }
}

impl fmt::Display for ShutdownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// Decoded `ConfirmShutdown` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReply {
    pub code: ShutdownCode,
    pub message: String,
    /// Exit code of the shutdown wrapper.
    pub hook_exit_code: i32,
    /// Output of the shutdown wrapper.
    pub hook_output: String,
}

/// Shutdown control at `/Shutdown`.
pub struct Shutdown {
    object: RemoteObject,
}

remote_interface!(Shutdown, "Shutdown", "/Shutdown", ".shutdown");

impl Shutdown {
    /// Ask whether VDR may shut down, optionally ignoring user activity.
    pub async fn confirm_shutdown(&self, ignore_user: bool) -> Result<Reply, VdrError> {
        self.object
            .call("ConfirmShutdown", vec![Value::Bool(ignore_user)])
            .await
    }

    pub async fn confirm(&self, ignore_user: bool) -> Result<ShutdownReply, VdrError> {
        let reply = self.confirm_shutdown(ignore_user).await?;
        Ok(ShutdownReply {
            code: ShutdownCode::from_code(reply.get(0)?),
            message: reply.get(1)?,
            hook_exit_code: reply.get(2)?,
            hook_output: reply.get(3)?,
        })
    }

    pub async fn manual_start(&self) -> Result<Reply, VdrError> {
        self.object.call("ManualStart", vec![]).await
    }

    pub async fn next_wakeup_time(&self) -> Result<Reply, VdrError> {
        self.object.call("NextWakeupTime", vec![]).await
    }

    pub async fn set_user_inactive(&self) -> Result<Reply, VdrError> {
        self.object.call("SetUserInactive", vec![]).await
    }
}
