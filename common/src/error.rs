use thiserror::Error;

/// Errors reported by the vendor IOTC / AV client library.
///
/// The library reports failures as negative integers. They are translated into
/// this enum at the SDK boundary so nothing past it deals in raw codes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkError {
    // ------------------------------------------------------------------
    // IOTC (connection layer)
    // ------------------------------------------------------------------
    #[error("Master doesn't respond, check whether the network can reach the Internet")]
    ServerNotResponding,

    #[error("Can't resolve hostname")]
    ResolveHostnameFailed,

    #[error("Already initialized")]
    AlreadyInitialized,

    #[error("Can't create mutex")]
    CreateMutexFailed,

    #[error("Can't create thread")]
    CreateThreadFailed,

    #[error("This UID is unlicensed, check your UID")]
    Unlicensed,

    #[error("IOTC module is not initialized")]
    NotInitialized,

    #[error("Connection attempt timed out")]
    Timeout,

    #[error("This session id is invalid")]
    InvalidSessionId,

    #[error("The amount of sessions reached the maximum, release a session first")]
    ExceedMaxSession,

    #[error("Device didn't register on server, so it can't be found")]
    DeviceNotFound,

    #[error("Session is closed by remote")]
    SessionClosedByRemote,

    #[error("No acknowledgement within timeout, the session might be disconnected by remote")]
    RemoteTimeoutDisconnect,

    #[error("Device doesn't listen or its sessions reached the maximum")]
    DeviceNotListening,

    #[error("Channel isn't on")]
    ChannelNotOn,

    #[error("All channels are occupied")]
    NoFreeChannel,

    #[error("Device can't connect to master, check proxy and firewall settings")]
    TcpTravelFailed,

    #[error("Can't connect to server by TCP, check proxy and firewall settings")]
    TcpConnectFailed,

    #[error("This UID's license doesn't support TCP")]
    NoPermission,

    #[error("Network is unreachable")]
    NetworkUnreachable,

    #[error("Can't connect to the device via LAN, P2P or relay mode")]
    SetupRelayFailed,

    #[error("Server doesn't support UDP relay mode")]
    RelayNotSupported,

    // ------------------------------------------------------------------
    // AV (streaming layer)
    // ------------------------------------------------------------------
    #[error("Invalid argument")]
    AvInvalidArgument,

    #[error("Receive buffer is too small for the frame")]
    AvBufferTooSmall,

    #[error("The amount of AV channels reached the maximum")]
    AvExceedMaxChannel,

    #[error("Insufficient memory")]
    AvOutOfMemory,

    #[error("Can't create AV thread")]
    AvCreateThreadFailed,

    #[error("AV server doesn't respond")]
    AvServerNoResponse,

    #[error("Client hasn't logged in to the AV server")]
    AvNotLoggedIn,

    #[error("Wrong view account or password")]
    AvWrongCredentials,

    #[error("AV session id is invalid")]
    AvInvalidSessionId,

    #[error("AV operation timed out")]
    AvTimeout,

    #[error("No frame data is ready yet")]
    AvDataNotReady,

    #[error("Frame is incomplete")]
    AvIncompleteFrame,

    #[error("This frame was lost")]
    AvFrameLost,

    #[error("AV session is closed by remote")]
    AvSessionClosedByRemote,

    #[error("AV session was disconnected by remote timeout")]
    AvRemoteTimeoutDisconnect,

    #[error("AV server has exited")]
    AvServerExit,

    #[error("AV client has exited")]
    AvClientExit,

    #[error("AV module is not initialized")]
    AvNotInitialized,

    #[error("Unrecognized vendor error")]
    Unknown(i32),
}

/// How a receiver loop should react to an [`SdkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Nothing buffered yet; back off and poll again.
    NoData,
    /// A single frame was dropped inside the SDK.
    FrameLost,
    /// The peer or the session is gone. Nothing more will arrive.
    SessionTerminal,
    /// Anything else.
    Failure,
}

impl SdkError {
    /// Translate a raw vendor return code.
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => SdkError::ServerNotResponding,
            -2 => SdkError::ResolveHostnameFailed,
            -3 => SdkError::AlreadyInitialized,
            -4 => SdkError::CreateMutexFailed,
            -5 => SdkError::CreateThreadFailed,
            -10 => SdkError::Unlicensed,
            -12 => SdkError::NotInitialized,
            -13 => SdkError::Timeout,
            -14 => SdkError::InvalidSessionId,
            -18 => SdkError::ExceedMaxSession,
            -19 => SdkError::DeviceNotFound,
            -22 => SdkError::SessionClosedByRemote,
            -23 => SdkError::RemoteTimeoutDisconnect,
            -24 => SdkError::DeviceNotListening,
            -26 => SdkError::ChannelNotOn,
            -31 => SdkError::NoFreeChannel,
            -32 => SdkError::TcpTravelFailed,
            -33 => SdkError::TcpConnectFailed,
            -40 => SdkError::NoPermission,
            -41 => SdkError::NetworkUnreachable,
            -42 => SdkError::SetupRelayFailed,
            -43 => SdkError::RelayNotSupported,
            -20000 => SdkError::AvInvalidArgument,
            -20001 => SdkError::AvBufferTooSmall,
            -20002 => SdkError::AvExceedMaxChannel,
            -20003 => SdkError::AvOutOfMemory,
            -20004 => SdkError::AvCreateThreadFailed,
            -20007 => SdkError::AvServerNoResponse,
            -20008 => SdkError::AvNotLoggedIn,
            -20009 => SdkError::AvWrongCredentials,
            -20010 => SdkError::AvInvalidSessionId,
            -20011 => SdkError::AvTimeout,
            -20012 => SdkError::AvDataNotReady,
            -20013 => SdkError::AvIncompleteFrame,
            -20014 => SdkError::AvFrameLost,
            -20015 => SdkError::AvSessionClosedByRemote,
            -20016 => SdkError::AvRemoteTimeoutDisconnect,
            -20017 => SdkError::AvServerExit,
            -20018 => SdkError::AvClientExit,
            -20019 => SdkError::AvNotInitialized,
            other => SdkError::Unknown(other),
        }
    }

    /// The raw vendor code this error was translated from.
    pub fn code(&self) -> i32 {
        match self {
            SdkError::ServerNotResponding => -1,
            SdkError::ResolveHostnameFailed => -2,
            SdkError::AlreadyInitialized => -3,
            SdkError::CreateMutexFailed => -4,
            SdkError::CreateThreadFailed => -5,
            SdkError::Unlicensed => -10,
            SdkError::NotInitialized => -12,
            SdkError::Timeout => -13,
            SdkError::InvalidSessionId => -14,
            SdkError::ExceedMaxSession => -18,
            SdkError::DeviceNotFound => -19,
            SdkError::SessionClosedByRemote => -22,
            SdkError::RemoteTimeoutDisconnect => -23,
            SdkError::DeviceNotListening => -24,
            SdkError::ChannelNotOn => -26,
            SdkError::NoFreeChannel => -31,
            SdkError::TcpTravelFailed => -32,
            SdkError::TcpConnectFailed => -33,
            SdkError::NoPermission => -40,
            SdkError::NetworkUnreachable => -41,
            SdkError::SetupRelayFailed => -42,
            SdkError::RelayNotSupported => -43,
            SdkError::AvInvalidArgument => -20000,
            SdkError::AvBufferTooSmall => -20001,
            SdkError::AvExceedMaxChannel => -20002,
            SdkError::AvOutOfMemory => -20003,
            SdkError::AvCreateThreadFailed => -20004,
            SdkError::AvServerNoResponse => -20007,
            SdkError::AvNotLoggedIn => -20008,
            SdkError::AvWrongCredentials => -20009,
            SdkError::AvInvalidSessionId => -20010,
            SdkError::AvTimeout => -20011,
            SdkError::AvDataNotReady => -20012,
            SdkError::AvIncompleteFrame => -20013,
            SdkError::AvFrameLost => -20014,
            SdkError::AvSessionClosedByRemote => -20015,
            SdkError::AvRemoteTimeoutDisconnect => -20016,
            SdkError::AvServerExit => -20017,
            SdkError::AvClientExit => -20018,
            SdkError::AvNotInitialized => -20019,
            SdkError::Unknown(code) => *code,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            SdkError::AvDataNotReady => ErrorClass::NoData,
            SdkError::AvFrameLost | SdkError::AvIncompleteFrame => ErrorClass::FrameLost,
            SdkError::AvSessionClosedByRemote
            | SdkError::AvRemoteTimeoutDisconnect
            | SdkError::InvalidSessionId
            | SdkError::AvInvalidSessionId
            | SdkError::SessionClosedByRemote
            | SdkError::RemoteTimeoutDisconnect
            | SdkError::AvServerExit
            | SdkError::AvClientExit => ErrorClass::SessionTerminal,
            _ => ErrorClass::Failure,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.class() == ErrorClass::SessionTerminal
    }

    /// Vendor-style symbolic name, e.g. `AV_ER_SESSION_CLOSE_BY_REMOTE`.
    pub fn name(&self) -> &'static str {
        match self {
            SdkError::ServerNotResponding => "IOTC_ER_SERVER_NOT_RESPONSE",
            SdkError::ResolveHostnameFailed => "IOTC_ER_FAIL_RESOLVE_HOSTNAME",
            SdkError::AlreadyInitialized => "IOTC_ER_ALREADY_INITIALIZED",
            SdkError::CreateMutexFailed => "IOTC_ER_FAIL_CREATE_MUTEX",
            SdkError::CreateThreadFailed => "IOTC_ER_FAIL_CREATE_THREAD",
            SdkError::Unlicensed => "IOTC_ER_UNLICENSE",
            SdkError::NotInitialized => "IOTC_ER_NOT_INITIALIZED",
            SdkError::Timeout => "IOTC_ER_TIMEOUT",
            SdkError::InvalidSessionId => "IOTC_ER_INVALID_SID",
            SdkError::ExceedMaxSession => "IOTC_ER_EXCEED_MAX_SESSION",
            SdkError::DeviceNotFound => "IOTC_ER_CAN_NOT_FIND_DEVICE",
            SdkError::SessionClosedByRemote => "IOTC_ER_SESSION_CLOSE_BY_REMOTE",
            SdkError::RemoteTimeoutDisconnect => "IOTC_ER_REMOTE_TIMEOUT_DISCONNECT",
            SdkError::DeviceNotListening => "IOTC_ER_DEVICE_NOT_LISTENING",
            SdkError::ChannelNotOn => "IOTC_ER_CH_NOT_ON",
            SdkError::NoFreeChannel => "IOTC_ER_SESSION_NO_FREE_CHANNEL",
            SdkError::TcpTravelFailed => "IOTC_ER_TCP_TRAVEL_FAILED",
            SdkError::TcpConnectFailed => "IOTC_ER_TCP_CONNECT_TO_SERVER_FAILED",
            SdkError::NoPermission => "IOTC_ER_NO_PERMISSION",
            SdkError::NetworkUnreachable => "IOTC_ER_NETWORK_UNREACHABLE",
            SdkError::SetupRelayFailed => "IOTC_ER_FAIL_SETUP_RELAY",
            SdkError::RelayNotSupported => "IOTC_ER_NOT_SUPPORT_RELAY",
            SdkError::AvInvalidArgument => "AV_ER_INVALID_ARG",
            SdkError::AvBufferTooSmall => "AV_ER_BUFPARA_MAXSIZE_INSUFF",
            SdkError::AvExceedMaxChannel => "AV_ER_EXCEED_MAX_CHANNEL",
            SdkError::AvOutOfMemory => "AV_ER_MEM_INSUFF",
            SdkError::AvCreateThreadFailed => "AV_ER_FAIL_CREATE_THREAD",
            SdkError::AvServerNoResponse => "AV_ER_SERV_NO_RESPONSE",
            SdkError::AvNotLoggedIn => "AV_ER_CLIENT_NO_AVLOGIN",
            SdkError::AvWrongCredentials => "AV_ER_WRONG_VIEWACCorPWD",
            SdkError::AvInvalidSessionId => "AV_ER_INVALID_SID",
            SdkError::AvTimeout => "AV_ER_TIMEOUT",
            SdkError::AvDataNotReady => "AV_ER_DATA_NOREADY",
            SdkError::AvIncompleteFrame => "AV_ER_INCOMPLETE_FRAME",
            SdkError::AvFrameLost => "AV_ER_LOSED_THIS_FRAME",
            SdkError::AvSessionClosedByRemote => "AV_ER_SESSION_CLOSE_BY_REMOTE",
            SdkError::AvRemoteTimeoutDisconnect => "AV_ER_REMOTE_TIMEOUT_DISCONNECT",
            SdkError::AvServerExit => "AV_ER_SERVER_EXIT",
            SdkError::AvClientExit => "AV_ER_CLIENT_EXIT",
            SdkError::AvNotInitialized => "AV_ER_NOT_INITIALIZED",
            SdkError::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Map a vendor return value to `Ok(value)` or the translated error.
pub fn check_code(code: i32) -> Result<i32, SdkError> {
    if code < 0 {
        Err(SdkError::from_code(code))
    } else {
        Ok(code)
    }
}

pub type SdkResult<T> = std::result::Result<T, SdkError>;
