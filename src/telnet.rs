//! Wire-level constants: the Telnet command byte space (RFC 854) and the
//! IANA-registered Telnet option codes used to look up [`crate::registry::Option`]
//! descriptors.

/// IAC-prefixed command bytes, per RFC 854.
pub mod op_command {
    /// End of subnegotiation parameters.
    pub const SE: u8 = 0xF0;
    /// No operation.
    pub const NOP: u8 = 0xF1;
    /// The data stream portion of a Synch; should be preceded by a byte sent
    /// with the TCP urgent pointer.
    pub const DM: u8 = 0xF2;
    /// NVT character BRK.
    pub const BRK: u8 = 0xF3;
    /// The function IP (Interrupt Process).
    pub const IP: u8 = 0xF4;
    /// The function AO (Abort Output).
    pub const AO: u8 = 0xF5;
    /// The function AYT (Are You There).
    pub const AYT: u8 = 0xF6;
    /// The function EC (Erase Character).
    pub const EC: u8 = 0xF7;
    /// The function EL (Erase Line).
    pub const EL: u8 = 0xF8;
    /// The GA (Go Ahead) signal.
    pub const GA: u8 = 0xF9;
    /// Indicates that what follows is subnegotiation of the indicated option.
    pub const SB: u8 = 0xFA;
    /// Indicates the desire to begin performing, or confirmation that you are
    /// now performing, the indicated option.
    pub const WILL: u8 = 0xFB;
    /// Indicates the refusal to perform, or continue performing, the
    /// indicated option.
    pub const WONT: u8 = 0xFC;
    /// Indicates the request that the other party perform, or confirmation
    /// that you are expecting the other party to perform, the indicated
    /// option.
    pub const DO: u8 = 0xFD;
    /// Indicates the demand that the other party stop performing, or
    /// confirmation that you are no longer expecting the other party to
    /// perform, the indicated option.
    pub const DONT: u8 = 0xFE;
    /// Interpret As Command. Doubled in the data stream to represent a
    /// literal 0xFF byte.
    pub const IAC: u8 = 0xFF;

    /// `true` if `b` is one of WILL/WONT/DO/DONT.
    #[must_use]
    pub fn is_negotiation(b: u8) -> bool {
        matches!(b, WILL | WONT | DO | DONT)
    }
}

/// Subnegotiation sub-commands in common use (e.g. for TERMINAL-TYPE, NAWS).
pub mod op_sub {
    pub const IS: u8 = 0;
    pub const SEND: u8 = 1;
}

/// IANA-registered Telnet option codes.
///
/// From <https://www.iana.org/assignments/telnet-options/telnet-options.xhtml>.
pub mod op_option {
    /// RFC 856. Affects CR/LF escaping on the wire.
    pub const BINARY: u8 = 0;
    /// RFC 857.
    pub const ECHO: u8 = 1;
    /// NIC 15391 of 1973.
    pub const RECONNECTION: u8 = 2;
    /// RFC 858.
    pub const SUPPRESS_GO_AHEAD: u8 = 3;
    /// NIC 15393 of 1973.
    pub const APPROX_MESSAGE_SIZE: u8 = 4;
    /// RFC 859. Has a built-in handler, see [`crate::fsm`].
    pub const STATUS: u8 = 5;
    /// RFC 860.
    pub const TIMING_MARK: u8 = 6;
    /// RFC 726.
    pub const RCTE: u8 = 7;
    /// RFC 732/1043.
    pub const OUT_LINE_WIDTH: u8 = 8;
    pub const OUT_PAGE_SIZE: u8 = 9;
    /// RFC 652.
    pub const NAOCRD: u8 = 10;
    /// RFC 653.
    pub const NAOHTS: u8 = 11;
    /// RFC 654.
    pub const NAOHTD: u8 = 12;
    /// RFC 655.
    pub const NAOFFD: u8 = 13;
    /// RFC 656.
    pub const NAOVTS: u8 = 14;
    /// RFC 657.
    pub const NAOVTD: u8 = 15;
    /// RFC 655.
    pub const NAOLFD: u8 = 16;
    /// RFC 698.
    pub const XASCII: u8 = 17;
    /// RFC 727.
    pub const LOGOUT: u8 = 18;
    /// RFC 735.
    pub const BYTE_MACRO: u8 = 19;
    /// RFC 732/1043.
    pub const DET: u8 = 20;
    /// RFC 736/734.
    pub const SUPDUP: u8 = 21;
    /// RFC 749.
    pub const SUPDUP_OUTPUT: u8 = 22;
    /// RFC 779.
    pub const SEND_LOCATION: u8 = 23;
    /// RFC 1091.
    pub const TERMINAL_TYPE: u8 = 24;
    /// RFC 885.
    pub const END_OF_RECORD: u8 = 25;
    /// RFC 927.
    pub const TACACS_UID: u8 = 26;
    /// RFC 933.
    pub const OUTPUT_MARKING: u8 = 27;
    /// RFC 946.
    pub const TERMINAL_LOCATION: u8 = 28;
    /// RFC 1041.
    pub const REGIME_3270: u8 = 29;
    /// RFC 1053.
    pub const X3_PAD: u8 = 30;
    /// RFC 1073.
    pub const NAWS: u8 = 31;
    /// RFC 1079.
    pub const TERMINAL_SPEED: u8 = 32;
    /// RFC 1372.
    pub const TOGGLE_FLOW_CONTROL: u8 = 33;
    /// RFC 1184.
    pub const LINEMODE: u8 = 34;
    /// RFC 1096.
    pub const X_DISPLAY_LOCATION: u8 = 35;
    /// RFC 1408, superseded by [`NEW_ENVIRON`].
    pub const ENVIRON: u8 = 36;
    /// RFC 2941.
    pub const AUTHENTICATION: u8 = 37;
    /// RFC 2946.
    pub const ENCRYPT: u8 = 38;
    /// RFC 1572.
    pub const NEW_ENVIRON: u8 = 39;
    /// Mud Server Status Protocol, widely deployed MUD extension.
    pub const MSSP: u8 = 70;
    pub const COMPRESS: u8 = 85;
    pub const COMPRESS2: u8 = 86;
    pub const ZMP: u8 = 93;
    /// Generic MUD Communication Protocol.
    pub const GMCP: u8 = 201;
    /// RFC 861. Not implemented beyond the byte value, per scope.
    pub const EXOPL: u8 = 255;
}
